use async_trait::async_trait;
use serde::Deserialize;

use super::{MailError, Mailer, OutgoingEmail};

pub const DEFAULT_BASE_URL: &str = "https://api.resend.com";

/// Client for the Resend `POST /emails` endpoint.
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
}

impl ResendClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ResendClient {
    fn name(&self) -> &str {
        "resend"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let resp = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A 2xx means the email was accepted even if the id is missing.
        let parsed: SendResponse = resp.json().await.unwrap_or(SendResponse { id: String::new() });
        Ok(parsed.id)
    }
}
