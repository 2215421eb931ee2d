use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use briefly_core::Article;

use super::{NewsError, NewsSource};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";

/// Client for the `/v2/everything` search endpoint.
pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn search(&self, query: &str, since: DateTime<Utc>) -> Result<Vec<Article>, NewsError> {
        let from = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let resp = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[
                ("q", query),
                ("from", from.as_str()),
                ("sortBy", "publishedAt"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NewsError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NewsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EverythingResponse = resp
            .json()
            .await
            .map_err(|e| NewsError::Decode(e.to_string()))?;

        Ok(parsed
            .articles
            .into_iter()
            .map(|a| Article::from_parts(a.title, a.description, a.url))
            .collect())
    }
}
