use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MailError, Mailer, OutgoingEmail};

/// A mailer for tests that records every delivered email.
pub struct MockMailer {
    fail_first: u32,
    attempts: AtomicU32,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMailer {
    pub fn new() -> Self {
        Self {
            fail_first: 0,
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(MailError::Status {
                status: 500,
                body: "mock failure".into(),
            });
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| MailError::Request(e.to_string()))?;
        sent.push(email.clone());
        Ok(format!("mock-{}", sent.len()))
    }
}
