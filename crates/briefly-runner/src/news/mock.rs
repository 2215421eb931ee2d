use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use briefly_core::Article;

use super::{NewsError, NewsSource};

/// A news source for tests. Unknown queries return no articles; every call is
/// recorded.
pub struct MockNewsSource {
    results: HashMap<String, Vec<Article>>,
    failing: Vec<String>,
    queries: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl Default for MockNewsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNewsSource {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failing: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_articles(mut self, query: &str, articles: Vec<Article>) -> Self {
        self.results.insert(query.to_string(), articles);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn queries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NewsSource for MockNewsSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, since: DateTime<Utc>) -> Result<Vec<Article>, NewsError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push((query.to_string(), since));
        }
        if self.failing.iter().any(|f| f == query) {
            return Err(NewsError::Status {
                status: 500,
                body: "mock failure".into(),
            });
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}
