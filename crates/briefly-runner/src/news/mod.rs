pub mod mock;
pub mod newsapi;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use briefly_core::category::DEFAULT_CATEGORIES;
use briefly_core::Article;

/// Articles kept per category.
pub const ARTICLES_PER_CATEGORY: usize = 5;

/// How far back the search window reaches.
pub const SEARCH_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("news request failed: {0}")]
    Request(String),

    #[error("news API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("news response could not be decoded: {0}")]
    Decode(String),
}

/// A searchable source of recent articles.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Articles matching `query` published since `since`, newest first.
    async fn search(&self, query: &str, since: DateTime<Utc>) -> Result<Vec<Article>, NewsError>;
}

/// The categories a cycle should fetch: the requested ones, or the defaults
/// when none were given.
pub fn effective_categories(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

/// Fetch up to [`ARTICLES_PER_CATEGORY`] articles for every category in
/// parallel. A failing category contributes nothing; results keep the order
/// of `categories`.
pub async fn fetch_articles(
    source: &dyn NewsSource,
    categories: &[String],
    now: DateTime<Utc>,
) -> Vec<Article> {
    let since = now - Duration::days(SEARCH_WINDOW_DAYS);

    let fetches = categories.iter().map(|category| async move {
        match source.search(category, since).await {
            Ok(mut articles) => {
                articles.truncate(ARTICLES_PER_CATEGORY);
                debug!(
                    "news[{}]: {} articles for '{category}'",
                    source.name(),
                    articles.len()
                );
                articles
            }
            Err(e) => {
                warn!("news[{}]: fetch failed for '{category}': {e}", source.name());
                Vec::new()
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}
