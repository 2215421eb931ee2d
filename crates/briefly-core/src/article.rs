use serde::{Deserialize, Serialize};

/// A news article as it flows through one send cycle. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
}

impl Article {
    pub const UNTITLED: &'static str = "No title";
    pub const NO_DESCRIPTION: &'static str = "No description";
    pub const NO_URL: &'static str = "#";

    /// Build an article from possibly-missing upstream fields.
    pub fn from_parts(
        title: Option<String>,
        description: Option<String>,
        url: Option<String>,
    ) -> Self {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self {
            title: or_default(title, Self::UNTITLED),
            description: or_default(description, Self::NO_DESCRIPTION),
            url: or_default(url, Self::NO_URL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_fills_missing_fields() {
        let article = Article::from_parts(None, Some("  ".into()), None);
        assert_eq!(article.title, "No title");
        assert_eq!(article.description, "No description");
        assert_eq!(article.url, "#");
    }

    #[test]
    fn from_parts_keeps_present_fields() {
        let article = Article::from_parts(
            Some("Rust 2.0".into()),
            Some("Big news".into()),
            Some("https://example.com/a".into()),
        );
        assert_eq!(article.title, "Rust 2.0");
        assert_eq!(article.description, "Big news");
        assert_eq!(article.url, "https://example.com/a");
    }
}
