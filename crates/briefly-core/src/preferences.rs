use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::frequency::Frequency;

/// The single per-user record controlling topics, cadence, and active status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: String,
    pub categories: Vec<String>,
    pub frequency: Frequency,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the scheduler should next run a send cycle for this user.
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Consecutive failed cycles since the last successful send.
    pub failure_count: u32,
    pub last_error: Option<String>,
}

/// Raw submission body. Every field is optional so that a missing field
/// produces a validation message instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitPreferences {
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPreferences {
    pub categories: Vec<String>,
    pub frequency: Frequency,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetActive {
    pub is_active: bool,
}

impl SubmitPreferences {
    /// Read a submission from an arbitrary JSON object. Fields of the wrong
    /// shape are mapped to values that fail [`validate`](Self::validate) for
    /// that field, so a list of numbers is reported as invalid categories
    /// rather than as a malformed body.
    pub fn from_json(body: &Value) -> Self {
        let categories = body.get("categories").map(|v| match v.as_array() {
            Some(items) if items.iter().all(Value::is_string) => items
                .iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        });
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(String::from);

        Self {
            categories,
            frequency: text("frequency"),
            email: text("email"),
        }
    }

    pub fn validate(self) -> Result<NewPreferences, ValidationError> {
        let categories = normalize_categories(self.categories.unwrap_or_default());
        if categories.is_empty() {
            return Err(ValidationError::InvalidCategories);
        }

        let frequency = self
            .frequency
            .as_deref()
            .and_then(Frequency::parse_str)
            .ok_or(ValidationError::InvalidFrequency)?;

        let email = self.email.unwrap_or_default().trim().to_string();
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail);
        }

        Ok(NewPreferences {
            categories,
            frequency,
            email,
        })
    }
}

/// Trim entries and drop blanks and repeats, keeping first-seen order.
fn normalize_categories(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for category in raw {
        let category = category.trim();
        if category.is_empty() || out.iter().any(|c| c == category) {
            continue;
        }
        out.push(category.to_string());
    }
    out
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(categories: Option<Vec<&str>>, frequency: Option<&str>) -> SubmitPreferences {
        SubmitPreferences {
            categories: categories.map(|c| c.into_iter().map(String::from).collect()),
            frequency: frequency.map(String::from),
            email: Some("reader@example.com".into()),
        }
    }

    #[test]
    fn valid_submission_passes() {
        let prefs = submission(Some(vec!["technology", "science"]), Some("weekly"))
            .validate()
            .unwrap();
        assert_eq!(prefs.categories, vec!["technology", "science"]);
        assert_eq!(prefs.frequency, Frequency::Weekly);
        assert_eq!(prefs.email, "reader@example.com");
    }

    #[test]
    fn missing_categories_rejected() {
        let err = submission(None, Some("daily")).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidCategories);
    }

    #[test]
    fn empty_categories_rejected() {
        let err = submission(Some(vec![]), Some("daily")).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidCategories);
    }

    #[test]
    fn blank_only_categories_rejected() {
        let err = submission(Some(vec!["  ", ""]), Some("daily"))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidCategories);
    }

    #[test]
    fn categories_are_trimmed_and_deduplicated() {
        let prefs = submission(Some(vec![" health", "health ", "sports"]), Some("daily"))
            .validate()
            .unwrap();
        assert_eq!(prefs.categories, vec!["health", "sports"]);
    }

    #[test]
    fn unknown_frequency_rejected() {
        let err = submission(Some(vec!["sports"]), Some("monthly"))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidFrequency);
    }

    #[test]
    fn missing_frequency_rejected() {
        let err = submission(Some(vec!["sports"]), None).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidFrequency);
    }

    #[test]
    fn categories_checked_before_frequency() {
        let err = submission(Some(vec![]), Some("never")).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidCategories);
    }

    #[test]
    fn email_without_at_rejected() {
        let mut s = submission(Some(vec!["sports"]), Some("daily"));
        s.email = Some("not-an-address".into());
        assert_eq!(s.validate().unwrap_err(), ValidationError::InvalidEmail);
    }

    #[test]
    fn missing_email_rejected() {
        let mut s = submission(Some(vec!["sports"]), Some("daily"));
        s.email = None;
        assert_eq!(s.validate().unwrap_err(), ValidationError::InvalidEmail);
    }

    #[test]
    fn from_json_reads_well_formed_body() {
        let body = serde_json::json!({
            "categories": ["science"],
            "frequency": "biweekly",
            "email": "reader@example.com"
        });
        let prefs = SubmitPreferences::from_json(&body).validate().unwrap();
        assert_eq!(prefs.categories, vec!["science"]);
        assert_eq!(prefs.frequency, Frequency::Biweekly);
    }

    #[test]
    fn from_json_non_list_categories_are_invalid() {
        for categories in [serde_json::json!("science"), serde_json::json!([1, 2])] {
            let body = serde_json::json!({
                "categories": categories,
                "frequency": "daily",
                "email": "reader@example.com"
            });
            let err = SubmitPreferences::from_json(&body).validate().unwrap_err();
            assert_eq!(err, ValidationError::InvalidCategories);
        }
    }

    #[test]
    fn from_json_non_string_frequency_is_invalid() {
        let body = serde_json::json!({
            "categories": ["science"],
            "frequency": 7,
            "email": "reader@example.com"
        });
        let err = SubmitPreferences::from_json(&body).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidFrequency);
    }

    #[test]
    fn error_messages_match_api_contract() {
        assert_eq!(ValidationError::InvalidCategories.to_string(), "Invalid categories");
        assert_eq!(ValidationError::InvalidFrequency.to_string(), "Invalid frequency");
    }
}
