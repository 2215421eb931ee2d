use anyhow::{bail, Result};
use clap::Args;

use briefly_core::schedule::BackoffPolicy;

use crate::cycle::CycleSettings;
use crate::mailer::resend;
use crate::news::newsapi;
use crate::retry::RetryPolicy;
use crate::summarizer::gemini;

/// Outbound services and retry tuning for send cycles.
#[derive(Debug, Clone, Args)]
pub struct PipelineConfig {
    /// News search API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    #[arg(long, env = "NEWS_API_URL", default_value = newsapi::DEFAULT_BASE_URL)]
    pub news_api_url: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_API_URL", default_value = gemini::DEFAULT_BASE_URL)]
    pub gemini_api_url: String,

    /// Resend API key
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    #[arg(long, env = "RESEND_API_URL", default_value = resend::DEFAULT_BASE_URL)]
    pub resend_api_url: String,

    /// Sender address for newsletters
    #[arg(long, env = "BRIEFLY_EMAIL_FROM", default_value = "onboarding@resend.dev")]
    pub email_from: String,

    /// Hour of day (UTC) that scheduled sends are pinned to
    #[arg(long, env = "BRIEFLY_SEND_HOUR", default_value = "9",
          value_parser = clap::value_parser!(u32).range(0..24))]
    pub send_hour: u32,

    /// Attempts per external step before the cycle fails
    #[arg(long, env = "BRIEFLY_STEP_ATTEMPTS", default_value = "3")]
    pub step_attempts: u32,

    /// Failed cycles retried with backoff before falling back to the regular slot
    #[arg(long, env = "BRIEFLY_MAX_CYCLE_RETRIES", default_value = "3")]
    pub max_cycle_retries: u32,

    /// Base delay (minutes) of the failed-cycle backoff
    #[arg(long, env = "BRIEFLY_RETRY_BASE_MINUTES", default_value = "5")]
    pub retry_base_minutes: u32,
}

/// API keys required to run cycles against the real services.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    pub news: String,
    pub gemini: String,
    pub resend: String,
}

impl PipelineConfig {
    /// Fail with every missing key named.
    pub fn require_keys(&self) -> Result<ApiKeys> {
        let missing: Vec<&str> = [
            ("NEWS_API_KEY", &self.news_api_key),
            ("GEMINI_API_KEY", &self.gemini_api_key),
            ("RESEND_API_KEY", &self.resend_api_key),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            bail!("missing required configuration: {}", missing.join(", "));
        }

        Ok(ApiKeys {
            news: self.news_api_key.clone().unwrap_or_default(),
            gemini: self.gemini_api_key.clone().unwrap_or_default(),
            resend: self.resend_api_key.clone().unwrap_or_default(),
        })
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            email_from: self.email_from.clone(),
            send_hour: self.send_hour,
            step_retry: RetryPolicy {
                attempts: self.step_attempts,
                ..RetryPolicy::default()
            },
            backoff: BackoffPolicy {
                base: chrono::Duration::minutes(i64::from(self.retry_base_minutes)),
                max_failures: self.max_cycle_retries,
                ..BackoffPolicy::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        pipeline: PipelineConfig,
    }

    fn parse(args: &[&str]) -> PipelineConfig {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().pipeline
    }

    #[test]
    fn defaults_and_overrides() {
        let cfg = parse(&["--send-hour", "7", "--max-cycle-retries", "5"]);
        assert_eq!(cfg.gemini_model, "gemini-2.5-flash");
        assert_eq!(cfg.email_from, "onboarding@resend.dev");

        let settings = cfg.cycle_settings();
        assert_eq!(settings.send_hour, 7);
        assert_eq!(settings.backoff.max_failures, 5);
        assert_eq!(settings.backoff.base, chrono::Duration::minutes(5));
        assert_eq!(settings.step_retry.attempts, 3);
    }

    #[test]
    fn send_hour_out_of_range_is_rejected() {
        let err = TestCli::try_parse_from(["test", "--send-hour", "24"]);
        assert!(err.is_err());
    }

    #[test]
    fn missing_keys_are_listed() {
        let cfg = parse(&["--news-api-key", "n", "--resend-api-key", " "]);
        let err = cfg.require_keys().unwrap_err().to_string();
        assert!(err.contains("GEMINI_API_KEY"));
        assert!(err.contains("RESEND_API_KEY"));
        assert!(!err.contains("NEWS_API_KEY"));
    }

    #[test]
    fn all_keys_present() {
        let cfg = parse(&[
            "--news-api-key", "n",
            "--gemini-api-key", "g",
            "--resend-api-key", "r",
        ]);
        let keys = cfg.require_keys().unwrap();
        assert_eq!(keys.gemini, "g");
    }
}
