use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use briefly_core::schedule::{BackoffPolicy, ScheduleUpdate};
use briefly_core::CycleRequest;
use briefly_db::Database;
use briefly_prompts::{assemble_prompt, PromptContext};

use crate::config::PipelineConfig;
use crate::mailer::resend::ResendClient;
use crate::mailer::{MailError, Mailer, OutgoingEmail};
use crate::news::newsapi::NewsApiClient;
use crate::news::{effective_categories, fetch_articles, NewsSource};
use crate::render::markdown_to_html;
use crate::retry::{retry, RetryPolicy};
use crate::summarizer::gemini::GeminiClient;
use crate::summarizer::{SummarizeError, Summarizer};
use crate::template::{self, NewsletterEmail};

/// Tracing target for failures that need a human.
pub const ALERT_TARGET: &str = "briefly::alert";

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub email_from: String,
    /// Hour of day (UTC) regular sends are pinned to.
    pub send_hour: u32,
    pub step_retry: RetryPolicy,
    pub backoff: BackoffPolicy,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            email_from: "onboarding@resend.dev".into(),
            send_hour: 9,
            step_retry: RetryPolicy::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// What one send cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The record was missing or inactive; nothing was written.
    Skipped { reason: String },
    Sent {
        article_count: usize,
        next_run_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        failure_count: u32,
        next_run_at: DateTime<Utc>,
        /// Backoff retries are used up and the record went back to its
        /// regular slot.
        exhausted: bool,
    },
}

#[derive(Debug, Error)]
enum StepError {
    #[error("summarize: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("render email: {0}")]
    Render(#[from] minijinja::Error),

    #[error("send email: {0}")]
    Mail(#[from] MailError),
}

/// Everything a send cycle talks to.
pub struct Pipeline {
    db: Arc<dyn Database>,
    news: Arc<dyn NewsSource>,
    summarizer: Arc<dyn Summarizer>,
    mailer: Arc<dyn Mailer>,
    settings: CycleSettings,
}

impl Pipeline {
    pub fn new(
        db: Arc<dyn Database>,
        news: Arc<dyn NewsSource>,
        summarizer: Arc<dyn Summarizer>,
        mailer: Arc<dyn Mailer>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            db,
            news,
            summarizer,
            mailer,
            settings,
        }
    }

    /// Build a pipeline backed by the real news, Gemini and Resend APIs.
    pub fn from_config(config: &PipelineConfig, db: Arc<dyn Database>) -> Result<Self> {
        let keys = config.require_keys()?;
        Ok(Self::new(
            db,
            Arc::new(NewsApiClient::new(&config.news_api_url, &keys.news)),
            Arc::new(GeminiClient::new(
                &config.gemini_api_url,
                &keys.gemini,
                &config.gemini_model,
            )),
            Arc::new(ResendClient::new(&config.resend_api_url, &keys.resend)),
            config.cycle_settings(),
        ))
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub async fn run_cycle(&self, req: &CycleRequest) -> Result<CycleOutcome> {
        self.run_cycle_at(req, Utc::now()).await
    }

    /// Run one send cycle as of `now` and persist the resulting schedule.
    ///
    /// Errors are returned only when the schedule itself cannot be written;
    /// step failures are recorded on the record and reported as
    /// [`CycleOutcome::Failed`].
    pub async fn run_cycle_at(&self, req: &CycleRequest, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let prefs = match self.db.get_preferences(&req.user_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("cycle[{}]: preferences lookup failed: {e}", req.user_id);
                return Ok(CycleOutcome::Skipped {
                    reason: format!("lookup failed: {e}"),
                });
            }
        };
        if !prefs.is_active {
            info!("cycle[{}]: inactive, skipping", req.user_id);
            return Ok(CycleOutcome::Skipped {
                reason: "inactive".into(),
            });
        }

        match self.deliver(req, now).await {
            Ok(article_count) => {
                let next_run_at = req.frequency.next_run_at(now, self.settings.send_hour);
                self.db
                    .update_schedule(&req.user_id, &ScheduleUpdate::sent(now, next_run_at))
                    .await
                    .with_context(|| format!("recording send for {}", req.user_id))?;
                info!(
                    "cycle[{}]: sent {article_count} articles, next run {next_run_at}",
                    req.user_id
                );
                Ok(CycleOutcome::Sent {
                    article_count,
                    next_run_at,
                })
            }
            Err(e) => {
                let message = e.to_string();
                let plan = self.settings.backoff.plan_failure(
                    now,
                    prefs.failure_count,
                    req.frequency,
                    self.settings.send_hour,
                );
                if plan.exhausted {
                    error!(
                        target: ALERT_TARGET,
                        user_id = %req.user_id,
                        failures = plan.failure_count,
                        "newsletter delivery keeps failing: {message}; \
                         falling back to regular schedule at {}",
                        plan.next_run_at
                    );
                } else {
                    error!(
                        "cycle[{}]: failed ({}/{}): {message}; retrying at {}",
                        req.user_id,
                        plan.failure_count,
                        self.settings.backoff.max_failures,
                        plan.next_run_at
                    );
                }
                self.db
                    .update_schedule(
                        &req.user_id,
                        &ScheduleUpdate::failed(plan.next_run_at, plan.failure_count, message.clone()),
                    )
                    .await
                    .with_context(|| format!("recording failure for {}", req.user_id))?;
                Ok(CycleOutcome::Failed {
                    error: message,
                    failure_count: plan.failure_count,
                    next_run_at: plan.next_run_at,
                    exhausted: plan.exhausted,
                })
            }
        }
    }

    /// Fetch, summarize, render and send. Returns the article count.
    async fn deliver(&self, req: &CycleRequest, now: DateTime<Utc>) -> Result<usize, StepError> {
        let categories = effective_categories(&req.categories);
        let articles = fetch_articles(self.news.as_ref(), &categories, now).await;

        let prompt = assemble_prompt(&PromptContext::new(&categories, &articles));
        let summary = retry("summarize", &self.settings.step_retry, || {
            self.summarizer.summarize(&prompt)
        })
        .await?;

        let body_html = markdown_to_html(&summary);
        let html = NewsletterEmail {
            categories: &categories,
            article_count: articles.len(),
            date: now.date_naive(),
            body_html: &body_html,
        }
        .render()?;
        let email = OutgoingEmail {
            from: self.settings.email_from.clone(),
            to: vec![req.email.clone()],
            subject: template::SUBJECT.to_string(),
            html,
        };
        let id = retry("send email", &self.settings.step_retry, || self.mailer.send(&email)).await?;
        info!("cycle[{}]: email accepted by {} ({id})", req.user_id, self.mailer.name());

        Ok(articles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use briefly_core::{Article, Frequency, NewPreferences};
    use briefly_db::SqliteDatabase;
    use chrono::{Duration, TimeZone};

    use crate::mailer::mock::MockMailer;
    use crate::news::mock::MockNewsSource;
    use crate::summarizer::mock::MockSummarizer;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn fast_settings() -> CycleSettings {
        CycleSettings {
            step_retry: RetryPolicy {
                attempts: 2,
                base_delay: StdDuration::from_millis(1),
            },
            ..CycleSettings::default()
        }
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.into(),
            description: "desc".into(),
            url: format!("https://news.example/{title}"),
        }
    }

    async fn seeded_db(frequency: Frequency) -> (Arc<dyn Database>, CycleRequest) {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let prefs = NewPreferences {
            categories: vec!["science".into(), "health".into()],
            frequency,
            email: "reader@example.com".into(),
        };
        db.upsert_preferences("u1", &prefs, now()).await.unwrap();
        (db, CycleRequest::new("u1", &prefs))
    }

    fn news() -> Arc<MockNewsSource> {
        Arc::new(
            MockNewsSource::new()
                .with_articles("science", vec![article("a"), article("b"), article("c")])
                .with_articles("health", vec![article("d")]),
        )
    }

    #[tokio::test]
    async fn sends_email_with_categories_and_count() {
        let (db, req) = seeded_db(Frequency::Weekly).await;
        let summarizer = Arc::new(MockSummarizer::new("# This week\n\nAll good."));
        let mailer = Arc::new(MockMailer::new());
        let pipeline = Pipeline::new(
            db.clone(),
            news(),
            summarizer.clone(),
            mailer.clone(),
            fast_settings(),
        );

        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        let expected_next = Utc.with_ymd_and_hms(2026, 6, 8, 9, 0, 0).unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Sent {
                article_count: 4,
                next_run_at: expected_next
            }
        );

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["reader@example.com"]);
        assert_eq!(sent[0].subject, "Your AI Newsletter");
        assert!(sent[0].html.contains("<strong>Categories:</strong> science, health"));
        assert!(sent[0].html.contains("<strong>Articles analyzed:</strong> 4"));
        assert!(sent[0].html.contains("<h1>This week</h1>"));

        let prompt = &summarizer.prompts()[0];
        assert!(prompt.contains("Categories requested: science, health"));
        assert!(prompt.contains("4. d\n"));

        let stored = db.get_preferences("u1").await.unwrap();
        assert_eq!(stored.next_run_at, Some(expected_next));
        assert_eq!(stored.last_sent_at, Some(now()));
        assert_eq!(stored.failure_count, 0);
    }

    #[tokio::test]
    async fn inactive_record_is_skipped() {
        let (db, req) = seeded_db(Frequency::Daily).await;
        db.set_active("u1", false).await.unwrap();
        let mailer = Arc::new(MockMailer::new());
        let summarizer = Arc::new(MockSummarizer::new("x"));
        let pipeline = Pipeline::new(
            db.clone(),
            news(),
            summarizer.clone(),
            mailer.clone(),
            fast_settings(),
        );

        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
        assert_eq!(summarizer.calls(), 0);
        assert!(mailer.sent().is_empty());
        let stored = db.get_preferences("u1").await.unwrap();
        assert!(stored.next_run_at.is_none());
        assert_eq!(stored.last_sent_at, None);
    }

    #[tokio::test]
    async fn missing_record_is_skipped() {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let pipeline = Pipeline::new(
            db,
            news(),
            Arc::new(MockSummarizer::new("x")),
            Arc::new(MockMailer::new()),
            fast_settings(),
        );
        let req = CycleRequest {
            user_id: "ghost".into(),
            categories: vec![],
            email: "g@example.com".into(),
            frequency: Frequency::Daily,
        };
        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn transient_step_failure_is_retried() {
        let (db, req) = seeded_db(Frequency::Daily).await;
        let summarizer = Arc::new(MockSummarizer::new("ok").failing_first(1));
        let mailer = Arc::new(MockMailer::new().failing_first(1));
        let pipeline = Pipeline::new(db, news(), summarizer.clone(), mailer.clone(), fast_settings());

        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Sent { .. }));
        assert_eq!(summarizer.calls(), 2);
        assert_eq!(mailer.attempts(), 2);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_backs_off() {
        let (db, req) = seeded_db(Frequency::Daily).await;
        let pipeline = Pipeline::new(
            db.clone(),
            news(),
            Arc::new(MockSummarizer::always_failing()),
            Arc::new(MockMailer::new()),
            fast_settings(),
        );

        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Failed {
                error: "summarize: failed to generate summary".into(),
                failure_count: 1,
                next_run_at: now() + Duration::minutes(5),
                exhausted: false,
            }
        );

        let stored = db.get_preferences("u1").await.unwrap();
        assert_eq!(stored.failure_count, 1);
        assert_eq!(
            stored.last_error.as_deref(),
            Some("summarize: failed to generate summary")
        );
        assert_eq!(stored.next_run_at, Some(now() + Duration::minutes(5)));

        let second = pipeline.run_cycle_at(&req, now()).await.unwrap();
        assert!(matches!(
            second,
            CycleOutcome::Failed { failure_count: 2, .. }
        ));
        let stored = db.get_preferences("u1").await.unwrap();
        assert_eq!(stored.next_run_at, Some(now() + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_cadence() {
        let (db, req) = seeded_db(Frequency::Biweekly).await;
        db.update_schedule(
            "u1",
            &ScheduleUpdate::failed(now(), 3, "earlier".into()),
        )
        .await
        .unwrap();
        let pipeline = Pipeline::new(
            db.clone(),
            news(),
            Arc::new(MockSummarizer::new("ok")),
            Arc::new(MockMailer::new().failing_first(u32::MAX)),
            fast_settings(),
        );

        let outcome = pipeline.run_cycle_at(&req, now()).await.unwrap();
        let regular = Utc.with_ymd_and_hms(2026, 6, 4, 9, 0, 0).unwrap();
        match outcome {
            CycleOutcome::Failed {
                failure_count,
                next_run_at,
                exhausted,
                error,
            } => {
                assert_eq!(failure_count, 4);
                assert_eq!(next_run_at, regular);
                assert!(exhausted);
                assert!(error.starts_with("send email:"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let stored = db.get_preferences("u1").await.unwrap();
        assert_eq!(stored.next_run_at, Some(regular));
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn success_after_failures_resets_count() {
        let (db, req) = seeded_db(Frequency::Daily).await;
        db.update_schedule("u1", &ScheduleUpdate::failed(now(), 2, "earlier".into()))
            .await
            .unwrap();
        let pipeline = Pipeline::new(
            db.clone(),
            news(),
            Arc::new(MockSummarizer::new("ok")),
            Arc::new(MockMailer::new()),
            fast_settings(),
        );
        pipeline.run_cycle_at(&req, now()).await.unwrap();
        let stored = db.get_preferences("u1").await.unwrap();
        assert_eq!(stored.failure_count, 0);
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn empty_categories_use_defaults() {
        let (db, mut req) = seeded_db(Frequency::Daily).await;
        req.categories.clear();
        let news = Arc::new(MockNewsSource::new());
        let mailer = Arc::new(MockMailer::new());
        let pipeline = Pipeline::new(
            db,
            news.clone(),
            Arc::new(MockSummarizer::new("ok")),
            mailer.clone(),
            fast_settings(),
        );
        pipeline.run_cycle_at(&req, now()).await.unwrap();

        let queried: Vec<String> = news.queries().into_iter().map(|(q, _)| q).collect();
        assert_eq!(queried, vec!["technology", "business", "politics"]);
        assert!(mailer.sent()[0]
            .html
            .contains("technology, business, politics"));
    }
}
