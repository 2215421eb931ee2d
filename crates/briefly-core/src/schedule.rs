use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;
use crate::preferences::{NewPreferences, Preferences};

/// Input of one send cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRequest {
    pub user_id: String,
    pub categories: Vec<String>,
    pub email: String,
    pub frequency: Frequency,
}

impl CycleRequest {
    pub fn new(user_id: &str, prefs: &NewPreferences) -> Self {
        Self {
            user_id: user_id.to_string(),
            categories: prefs.categories.clone(),
            email: prefs.email.clone(),
            frequency: prefs.frequency,
        }
    }
}

impl From<&Preferences> for CycleRequest {
    fn from(p: &Preferences) -> Self {
        Self {
            user_id: p.user_id.clone(),
            categories: p.categories.clone(),
            email: p.email.clone(),
            frequency: p.frequency,
        }
    }
}

/// Events consumed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "snake_case")]
pub enum ScheduleEvent {
    /// Run a cycle now, replacing any cycle already running for the user.
    Start(CycleRequest),
    /// Cancel the in-flight cycle for the user.
    Deleted { user_id: String },
}

impl ScheduleEvent {
    pub fn user_id(&self) -> &str {
        match self {
            ScheduleEvent::Start(req) => &req.user_id,
            ScheduleEvent::Deleted { user_id } => user_id,
        }
    }
}

/// Bookkeeping written back to a preferences record after a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub next_run_at: DateTime<Utc>,
    pub failure_count: u32,
    pub last_error: Option<String>,
    /// `None` leaves the stored value untouched.
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl ScheduleUpdate {
    pub fn sent(at: DateTime<Utc>, next_run_at: DateTime<Utc>) -> Self {
        Self {
            next_run_at,
            failure_count: 0,
            last_error: None,
            last_sent_at: Some(at),
        }
    }

    pub fn failed(next_run_at: DateTime<Utc>, failure_count: u32, error: String) -> Self {
        Self {
            next_run_at,
            failure_count,
            last_error: Some(error),
            last_sent_at: None,
        }
    }
}

/// How failed cycles are retried before falling back to the regular cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Failures tolerated before alerting and returning to the regular slot.
    pub max_failures: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::minutes(5),
            cap: Duration::hours(6),
            max_failures: 3,
        }
    }
}

/// Where a failed cycle leaves the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    pub failure_count: u32,
    pub next_run_at: DateTime<Utc>,
    /// Retries are used up; the caller should raise an alert.
    pub exhausted: bool,
}

impl BackoffPolicy {
    /// Delay before retry number `failures` (1-based): `base * 2^(failures-1)`, capped.
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(20);
        self.base
            .checked_mul(1i32 << exp)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    pub fn plan_failure(
        &self,
        now: DateTime<Utc>,
        previous_failures: u32,
        frequency: Frequency,
        send_hour: u32,
    ) -> FailurePlan {
        let failure_count = previous_failures.saturating_add(1);
        if failure_count > self.max_failures {
            FailurePlan {
                failure_count,
                next_run_at: frequency.next_run_at(now, send_hour),
                exhausted: true,
            }
        } else {
            FailurePlan {
                failure_count,
                next_run_at: now + self.delay(failure_count),
                exhausted: false,
            }
        }
    }
}
