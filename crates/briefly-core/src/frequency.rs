use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery cadence of a newsletter subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    /// Twice a week, i.e. every third day. Not "every two weeks".
    Biweekly,
}

impl Frequency {
    pub const ALL: &[Frequency] = &[Frequency::Daily, Frequency::Weekly, Frequency::Biweekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Biweekly => "Bi-weekly",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Frequency::Daily => "Every day",
            Frequency::Weekly => "Once a week",
            Frequency::Biweekly => "Twice a week",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "biweekly" => Some(Frequency::Biweekly),
            _ => None,
        }
    }

    /// Days between two sends.
    pub fn interval_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Biweekly => 3,
        }
    }

    /// The next delivery slot after `now`: `now` plus the cadence interval,
    /// with the time of day pinned to `send_hour`:00 UTC.
    pub fn next_run_at(&self, now: DateTime<Utc>, send_hour: u32) -> DateTime<Utc> {
        let day = (now + Duration::days(self.interval_days())).date_naive();
        let time = NaiveTime::from_hms_opt(send_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        day.and_time(time).and_utc()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
