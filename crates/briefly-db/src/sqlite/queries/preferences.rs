use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use briefly_core::frequency::Frequency;
use briefly_core::preferences::{NewPreferences, Preferences};
use briefly_core::schedule::ScheduleUpdate;

use super::super::{ts, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn conversion_err(column: &str, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("{column}: {msg}").into(),
    )
}

fn row_to_preferences(row: &Row) -> rusqlite::Result<Preferences> {
    let categories_json: String = row.get("categories")?;
    let categories: Vec<String> = serde_json::from_str(&categories_json)
        .map_err(|e| conversion_err("categories", e.to_string()))?;
    let frequency_str: String = row.get("frequency")?;
    let frequency = Frequency::parse_str(&frequency_str)
        .ok_or_else(|| conversion_err("frequency", format!("unknown value '{frequency_str}'")))?;
    let is_active: i32 = row.get("is_active")?;
    let failure_count: i64 = row.get("failure_count")?;
    Ok(Preferences {
        user_id: row.get("user_id")?,
        categories,
        frequency,
        email: row.get("email")?,
        is_active: is_active != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        next_run_at: row.get("next_run_at")?,
        last_sent_at: row.get("last_sent_at")?,
        failure_count: u32::try_from(failure_count).unwrap_or(u32::MAX),
        last_error: row.get("last_error")?,
    })
}

fn not_found(user_id: &str) -> DbError {
    DbError::NotFound(format!("preferences for user {user_id}"))
}

impl SqliteDatabase {
    pub fn upsert_preferences_sync(
        &self,
        user_id: &str,
        input: &NewPreferences,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        let categories = serde_json::to_string(&input.categories)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        self.with_conn(|conn| {
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO user_preferences
                    (user_id, categories, frequency, email, is_active,
                     created_at, updated_at, next_run_at, failure_count, last_error)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, ?6, 0, NULL)
                 ON CONFLICT(user_id) DO UPDATE SET
                    categories    = excluded.categories,
                    frequency     = excluded.frequency,
                    email         = excluded.email,
                    is_active     = 1,
                    updated_at    = excluded.updated_at,
                    next_run_at   = excluded.next_run_at,
                    failure_count = 0,
                    last_error    = NULL",
                params![
                    user_id,
                    categories,
                    input.frequency.as_str(),
                    input.email,
                    now,
                    ts(next_run_at),
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                row_to_preferences,
            )
            .to_db()
        })
    }

    pub fn get_preferences_sync(&self, user_id: &str) -> Result<Preferences, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                row_to_preferences,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => not_found(user_id),
                other => DbError::Internal(other.to_string()),
            })
        })
    }

    pub fn set_active_sync(&self, user_id: &str, is_active: bool) -> Result<Preferences, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE user_preferences SET
                        is_active   = ?1,
                        updated_at  = ?2,
                        next_run_at = CASE WHEN ?1 = 1 THEN next_run_at ELSE NULL END
                     WHERE user_id = ?3",
                    params![if is_active { 1i32 } else { 0i32 }, ts(Utc::now()), user_id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(not_found(user_id));
            }
            Ok(())
        })?;
        self.get_preferences_sync(user_id)
    }

    pub fn ensure_next_run_sync(
        &self,
        user_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE user_preferences SET next_run_at = ?1
                 WHERE user_id = ?2 AND next_run_at IS NULL",
                params![ts(next_run_at), user_id],
            )
            .to_db()?;
            Ok(())
        })?;
        self.get_preferences_sync(user_id)
    }

    pub fn delete_preferences_sync(&self, user_id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM user_preferences WHERE user_id = ?1",
                    params![user_id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(not_found(user_id));
            }
            Ok(())
        })
    }

    pub fn list_due_preferences_sync(&self, now: DateTime<Utc>) -> Result<Vec<Preferences>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM user_preferences
                     WHERE is_active = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1
                     ORDER BY next_run_at",
                )
                .to_db()?;
            let due = stmt
                .query_map(params![ts(now)], row_to_preferences)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(due)
        })
    }

    pub fn update_schedule_sync(
        &self,
        user_id: &str,
        update: &ScheduleUpdate,
    ) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE user_preferences SET
                        next_run_at   = ?1,
                        failure_count = ?2,
                        last_error    = ?3,
                        last_sent_at  = COALESCE(?4, last_sent_at),
                        updated_at    = ?5
                     WHERE user_id = ?6",
                    params![
                        ts(update.next_run_at),
                        i64::from(update.failure_count),
                        update.last_error,
                        update.last_sent_at.map(ts),
                        ts(Utc::now()),
                        user_id,
                    ],
                )
                .to_db()?;
            if changed == 0 {
                return Err(not_found(user_id));
            }
            Ok(())
        })
    }
}
