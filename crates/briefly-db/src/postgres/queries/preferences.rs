use chrono::{DateTime, Utc};

use briefly_core::frequency::Frequency;
use briefly_core::preferences::{NewPreferences, Preferences};
use briefly_core::schedule::ScheduleUpdate;

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct PreferencesRow {
    user_id: String,
    categories: Vec<String>,
    frequency: String,
    email: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    next_run_at: Option<DateTime<Utc>>,
    last_sent_at: Option<DateTime<Utc>>,
    failure_count: i32,
    last_error: Option<String>,
}

impl TryFrom<PreferencesRow> for Preferences {
    type Error = DbError;

    fn try_from(r: PreferencesRow) -> Result<Self, Self::Error> {
        let frequency = Frequency::parse_str(&r.frequency).ok_or_else(|| {
            DbError::Internal(format!("unknown frequency '{}' for {}", r.frequency, r.user_id))
        })?;
        Ok(Preferences {
            user_id: r.user_id,
            categories: r.categories,
            frequency,
            email: r.email,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            next_run_at: r.next_run_at,
            last_sent_at: r.last_sent_at,
            failure_count: u32::try_from(r.failure_count).unwrap_or(0),
            last_error: r.last_error,
        })
    }
}

fn not_found(user_id: &str) -> DbError {
    pg_not_found(&format!("preferences for user {user_id}"))
}

impl PostgresDatabase {
    pub(crate) async fn pg_upsert_preferences(
        &self,
        user_id: &str,
        input: &NewPreferences,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            "INSERT INTO user_preferences
                (user_id, categories, frequency, email, is_active,
                 created_at, updated_at, next_run_at, failure_count, last_error)
             VALUES ($1, $2, $3, $4, TRUE, $5, $5, $6, 0, NULL)
             ON CONFLICT (user_id) DO UPDATE SET
                categories    = EXCLUDED.categories,
                frequency     = EXCLUDED.frequency,
                email         = EXCLUDED.email,
                is_active     = TRUE,
                updated_at    = EXCLUDED.updated_at,
                next_run_at   = EXCLUDED.next_run_at,
                failure_count = 0,
                last_error    = NULL
             RETURNING *",
        )
        .bind(user_id)
        .bind(&input.categories)
        .bind(input.frequency.as_str())
        .bind(&input.email)
        .bind(Utc::now())
        .bind(next_run_at)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        row.try_into()
    }

    pub(crate) async fn pg_get_preferences(&self, user_id: &str) -> Result<Preferences, DbError> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            "SELECT * FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| not_found(user_id))?;

        row.try_into()
    }

    pub(crate) async fn pg_set_active(
        &self,
        user_id: &str,
        is_active: bool,
    ) -> Result<Preferences, DbError> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            "UPDATE user_preferences SET
                is_active   = $1,
                updated_at  = $2,
                next_run_at = CASE WHEN $1 THEN next_run_at ELSE NULL END
             WHERE user_id = $3
             RETURNING *",
        )
        .bind(is_active)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| not_found(user_id))?;

        row.try_into()
    }

    pub(crate) async fn pg_ensure_next_run(
        &self,
        user_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        sqlx::query(
            "UPDATE user_preferences SET next_run_at = $1
             WHERE user_id = $2 AND next_run_at IS NULL",
        )
        .bind(next_run_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        self.pg_get_preferences(user_id).await
    }

    pub(crate) async fn pg_delete_preferences(&self, user_id: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found(user_id));
        }
        Ok(())
    }

    pub(crate) async fn pg_list_due_preferences(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Preferences>, DbError> {
        let rows = sqlx::query_as::<_, PreferencesRow>(
            "SELECT * FROM user_preferences
             WHERE is_active AND next_run_at IS NOT NULL AND next_run_at <= $1
             ORDER BY next_run_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        rows.into_iter().map(Preferences::try_from).collect()
    }

    pub(crate) async fn pg_update_schedule(
        &self,
        user_id: &str,
        update: &ScheduleUpdate,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE user_preferences SET
                next_run_at   = $1,
                failure_count = $2,
                last_error    = $3,
                last_sent_at  = COALESCE($4, last_sent_at),
                updated_at    = $5
             WHERE user_id = $6",
        )
        .bind(update.next_run_at)
        .bind(i32::try_from(update.failure_count).unwrap_or(i32::MAX))
        .bind(&update.last_error)
        .bind(update.last_sent_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found(user_id));
        }
        Ok(())
    }
}
