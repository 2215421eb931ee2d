pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use briefly_core::api_key::ApiKey;
use briefly_core::preferences::{NewPreferences, Preferences};
use briefly_core::schedule::ScheduleUpdate;

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    // -- Preferences --
    async fn upsert_preferences(
        &self,
        user_id: &str,
        input: &NewPreferences,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        self.pg_upsert_preferences(user_id, input, next_run_at).await
    }
    async fn get_preferences(&self, user_id: &str) -> Result<Preferences, DbError> {
        self.pg_get_preferences(user_id).await
    }
    async fn set_active(&self, user_id: &str, is_active: bool) -> Result<Preferences, DbError> {
        self.pg_set_active(user_id, is_active).await
    }
    async fn ensure_next_run(
        &self,
        user_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        self.pg_ensure_next_run(user_id, next_run_at).await
    }
    async fn delete_preferences(&self, user_id: &str) -> Result<(), DbError> {
        self.pg_delete_preferences(user_id).await
    }
    async fn list_due_preferences(&self, now: DateTime<Utc>) -> Result<Vec<Preferences>, DbError> {
        self.pg_list_due_preferences(now).await
    }
    async fn update_schedule(&self, user_id: &str, update: &ScheduleUpdate) -> Result<(), DbError> {
        self.pg_update_schedule(user_id, update).await
    }

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError> {
        self.pg_insert_api_key(user_id, name, key_hash).await
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        self.pg_find_api_key_by_hash(key_hash).await
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_touch_api_key(id).await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.pg_list_api_keys().await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_delete_api_key(id).await
    }
}
