#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use briefly_core::api_key::ApiKey;
use briefly_core::preferences::{NewPreferences, Preferences};
use briefly_core::schedule::ScheduleUpdate;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Storage operations shared by every backend.
///
/// Route handlers, the auth middleware, and the scheduler program against
/// this trait through an `Arc<dyn Database>`.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Preferences --

    /// Insert or overwrite the record for `user_id`. The record becomes
    /// active, its failure state is cleared, and `created_at` is preserved
    /// across overwrites.
    async fn upsert_preferences(
        &self,
        user_id: &str,
        input: &NewPreferences,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError>;
    async fn get_preferences(&self, user_id: &str) -> Result<Preferences, DbError>;
    /// Toggle the active flag. Pausing clears `next_run_at` so a later resume
    /// starts from a fresh slot instead of a stale one.
    async fn set_active(&self, user_id: &str, is_active: bool) -> Result<Preferences, DbError>;
    /// Set `next_run_at` only when it is currently unset.
    async fn ensure_next_run(
        &self,
        user_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError>;
    async fn delete_preferences(&self, user_id: &str) -> Result<(), DbError>;
    /// Active records whose `next_run_at` is at or before `now`, oldest first.
    async fn list_due_preferences(&self, now: DateTime<Utc>) -> Result<Vec<Preferences>, DbError>;
    async fn update_schedule(&self, user_id: &str, update: &ScheduleUpdate) -> Result<(), DbError>;

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError>;
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError>;
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    Sqlite,
    Postgres,
}

impl DbBackend {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "sqlite" => Some(DbBackend::Sqlite),
            "postgres" | "postgresql" => Some(DbBackend::Postgres),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: DbBackend,
    /// SQLite file path. Defaults to `<data dir>/briefly.db`.
    pub sqlite_path: Option<String>,
    /// Postgres connection URL.
    pub database_url: Option<String>,
}

/// Open the configured backend and run its migrations.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.backend {
        #[cfg(feature = "sqlite")]
        DbBackend::Sqlite => Ok(Arc::new(SqliteDatabase::open(config)?)),
        #[cfg(feature = "postgres")]
        DbBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| DbError::Internal("DATABASE_URL is required for postgres".into()))?;
            Ok(Arc::new(PostgresDatabase::connect(url).await?))
        }
        #[allow(unreachable_patterns)]
        other => Err(DbError::Internal(format!(
            "backend {other:?} not compiled in"
        ))),
    }
}

/// Base directory for on-disk state.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BRIEFLY_DATA_DIR") {
        PathBuf::from(dir)
    } else if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join("briefly")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share/briefly")
    } else {
        PathBuf::from(".")
    }
}
