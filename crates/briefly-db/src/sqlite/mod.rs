pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use briefly_core::api_key::ApiKey;
use briefly_core::preferences::{NewPreferences, Preferences};
use briefly_core::schedule::ScheduleUpdate;

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

/// Fixed-width RFC 3339 text, so stored timestamps compare correctly as strings.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("briefly.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    /// Run a synchronous query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Preferences --
    async fn upsert_preferences(
        &self,
        user_id: &str,
        input: &NewPreferences,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        let user_id = user_id.to_string();
        let input = input.clone();
        self.blocking(move |db| db.upsert_preferences_sync(&user_id, &input, next_run_at))
            .await
    }
    async fn get_preferences(&self, user_id: &str) -> Result<Preferences, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.get_preferences_sync(&user_id)).await
    }
    async fn set_active(&self, user_id: &str, is_active: bool) -> Result<Preferences, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.set_active_sync(&user_id, is_active))
            .await
    }
    async fn ensure_next_run(
        &self,
        user_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<Preferences, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.ensure_next_run_sync(&user_id, next_run_at))
            .await
    }
    async fn delete_preferences(&self, user_id: &str) -> Result<(), DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.delete_preferences_sync(&user_id))
            .await
    }
    async fn list_due_preferences(&self, now: DateTime<Utc>) -> Result<Vec<Preferences>, DbError> {
        self.blocking(move |db| db.list_due_preferences_sync(now)).await
    }
    async fn update_schedule(&self, user_id: &str, update: &ScheduleUpdate) -> Result<(), DbError> {
        let user_id = user_id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_schedule_sync(&user_id, &update))
            .await
    }

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        let key_hash = key_hash.to_string();
        self.blocking(move |db| db.insert_api_key_sync(&user_id, &name, &key_hash))
            .await
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        let key_hash = key_hash.to_string();
        self.blocking(move |db| db.find_api_key_by_hash_sync(&key_hash))
            .await
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.touch_api_key_sync(&id)).await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.blocking(|db| db.list_api_keys_sync()).await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_api_key_sync(&id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_returns_working_db() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
                .to_db()?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("test.db");
        assert!(!db_path.exists());

        let _db = SqliteDatabase::open_path(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn ts_is_fixed_width() {
        use chrono::TimeZone;
        let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let frac = whole + chrono::Duration::milliseconds(250);
        assert_eq!(ts(whole).len(), ts(frac).len());
        assert!(ts(whole) < ts(frac));
    }
}
