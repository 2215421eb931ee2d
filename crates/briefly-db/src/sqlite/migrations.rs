use rusqlite::Connection;
use tracing::info;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        info!("sqlite: applying schema version 1");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_preferences (
                user_id       TEXT PRIMARY KEY,
                categories    TEXT NOT NULL,
                frequency     TEXT NOT NULL
                                  CHECK(frequency IN ('daily', 'weekly', 'biweekly')),
                email         TEXT NOT NULL,
                is_active     INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                next_run_at   TEXT,
                last_sent_at  TEXT,
                failure_count INTEGER NOT NULL DEFAULT 0,
                last_error    TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_user_preferences_due
                ON user_preferences(is_active, next_run_at);

            CREATE TABLE IF NOT EXISTS api_keys (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL,
                name         TEXT NOT NULL DEFAULT '',
                key_hash     TEXT NOT NULL UNIQUE,
                created_at   TEXT NOT NULL,
                last_used_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);

            INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'));",
        )
        .to_db()?;
    }

    Ok(())
}
