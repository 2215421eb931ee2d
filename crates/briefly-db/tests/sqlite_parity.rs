// Integration tests that exercise every Database trait method against the
// in-memory SQLite backend. The test logic lives in `common/mod.rs` so that
// the same assertions can be re-used for Postgres.

mod common;

use std::sync::Arc;

use briefly_db::Database;

async fn make_db() -> Arc<dyn Database> {
    Arc::new(briefly_db::SqliteDatabase::open_in_memory().unwrap())
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let db = make_db().await;
    common::test_upsert_is_idempotent(&*db).await;
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let db = make_db().await;
    common::test_get_missing_is_not_found(&*db).await;
}

#[tokio::test]
async fn active_toggle_gates_due_list() {
    let db = make_db().await;
    common::test_active_toggle_gates_due_list(&*db).await;
}

#[tokio::test]
async fn due_list_ordering() {
    let db = make_db().await;
    common::test_due_list_ordering(&*db).await;
}

#[tokio::test]
async fn schedule_updates() {
    let db = make_db().await;
    common::test_schedule_updates(&*db).await;
}

#[tokio::test]
async fn ensure_next_run_only_fills_gaps() {
    let db = make_db().await;
    common::test_ensure_next_run_only_fills_gaps(&*db).await;
}

#[tokio::test]
async fn delete_preferences() {
    let db = make_db().await;
    common::test_delete_preferences(&*db).await;
}

#[tokio::test]
async fn update_schedule_missing_user() {
    let db = make_db().await;
    common::test_update_schedule_missing_user(&*db).await;
}

#[tokio::test]
async fn api_key_lifecycle() {
    let db = make_db().await;
    common::test_api_key_lifecycle(&*db).await;
}

#[tokio::test]
async fn on_disk_database_survives_reopen() {
    use briefly_core::frequency::Frequency;
    use briefly_core::preferences::NewPreferences;

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("briefly.db");
    {
        let db = briefly_db::SqliteDatabase::open_path(&path).unwrap();
        db.upsert_preferences(
            "persisted",
            &NewPreferences {
                categories: vec!["science".into()],
                frequency: Frequency::Daily,
                email: "p@example.com".into(),
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();
    }
    let reopened = briefly_db::SqliteDatabase::open_path(&path).unwrap();
    let prefs = reopened.get_preferences("persisted").await.unwrap();
    assert_eq!(prefs.categories, vec!["science"]);
}
