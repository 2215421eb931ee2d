// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use briefly_core::frequency::Frequency;
use briefly_core::preferences::NewPreferences;
use briefly_core::schedule::ScheduleUpdate;
use briefly_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_prefs(categories: &[&str], frequency: Frequency, email: &str) -> NewPreferences {
    NewPreferences {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        frequency,
        email: email.to_string(),
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Repeated submissions for one user leave exactly one record holding the
/// latest values.
pub async fn test_upsert_is_idempotent(db: &dyn Database) {
    let first = db
        .upsert_preferences(
            "user-a",
            &make_prefs(&["technology"], Frequency::Daily, "a@example.com"),
            noon(),
        )
        .await
        .unwrap();
    assert_eq!(first.categories, vec!["technology"]);
    assert!(first.is_active);
    assert_eq!(first.next_run_at, Some(noon()));

    for _ in 0..3 {
        db.upsert_preferences(
            "user-a",
            &make_prefs(&["science", "health"], Frequency::Weekly, "a2@example.com"),
            noon(),
        )
        .await
        .unwrap();
    }

    let stored = db.get_preferences("user-a").await.unwrap();
    assert_eq!(stored.categories, vec!["science", "health"]);
    assert_eq!(stored.frequency, Frequency::Weekly);
    assert_eq!(stored.email, "a2@example.com");
    assert_eq!(stored.created_at, first.created_at);

    // Only one due record for this user, however many upserts happened.
    let due = db.list_due_preferences(noon()).await.unwrap();
    assert_eq!(due.iter().filter(|p| p.user_id == "user-a").count(), 1);
}

pub async fn test_get_missing_is_not_found(db: &dyn Database) {
    let err = db.get_preferences("ghost").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)), "got {err:?}");
}

/// Deactivating hides a record from the poller; reactivating brings it back.
pub async fn test_active_toggle_gates_due_list(db: &dyn Database) {
    db.upsert_preferences(
        "user-b",
        &make_prefs(&["sports"], Frequency::Daily, "b@example.com"),
        noon() - Duration::minutes(1),
    )
    .await
    .unwrap();

    let paused = db.set_active("user-b", false).await.unwrap();
    assert!(!paused.is_active);
    assert!(paused.next_run_at.is_none());
    assert!(db.list_due_preferences(noon()).await.unwrap().is_empty());

    // The pre-pause slot is gone, so resuming alone does not trigger a send.
    let resumed = db.set_active("user-b", true).await.unwrap();
    assert!(resumed.is_active);
    assert!(resumed.next_run_at.is_none());
    assert!(db
        .list_due_preferences(noon() + Duration::weeks(3))
        .await
        .unwrap()
        .is_empty());

    let slot = noon() + Duration::days(1);
    db.ensure_next_run("user-b", slot).await.unwrap();
    let due = db.list_due_preferences(slot).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].user_id, "user-b");
}

pub async fn test_due_list_ordering(db: &dyn Database) {
    db.upsert_preferences(
        "late",
        &make_prefs(&["x"], Frequency::Daily, "l@example.com"),
        noon() - Duration::minutes(1),
    )
    .await
    .unwrap();
    db.upsert_preferences(
        "early",
        &make_prefs(&["x"], Frequency::Daily, "e@example.com"),
        noon() - Duration::hours(3),
    )
    .await
    .unwrap();
    db.upsert_preferences(
        "not-yet",
        &make_prefs(&["x"], Frequency::Daily, "n@example.com"),
        noon() + Duration::seconds(1),
    )
    .await
    .unwrap();

    let due = db.list_due_preferences(noon()).await.unwrap();
    let ids: Vec<_> = due.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

pub async fn test_schedule_updates(db: &dyn Database) {
    db.upsert_preferences(
        "user-c",
        &make_prefs(&["health"], Frequency::Biweekly, "c@example.com"),
        noon(),
    )
    .await
    .unwrap();

    let retry_at = noon() + Duration::minutes(5);
    db.update_schedule(
        "user-c",
        &ScheduleUpdate::failed(retry_at, 1, "summarizer unavailable".into()),
    )
    .await
    .unwrap();
    let failed = db.get_preferences("user-c").await.unwrap();
    assert_eq!(failed.failure_count, 1);
    assert_eq!(failed.last_error.as_deref(), Some("summarizer unavailable"));
    assert_eq!(failed.next_run_at, Some(retry_at));
    assert!(failed.last_sent_at.is_none());

    let next = Frequency::Biweekly.next_run_at(noon(), 9);
    db.update_schedule("user-c", &ScheduleUpdate::sent(noon(), next))
        .await
        .unwrap();
    let sent = db.get_preferences("user-c").await.unwrap();
    assert_eq!(sent.failure_count, 0);
    assert!(sent.last_error.is_none());
    assert_eq!(sent.last_sent_at, Some(noon()));
    assert_eq!(sent.next_run_at, Some(next));

    // A later failure keeps the last successful send time.
    db.update_schedule(
        "user-c",
        &ScheduleUpdate::failed(retry_at, 1, "mailer down".into()),
    )
    .await
    .unwrap();
    let again = db.get_preferences("user-c").await.unwrap();
    assert_eq!(again.last_sent_at, Some(noon()));
}

pub async fn test_ensure_next_run_only_fills_gaps(db: &dyn Database) {
    db.upsert_preferences(
        "user-d",
        &make_prefs(&["science"], Frequency::Daily, "d@example.com"),
        noon(),
    )
    .await
    .unwrap();

    let later = noon() + Duration::days(2);
    let kept = db.ensure_next_run("user-d", later).await.unwrap();
    assert_eq!(kept.next_run_at, Some(noon()));

    db.set_active("user-d", false).await.unwrap();
    db.set_active("user-d", true).await.unwrap();
    let filled = db.ensure_next_run("user-d", later).await.unwrap();
    assert_eq!(filled.next_run_at, Some(later));
}

pub async fn test_delete_preferences(db: &dyn Database) {
    db.upsert_preferences(
        "user-e",
        &make_prefs(&["politics"], Frequency::Weekly, "e@example.com"),
        noon(),
    )
    .await
    .unwrap();

    db.delete_preferences("user-e").await.unwrap();
    assert!(matches!(
        db.get_preferences("user-e").await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.delete_preferences("user-e").await,
        Err(DbError::NotFound(_))
    ));
}

pub async fn test_update_schedule_missing_user(db: &dyn Database) {
    let err = db
        .update_schedule("ghost", &ScheduleUpdate::sent(noon(), noon()))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

pub async fn test_api_key_lifecycle(db: &dyn Database) {
    let key = db.insert_api_key("user-f", "phone", "hash-f").await.unwrap();
    assert_eq!(key.user_id, "user-f");
    assert!(key.last_used_at.is_none());

    let found = db.find_api_key_by_hash("hash-f").await.unwrap().unwrap();
    assert_eq!(found.id, key.id);
    assert!(db.find_api_key_by_hash("nope").await.unwrap().is_none());

    db.touch_api_key(&key.id).await.unwrap();
    let touched = db.find_api_key_by_hash("hash-f").await.unwrap().unwrap();
    assert!(touched.last_used_at.is_some());

    assert_eq!(db.list_api_keys().await.unwrap().len(), 1);
    db.delete_api_key(&key.id).await.unwrap();
    assert!(db.list_api_keys().await.unwrap().is_empty());
    assert!(matches!(
        db.delete_api_key(&key.id).await,
        Err(DbError::NotFound(_))
    ));
}
