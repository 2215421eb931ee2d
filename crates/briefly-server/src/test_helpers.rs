use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use briefly_core::ScheduleEvent;
use briefly_db::{Database, SqliteDatabase};
use briefly_runner::mailer::mock::MockMailer;
use briefly_runner::news::mock::MockNewsSource;
use briefly_runner::summarizer::mock::MockSummarizer;
use briefly_runner::{CycleSettings, Pipeline};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::routes::{build_router, InnerAppState};
use crate::scheduler::{Scheduler, SchedulerHandle};

/// A router over in-memory SQLite whose scheduler events are captured
/// instead of executed.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<dyn Database>,
    pub api_key: String,
    pub events: UnboundedReceiver<ScheduleEvent>,
}

/// Issue a key for `user_id` directly in the database.
pub async fn issue_key(db: &dyn Database, user_id: &str) -> String {
    let api_key = crate::auth::generate_api_key();
    db.insert_api_key(user_id, "test", &crate::auth::sha256_hex(&api_key))
        .await
        .unwrap();
    api_key
}

pub async fn test_app(user_id: &str) -> TestApp {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let api_key = issue_key(&*db, user_id).await;
    let (scheduler, events) = SchedulerHandle::detached();
    let router = build_router(Arc::new(InnerAppState {
        db: db.clone(),
        scheduler,
        send_hour: 9,
    }));
    TestApp {
        router,
        db,
        api_key,
        events,
    }
}

/// Build a test router with a key issued for `user_id`, returning (router, api_key).
pub async fn test_router_with_auth(user_id: &str) -> (Router, String) {
    let app = test_app(user_id).await;
    (app.router, app.api_key)
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_body(value: &Value) -> Body {
    Body::from(serde_json::to_vec(value).unwrap())
}

/// A running test server with a live scheduler backed by mock adapters.
pub struct TestServer {
    pub base_url: String,
    pub api_key: String,
    pub db: Arc<dyn Database>,
    pub mailer: Arc<MockMailer>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server(user_id: &str) -> TestServer {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let api_key = issue_key(&*db, user_id).await;
    let mailer = Arc::new(MockMailer::new());
    let pipeline = Arc::new(Pipeline::new(
        db.clone(),
        Arc::new(MockNewsSource::new()),
        Arc::new(MockSummarizer::new("# Your briefing\n\nNothing new.")),
        mailer.clone(),
        CycleSettings::default(),
    ));
    let (scheduler, _poller) = Scheduler::new(pipeline).start(Duration::from_secs(3600));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = build_router(Arc::new(InnerAppState {
        db: db.clone(),
        scheduler,
        send_hour: 9,
    }));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        api_key,
        db,
        mailer,
        _handle: handle,
    }
}
