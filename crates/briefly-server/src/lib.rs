pub mod auth;
pub mod config;
pub mod routes;
pub mod scheduler;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use briefly_db::Database;
use briefly_runner::Pipeline;
use tokio::net::TcpListener;
use tracing::info;

use routes::{AppState, InnerAppState};
use scheduler::Scheduler;

/// Start the scheduler and serve the API until the listener closes.
pub async fn serve(
    listener: TcpListener,
    db: Arc<dyn Database>,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
) -> Result<()> {
    let send_hour = pipeline.settings().send_hour;
    let (scheduler, _poller) = Scheduler::new(pipeline).start(poll_interval);
    info!("scheduler polling every {poll_interval:?}");

    let state: AppState = Arc::new(InnerAppState {
        db,
        scheduler,
        send_hour,
    });
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
