pub mod categories;
pub mod health;
pub mod preferences;

use std::sync::Arc;

use axum::{http::StatusCode, middleware, Json, Router};
use briefly_db::{Database, DbError};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::scheduler::SchedulerHandle;

pub struct InnerAppState {
    pub db: Arc<dyn Database>,
    pub scheduler: SchedulerHandle,
    /// Hour of day (UTC) regular sends are pinned to.
    pub send_hour: u32,
}

pub type AppState = Arc<InnerAppState>;

pub type ApiError = (StatusCode, Json<Value>);

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(categories::routes());

    let protected = Router::new()
        .merge(preferences::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn error_response(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": msg.into() })))
}

pub(crate) fn to_error(e: DbError) -> ApiError {
    match &e {
        DbError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Preferences not found"),
        DbError::Io(_) | DbError::Internal(_) => {
            tracing::error!("storage error: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
