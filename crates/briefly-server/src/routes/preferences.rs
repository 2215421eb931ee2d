use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use briefly_core::preferences::SetActive;
use briefly_core::{CycleRequest, ScheduleEvent, SubmitPreferences};

use super::{error_response, to_error, ApiError, AppState};
use crate::auth::AuthUser;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/user-preferences",
        get(get_preferences)
            .post(save_preferences)
            .patch(set_active)
            .delete(delete_preferences),
    )
}

async fn save_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = match body {
        Ok(Json(body)) if body.is_object() => body,
        _ => return Err(error_response(StatusCode::BAD_REQUEST, "Invalid request body")),
    };
    let input = SubmitPreferences::from_json(&body)
        .validate()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    let prefs = state
        .db
        .upsert_preferences(&user.user_id, &input, Utc::now())
        .await
        .map_err(|e| {
            error!("saving preferences for {}: {e}", user.user_id);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save preferences")
        })?;

    state
        .scheduler
        .emit(ScheduleEvent::Start(CycleRequest::new(&user.user_id, &input)));
    info!(
        "preferences saved for {} ({}, {} categories)",
        user.user_id,
        prefs.frequency,
        prefs.categories.len()
    );

    Ok(Json(json!({
        "success": true,
        "message": "Preferences saved successfully",
        "preferences": prefs,
    })))
}

async fn get_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    state
        .db
        .get_preferences(&user.user_id)
        .await
        .map(|p| Json(json!(p)))
        .map_err(to_error)
}

async fn set_active(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<SetActive>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) =
        body.map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid request body"))?;

    let mut prefs = state
        .db
        .set_active(&user.user_id, input.is_active)
        .await
        .map_err(to_error)?;

    if prefs.is_active && prefs.next_run_at.is_none() {
        let next = prefs.frequency.next_run_at(Utc::now(), state.send_hour);
        prefs = state
            .db
            .ensure_next_run(&user.user_id, next)
            .await
            .map_err(to_error)?;
    }

    info!(
        "{} {} newsletter",
        user.user_id,
        if prefs.is_active { "resumed" } else { "paused" }
    );
    Ok(Json(json!(prefs)))
}

async fn delete_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    state
        .db
        .delete_preferences(&user.user_id)
        .await
        .map_err(to_error)?;
    state.scheduler.emit(ScheduleEvent::Deleted {
        user_id: user.user_id.clone(),
    });
    info!("preferences deleted for {}", user.user_id);
    Ok(StatusCode::NO_CONTENT)
}
