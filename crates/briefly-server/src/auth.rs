use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::routes::AppState;

/// The user a request was authenticated as. Inserted into request
/// extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// SHA-256 hash a raw key, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a new API key: `bf_` + 43 chars of base62-encoded random bytes.
pub fn generate_api_key() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random_part: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62.len());
            BASE62[idx] as char
        })
        .collect();
    format!("bf_{random_part}")
}

fn unauthorized(method: &Method) -> Response {
    let msg = if method == Method::POST {
        "You must be logged in to save preferences"
    } else {
        "You must be logged in"
    };
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
}

/// Axum middleware that resolves `Authorization: Bearer <key>` to the
/// owning user, or rejects the request with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return unauthorized(request.method());
    };

    match state.db.find_api_key_by_hash(&sha256_hex(token)).await {
        Ok(Some(api_key)) => {
            // Fire-and-forget: update last_used_at
            let db = state.db.clone();
            let key_id = api_key.id.clone();
            tokio::spawn(async move {
                if let Err(e) = db.touch_api_key(&key_id).await {
                    debug!("auth: updating last_used_at for key {key_id}: {e}");
                }
            });
            request.extensions_mut().insert(AuthUser {
                user_id: api_key.user_id,
            });
            next.run(request).await
        }
        Ok(None) => unauthorized(request.method()),
        Err(e) => {
            warn!("auth: key lookup failed: {e}");
            unauthorized(request.method())
        }
    }
}
