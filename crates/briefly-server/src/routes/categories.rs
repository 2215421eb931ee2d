use axum::{routing::get, Json, Router};
use briefly_core::category::CATALOG;
use briefly_core::Frequency;
use serde_json::{json, Value};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/categories", get(list_categories))
}

async fn list_categories() -> Json<Value> {
    let frequencies: Vec<Value> = Frequency::ALL
        .iter()
        .map(|f| {
            json!({
                "id": f.as_str(),
                "name": f.display_name(),
                "description": f.description(),
            })
        })
        .collect();
    Json(json!({
        "categories": CATALOG,
        "frequencies": frequencies,
    }))
}
