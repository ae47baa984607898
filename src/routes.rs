use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::shared::AppState;
use crate::websockets::{app_handler, dashboard_handler};

/// Liveness probe
pub async fn status() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/room/:instance_id/dashboard", get(dashboard_handler))
        .route("/room/:instance_id/app/:app_id", get(app_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
