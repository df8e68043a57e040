use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /healthz — liveness probe, no dependency checks (no background jobs
/// to report on, the session store is touched lazily per request).
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "topics_registered": state.topics.len(),
    }))
}
