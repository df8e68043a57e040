use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use coachengine_sessions::SessionOrchestrator;
use coachengine_topics::TopicRegistry;

/// Shared state handed to every Axum handler.
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    pub topics: Arc<TopicRegistry>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(crate::http::health::health_handler))
        .route("/v1/sessions", post(crate::http::sessions::initiate_handler))
        .route(
            "/v1/sessions/{session_id}/messages",
            post(crate::http::sessions::add_message_handler),
        )
        .route(
            "/v1/sessions/{session_id}/complete",
            post(crate::http::sessions::complete_handler),
        )
        .route(
            "/v1/sessions/{session_id}",
            get(crate::http::sessions::get_session_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
