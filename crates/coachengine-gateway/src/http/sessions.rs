use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use coachengine_core::{EngineError, ParamValue};
use coachengine_templates::ParamBag;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct InitiateRequest {
    pub topic_id: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
pub struct AddMessageRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct SessionTurnResponse {
    pub session_id: String,
    pub message: String,
    pub turn: u32,
    pub max_turns: u32,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed: Option<bool>,
    pub metadata: MetadataResponse,
}

#[derive(Serialize)]
pub struct MetadataResponse {
    pub model: String,
    pub processing_time_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub session_id: String,
    pub result: serde_json::Value,
    pub metadata: MetadataResponse,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: String,
    pub turn: u32,
    pub max_turns: u32,
    pub created_at: String,
    pub last_activity_at: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

pub async fn initiate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<SessionTurnResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (tenant_id, user_id) = caller_identity(&headers)?;
    let params: HashMap<String, ParamValue> =
        req.params.into_iter().map(|(k, v)| (k, ParamValue::from_json(v))).collect();
    let bag: ParamBag = params.into();

    let outcome = state
        .orchestrator
        .initiate(&tenant_id, &user_id, &req.topic_id, bag, &CancellationToken::new())
        .await
        .map_err(to_http_error)?;

    Ok(Json(SessionTurnResponse {
        session_id: outcome.session_id,
        message: outcome.message,
        turn: outcome.turn,
        max_turns: outcome.max_turns,
        is_final: outcome.is_final,
        resumed: Some(outcome.resumed),
        metadata: MetadataResponse {
            model: outcome.metadata.model,
            processing_time_ms: outcome.metadata.processing_time_ms,
            tokens_in: outcome.metadata.tokens_in,
            tokens_out: outcome.metadata.tokens_out,
        },
    }))
}

pub async fn add_message_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddMessageRequest>,
) -> Result<Json<SessionTurnResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (tenant_id, user_id) = caller_identity(&headers)?;

    let outcome = state
        .orchestrator
        .add_message(&tenant_id, &user_id, &session_id, &req.text, &CancellationToken::new())
        .await
        .map_err(to_http_error)?;

    Ok(Json(SessionTurnResponse {
        session_id: outcome.session_id,
        message: outcome.message,
        turn: outcome.turn,
        max_turns: outcome.max_turns,
        is_final: outcome.is_final,
        resumed: None,
        metadata: MetadataResponse {
            model: outcome.metadata.model,
            processing_time_ms: outcome.metadata.processing_time_ms,
            tokens_in: outcome.metadata.tokens_in,
            tokens_out: outcome.metadata.tokens_out,
        },
    }))
}

pub async fn complete_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CompleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (tenant_id, user_id) = caller_identity(&headers)?;

    let outcome = state
        .orchestrator
        .complete(&tenant_id, &user_id, &session_id, &CancellationToken::new())
        .await
        .map_err(to_http_error)?;

    Ok(Json(CompleteResponse {
        session_id: outcome.session_id,
        result: outcome.result,
        metadata: MetadataResponse {
            model: outcome.metadata.model,
            processing_time_ms: outcome.metadata.processing_time_ms,
            tokens_in: outcome.metadata.tokens_in,
            tokens_out: outcome.metadata.tokens_out,
        },
    }))
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (tenant_id, user_id) = caller_identity(&headers)?;

    let snapshot = state
        .orchestrator
        .get_session(&tenant_id, &user_id, &session_id)
        .map_err(to_http_error)?;

    Ok(Json(SessionResponse {
        session_id: snapshot.session_id,
        status: format!("{:?}", snapshot.status).to_lowercase(),
        turn: snapshot.turn,
        max_turns: snapshot.max_turns,
        created_at: snapshot.created_at,
        last_activity_at: snapshot.last_activity_at,
        expires_at: snapshot.expires_at,
        completed_at: snapshot.completed_at,
    }))
}

/// Tenant and user identity is read from headers set by the authenticating
/// proxy in front of this service — no auth is performed here.
fn caller_identity(headers: &HeaderMap) -> Result<(String, String), (StatusCode, Json<ErrorResponse>)> {
    let tenant_id = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| bad_request("missing X-Tenant-Id header"))?;
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| bad_request("missing X-User-Id header"))?;
    Ok((tenant_id, user_id))
}

fn bad_request(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { code: "BAD_REQUEST".to_string(), error: msg.to_string() }),
    )
}

fn to_http_error(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        EngineError::TopicNotAvailable { .. } => StatusCode::NOT_FOUND,
        EngineError::SessionNotFound => StatusCode::NOT_FOUND,
        EngineError::Forbidden => StatusCode::FORBIDDEN,
        EngineError::SessionConflict { .. } => StatusCode::CONFLICT,
        EngineError::SessionNotActive => StatusCode::CONFLICT,
        EngineError::MaxTurnsReached => StatusCode::CONFLICT,
        EngineError::SessionExpired => StatusCode::GONE,
        EngineError::ConcurrentModification => StatusCode::CONFLICT,
        EngineError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::MissingParameter { .. }
        | EngineError::UndeclaredPlaceholder { .. }
        | EngineError::NullParameter { .. }
        | EngineError::MessageTooLong { .. } => StatusCode::BAD_REQUEST,
        EngineError::ProviderRejected(_) | EngineError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
        EngineError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InvalidRuntimeConfig(_) | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(code = err.code(), error = %err, "internal error handling request");
    }

    (status, Json(ErrorResponse { code: err.code().to_string(), error: err.to_string() }))
}
