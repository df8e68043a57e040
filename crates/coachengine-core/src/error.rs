use thiserror::Error;

/// The engine-wide error taxonomy.
///
/// Component crates (`coachengine-topics`, `-templates`, `-providers`,
/// `-runtimeconfig`, `-sessions`) define their own narrower error enums;
/// each converts into this one at the point where control crosses a
/// component boundary, so the orchestrator and the gateway only ever have
/// to match on a single type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("topic not available: {topic_id}")]
    TopicNotAvailable { topic_id: String },

    #[error("missing required parameter: {name}")]
    MissingParameter { name: String },

    #[error("placeholder '{name}' has no declared parameter")]
    UndeclaredPlaceholder { name: String },

    #[error("required parameter '{name}' resolved to null")]
    NullParameter { name: String },

    #[error("session not found")]
    SessionNotFound,

    #[error("forbidden: caller does not own this session")]
    Forbidden,

    #[error("session conflict: already owned by another user")]
    SessionConflict { other_user_id: String },

    #[error("session is not active")]
    SessionNotActive,

    #[error("max turns reached")]
    MaxTurnsReached,

    #[error("session expired")]
    SessionExpired,

    #[error("message too long: {len} chars (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("concurrent modification detected")]
    ConcurrentModification,

    #[error("busy: too much contention on this session, try again")]
    Busy,

    #[error("provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid runtime configuration: {0}")]
    InvalidRuntimeConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code, used both for structured log fields
    /// and for the HTTP status mapping performed at the gateway boundary.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::TopicNotAvailable { .. } => "TOPIC_NOT_AVAILABLE",
            EngineError::MissingParameter { .. } => "MISSING_PARAMETER",
            EngineError::UndeclaredPlaceholder { .. } => "UNDECLARED_PLACEHOLDER",
            EngineError::NullParameter { .. } => "NULL_PARAMETER",
            EngineError::SessionNotFound => "SESSION_NOT_FOUND",
            EngineError::Forbidden => "FORBIDDEN",
            EngineError::SessionConflict { .. } => "SESSION_CONFLICT",
            EngineError::SessionNotActive => "SESSION_NOT_ACTIVE",
            EngineError::MaxTurnsReached => "MAX_TURNS_REACHED",
            EngineError::SessionExpired => "SESSION_EXPIRED",
            EngineError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
            EngineError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            EngineError::Busy => "BUSY",
            EngineError::ProviderRejected(_) => "PROVIDER_REJECTED",
            EngineError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            EngineError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            EngineError::Cancelled => "CANCELLED",
            EngineError::InvalidRuntimeConfig(_) => "INVALID_RUNTIME_CONFIG",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors that are purely internal bookkeeping and must never
    /// surface to a caller — the orchestrator retries on these instead.
    pub fn is_retryable_internally(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
