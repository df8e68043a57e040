use coachengine_core::EngineError;
use coachengine_providers::ProviderError;
use coachengine_runtimeconfig::RuntimeConfigError;
use coachengine_templates::TemplateError;
use coachengine_topics::TopicError;
use thiserror::Error;

/// Storage-layer errors from the session store, kept distinct from
/// `EngineError` so the store has no dependency on the orchestrator.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found")]
    NotFound,

    #[error("stored version does not match expected version")]
    VersionConflict,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<SessionStoreError> for EngineError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound => EngineError::SessionNotFound,
            SessionStoreError::VersionConflict => EngineError::ConcurrentModification,
            SessionStoreError::Database(err) => EngineError::Internal(err.to_string()),
        }
    }
}

// `TopicError`, `TemplateError`, `ProviderError` and `RuntimeConfigError`
// are all foreign to this crate, and so is `EngineError` (defined in
// `coachengine-core`) — a `From<Foreign> for Foreign` impl here would
// violate the orphan rule (E0117). Only `SessionStoreError` is local, so
// only it gets a real `From` impl; the rest are plain mapping functions
// called explicitly with `.map_err(...)` at the orchestrator's call sites.

pub(crate) fn topic_err(e: TopicError) -> EngineError {
    match e {
        TopicError::NotFound(topic_id) => EngineError::TopicNotAvailable { topic_id },
        other => EngineError::Internal(other.to_string()),
    }
}

pub(crate) fn template_err(e: TemplateError) -> EngineError {
    match e {
        TemplateError::MissingParameter(name) => EngineError::MissingParameter { name },
        TemplateError::NullParameter(name) => EngineError::NullParameter { name },
        TemplateError::UndeclaredPlaceholder(name) => EngineError::UndeclaredPlaceholder { name },
        other => EngineError::Internal(other.to_string()),
    }
}

pub(crate) fn provider_err(e: ProviderError) -> EngineError {
    match e {
        ProviderError::Cancelled => EngineError::Cancelled,
        ProviderError::RateLimited { .. } | ProviderError::Unavailable(_) | ProviderError::Http(_) => {
            EngineError::ProviderUnavailable(e.to_string())
        }
        ProviderError::Api { .. } | ProviderError::Parse(_) => EngineError::ProviderRejected(e.to_string()),
    }
}

pub(crate) fn runtime_config_err(e: RuntimeConfigError) -> EngineError {
    match e {
        RuntimeConfigError::NotAvailable { topic_id, .. } => EngineError::TopicNotAvailable { topic_id },
        RuntimeConfigError::Invalid(msg) => EngineError::InvalidRuntimeConfig(msg),
        RuntimeConfigError::Database(err) => EngineError::Internal(err.to_string()),
    }
}
