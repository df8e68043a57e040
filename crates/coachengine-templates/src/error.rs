use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("required parameter '{0}' resolved to null")]
    NullParameter(String),

    #[error("placeholder '{0}' has no declared parameter")]
    UndeclaredPlaceholder(String),

    #[error("parameter '{name}' declared as {expected} but resolved value is {actual}")]
    TypeMismatch {
        name: String,
        expected: coachengine_core::ValueKind,
        actual: coachengine_core::ValueKind,
    },

    #[error("prompt store error: {0}")]
    Store(#[from] PromptStoreError),

    #[error("resolver hook '{0}' failed: {1}")]
    ResolverFailed(String, String),
}

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
