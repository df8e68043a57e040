use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("no active runtime configuration for tenant {tenant_id} topic {topic_id}")]
    NotAvailable { tenant_id: String, topic_id: String },

    #[error("invalid runtime configuration: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeConfigError>;
