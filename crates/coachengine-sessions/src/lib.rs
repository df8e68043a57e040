//! Session persistence and lifecycle orchestration — the aggregate root
//! that composes topics, runtime configuration, templates and providers
//! into the Initiate/AddMessage/Complete operations the gateway exposes.

pub mod db;
pub mod error;
pub mod orchestrator;
pub mod retention;
pub mod store;
pub mod types;

pub use error::SessionStoreError;
pub use orchestrator::{
    CompleteOutcome, InitiateOutcome, Metadata, SessionOrchestrator, SessionSnapshot, TurnOutcome,
};
pub use retention::{purge_after, RESUMABLE_RETENTION_DAYS, TERMINAL_RETENTION_DAYS};
pub use store::{SessionStore, SqliteSessionStore};
pub use types::{Message, MessageRole, Session, SessionStatus};
