pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::RuntimeConfigError;
pub use store::{RuntimeConfigStore, SqliteRuntimeConfigStore};
pub use types::RuntimeTopicConfig;
