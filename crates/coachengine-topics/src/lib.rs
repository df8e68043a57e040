pub mod definition;
pub mod error;
pub mod registry;
pub mod schema;

pub use definition::{ParameterDescriptor, TemplateRef, TemplateRole, TopicDefinition, TopicKind};
pub use error::TopicError;
pub use registry::{TopicRegistry, TopicRegistryBuilder};
pub use schema::{ResultSchema, SchemaField};
