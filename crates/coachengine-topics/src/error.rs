use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopicError {
    #[error("duplicate topic: {0}")]
    DuplicateTopic(String),

    #[error("topic '{topic}' template '{role:?}' references undeclared placeholder(s): {placeholders:?}")]
    InvalidTemplateRefs {
        topic: String,
        role: crate::definition::TemplateRole,
        placeholders: Vec<String>,
    },

    #[error("conversation topic '{0}' is missing a required '{1:?}' template")]
    MissingRequiredTemplate(String, crate::definition::TemplateRole),

    #[error("conversation topic '{0}' has neither a result schema nor is marked freeform")]
    AmbiguousResultContract(String),

    #[error("topic not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, TopicError>;
