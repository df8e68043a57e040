use std::collections::HashMap;

use coachengine_core::ValueKind;
use serde::{Deserialize, Serialize};

use crate::schema::ResultSchema;

/// Single-shot topics produce one completion and return; conversation
/// topics are stateful and go through the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    SingleShot,
    Conversation,
}

/// The four independently stored pieces of prompt text a topic can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRole {
    System,
    Initiation,
    Resume,
    Extraction,
}

/// An opaque reference the Template Renderer resolves against the prompt
/// store. Topic code never inspects this beyond passing it along — topic
/// *shape* is code, but template *content* is data, owned and versioned
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub key: String,
    pub version: u32,
}

impl TemplateRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), version: 1 }
    }

    pub fn versioned(key: impl Into<String>, version: u32) -> Self {
        Self { key: key.into(), version }
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, self.version)
    }
}

/// A single declared parameter of a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub required: bool,
    pub description: Option<String>,
    /// Name of a resolver hook registered with the Template Renderer
    /// (e.g. `"business_context"`), consulted when the caller doesn't
    /// supply a value directly. `None` means the parameter is never
    /// resolver-backed — only caller value or declared default apply.
    pub resolver_hook: Option<String>,
    /// Default value used when neither the caller nor a resolver hook
    /// produces one. Stored as JSON to keep `ParameterDescriptor` plain
    /// data, converted to `ParamValue` at resolution time.
    pub default: Option<serde_json::Value>,
}

impl ParameterDescriptor {
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
            resolver_hook: None,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
            resolver_hook: None,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resolver_hook(mut self, hook: impl Into<String>) -> Self {
        self.resolver_hook = Some(hook.into());
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Static, process-wide, immutable-after-load topic definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDefinition {
    pub id: String,
    pub kind: TopicKind,
    pub parameters: Vec<ParameterDescriptor>,
    pub templates: HashMap<TemplateRole, TemplateRef>,
    pub result_schema: Option<ResultSchema>,
    /// When true, a `Conversation` topic with no `result_schema` is
    /// explicitly freeform rather than a registration error.
    pub freeform: bool,
    /// Conventional textual marker the assistant can emit to signal
    /// completion out-of-band from the provider's own finish reason.
    pub completion_marker: Option<String>,
}

impl TopicDefinition {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
