use std::collections::HashMap;

use coachengine_core::template_syntax::extract_placeholders;
use tracing::debug;

use crate::definition::{TemplateRole, TopicDefinition, TopicKind};
use crate::error::{Result, TopicError};

/// Read-only, in-process catalog of topic definitions.
///
/// Built once at process start via [`TopicRegistryBuilder`] and threaded
/// explicitly into the Session Orchestrator's constructor — no
/// process-wide singleton.
pub struct TopicRegistry {
    topics: HashMap<String, TopicDefinition>,
}

impl TopicRegistry {
    pub fn lookup(&self, id: &str) -> Result<&TopicDefinition> {
        self.topics.get(id).ok_or_else(|| TopicError::NotFound(id.to_string()))
    }

    /// Informational only — used by the administrative surface, never
    /// consulted by the orchestrator's runtime path.
    pub fn list_conversation_topics(&self) -> Vec<&TopicDefinition> {
        self.topics.values().filter(|t| t.kind == TopicKind::Conversation).collect()
    }

    pub fn list_single_shot_topics(&self) -> Vec<&TopicDefinition> {
        self.topics.values().filter(|t| t.kind == TopicKind::SingleShot).collect()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Accumulates topic registrations and performs eager registration-time
/// validation before handing back an immutable [`TopicRegistry`].
#[derive(Default)]
pub struct TopicRegistryBuilder {
    topics: HashMap<String, TopicDefinition>,
    errors: Vec<TopicError>,
}

impl TopicRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic definition along with the literal template bodies
    /// used only to perform this eager check — the registry itself only
    /// ever stores the opaque `TemplateRef`, never the body. Topic shape
    /// is code; template content is data, resolved later by the renderer.
    pub fn register(
        mut self,
        def: TopicDefinition,
        template_bodies: &HashMap<TemplateRole, String>,
    ) -> Self {
        if self.topics.contains_key(&def.id) {
            self.errors.push(TopicError::DuplicateTopic(def.id.clone()));
            return self;
        }

        if def.kind == TopicKind::Conversation {
            for required_role in [TemplateRole::System, TemplateRole::Initiation] {
                if !def.templates.contains_key(&required_role) {
                    self.errors
                        .push(TopicError::MissingRequiredTemplate(def.id.clone(), required_role));
                }
            }
            if def.result_schema.is_none() && !def.freeform {
                self.errors.push(TopicError::AmbiguousResultContract(def.id.clone()));
            }
            if def.result_schema.is_some() && !def.templates.contains_key(&TemplateRole::Extraction) {
                self.errors
                    .push(TopicError::MissingRequiredTemplate(def.id.clone(), TemplateRole::Extraction));
            }
        }

        let declared: std::collections::HashSet<&str> =
            def.parameters.iter().map(|p| p.name.as_str()).collect();

        for (role, body) in template_bodies {
            let placeholders = extract_placeholders(body);
            let undeclared: Vec<String> = placeholders
                .into_iter()
                .filter(|name| !declared.contains(name.as_str()))
                .collect();
            if !undeclared.is_empty() {
                self.errors.push(TopicError::InvalidTemplateRefs {
                    topic: def.id.clone(),
                    role: *role,
                    placeholders: undeclared,
                });
            }
        }

        debug!(topic = %def.id, "registered topic definition");
        self.topics.insert(def.id.clone(), def);
        self
    }

    /// Finalize the registry. Returns every accumulated error rather than
    /// failing on the first one, so a misconfigured topic set fails
    /// startup loudly and completely.
    pub fn build(self) -> std::result::Result<TopicRegistry, Vec<TopicError>> {
        if self.errors.is_empty() {
            Ok(TopicRegistry { topics: self.topics })
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ParameterDescriptor, TemplateRef};
    use crate::schema::{ResultSchema, SchemaField};
    use coachengine_core::ValueKind;

    fn conversation_topic(id: &str) -> TopicDefinition {
        let mut templates = HashMap::new();
        templates.insert(TemplateRole::System, TemplateRef::new("sys/1"));
        templates.insert(TemplateRole::Initiation, TemplateRef::new("init/1"));
        templates.insert(TemplateRole::Extraction, TemplateRef::new("extract/1"));
        TopicDefinition {
            id: id.to_string(),
            kind: TopicKind::Conversation,
            parameters: vec![ParameterDescriptor::required("business_context", ValueKind::String)],
            templates,
            result_schema: Some(ResultSchema::new().field("values", SchemaField::required(ValueKind::Array))),
            freeform: false,
            completion_marker: Some("[[DONE]]".to_string()),
        }
    }

    #[test]
    fn duplicate_topic_id_rejected() {
        let mut bodies = HashMap::new();
        bodies.insert(TemplateRole::System, "Hello {{business_context}}".to_string());
        bodies.insert(TemplateRole::Initiation, "Let's begin.".to_string());

        let result = TopicRegistryBuilder::new()
            .register(conversation_topic("COACHING:core_values"), &bodies)
            .register(conversation_topic("COACHING:core_values"), &bodies)
            .build();

        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, TopicError::DuplicateTopic(_))));
    }

    #[test]
    fn undeclared_placeholder_rejected_at_registration() {
        let mut bodies = HashMap::new();
        bodies.insert(TemplateRole::System, "Hello {{nonexistent_param}}".to_string());
        bodies.insert(TemplateRole::Initiation, "Let's begin.".to_string());

        let result = TopicRegistryBuilder::new()
            .register(conversation_topic("COACHING:core_values"), &bodies)
            .build();

        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, TopicError::InvalidTemplateRefs { .. })));
    }

    #[test]
    fn conversation_without_schema_or_freeform_rejected() {
        let mut def = conversation_topic("COACHING:freeform_missing");
        def.result_schema = None;
        def.freeform = false;
        let bodies = HashMap::new();

        let result = TopicRegistryBuilder::new().register(def, &bodies).build();
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, TopicError::AmbiguousResultContract(_))));
    }

    #[test]
    fn valid_registration_succeeds() {
        let mut bodies = HashMap::new();
        bodies.insert(TemplateRole::System, "Hello {{business_context}}".to_string());
        bodies.insert(TemplateRole::Initiation, "Let's begin.".to_string());

        let registry = TopicRegistryBuilder::new()
            .register(conversation_topic("COACHING:core_values"), &bodies)
            .build()
            .expect("registration should succeed");

        assert!(registry.lookup("COACHING:core_values").is_ok());
        assert_eq!(registry.list_conversation_topics().len(), 1);
    }
}
