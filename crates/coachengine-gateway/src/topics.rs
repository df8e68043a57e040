//! Baked-in demo topic catalog, registered at startup.
//!
//! A real deployment would load topic definitions and template bodies from
//! a versioned store of its own; this gateway ships the one topic from the
//! walkthrough scenario so the server is runnable and demoable out of the
//! box, with its own prompt store wired from the same literal bodies used
//! to validate the registration.

use std::collections::HashMap;
use std::sync::Arc;

use coachengine_core::ValueKind;
use coachengine_templates::StaticPromptStore;
use coachengine_topics::{
    ParameterDescriptor, ResultSchema, SchemaField, TemplateRef, TemplateRole, TopicDefinition,
    TopicKind, TopicRegistry, TopicRegistryBuilder,
};

pub const CORE_VALUES_TOPIC: &str = "COACHING:core_values";

const SYSTEM_PROMPT: &str = "You are an executive coach helping the owner of {{business_context}} \
articulate the core values that should guide their company's decisions. Ask focused questions, one \
at a time, and push back gently on vague answers. When the conversation has surfaced at least three \
distinct values, end your reply with the marker [[DONE]].";

const INITIATION_PROMPT: &str = "Greet the user and ask what matters most to them about how their \
business treats customers and employees.";

const RESUME_PROMPT: &str = "Resuming a prior conversation. Summary of what has been covered so far:\n\
{{conversation_summary}}\n\nContinue the coaching conversation from here.";

const EXTRACTION_PROMPT: &str = "Review the full conversation transcript above and extract the core \
values the user settled on, ranked by the importance they placed on each.";

fn core_values_definition() -> TopicDefinition {
    let mut templates = HashMap::new();
    templates.insert(TemplateRole::System, TemplateRef::new("core_values/system"));
    templates.insert(TemplateRole::Initiation, TemplateRef::new("core_values/initiation"));
    templates.insert(TemplateRole::Resume, TemplateRef::new("core_values/resume"));
    templates.insert(TemplateRole::Extraction, TemplateRef::new("core_values/extraction"));

    TopicDefinition {
        id: CORE_VALUES_TOPIC.to_string(),
        kind: TopicKind::Conversation,
        parameters: vec![
            ParameterDescriptor::required("business_context", ValueKind::String)
                .with_description("One-line description of what the business does"),
            ParameterDescriptor::optional("conversation_summary", ValueKind::String)
                .with_default(serde_json::json!("")),
        ],
        templates,
        result_schema: Some(
            ResultSchema::new().field(
                "values",
                SchemaField::required(ValueKind::Array)
                    .with_description("Core values surfaced during the conversation, most important first")
                    .with_array_item_fields(
                        ResultSchema::new()
                            .field("name", SchemaField::required(ValueKind::String))
                            .field(
                                "importance_rank",
                                SchemaField::required(ValueKind::Number)
                                    .with_description("1 = most important"),
                            )
                            .field("rationale", SchemaField::optional(ValueKind::String)),
                    ),
            ),
        ),
        freeform: false,
        completion_marker: Some("[[DONE]]".to_string()),
    }
}

pub fn build_registry() -> anyhow::Result<Arc<TopicRegistry>> {
    let mut bodies = HashMap::new();
    bodies.insert(TemplateRole::System, SYSTEM_PROMPT.to_string());
    bodies.insert(TemplateRole::Initiation, INITIATION_PROMPT.to_string());
    bodies.insert(TemplateRole::Resume, RESUME_PROMPT.to_string());
    bodies.insert(TemplateRole::Extraction, EXTRACTION_PROMPT.to_string());

    let registry = TopicRegistryBuilder::new()
        .register(core_values_definition(), &bodies)
        .build()
        .map_err(|errs| anyhow::anyhow!("topic registry validation failed: {errs:?}"))?;
    Ok(Arc::new(registry))
}

pub fn build_prompt_store() -> Arc<StaticPromptStore> {
    Arc::new(
        StaticPromptStore::new()
            .with("core_values/system", 1, SYSTEM_PROMPT)
            .with("core_values/initiation", 1, INITIATION_PROMPT)
            .with("core_values/resume", 1, RESUME_PROMPT)
            .with("core_values/extraction", 1, EXTRACTION_PROMPT),
    )
}
