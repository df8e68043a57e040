use std::sync::Arc;
use std::time::Duration;

use coachengine_core::template_syntax::extract_placeholders;
use coachengine_core::ParamValue;
use coachengine_topics::{ParameterDescriptor, TemplateRef, TopicDefinition};
use tracing::instrument;

use crate::cache::TemplateCache;
use crate::error::{Result, TemplateError};
use crate::params::{ParamBag, ResolverContext, ResolverRegistry};
use crate::store::{PromptStore, TemplateReference};

/// Resolves a topic's template against a caller-supplied parameter bag,
/// turning an opaque `TemplateRef` plus a `ParamBag` into rendered text.
///
/// Parameter resolution follows a fixed order, evaluated independently for
/// each declared parameter: the caller's explicit value, then a named
/// resolver hook, then the declared default. A required parameter still
/// unresolved after all three steps is a `MissingParameter` error; a
/// resolved value of `Null` on a required parameter is `NullParameter`.
pub struct TemplateRenderer {
    store: Arc<dyn PromptStore>,
    cache: TemplateCache,
    resolvers: ResolverRegistry,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn PromptStore>, resolvers: ResolverRegistry) -> Self {
        Self { store, cache: TemplateCache::new(Duration::from_secs(300), 1024), resolvers }
    }

    pub fn with_cache(mut self, cache: TemplateCache) -> Self {
        self.cache = cache;
        self
    }

    #[instrument(skip(self, topic, bag), fields(topic = %topic.id, template = %template_ref))]
    pub async fn render(
        &self,
        topic: &TopicDefinition,
        template_ref: &TemplateRef,
        bag: &ParamBag,
        ctx: &ResolverContext,
    ) -> Result<String> {
        let body = self.load_body(template_ref).await?;
        let placeholders = extract_placeholders(&body);

        let mut resolved = std::collections::HashMap::new();
        for name in &placeholders {
            let descriptor = topic
                .parameter(name)
                .ok_or_else(|| TemplateError::UndeclaredPlaceholder(name.clone()))?;
            let value = self.resolve_one(descriptor, bag, ctx).await?;
            resolved.insert(name.clone(), value);
        }

        Ok(substitute(&body, &resolved))
    }

    async fn load_body(&self, template_ref: &TemplateRef) -> Result<String> {
        let reference = TemplateReference::new(template_ref.key.clone(), template_ref.version);
        if let Some(cached) = self.cache.get(&reference) {
            return Ok(cached);
        }
        let body = self.store.load(&reference).await?;
        self.cache.put(reference, body.clone());
        Ok(body)
    }

    async fn resolve_one(
        &self,
        descriptor: &ParameterDescriptor,
        bag: &ParamBag,
        ctx: &ResolverContext,
    ) -> Result<ParamValue> {
        if let Some(value) = bag.get(&descriptor.name) {
            return self.finalize(descriptor, value.clone());
        }

        if let Some(hook_name) = &descriptor.resolver_hook {
            let hook = self.resolvers.get(hook_name).ok_or_else(|| {
                TemplateError::ResolverFailed(hook_name.clone(), "hook not registered".to_string())
            })?;
            if let Some(value) = hook.resolve(&descriptor.name, ctx).await {
                return self.finalize(descriptor, value);
            }
        }

        if let Some(default) = &descriptor.default {
            return self.finalize(descriptor, ParamValue::from_json(default.clone()));
        }

        if descriptor.required {
            return Err(TemplateError::MissingParameter(descriptor.name.clone()));
        }
        Ok(ParamValue::Null)
    }

    fn finalize(&self, descriptor: &ParameterDescriptor, value: ParamValue) -> Result<ParamValue> {
        if value.is_null() {
            if descriptor.required {
                return Err(TemplateError::NullParameter(descriptor.name.clone()));
            }
            return Ok(value);
        }
        if !descriptor.kind.matches(&value) {
            return Err(TemplateError::TypeMismatch {
                name: descriptor.name.clone(),
                expected: descriptor.kind,
                actual: value.kind().expect("non-null value always has a kind"),
            });
        }
        Ok(value)
    }
}

fn substitute(body: &str, resolved: &std::collections::HashMap<String, ParamValue>) -> String {
    let mut out = String::with_capacity(body.len());
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"{{") {
            if let Some(end) = body[i + 2..].find("}}") {
                let name = body[i + 2..i + 2 + end].trim();
                if let Some(value) = resolved.get(name) {
                    out.push_str(&value.render_text());
                    i += 2 + end + 2;
                    continue;
                }
            }
        }
        let ch = body[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StaticPromptStore;
    use coachengine_core::ValueKind;
    use coachengine_topics::{TemplateRole, TopicKind};
    use std::collections::HashMap;

    fn topic_with(params: Vec<ParameterDescriptor>) -> TopicDefinition {
        let mut templates = HashMap::new();
        templates.insert(TemplateRole::System, TemplateRef::new("sys/t"));
        TopicDefinition {
            id: "COACHING:test".to_string(),
            kind: TopicKind::Conversation,
            parameters: params,
            templates,
            result_schema: None,
            freeform: true,
            completion_marker: None,
        }
    }

    fn ctx() -> ResolverContext {
        ResolverContext {
            tenant_id: "tenant-1".to_string(),
            user_id: "user-1".to_string(),
            topic_id: "COACHING:test".to_string(),
        }
    }

    #[tokio::test]
    async fn caller_value_takes_precedence_over_default() {
        let store = Arc::new(
            StaticPromptStore::new().with("sys/t", 1, "Hello {{business_context}}!"),
        );
        let topic = topic_with(vec![ParameterDescriptor::required(
            "business_context",
            ValueKind::String,
        )
        .with_default(serde_json::json!("fallback"))]);
        let renderer = TemplateRenderer::new(store, ResolverRegistry::new());
        let bag = ParamBag::new().with("business_context", ParamValue::String("runs a bakery".into()));

        let out = renderer
            .render(&topic, &TemplateRef::new("sys/t"), &bag, &ctx())
            .await
            .unwrap();
        assert_eq!(out, "Hello runs a bakery!");
    }

    #[tokio::test]
    async fn missing_required_parameter_errors() {
        let store = Arc::new(StaticPromptStore::new().with("sys/t", 1, "Hi {{name}}"));
        let topic = topic_with(vec![ParameterDescriptor::required("name", ValueKind::String)]);
        let renderer = TemplateRenderer::new(store, ResolverRegistry::new());

        let err = renderer
            .render(&topic, &TemplateRef::new("sys/t"), &ParamBag::new(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingParameter(_)));
    }

    #[tokio::test]
    async fn null_caller_value_on_required_parameter_errors() {
        let store = Arc::new(StaticPromptStore::new().with("sys/t", 1, "Hi {{name}}"));
        let topic = topic_with(vec![ParameterDescriptor::required("name", ValueKind::String)]);
        let renderer = TemplateRenderer::new(store, ResolverRegistry::new());
        let bag = ParamBag::new().with("name", ParamValue::Null);

        let err = renderer
            .render(&topic, &TemplateRef::new("sys/t"), &bag, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::NullParameter(_)));
    }

    #[tokio::test]
    async fn undeclared_placeholder_errors_defensively() {
        let store = Arc::new(StaticPromptStore::new().with("sys/t", 1, "Hi {{ghost}}"));
        let topic = topic_with(vec![]);
        let renderer = TemplateRenderer::new(store, ResolverRegistry::new());

        let err = renderer
            .render(&topic, &TemplateRef::new("sys/t"), &ParamBag::new(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::UndeclaredPlaceholder(_)));
    }

    #[tokio::test]
    async fn default_used_when_caller_and_resolver_absent() {
        let store = Arc::new(StaticPromptStore::new().with("sys/t", 1, "Rank: {{rank}}"));
        let topic = topic_with(vec![ParameterDescriptor::optional("rank", ValueKind::Number)
            .with_default(serde_json::json!(1))]);
        let renderer = TemplateRenderer::new(store, ResolverRegistry::new());

        let out = renderer
            .render(&topic, &TemplateRef::new("sys/t"), &ParamBag::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(out, "Rank: 1");
    }
}
