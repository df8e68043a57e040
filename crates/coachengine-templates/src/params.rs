use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coachengine_core::ParamValue;

/// The caller-supplied parameter map for a single render — an opaque map
/// of tagged values, parsed once at the API boundary and threaded through
/// unchanged from there.
#[derive(Debug, Clone, Default)]
pub struct ParamBag(HashMap<String, ParamValue>);

impl ParamBag {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }
}

impl From<HashMap<String, ParamValue>> for ParamBag {
    fn from(map: HashMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

/// A named resolver hook, consulted when the caller doesn't supply a
/// parameter value directly.
///
/// Implementations must be idempotent and side-effect-free observers of
/// other services — e.g. "fetch business context for current user".
#[async_trait]
pub trait ResolverHook: Send + Sync {
    /// Resolve a value for `param_name` given the caller context, or
    /// `None` if this hook has nothing to contribute (falls through to the
    /// declared default, if any).
    async fn resolve(&self, param_name: &str, ctx: &ResolverContext) -> Option<ParamValue>;
}

/// Context handed to a resolver hook — deliberately minimal; hooks that
/// need more call out to their own sibling-service client.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    pub tenant_id: String,
    pub user_id: String,
    pub topic_id: String,
}

/// A named collection of resolver hooks, keyed by the name declared on a
/// topic's `ParameterDescriptor::resolver_hook`.
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    hooks: HashMap<String, Arc<dyn ResolverHook>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, hook: Arc<dyn ResolverHook>) -> Self {
        self.hooks.insert(name.into(), hook);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResolverHook>> {
        self.hooks.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysNone;

    #[async_trait]
    impl ResolverHook for AlwaysNone {
        async fn resolve(&self, _param_name: &str, _ctx: &ResolverContext) -> Option<ParamValue> {
            None
        }
    }

    #[tokio::test]
    async fn registry_returns_registered_hook() {
        let registry = ResolverRegistry::new().register("business_context", Arc::new(AlwaysNone));
        assert!(registry.get("business_context").is_some());
        assert!(registry.get("missing").is_none());
    }
}
