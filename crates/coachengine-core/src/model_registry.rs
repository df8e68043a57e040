//! Model registry — maps a logical model code onto the provider adapter
//! and concrete provider-side model identifier that should serve it.
//!
//! A small, read-mostly, in-process list consulted by the gateway, with
//! an `active` flag and declared capability set per entry, and admin-style
//! mutation (`upsert`/`deactivate`) for entries that are static at startup
//! but adjustable without a redeploy.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Which backend adapter serves a model code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Anthropic,
    OpenAiCompat,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Streaming,
    FunctionCalling,
}

/// A single model entry: the unit of resolution for the Provider Gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Logical model code referenced from runtime configuration, e.g.
    /// `"claude-sonnet"` or `"gpt-4o-mini"`.
    pub code: String,
    pub provider_tag: ProviderTag,
    /// The provider's own model identifier, e.g. `"claude-3-5-sonnet-latest"`.
    pub provider_model_id: String,
    pub capabilities: Vec<Capability>,
    pub active: bool,
    /// Optional cost metadata (USD per 1K tokens), informational only.
    pub cost_per_1k_input_usd: Option<f64>,
    pub cost_per_1k_output_usd: Option<f64>,
}

impl ModelEntry {
    pub fn supports(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelRegistryError {
    #[error("duplicate model code: {0}")]
    Duplicate(String),
}

/// Thread-safe, read-mostly catalog of model entries.
///
/// Readers never block each other (a plain `RwLock` read guard); writes
/// only happen through administrative operations — entries are loaded at
/// startup and refreshed only through `upsert`/`deactivate`, never on the
/// request hot path.
pub struct ModelRegistry {
    entries: RwLock<HashMap<String, ModelEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_entries(entries: Vec<ModelEntry>) -> Self {
        let registry = Self::new();
        for entry in entries {
            registry.upsert(entry);
        }
        registry
    }

    /// Insert or replace an entry by code. Always succeeds — this is the
    /// admin write path and replacement is the intended semantics.
    pub fn upsert(&self, entry: ModelEntry) {
        self.entries.write().unwrap().insert(entry.code.clone(), entry);
    }

    pub fn get(&self, code: &str) -> Option<ModelEntry> {
        self.entries.read().unwrap().get(code).cloned()
    }

    /// Returns the entry only if it exists and is active — the check the
    /// Provider Gateway performs before dispatch.
    pub fn get_active(&self, code: &str) -> Option<ModelEntry> {
        self.get(code).filter(|e| e.active)
    }

    pub fn deactivate(&self, code: &str) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(code) {
            entry.active = false;
        }
    }

    pub fn list(&self) -> Vec<ModelEntry> {
        self.entries.read().unwrap().values().cloned().collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, active: bool) -> ModelEntry {
        ModelEntry {
            code: code.to_string(),
            provider_tag: ProviderTag::Anthropic,
            provider_model_id: format!("{code}-v1"),
            capabilities: vec![Capability::Chat],
            active,
            cost_per_1k_input_usd: None,
            cost_per_1k_output_usd: None,
        }
    }

    #[test]
    fn inactive_model_not_returned_by_get_active() {
        let reg = ModelRegistry::with_entries(vec![entry("m1", false)]);
        assert!(reg.get("m1").is_some());
        assert!(reg.get_active("m1").is_none());
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let reg = ModelRegistry::with_entries(vec![entry("m1", true)]);
        reg.upsert(entry("m1", false));
        assert!(!reg.get("m1").unwrap().active);
    }
}
