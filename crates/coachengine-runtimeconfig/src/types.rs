use serde::{Deserialize, Serialize};

/// Per-tenant, per-topic execution policy: how a topic runs, as opposed to
/// the topic's identity and shape (which is code, not data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeTopicConfig {
    pub tenant_id: String,
    pub topic_id: String,
    pub model_code: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_turns: u32,
    pub session_ttl_hours: u32,
    pub idle_timeout_minutes: u32,
    /// Cheaper/faster model for the extraction call, if different from
    /// `model_code`.
    pub extraction_model_code: Option<String>,
    /// Model tried when `model_code` is exhausted or unavailable for a
    /// conversation turn. Distinct from provider-level retry within a
    /// single model: this is a different logical model entirely.
    pub fallback_model_code: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl RuntimeTopicConfig {
    pub fn extraction_model(&self) -> &str {
        self.extraction_model_code.as_deref().unwrap_or(&self.model_code)
    }
}
