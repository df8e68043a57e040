use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
    Abandoned,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub ts: String,
    /// Present for user/assistant messages; absent for the system prompt.
    pub turn: Option<u32>,
}

/// The coaching session aggregate. Messages are append-only; nothing ever
/// rewrites a prior entry's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub topic_id: String,
    pub status: SessionStatus,
    pub turn: u32,
    pub max_turns: u32,
    pub messages: Vec<Message>,
    pub created_at: String,
    pub last_activity_at: String,
    pub expires_at: String,
    pub completed_at: Option<String>,
    pub extracted_result: Option<serde_json::Value>,
    pub extraction_schema_id: Option<String>,
    /// Monotonic version used for optimistic-concurrency writes.
    pub version: u64,
}

impl Session {
    pub fn is_owned_by(&self, tenant_id: &str, user_id: &str) -> bool {
        self.tenant_id == tenant_id && self.user_id == user_id
    }

    pub fn is_expired_as_of(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.status == SessionStatus::Active
            && chrono::DateTime::parse_from_rfc3339(&self.expires_at)
                .map(|expires| now >= expires)
                .unwrap_or(false)
    }
}
