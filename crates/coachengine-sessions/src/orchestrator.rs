//! The Session Orchestrator (C5) — aggregate root of the core. Composes
//! the Topic Registry (C1), Runtime Configuration Store (C2), Template
//! Renderer (C3) and Provider Gateway / Model Router (C4) into the three
//! operations the API layer calls: Initiate, AddMessage, Complete.
//!
//! Every operation is transactional at the single-session level: it
//! either fully succeeds or leaves the session in its pre-operation
//! state. Per-session serialization is enforced by a version-stamped
//! compare-and-swap on every write, retried a bounded number of times on
//! `ConcurrentModification` before surfacing `Busy`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use coachengine_core::config::MAX_USER_MESSAGE_CHARS;
use coachengine_core::{EngineError, Result};
use coachengine_providers::{ChatMessage, ModelRouter, Role};
use coachengine_runtimeconfig::RuntimeConfigStore;
use coachengine_templates::{ParamBag, ResolverContext, TemplateRenderer};
use coachengine_topics::{TemplateRole, TopicDefinition, TopicKind, TopicRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{provider_err, runtime_config_err, template_err, topic_err};
use crate::store::SessionStore;
use crate::types::{Message, MessageRole, Session, SessionStatus};

/// Number of trailing user+assistant turns folded into the resume-template
/// summary parameter — a deterministic, bounded-length digest, not an LLM
/// call of its own.
const RESUME_HISTORY_TURNS: usize = 6;

/// Extraction is always dispatched at low, deterministic sampling —
/// structured output tolerates no creative variance.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Uniform metadata object returned with every operation.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub model: String,
    pub processing_time_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug, Clone)]
pub struct InitiateOutcome {
    pub session_id: String,
    pub message: String,
    pub turn: u32,
    pub max_turns: u32,
    pub is_final: bool,
    pub resumed: bool,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub message: String,
    pub turn: u32,
    pub max_turns: u32,
    pub is_final: bool,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct CompleteOutcome {
    pub session_id: String,
    pub result: serde_json::Value,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub turn: u32,
    pub max_turns: u32,
    pub created_at: String,
    pub last_activity_at: String,
    pub expires_at: String,
    pub completed_at: Option<String>,
}

/// The three inward ports (topic lookup, runtime configuration, session
/// persistence) and the one outward port (model dispatch) are passed in
/// at construction rather than looked up through a process-wide registry,
/// so tests can substitute in-memory fakes for all four.
pub struct SessionOrchestrator {
    topics: Arc<TopicRegistry>,
    runtime_config: Arc<dyn RuntimeConfigStore>,
    renderer: Arc<TemplateRenderer>,
    router: Arc<ModelRouter>,
    sessions: Arc<dyn SessionStore>,
    max_cas_retries: u32,
}

impl SessionOrchestrator {
    pub fn new(
        topics: Arc<TopicRegistry>,
        runtime_config: Arc<dyn RuntimeConfigStore>,
        renderer: Arc<TemplateRenderer>,
        router: Arc<ModelRouter>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self { topics, runtime_config, renderer, router, sessions, max_cas_retries: 3 }
    }

    pub fn with_max_cas_retries(mut self, n: u32) -> Self {
        self.max_cas_retries = n;
        self
    }

    #[instrument(skip(self, params, cancel), fields(tenant_id, topic_id))]
    pub async fn initiate(
        &self,
        tenant_id: &str,
        user_id: &str,
        topic_id: &str,
        params: ParamBag,
        cancel: &CancellationToken,
    ) -> Result<InitiateOutcome> {
        let start = Instant::now();
        let topic = self.topics.lookup(topic_id).map_err(topic_err)?.clone();
        if topic.kind != TopicKind::Conversation {
            return Err(EngineError::TopicNotAvailable { topic_id: topic_id.to_string() });
        }
        let config = self.runtime_config.get(tenant_id, topic_id).map_err(runtime_config_err)?;
        if !config.is_active {
            return Err(EngineError::TopicNotAvailable { topic_id: topic_id.to_string() });
        }

        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let existing = self
                .sessions
                .find_active(tenant_id, topic_id)
                .map_err(EngineError::from)?;

            let outcome = match existing {
                Some(session) if session.is_expired_as_of(Utc::now()) => {
                    self.expire_in_place(session)?;
                    self.create_session(tenant_id, user_id, &topic, &config, params.clone(), cancel).await
                }
                Some(session) if session.user_id == user_id => {
                    self.resume_session(session, &topic, &config, params.clone(), cancel).await
                }
                Some(session) => Err(EngineError::SessionConflict { other_user_id: session.user_id }),
                None => self.create_session(tenant_id, user_id, &topic, &config, params.clone(), cancel).await,
            };

            match outcome {
                Err(EngineError::ConcurrentModification) if attempts < self.max_cas_retries => {
                    attempts += 1;
                    continue;
                }
                Err(EngineError::ConcurrentModification) => return Err(EngineError::Busy),
                Err(e) => return Err(e),
                Ok(mut result) => {
                    result.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
                    return Ok(result);
                }
            }
        }
    }

    async fn create_session(
        &self,
        tenant_id: &str,
        user_id: &str,
        topic: &TopicDefinition,
        config: &coachengine_runtimeconfig::RuntimeTopicConfig,
        params: ParamBag,
        cancel: &CancellationToken,
    ) -> Result<InitiateOutcome> {
        let ctx = ResolverContext {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            topic_id: topic.id.clone(),
        };

        let system_ref = topic
            .templates
            .get(&TemplateRole::System)
            .ok_or_else(|| EngineError::Internal(format!("topic {} missing System template", topic.id)))?;
        let initiation_ref = topic
            .templates
            .get(&TemplateRole::Initiation)
            .ok_or_else(|| EngineError::Internal(format!("topic {} missing Initiation template", topic.id)))?;

        let system_text = self.renderer.render(topic, system_ref, &params, &ctx).await.map_err(template_err)?;
        let initiation_text = self.renderer.render(topic, initiation_ref, &params, &ctx).await.map_err(template_err)?;

        let now = Utc::now();
        let system_message = ChatMessage { role: Role::System, content: system_text.clone() };
        let initiation_message = ChatMessage { role: Role::User, content: initiation_text.clone() };

        let (response, model_used) = self
            .router
            .dispatch(
                &config.model_code,
                config.fallback_model_code.as_deref(),
                vec![system_message, initiation_message],
                config.max_tokens,
                Some(config.temperature),
                cancel,
            )
            .await
            .map_err(provider_err)?;

        let turn = 1u32;
        let is_final = detect_completion(topic, &response, turn, config.max_turns);
        let expires_at = now + Duration::hours(config.session_ttl_hours as i64);

        let session = Session {
            session_id: coachengine_core::SessionId::new().to_string(),
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            topic_id: topic.id.clone(),
            status: SessionStatus::Active,
            turn,
            max_turns: config.max_turns,
            messages: vec![
                Message { role: MessageRole::System, content: system_text, ts: now.to_rfc3339(), turn: None },
                Message {
                    role: MessageRole::Assistant,
                    content: response.content.clone(),
                    ts: now.to_rfc3339(),
                    turn: Some(turn),
                },
            ],
            created_at: now.to_rfc3339(),
            last_activity_at: now.to_rfc3339(),
            expires_at: expires_at.to_rfc3339(),
            completed_at: None,
            extracted_result: None,
            extraction_schema_id: None,
            version: 1,
        };

        self.sessions.create(session.clone()).map_err(EngineError::from)?;
        info!(session_id = %session.session_id, topic_id = %topic.id, "session initiated");

        let metadata = Metadata {
            model: model_used,
            processing_time_ms: 0,
            tokens_in: response.tokens_in,
            tokens_out: response.tokens_out,
        };

        let mut outcome = InitiateOutcome {
            session_id: session.session_id.clone(),
            message: response.content,
            turn,
            max_turns: session.max_turns,
            is_final,
            resumed: false,
            metadata,
        };

        if is_final {
            let completed = self.complete_loaded(session, topic, config, cancel).await?;
            outcome.metadata.tokens_in += completed.metadata.tokens_in;
            outcome.metadata.tokens_out += completed.metadata.tokens_out;
        }

        Ok(outcome)
    }

    async fn resume_session(
        &self,
        session: Session,
        topic: &TopicDefinition,
        config: &coachengine_runtimeconfig::RuntimeTopicConfig,
        params: ParamBag,
        cancel: &CancellationToken,
    ) -> Result<InitiateOutcome> {
        let resume_ref = topic
            .templates
            .get(&TemplateRole::Resume)
            .ok_or_else(|| EngineError::Internal(format!("topic {} missing Resume template", topic.id)))?;

        let ctx = ResolverContext {
            tenant_id: session.tenant_id.clone(),
            user_id: session.user_id.clone(),
            topic_id: topic.id.clone(),
        };
        let summary = summarize_history(&session.messages, RESUME_HISTORY_TURNS);
        let bag = params.with("conversation_summary", coachengine_core::ParamValue::String(summary));
        let resume_text = self.renderer.render(topic, resume_ref, &bag, &ctx).await.map_err(template_err)?;

        let mut messages = to_chat_messages(&session.messages);
        messages.push(ChatMessage { role: Role::System, content: resume_text.clone() });

        let (response, model_used) = self
            .router
            .dispatch(
                &config.model_code,
                config.fallback_model_code.as_deref(),
                messages,
                config.max_tokens,
                Some(config.temperature),
                cancel,
            )
            .await
            .map_err(provider_err)?;

        let now = Utc::now();
        let turn = session.turn + 1;
        let is_final = detect_completion(topic, &response, turn, session.max_turns);
        let expected_version = session.version;

        let mut updated = session;
        updated.messages.push(Message {
            role: MessageRole::System,
            content: resume_text,
            ts: now.to_rfc3339(),
            turn: None,
        });
        updated.messages.push(Message {
            role: MessageRole::Assistant,
            content: response.content.clone(),
            ts: now.to_rfc3339(),
            turn: Some(turn),
        });
        updated.turn = turn;
        updated.last_activity_at = now.to_rfc3339();
        updated.expires_at = (now + Duration::hours(config.session_ttl_hours as i64)).to_rfc3339();

        self.sessions.update(&updated, expected_version).map_err(EngineError::from)?;
        info!(session_id = %updated.session_id, "session resumed");

        let metadata = Metadata {
            model: model_used,
            processing_time_ms: 0,
            tokens_in: response.tokens_in,
            tokens_out: response.tokens_out,
        };

        let mut outcome = InitiateOutcome {
            session_id: updated.session_id.clone(),
            message: response.content,
            turn,
            max_turns: updated.max_turns,
            is_final,
            resumed: true,
            metadata,
        };

        if is_final {
            let completed = self.complete_loaded(updated, topic, config, cancel).await?;
            outcome.metadata.tokens_in += completed.metadata.tokens_in;
            outcome.metadata.tokens_out += completed.metadata.tokens_out;
        }

        Ok(outcome)
    }

    /// Mark an already-expired (by TTL) but still-`Active`-in-storage
    /// session as `Expired`, so it stops blocking the resumable-session
    /// unique index. Best-effort: a lost race here just means the next
    /// Initiate attempt retries.
    fn expire_in_place(&self, mut session: Session) -> Result<()> {
        let expected_version = session.version;
        session.status = SessionStatus::Expired;
        self.sessions.update(&session, expected_version).map_err(EngineError::from)
    }

    #[instrument(skip(self, text, cancel), fields(session_id))]
    pub async fn add_message(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let start = Instant::now();
        if text.trim().is_empty() {
            return Err(EngineError::MissingParameter { name: "text".to_string() });
        }
        if text.len() > MAX_USER_MESSAGE_CHARS {
            return Err(EngineError::MessageTooLong { len: text.len(), max: MAX_USER_MESSAGE_CHARS });
        }

        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let session = self.sessions.get(session_id).map_err(EngineError::from)?;
            if session.tenant_id != tenant_id {
                // Tenant Y must not learn session_id belongs to tenant X.
                return Err(EngineError::SessionNotFound);
            }
            if session.user_id != user_id {
                return Err(EngineError::Forbidden);
            }
            if session.is_expired_as_of(Utc::now()) {
                let _ = self.expire_in_place(session);
                return Err(EngineError::SessionExpired);
            }
            if session.status != SessionStatus::Active {
                return Err(EngineError::SessionNotActive);
            }
            if session.turn >= session.max_turns {
                return Err(EngineError::MaxTurnsReached);
            }

            let topic = self.topics.lookup(&session.topic_id).map_err(topic_err)?.clone();
            let config = self.runtime_config.get(tenant_id, &session.topic_id).map_err(runtime_config_err)?;

            match self.apply_turn(session, &topic, &config, text, cancel).await {
                Err(EngineError::ConcurrentModification) if attempts < self.max_cas_retries => {
                    attempts += 1;
                    continue;
                }
                Err(EngineError::ConcurrentModification) => return Err(EngineError::Busy),
                Err(e) => return Err(e),
                Ok(mut outcome) => {
                    outcome.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
                    return Ok(outcome);
                }
            }
        }
    }

    async fn apply_turn(
        &self,
        mut session: Session,
        topic: &TopicDefinition,
        config: &coachengine_runtimeconfig::RuntimeTopicConfig,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let expected_version = session.version;
        let now = Utc::now();

        session.messages.push(Message {
            role: MessageRole::User,
            content: text.to_string(),
            ts: now.to_rfc3339(),
            turn: None,
        });

        let messages = to_chat_messages(&session.messages);
        let (response, model_used) = self
            .router
            .dispatch(
                &config.model_code,
                config.fallback_model_code.as_deref(),
                messages,
                config.max_tokens,
                Some(config.temperature),
                cancel,
            )
            .await
            .map_err(provider_err)?;

        let turn = session.turn + 1;
        let is_final = detect_completion(topic, &response, turn, config.max_turns);

        session.messages.push(Message {
            role: MessageRole::Assistant,
            content: response.content.clone(),
            ts: now.to_rfc3339(),
            turn: Some(turn),
        });
        session.turn = turn;
        session.last_activity_at = now.to_rfc3339();
        session.expires_at = (now + Duration::hours(config.session_ttl_hours as i64)).to_rfc3339();

        self.sessions.update(&session, expected_version).map_err(EngineError::from)?;

        let mut metadata = Metadata {
            model: model_used,
            processing_time_ms: 0,
            tokens_in: response.tokens_in,
            tokens_out: response.tokens_out,
        };

        if is_final {
            let completed = self.complete_loaded(session.clone(), topic, config, cancel).await?;
            metadata.tokens_in += completed.metadata.tokens_in;
            metadata.tokens_out += completed.metadata.tokens_out;
        }

        Ok(TurnOutcome {
            session_id: session.session_id,
            message: response.content,
            turn,
            max_turns: session.max_turns,
            is_final,
            metadata,
        })
    }

    #[instrument(skip(self, cancel), fields(session_id))]
    pub async fn complete(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CompleteOutcome> {
        let start = Instant::now();
        let session = self.sessions.get(session_id).map_err(EngineError::from)?;
        if session.tenant_id != tenant_id {
            return Err(EngineError::SessionNotFound);
        }
        if session.user_id != user_id {
            return Err(EngineError::Forbidden);
        }

        if session.status == SessionStatus::Completed {
            let result = session
                .extracted_result
                .clone()
                .ok_or_else(|| EngineError::Internal("completed session missing extracted_result".to_string()))?;
            return Ok(CompleteOutcome {
                session_id: session.session_id,
                result,
                metadata: Metadata {
                    model: config_model_or_unknown(&self.runtime_config, tenant_id, &session.topic_id),
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    tokens_in: 0,
                    tokens_out: 0,
                },
            });
        }

        if session.status != SessionStatus::Active {
            return Err(EngineError::SessionNotActive);
        }

        let topic = self.topics.lookup(&session.topic_id).map_err(topic_err)?.clone();
        let config = self.runtime_config.get(tenant_id, &session.topic_id).map_err(runtime_config_err)?;

        let mut outcome = self.complete_loaded(session, &topic, &config, cancel).await?;
        outcome.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    /// Shared by the explicit `Complete` operation and the internal
    /// completion triggered by Initiate/AddMessage when the assistant
    /// response (or turn limit) is final.
    async fn complete_loaded(
        &self,
        session: Session,
        topic: &TopicDefinition,
        config: &coachengine_runtimeconfig::RuntimeTopicConfig,
        cancel: &CancellationToken,
    ) -> Result<CompleteOutcome> {
        let schema = topic.result_schema.as_ref().ok_or_else(|| {
            EngineError::ExtractionFailed(format!("topic {} has no result schema to extract against", topic.id))
        })?;

        let extraction_ref = topic.templates.get(&TemplateRole::Extraction).ok_or_else(|| {
            EngineError::Internal(format!("topic {} missing Extraction template", topic.id))
        })?;
        let ctx = ResolverContext {
            tenant_id: session.tenant_id.clone(),
            user_id: session.user_id.clone(),
            topic_id: topic.id.clone(),
        };
        let instructions = self.renderer.render(topic, extraction_ref, &ParamBag::new(), &ctx).await.map_err(template_err)?;
        let system_prompt = format!("{instructions}\n\n{}", schema.render_prompt_text());
        let transcript = serialize_transcript(&session.messages);

        let extraction_model = config.extraction_model().to_string();
        let max_tokens = config.max_tokens.max(1024);

        let mut messages = vec![
            ChatMessage { role: Role::System, content: system_prompt.clone() },
            ChatMessage { role: Role::User, content: transcript.clone() },
        ];

        let mut total_tokens_in = 0u32;
        let mut total_tokens_out = 0u32;
        let mut model_used = extraction_model.clone();
        let mut last_error: Option<String> = None;

        for attempt in 0..2 {
            let (response, used) = self
                .router
                .dispatch(&extraction_model, None, messages.clone(), max_tokens, Some(EXTRACTION_TEMPERATURE), cancel)
                .await
                .map_err(provider_err)?;
            model_used = used;
            total_tokens_in += response.tokens_in;
            total_tokens_out += response.tokens_out;

            match parse_and_validate(&response.content, schema) {
                Ok(value) => {
                    let now = Utc::now();
                    let expected_version = session.version;
                    let mut completed = session;
                    completed.status = SessionStatus::Completed;
                    completed.completed_at = Some(now.to_rfc3339());
                    completed.extracted_result = Some(value.clone());
                    completed.extraction_schema_id = Some(topic.id.clone());
                    self.sessions.update(&completed, expected_version).map_err(EngineError::from)?;

                    info!(session_id = %completed.session_id, attempt, "extraction succeeded");
                    return Ok(CompleteOutcome {
                        session_id: completed.session_id,
                        result: value,
                        metadata: Metadata {
                            model: model_used,
                            processing_time_ms: 0,
                            tokens_in: total_tokens_in,
                            tokens_out: total_tokens_out,
                        },
                    });
                }
                Err(parse_err) => {
                    warn!(attempt, err = %parse_err, "extraction output failed schema validation");
                    last_error = Some(parse_err.to_string());
                    if attempt == 0 {
                        messages.push(ChatMessage { role: Role::Assistant, content: response.content });
                        messages.push(ChatMessage {
                            role: Role::User,
                            content: format!(
                                "Your previous output did not match the required schema: {parse_err}. \
                                 Respond again with corrected JSON only, no commentary."
                            ),
                        });
                    }
                }
            }
        }

        Err(EngineError::ExtractionFailed(last_error.unwrap_or_else(|| "unknown parse failure".to_string())))
    }

    pub fn get_session(&self, tenant_id: &str, user_id: &str, session_id: &str) -> Result<SessionSnapshot> {
        let mut session = self.sessions.get(session_id).map_err(EngineError::from)?;
        if session.tenant_id != tenant_id {
            return Err(EngineError::SessionNotFound);
        }
        if session.user_id != user_id {
            return Err(EngineError::Forbidden);
        }

        if session.is_expired_as_of(Utc::now()) {
            let _ = self.expire_in_place(session.clone());
            session.status = SessionStatus::Expired;
        }

        Ok(SessionSnapshot {
            session_id: session.session_id,
            status: session.status,
            turn: session.turn,
            max_turns: session.max_turns,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            completed_at: session.completed_at,
        })
    }
}

fn config_model_or_unknown(
    store: &Arc<dyn RuntimeConfigStore>,
    tenant_id: &str,
    topic_id: &str,
) -> String {
    store.get(tenant_id, topic_id).map(|c| c.model_code).unwrap_or_else(|_| "unknown".to_string())
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: match m.role {
                MessageRole::System => Role::System,
                MessageRole::User => Role::User,
                MessageRole::Assistant => Role::Assistant,
            },
            content: m.content.clone(),
        })
        .collect()
}

/// Deterministic, bounded-length digest of the last `n` user+assistant
/// turns, used as the resume template's `conversation_summary` parameter.
/// This is an in-memory transform, not an LLM call.
fn summarize_history(messages: &[Message], n: usize) -> String {
    let turns: Vec<&Message> =
        messages.iter().filter(|m| m.role != MessageRole::System).rev().take(n * 2).collect();
    let mut lines: Vec<String> = turns
        .into_iter()
        .rev()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
                MessageRole::System => unreachable!("filtered above"),
            };
            format!("{role}: {}", m.content)
        })
        .collect();
    if lines.is_empty() {
        lines.push("(no prior turns)".to_string());
    }
    lines.join("\n")
}

fn serialize_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::System => "SYSTEM",
                MessageRole::User => "USER",
                MessageRole::Assistant => "ASSISTANT",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First positive hit wins: the provider's own finish signal, then the
/// topic's conventional textual marker. Turn-limit exhaustion is a
/// separate trigger, ORed in by the caller.
fn detect_completion(
    topic: &TopicDefinition,
    response: &coachengine_providers::ChatResponse,
    turn_after: u32,
    max_turns: u32,
) -> bool {
    if response.stop_reason == "stop_sequence" {
        return true;
    }
    if let Some(marker) = &topic.completion_marker {
        if response.content.contains(marker.as_str()) {
            return true;
        }
    }
    turn_after >= max_turns
}

fn parse_and_validate(
    content: &str,
    schema: &coachengine_topics::ResultSchema,
) -> std::result::Result<serde_json::Value, String> {
    let trimmed = strip_code_fence(content);
    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {e}"))?;
    schema.validate(&value).map_err(|e| e.to_string())?;
    Ok(value)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}
