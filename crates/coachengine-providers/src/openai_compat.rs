use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, Role};

/// Any provider speaking the OpenAI chat-completions wire format — OpenAI
/// itself, and the numerous compatible third-party endpoints.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
    provider_name: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_path(
            "openai",
            api_key,
            base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            "/v1/chat/completions".to_string(),
        )
    }

    pub fn with_path(
        name: impl Into<String>,
        api_key: String,
        base_url: String,
        chat_path: String,
    ) -> Self {
        Self { client: reqwest::Client::new(), provider_name: name.into(), api_key, base_url, chat_path }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}{}", self.base_url, self.chat_path);

        debug!(model = %req.model, provider = %self.provider_name, "sending request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, provider = %self.provider_name, "api error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse =
            resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        parse_response(api_resp, &req.model)
    }
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

fn build_request_body(req: &ChatRequest) -> ApiRequest<'_> {
    let messages = req
        .messages
        .iter()
        .map(|m| ApiMessage {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        })
        .collect();
    ApiRequest { model: &req.model, messages, max_tokens: req.max_tokens, temperature: req.temperature }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn parse_response(resp: ApiResponse, requested_model: &str) -> Result<ChatResponse, ProviderError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("response had no choices".to_string()))?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        model: resp.model.unwrap_or_else(|| requested_model.to_string()),
        tokens_in: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        stop_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;

    #[test]
    fn system_message_kept_in_messages_array() {
        let req = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage { role: Role::System, content: "be terse".to_string() },
                ChatMessage { role: Role::User, content: "hi".to_string() },
            ],
            max_tokens: 64,
            temperature: None,
        };
        let body = build_request_body(&req);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
    }

    #[test]
    fn parse_response_falls_back_to_requested_model_when_absent() {
        let resp = ApiResponse {
            choices: vec![Choice {
                message: ChoiceMessage { content: Some("hi there".to_string()) },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
            model: None,
        };
        let parsed = parse_response(resp, "gpt-4o-mini").unwrap();
        assert_eq!(parsed.model, "gpt-4o-mini");
        assert_eq!(parsed.content, "hi there");
    }
}
