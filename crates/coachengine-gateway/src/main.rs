use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use coachengine_core::config::EngineConfig;
use coachengine_core::model_registry::{Capability, ModelEntry, ModelRegistry, ProviderTag};
use coachengine_providers::{AnthropicProvider, LlmProvider, MockProvider, ModelRouter, OpenAiCompatProvider};
use coachengine_runtimeconfig::{RuntimeConfigStore, RuntimeTopicConfig, SqliteRuntimeConfigStore};
use coachengine_sessions::{SessionOrchestrator, SqliteSessionStore};
use coachengine_templates::{ResolverRegistry, TemplateRenderer};
use tracing::{info, warn};

mod app;
mod http;
mod topics;

const MOCK_MODEL_CODE: &str = "mock-default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachengine_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("COACHENGINE_CONFIG").ok();
    let config = EngineConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        EngineConfig::default()
    });

    let models = Arc::new(build_model_registry(&config));
    let adapters = build_adapters(&config);
    let router = Arc::new(ModelRouter::new(
        models.clone(),
        adapters,
        config.concurrency.provider_max_retries,
        config.concurrency.provider_permits,
    ));

    let topics = topics::build_registry()?;
    let prompt_store = topics::build_prompt_store();
    let renderer = Arc::new(TemplateRenderer::new(prompt_store, ResolverRegistry::new()));

    let sessions_conn = rusqlite::Connection::open(&config.database.sessions_path)?;
    let sessions = Arc::new(SqliteSessionStore::new(sessions_conn)?);

    let runtime_conn = rusqlite::Connection::open(&config.database.runtime_config_path)?;
    let runtime_config = Arc::new(SqliteRuntimeConfigStore::new(runtime_conn, models.clone())?);
    seed_demo_runtime_config(runtime_config.as_ref())?;

    let orchestrator = SessionOrchestrator::new(topics.clone(), runtime_config, renderer, router, sessions)
        .with_max_cas_retries(config.concurrency.max_cas_retries);

    let state = Arc::new(app::AppState { orchestrator, topics });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("coachengine gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Registers one entry per configured provider plus a deterministic mock
/// model so the server is runnable with no API keys at all.
fn build_model_registry(config: &EngineConfig) -> ModelRegistry {
    let registry = ModelRegistry::new();

    if let Some(anthropic) = &config.providers.anthropic {
        registry.upsert(ModelEntry {
            code: "claude-sonnet".to_string(),
            provider_tag: ProviderTag::Anthropic,
            provider_model_id: "claude-3-5-sonnet-latest".to_string(),
            capabilities: vec![Capability::Chat],
            active: true,
            cost_per_1k_input_usd: None,
            cost_per_1k_output_usd: None,
        });
        let _ = anthropic;
    }

    if let Some(openai) = &config.providers.openai {
        registry.upsert(ModelEntry {
            code: "gpt-4o-mini".to_string(),
            provider_tag: ProviderTag::OpenAiCompat,
            provider_model_id: "gpt-4o-mini".to_string(),
            capabilities: vec![Capability::Chat],
            active: true,
            cost_per_1k_input_usd: None,
            cost_per_1k_output_usd: None,
        });
        let _ = openai;
    }

    for entry in &config.providers.openai_compat {
        registry.upsert(ModelEntry {
            code: entry.id.clone(),
            provider_tag: ProviderTag::OpenAiCompat,
            provider_model_id: entry.id.clone(),
            capabilities: vec![Capability::Chat],
            active: true,
            cost_per_1k_input_usd: None,
            cost_per_1k_output_usd: None,
        });
    }

    registry.upsert(ModelEntry {
        code: MOCK_MODEL_CODE.to_string(),
        provider_tag: ProviderTag::Mock,
        provider_model_id: MOCK_MODEL_CODE.to_string(),
        capabilities: vec![Capability::Chat],
        active: true,
        cost_per_1k_input_usd: None,
        cost_per_1k_output_usd: None,
    });

    registry
}

fn build_adapters(config: &EngineConfig) -> HashMap<ProviderTag, Arc<dyn LlmProvider>> {
    let mut adapters: HashMap<ProviderTag, Arc<dyn LlmProvider>> = HashMap::new();

    if let Some(anthropic) = &config.providers.anthropic {
        adapters.insert(
            ProviderTag::Anthropic,
            Arc::new(AnthropicProvider::new(anthropic.api_key.clone(), Some(anthropic.base_url.clone()))),
        );
    }

    if let Some(openai) = &config.providers.openai {
        adapters.insert(
            ProviderTag::OpenAiCompat,
            Arc::new(OpenAiCompatProvider::new(openai.api_key.clone(), Some(openai.base_url.clone()))),
        );
    } else if let Some(entry) = config.providers.openai_compat.first() {
        adapters.insert(
            ProviderTag::OpenAiCompat,
            Arc::new(OpenAiCompatProvider::with_path(
                entry.id.clone(),
                entry.api_key.clone(),
                entry.base_url.clone(),
                entry.chat_path.clone(),
            )),
        );
    }

    adapters.insert(
        ProviderTag::Mock,
        Arc::new(MockProvider::new(
            "mock",
            vec!["Thanks for sharing — tell me more about what matters most to you. [[DONE]]"],
        )),
    );

    adapters
}

/// Seeds a runtime config row for the demo tenant against the one baked-in
/// topic, so the walkthrough scenario works the moment the server starts.
fn seed_demo_runtime_config(store: &dyn RuntimeConfigStore) -> anyhow::Result<()> {
    const DEMO_TENANT: &str = "demo-tenant";

    if store.get(DEMO_TENANT, topics::CORE_VALUES_TOPIC).is_ok() {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();
    store.put(RuntimeTopicConfig {
        tenant_id: DEMO_TENANT.to_string(),
        topic_id: topics::CORE_VALUES_TOPIC.to_string(),
        model_code: MOCK_MODEL_CODE.to_string(),
        temperature: 0.7,
        max_tokens: 1024,
        max_turns: 8,
        session_ttl_hours: 24,
        idle_timeout_minutes: 30,
        extraction_model_code: None,
        fallback_model_code: None,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    })?;
    Ok(())
}
