use std::sync::{Arc, Mutex};

use coachengine_core::model_registry::ModelRegistry;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::error::{Result, RuntimeConfigError};
use crate::types::RuntimeTopicConfig;

/// Port over the execution policy store. A separate trait (rather than a
/// concrete struct) so the orchestrator can be tested against an in-memory
/// fake without a database.
pub trait RuntimeConfigStore: Send + Sync {
    fn get(&self, tenant_id: &str, topic_id: &str) -> Result<RuntimeTopicConfig>;
    fn put(&self, config: RuntimeTopicConfig) -> Result<()>;
    fn list(&self, tenant_id: &str) -> Result<Vec<RuntimeTopicConfig>>;
}

/// SQLite-backed adapter, guarded by a mutex — a single-node deployment
/// has no need for a connection pool here.
pub struct SqliteRuntimeConfigStore {
    db: Mutex<Connection>,
    models: Arc<ModelRegistry>,
}

impl SqliteRuntimeConfigStore {
    pub fn new(conn: Connection, models: Arc<ModelRegistry>) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn), models })
    }

    fn validate(&self, config: &RuntimeTopicConfig) -> Result<()> {
        if config.max_turns < 1 {
            return Err(RuntimeConfigError::Invalid("max_turns must be >= 1".to_string()));
        }
        if config.session_ttl_hours == 0 {
            return Err(RuntimeConfigError::Invalid("session_ttl_hours must be > 0".to_string()));
        }
        if config.idle_timeout_minutes == 0 {
            return Err(RuntimeConfigError::Invalid("idle_timeout_minutes must be > 0".to_string()));
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(RuntimeConfigError::Invalid(format!(
                "temperature {} outside provider-declared bounds [0.0, 2.0]",
                config.temperature
            )));
        }

        let model = self.models.get_active(&config.model_code).ok_or_else(|| {
            RuntimeConfigError::Invalid(format!("model code '{}' does not exist or is inactive", config.model_code))
        })?;
        let _ = model;

        if let Some(extraction_code) = &config.extraction_model_code {
            self.models.get_active(extraction_code).ok_or_else(|| {
                RuntimeConfigError::Invalid(format!(
                    "extraction model code '{extraction_code}' does not exist or is inactive"
                ))
            })?;
        }

        if let Some(fallback_code) = &config.fallback_model_code {
            self.models.get_active(fallback_code).ok_or_else(|| {
                RuntimeConfigError::Invalid(format!(
                    "fallback model code '{fallback_code}' does not exist or is inactive"
                ))
            })?;
        }

        Ok(())
    }
}

impl RuntimeConfigStore for SqliteRuntimeConfigStore {
    #[instrument(skip(self), fields(tenant_id, topic_id))]
    fn get(&self, tenant_id: &str, topic_id: &str) -> Result<RuntimeTopicConfig> {
        let db = self.db.lock().expect("runtime config mutex poisoned");
        let row = db
            .query_row(
                "SELECT tenant_id, topic_id, model_code, temperature, max_tokens, max_turns,
                        session_ttl_hours, idle_timeout_minutes, extraction_model_code,
                        fallback_model_code, is_active, created_at, updated_at
                 FROM runtime_configs
                 WHERE tenant_id = ?1 AND topic_id = ?2 AND is_active = 1",
                rusqlite::params![tenant_id, topic_id],
                row_to_config,
            )
            .optional()?;

        row.ok_or_else(|| RuntimeConfigError::NotAvailable {
            tenant_id: tenant_id.to_string(),
            topic_id: topic_id.to_string(),
        })
    }

    #[instrument(skip(self, config), fields(tenant_id = %config.tenant_id, topic_id = %config.topic_id))]
    fn put(&self, config: RuntimeTopicConfig) -> Result<()> {
        self.validate(&config)?;

        let db = self.db.lock().expect("runtime config mutex poisoned");
        db.execute(
            "INSERT INTO runtime_configs
                (tenant_id, topic_id, model_code, temperature, max_tokens, max_turns,
                 session_ttl_hours, idle_timeout_minutes, extraction_model_code,
                 fallback_model_code, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT (tenant_id, topic_id) DO UPDATE SET
                model_code = excluded.model_code,
                temperature = excluded.temperature,
                max_tokens = excluded.max_tokens,
                max_turns = excluded.max_turns,
                session_ttl_hours = excluded.session_ttl_hours,
                idle_timeout_minutes = excluded.idle_timeout_minutes,
                extraction_model_code = excluded.extraction_model_code,
                fallback_model_code = excluded.fallback_model_code,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            rusqlite::params![
                config.tenant_id,
                config.topic_id,
                config.model_code,
                config.temperature,
                config.max_tokens,
                config.max_turns,
                config.session_ttl_hours,
                config.idle_timeout_minutes,
                config.extraction_model_code,
                config.fallback_model_code,
                config.is_active,
                config.created_at,
                config.updated_at,
            ],
        )?;
        debug!("runtime config upserted");
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id))]
    fn list(&self, tenant_id: &str) -> Result<Vec<RuntimeTopicConfig>> {
        let db = self.db.lock().expect("runtime config mutex poisoned");
        let mut stmt = db.prepare(
            "SELECT tenant_id, topic_id, model_code, temperature, max_tokens, max_turns,
                    session_ttl_hours, idle_timeout_minutes, extraction_model_code,
                    fallback_model_code, is_active, created_at, updated_at
             FROM runtime_configs WHERE tenant_id = ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![tenant_id], row_to_config)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuntimeTopicConfig> {
    Ok(RuntimeTopicConfig {
        tenant_id: row.get(0)?,
        topic_id: row.get(1)?,
        model_code: row.get(2)?,
        temperature: row.get(3)?,
        max_tokens: row.get::<_, i64>(4)? as u32,
        max_turns: row.get::<_, i64>(5)? as u32,
        session_ttl_hours: row.get::<_, i64>(6)? as u32,
        idle_timeout_minutes: row.get::<_, i64>(7)? as u32,
        extraction_model_code: row.get(8)?,
        fallback_model_code: row.get(9)?,
        is_active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachengine_core::model_registry::{Capability, ModelEntry, ProviderTag};

    fn registry() -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::with_entries(vec![ModelEntry {
            code: "claude-sonnet".to_string(),
            provider_tag: ProviderTag::Anthropic,
            provider_model_id: "claude-3-5-sonnet-latest".to_string(),
            capabilities: vec![Capability::Chat],
            active: true,
            cost_per_1k_input_usd: None,
            cost_per_1k_output_usd: None,
        }]))
    }

    fn sample_config() -> RuntimeTopicConfig {
        RuntimeTopicConfig {
            tenant_id: "tenant-1".to_string(),
            topic_id: "COACHING:core_values".to_string(),
            model_code: "claude-sonnet".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            max_turns: 3,
            session_ttl_hours: 24,
            idle_timeout_minutes: 30,
            extraction_model_code: None,
            fallback_model_code: None,
            is_active: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = SqliteRuntimeConfigStore::new(Connection::open_in_memory().unwrap(), registry()).unwrap();
        store.put(sample_config()).unwrap();
        let got = store.get("tenant-1", "COACHING:core_values").unwrap();
        assert_eq!(got.model_code, "claude-sonnet");
        assert_eq!(got.max_turns, 3);
    }

    #[test]
    fn get_missing_returns_not_available() {
        let store = SqliteRuntimeConfigStore::new(Connection::open_in_memory().unwrap(), registry()).unwrap();
        let err = store.get("tenant-1", "nope").unwrap_err();
        assert!(matches!(err, RuntimeConfigError::NotAvailable { .. }));
    }

    #[test]
    fn put_rejects_unknown_model_code() {
        let store = SqliteRuntimeConfigStore::new(Connection::open_in_memory().unwrap(), registry()).unwrap();
        let mut config = sample_config();
        config.model_code = "does-not-exist".to_string();
        let err = store.put(config).unwrap_err();
        assert!(matches!(err, RuntimeConfigError::Invalid(_)));
    }

    #[test]
    fn put_rejects_zero_max_turns() {
        let store = SqliteRuntimeConfigStore::new(Connection::open_in_memory().unwrap(), registry()).unwrap();
        let mut config = sample_config();
        config.max_turns = 0;
        let err = store.put(config).unwrap_err();
        assert!(matches!(err, RuntimeConfigError::Invalid(_)));
    }

    #[test]
    fn put_upserts_on_conflict() {
        let store = SqliteRuntimeConfigStore::new(Connection::open_in_memory().unwrap(), registry()).unwrap();
        store.put(sample_config()).unwrap();
        let mut updated = sample_config();
        updated.max_turns = 5;
        store.put(updated).unwrap();

        let got = store.get("tenant-1", "COACHING:core_values").unwrap();
        assert_eq!(got.max_turns, 5);
    }
}
