use rusqlite::Connection;

use crate::error::Result;

/// Initialise the runtime_configs table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS runtime_configs (
            tenant_id              TEXT NOT NULL,
            topic_id               TEXT NOT NULL,
            model_code              TEXT NOT NULL,
            temperature             REAL NOT NULL,
            max_tokens              INTEGER NOT NULL,
            max_turns               INTEGER NOT NULL,
            session_ttl_hours       INTEGER NOT NULL,
            idle_timeout_minutes    INTEGER NOT NULL,
            extraction_model_code   TEXT,
            fallback_model_code     TEXT,
            is_active               INTEGER NOT NULL DEFAULT 1,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            PRIMARY KEY (tenant_id, topic_id)
        );",
    )?;
    Ok(())
}
