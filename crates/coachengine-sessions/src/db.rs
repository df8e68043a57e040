use rusqlite::Connection;

use crate::error::SessionStoreError;

/// Initialise the sessions table and the resumable-session lookup index.
/// Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<(), SessionStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id            TEXT PRIMARY KEY,
            tenant_id              TEXT NOT NULL,
            user_id                TEXT NOT NULL,
            topic_id               TEXT NOT NULL,
            status                 TEXT NOT NULL,
            turn                   INTEGER NOT NULL,
            max_turns              INTEGER NOT NULL,
            messages_json          TEXT NOT NULL,
            created_at             TEXT NOT NULL,
            last_activity_at       TEXT NOT NULL,
            expires_at             TEXT NOT NULL,
            completed_at           TEXT,
            extracted_result_json  TEXT,
            extraction_schema_id   TEXT,
            version                INTEGER NOT NULL
        );
        -- At most one active (resumable) session per (tenant, topic),
        -- regardless of owning user — a second user racing to initiate
        -- the same topic hits this constraint and surfaces as a conflict
        -- rather than silently creating a second session.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_resumable
            ON sessions(tenant_id, topic_id)
            WHERE status = 'active';
        CREATE INDEX IF NOT EXISTS idx_sessions_tenant_topic
            ON sessions(tenant_id, topic_id, status);",
    )?;
    Ok(())
}
