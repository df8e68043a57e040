use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::error::SessionStoreError;
use crate::types::{Session, SessionStatus};

type Result<T> = std::result::Result<T, SessionStoreError>;

/// Port over session persistence. A trait so the orchestrator can be
/// exercised against an in-memory fake in tests without a database.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Result<Session>;

    /// Any non-terminal session for (tenant, topic), regardless of owner —
    /// used by Initiate to detect both same-user resumption and
    /// cross-user conflict in a single read.
    fn find_active(&self, tenant_id: &str, topic_id: &str) -> Result<Option<Session>>;

    /// Insert a brand new session at version 1. Fails with
    /// `VersionConflict` if the partial unique index on (tenant, user,
    /// topic, active) already has a row — the caller raced another
    /// Initiate and should re-read and resume instead.
    fn create(&self, session: Session) -> Result<()>;

    /// Compare-and-swap update: succeeds only if the stored version still
    /// equals `expected_version`, and bumps the stored version by one.
    fn update(&self, session: &Session, expected_version: u64) -> Result<()>;
}

pub struct SqliteSessionStore {
    db: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self), fields(session_id))]
    fn get(&self, session_id: &str) -> Result<Session> {
        let db = self.db.lock().expect("session store mutex poisoned");
        db.query_row(
            "SELECT session_id, tenant_id, user_id, topic_id, status, turn, max_turns,
                    messages_json, created_at, last_activity_at, expires_at, completed_at,
                    extracted_result_json, extraction_schema_id, version
             FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_id],
            row_to_session,
        )
        .optional()?
        .ok_or(SessionStoreError::NotFound)
    }

    #[instrument(skip(self), fields(tenant_id, topic_id))]
    fn find_active(&self, tenant_id: &str, topic_id: &str) -> Result<Option<Session>> {
        let db = self.db.lock().expect("session store mutex poisoned");
        db.query_row(
            "SELECT session_id, tenant_id, user_id, topic_id, status, turn, max_turns,
                    messages_json, created_at, last_activity_at, expires_at, completed_at,
                    extracted_result_json, extraction_schema_id, version
             FROM sessions WHERE tenant_id = ?1 AND topic_id = ?2 AND status = 'active'",
            rusqlite::params![tenant_id, topic_id],
            row_to_session,
        )
        .optional()
        .map_err(SessionStoreError::from)
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    fn create(&self, session: Session) -> Result<()> {
        let db = self.db.lock().expect("session store mutex poisoned");
        let result = db.execute(
            "INSERT INTO sessions
                (session_id, tenant_id, user_id, topic_id, status, turn, max_turns,
                 messages_json, created_at, last_activity_at, expires_at, completed_at,
                 extracted_result_json, extraction_schema_id, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            rusqlite::params![
                session.session_id,
                session.tenant_id,
                session.user_id,
                session.topic_id,
                status_str(session.status),
                session.turn,
                session.max_turns,
                serde_json::to_string(&session.messages).map_err(to_db_err)?,
                session.created_at,
                session.last_activity_at,
                session.expires_at,
                session.completed_at,
                session.extracted_result.as_ref().map(serde_json::to_string).transpose().map_err(to_db_err)?,
                session.extraction_schema_id,
                session.version,
            ],
        );

        match result {
            Ok(_) => {
                debug!("session created");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(SessionStoreError::VersionConflict)
            }
            Err(e) => Err(SessionStoreError::Database(e)),
        }
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id, expected_version))]
    fn update(&self, session: &Session, expected_version: u64) -> Result<()> {
        let db = self.db.lock().expect("session store mutex poisoned");
        let rows_changed = db.execute(
            "UPDATE sessions SET
                status = ?1, turn = ?2, max_turns = ?3, messages_json = ?4,
                last_activity_at = ?5, expires_at = ?6, completed_at = ?7,
                extracted_result_json = ?8, extraction_schema_id = ?9, version = ?10
             WHERE session_id = ?11 AND version = ?12",
            rusqlite::params![
                status_str(session.status),
                session.turn,
                session.max_turns,
                serde_json::to_string(&session.messages).map_err(to_db_err)?,
                session.last_activity_at,
                session.expires_at,
                session.completed_at,
                session.extracted_result.as_ref().map(serde_json::to_string).transpose().map_err(to_db_err)?,
                session.extraction_schema_id,
                expected_version + 1,
                session.session_id,
                expected_version,
            ],
        )?;

        if rows_changed == 0 {
            return Err(SessionStoreError::VersionConflict);
        }
        Ok(())
    }
}

fn to_db_err(e: serde_json::Error) -> SessionStoreError {
    SessionStoreError::Database(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::Expired => "expired",
        SessionStatus::Abandoned => "abandoned",
        SessionStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> SessionStatus {
    match s {
        "active" => SessionStatus::Active,
        "completed" => SessionStatus::Completed,
        "expired" => SessionStatus::Expired,
        "cancelled" => SessionStatus::Cancelled,
        _ => SessionStatus::Abandoned,
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(4)?;
    let messages_json: String = row.get(7)?;
    let extracted_result_json: Option<String> = row.get(12)?;

    Ok(Session {
        session_id: row.get(0)?,
        tenant_id: row.get(1)?,
        user_id: row.get(2)?,
        topic_id: row.get(3)?,
        status: status_from_str(&status),
        turn: row.get::<_, i64>(5)? as u32,
        max_turns: row.get::<_, i64>(6)? as u32,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
        created_at: row.get(8)?,
        last_activity_at: row.get(9)?,
        expires_at: row.get(10)?,
        completed_at: row.get(11)?,
        extracted_result: extracted_result_json.and_then(|s| serde_json::from_str(&s).ok()),
        extraction_schema_id: row.get(13)?,
        version: row.get::<_, i64>(14)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageRole};

    fn sample_session(id: &str, user_id: &str) -> Session {
        Session {
            session_id: id.to_string(),
            tenant_id: "tenant-1".to_string(),
            user_id: user_id.to_string(),
            topic_id: "COACHING:core_values".to_string(),
            status: SessionStatus::Active,
            turn: 1,
            max_turns: 3,
            messages: vec![Message {
                role: MessageRole::System,
                content: "sys".to_string(),
                ts: "2026-01-01T00:00:00Z".to_string(),
                turn: None,
            }],
            created_at: "2026-01-01T00:00:00Z".to_string(),
            last_activity_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: "2026-01-02T00:00:00Z".to_string(),
            completed_at: None,
            extracted_result: None,
            extraction_schema_id: None,
            version: 1,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap();
        store.create(sample_session("s1", "user-1")).unwrap();
        let got = store.get("s1").unwrap();
        assert_eq!(got.turn, 1);
        assert_eq!(got.messages.len(), 1);
    }

    #[test]
    fn get_missing_session_errors() {
        let store = SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap();
        assert!(matches!(store.get("missing").unwrap_err(), SessionStoreError::NotFound));
    }

    #[test]
    fn second_active_session_for_same_topic_conflicts() {
        let store = SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap();
        store.create(sample_session("s1", "user-1")).unwrap();
        let err = store.create(sample_session("s2", "user-2")).unwrap_err();
        assert!(matches!(err, SessionStoreError::VersionConflict));
    }

    #[test]
    fn find_active_returns_the_owner() {
        let store = SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap();
        store.create(sample_session("s1", "user-1")).unwrap();
        let found = store.find_active("tenant-1", "COACHING:core_values").unwrap().unwrap();
        assert_eq!(found.user_id, "user-1");
    }

    #[test]
    fn update_with_stale_version_conflicts() {
        let store = SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let session = sample_session("s1", "user-1");
        store.create(session.clone()).unwrap();

        let mut updated = session.clone();
        updated.turn = 2;
        store.update(&updated, 1).unwrap();

        let mut stale_update = session;
        stale_update.turn = 3;
        let err = store.update(&stale_update, 1).unwrap_err();
        assert!(matches!(err, SessionStoreError::VersionConflict));
    }
}
