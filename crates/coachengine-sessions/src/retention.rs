//! Retention-window computation for terminal and resumable sessions.
//!
//! No background purge job is specified (no cron/scheduler component is
//! part of the core) — this module only computes the timestamp an
//! operator job should purge after, so the number lives in one place
//! instead of being re-derived by whatever purges the store.

use chrono::{DateTime, Duration, Utc};

use crate::types::{Session, SessionStatus};

/// Terminal sessions (completed, expired, abandoned, cancelled) are kept
/// for audit and result retrieval for this long after they went terminal.
pub const TERMINAL_RETENTION_DAYS: i64 = 14;

/// Resumable (non-terminal, not-yet-expired) sessions are kept this long
/// from their last activity, to accommodate a user stepping away well
/// past the idle timeout but before TTL.
pub const RESUMABLE_RETENTION_DAYS: i64 = 30;

/// The timestamp after which a purge job may delete this session's
/// record.
///
/// `Expired` is detected lazily (see [`Session::is_expired_as_of`]) — a
/// session whose `expires_at` has passed but hasn't yet been touched by a
/// read is still stored with `status = Active`. Retention follows the
/// stored status, not the as-of-now computed one: still-`Active` rows get
/// the longer resumable window measured from `last_activity_at`; rows
/// already transitioned to a terminal status get the shorter audit window
/// measured from `completed_at` (falling back to `last_activity_at` for
/// terminal statuses that never set it, e.g. `Abandoned`).
pub fn purge_after(session: &Session) -> Option<DateTime<Utc>> {
    let last_activity = DateTime::parse_from_rfc3339(&session.last_activity_at)
        .ok()?
        .with_timezone(&Utc);

    match session.status {
        SessionStatus::Active => Some(last_activity + Duration::days(RESUMABLE_RETENTION_DAYS)),
        SessionStatus::Completed | SessionStatus::Expired | SessionStatus::Abandoned | SessionStatus::Cancelled => {
            let terminal_at = session
                .completed_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(last_activity);
            Some(terminal_at + Duration::days(TERMINAL_RETENTION_DAYS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageRole};

    fn base_session(status: SessionStatus) -> Session {
        Session {
            session_id: "s1".to_string(),
            tenant_id: "t1".to_string(),
            user_id: "u1".to_string(),
            topic_id: "COACHING:core_values".to_string(),
            status,
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
    fn active_session_uses_the_resumable_window_from_last_activity() {
        let mut session = base_session(SessionStatus::Active);
        let last_activity = Utc::now() - Duration::days(1);
        session.last_activity_at = last_activity.to_rfc3339();
        let purge = purge_after(&session).unwrap();
        assert_eq!(purge, last_activity + Duration::days(RESUMABLE_RETENTION_DAYS));
    }

    #[test]
    fn completed_session_retains_from_completed_at() {
        let mut session = base_session(SessionStatus::Completed);
        let completed_at = Utc::now() - Duration::days(1);
        session.completed_at = Some(completed_at.to_rfc3339());
        let purge = purge_after(&session).unwrap();
        assert_eq!(purge, completed_at + Duration::days(TERMINAL_RETENTION_DAYS));
    }
}
