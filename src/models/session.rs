use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::impl_syncable_record;

/// One unit of user activity: a quiz run in a category and mode.
///
/// Answer results reference the session by id; the session does not
/// contain them. Sessions are created when activity starts, mutated as
/// items are answered and at completion, and never deleted except on
/// account erasure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSession {
    pub id: Uuid,
    pub user_id: String,
    pub category: String,
    pub mode: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    /// Absent while the session is still in progress.
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub needs_sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl ProgressSession {
    pub fn new(
        user_id: impl Into<String>,
        category: impl Into<String>,
        mode: impl Into<String>,
        total_questions: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            category: category.into(),
            mode: mode.into(),
            total_questions,
            correct_answers: 0,
            duration_seconds: 0.0,
            started_at: now,
            completed_at: None,
            last_modified: now,
            needs_sync: true,
            synced_at: None,
        }
    }

    /// Records the final score and closes the session.
    pub fn complete(&mut self, correct_answers: u32, duration_seconds: f64, now: DateTime<Utc>) {
        self.correct_answers = correct_answers;
        self.duration_seconds = duration_seconds;
        self.completed_at = Some(now);
        self.needs_sync = true;
        self.last_modified = now;
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

impl_syncable_record!(ProgressSession);

impl fmt::Display for ProgressSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} ({}, {})",
            self.category, self.correct_answers, self.total_questions, self.mode, self.user_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncableRecord;

    #[test]
    fn new_session_is_pending() {
        let session = ProgressSession::new("user1", "geography", "timed", 10);

        assert!(session.needs_sync);
        assert!(session.synced_at.is_none());
        assert!(session.completed_at.is_none());
        assert_eq!(session.correct_answers, 0);
    }

    #[test]
    fn complete_refreshes_last_modified() {
        let mut session = ProgressSession::new("user1", "geography", "timed", 10);
        let before = session.last_modified;

        let later = before + chrono::Duration::minutes(5);
        session.complete(8, 312.5, later);

        assert_eq!(session.completed_at, Some(later));
        assert_eq!(session.correct_answers, 8);
        assert_eq!(session.last_modified, later);
        assert!(session.needs_sync);
        assert!(session.is_completed());
    }

    #[test]
    fn mark_synced_then_edit_flips_flag_again() {
        let mut session = ProgressSession::new("user1", "science", "practice", 5);
        let t1 = session.last_modified + chrono::Duration::seconds(1);

        session.mark_synced(t1);
        assert!(!session.needs_sync);
        assert_eq!(session.synced_at, Some(t1));

        let t2 = t1 + chrono::Duration::seconds(1);
        session.mark_for_sync(t2);
        assert!(session.needs_sync);
        assert_eq!(session.last_modified, t2);
        // id never changes
        assert_eq!(session.record_id(), session.id);
    }

    #[test]
    fn json_roundtrip() {
        let session = ProgressSession::new("user1", "history", "timed", 20);
        let json = serde_json::to_string(&session).unwrap();
        let parsed: ProgressSession = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, session.id);
        assert_eq!(parsed.category, session.category);
        assert_eq!(parsed.started_at, session.started_at);
    }
}
