use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::impl_syncable_record;

/// One graded attempt at a single quiz question.
///
/// Created once when the answer is submitted and immutable afterwards,
/// apart from the sync bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResult {
    pub id: Uuid,
    pub user_id: String,
    pub question_id: String,
    pub session_id: Uuid,
    pub answer: String,
    pub is_correct: bool,
    pub time_spent_seconds: f64,
    pub answered_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub needs_sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl ProgressResult {
    pub fn new(
        user_id: impl Into<String>,
        question_id: impl Into<String>,
        session_id: Uuid,
        answer: impl Into<String>,
        is_correct: bool,
        time_spent_seconds: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            question_id: question_id.into(),
            session_id,
            answer: answer.into(),
            is_correct,
            time_spent_seconds,
            answered_at: now,
            last_modified: now,
            needs_sync: true,
            synced_at: None,
        }
    }
}

impl_syncable_record!(ProgressResult);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncableRecord;

    #[test]
    fn new_result_is_pending() {
        let session_id = Uuid::new_v4();
        let result = ProgressResult::new("user1", "q-42", session_id, "Paris", true, 4.2);

        assert!(result.needs_sync);
        assert!(result.synced_at.is_none());
        assert_eq!(result.session_id, session_id);
        assert_eq!(result.answered_at, result.last_modified);
    }

    #[test]
    fn submission_key_orders_by_last_modified() {
        let a = ProgressResult::new("user1", "q-1", Uuid::new_v4(), "A", true, 1.0);
        let mut b = ProgressResult::new("user1", "q-2", Uuid::new_v4(), "B", false, 2.0);
        b.mark_for_sync(a.last_modified + chrono::Duration::seconds(10));

        assert!(a.submission_key() < b.submission_key());
    }
}
