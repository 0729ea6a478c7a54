//! Sync state store for progress records.
//!
//! Backs both synchronizers with the two queries the engine is allowed to
//! make: "all pending records for user X" and batch acknowledgement. The
//! batch mark is a single transaction so a failure can never leave a
//! partial mark behind.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::error::{Result, SyncError};
use crate::models::{ProgressResult, ProgressSession, SyncableRecord};

/// Local persistence contract for syncable progress records.
pub trait SyncStateStore: Send + Sync {
    /// Inserts or replaces a session row as-is, sync flags included.
    fn upsert_session(&self, session: &ProgressSession) -> impl Future<Output = Result<()>> + Send;

    /// Inserts or replaces a result row as-is, sync flags included.
    fn upsert_result(&self, result: &ProgressResult) -> impl Future<Output = Result<()>> + Send;

    fn get_session(&self, id: Uuid)
        -> impl Future<Output = Result<Option<ProgressSession>>> + Send;

    fn get_result(&self, id: Uuid) -> impl Future<Output = Result<Option<ProgressResult>>> + Send;

    /// Every record for the user with `needs_sync = true`, ordered by
    /// `last_modified` ascending with the id as tie-break. This is the
    /// submission order for batch uploads and must be reproducible across
    /// retries.
    fn list_pending(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<(Vec<ProgressSession>, Vec<ProgressResult>)>> + Send;

    /// Clears `needs_sync` and stamps `synced_at` for every listed id, all
    /// or nothing. Ids that are already synced are left untouched, so
    /// retrying an acknowledgement is a no-op.
    fn mark_synced(
        &self,
        session_ids: &[Uuid],
        result_ids: &[Uuid],
        synced_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// (pending sessions, pending results) for the user, for UI badges.
    fn pending_counts(&self, user_id: &str) -> impl Future<Output = Result<(u64, u64)>> + Send;

    /// Application-side hook: flags the session as needing sync, stamps
    /// `last_modified`, and persists it in one step.
    fn mark_session_for_sync(
        &self,
        session: &mut ProgressSession,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            session.mark_for_sync(now);
            self.upsert_session(session).await
        }
    }

    /// Application-side hook for results; see `mark_session_for_sync`.
    fn mark_result_for_sync(
        &self,
        result: &mut ProgressResult,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            result.mark_for_sync(now);
            self.upsert_result(result).await
        }
    }
}

/// `SQLite` implementation of [`SyncStateStore`].
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    category: String,
    mode: String,
    total_questions: i64,
    correct_answers: i64,
    duration_seconds: f64,
    started_at: String,
    completed_at: Option<String>,
    last_modified: String,
    needs_sync: i64,
    synced_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: String,
    user_id: String,
    question_id: String,
    session_id: String,
    answer: String,
    is_correct: i64,
    time_spent_seconds: f64,
    answered_at: String,
    last_modified: String,
    needs_sync: i64,
    synced_at: Option<String>,
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| SyncError::Validation {
        id: raw.to_string(),
        reason: format!("bad uuid: {e}"),
    })
}

impl TryFrom<SessionRow> for ProgressSession {
    type Error = SyncError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let completed_at = match &row.completed_at {
            Some(raw) => Some(parse_ts(raw, &row.id)?),
            None => None,
        };
        let synced_at = match &row.synced_at {
            Some(raw) => Some(parse_ts(raw, &row.id)?),
            None => None,
        };
        Ok(ProgressSession {
            id: parse_uuid(&row.id)?,
            category: row.category,
            mode: row.mode,
            total_questions: row.total_questions as u32,
            correct_answers: row.correct_answers as u32,
            duration_seconds: row.duration_seconds,
            started_at: parse_ts(&row.started_at, &row.id)?,
            completed_at,
            last_modified: parse_ts(&row.last_modified, &row.id)?,
            needs_sync: row.needs_sync != 0,
            synced_at,
            user_id: row.user_id,
        })
    }
}

impl TryFrom<ResultRow> for ProgressResult {
    type Error = SyncError;

    fn try_from(row: ResultRow) -> Result<Self> {
        let synced_at = match &row.synced_at {
            Some(raw) => Some(parse_ts(raw, &row.id)?),
            None => None,
        };
        Ok(ProgressResult {
            id: parse_uuid(&row.id)?,
            question_id: row.question_id,
            session_id: parse_uuid(&row.session_id)?,
            answer: row.answer,
            is_correct: row.is_correct != 0,
            time_spent_seconds: row.time_spent_seconds,
            answered_at: parse_ts(&row.answered_at, &row.id)?,
            last_modified: parse_ts(&row.last_modified, &row.id)?,
            needs_sync: row.needs_sync != 0,
            synced_at,
            user_id: row.user_id,
        })
    }
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SyncStateStore for SqliteProgressStore {
    async fn upsert_session(&self, session: &ProgressSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO progress_sessions
                (id, user_id, category, mode, total_questions, correct_answers,
                 duration_seconds, started_at, completed_at, last_modified, needs_sync, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(&session.category)
        .bind(&session.mode)
        .bind(i64::from(session.total_questions))
        .bind(i64::from(session.correct_answers))
        .bind(session.duration_seconds)
        .bind(format_ts(session.started_at))
        .bind(session.completed_at.map(format_ts))
        .bind(format_ts(session.last_modified))
        .bind(i64::from(session.needs_sync))
        .bind(session.synced_at.map(format_ts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_result(&self, result: &ProgressResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO progress_results
                (id, user_id, question_id, session_id, answer, is_correct,
                 time_spent_seconds, answered_at, last_modified, needs_sync, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.id.to_string())
        .bind(&result.user_id)
        .bind(&result.question_id)
        .bind(result.session_id.to_string())
        .bind(&result.answer)
        .bind(i64::from(result.is_correct))
        .bind(result.time_spent_seconds)
        .bind(format_ts(result.answered_at))
        .bind(format_ts(result.last_modified))
        .bind(i64::from(result.needs_sync))
        .bind(result.synced_at.map(format_ts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ProgressSession>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM progress_sessions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(ProgressSession::try_from).transpose()
    }

    async fn get_result(&self, id: Uuid) -> Result<Option<ProgressResult>> {
        let row: Option<ResultRow> = sqlx::query_as("SELECT * FROM progress_results WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProgressResult::try_from).transpose()
    }

    async fn list_pending(
        &self,
        user_id: &str,
    ) -> Result<(Vec<ProgressSession>, Vec<ProgressResult>)> {
        let session_rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM progress_sessions WHERE user_id = ? AND needs_sync = 1
             ORDER BY last_modified, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let result_rows: Vec<ResultRow> = sqlx::query_as(
            "SELECT * FROM progress_results WHERE user_id = ? AND needs_sync = 1
             ORDER BY last_modified, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let sessions = session_rows
            .into_iter()
            .map(ProgressSession::try_from)
            .collect::<Result<Vec<_>>>()?;
        let results = result_rows
            .into_iter()
            .map(ProgressResult::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((sessions, results))
    }

    async fn mark_synced(
        &self,
        session_ids: &[Uuid],
        result_ids: &[Uuid],
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let stamp = format_ts(synced_at);
        let mut tx = self.pool.begin().await?;

        for id in session_ids {
            sqlx::query(
                "UPDATE progress_sessions SET needs_sync = 0, synced_at = ?
                 WHERE id = ? AND needs_sync = 1",
            )
            .bind(&stamp)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        }
        for id in result_ids {
            sqlx::query(
                "UPDATE progress_results SET needs_sync = 0, synced_at = ?
                 WHERE id = ? AND needs_sync = 1",
            )
            .bind(&stamp)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pending_counts(&self, user_id: &str) -> Result<(u64, u64)> {
        let sessions: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM progress_sessions WHERE user_id = ? AND needs_sync = 1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let results: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM progress_results WHERE user_id = ? AND needs_sync = 1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((sessions as u64, results as u64))
    }
}
