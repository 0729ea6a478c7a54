//! Wire types for the Trivio sync service.
//!
//! Field names are camelCase to match the remote API. Batch responses are
//! count-based: `syncedSessions = k` means the first `k` sessions in
//! submission order were accepted, and `failedSessions` conflict losers
//! follow immediately after that prefix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LeaderboardEntry, ProgressResult, ProgressSession, QuizQuestion};

/// One session in a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub id: Uuid,
    pub user_id: String,
    pub category: String,
    pub mode: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

impl From<&ProgressSession> for SessionPayload {
    fn from(session: &ProgressSession) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id.clone(),
            category: session.category.clone(),
            mode: session.mode.clone(),
            total_questions: session.total_questions,
            correct_answers: session.correct_answers,
            duration_seconds: session.duration_seconds,
            started_at: session.started_at,
            completed_at: session.completed_at,
            last_modified: session.last_modified,
        }
    }
}

/// One answer result in a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub id: Uuid,
    pub user_id: String,
    pub question_id: String,
    pub session_id: Uuid,
    pub answer: String,
    pub is_correct: bool,
    pub time_spent_seconds: f64,
    pub answered_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl From<&ProgressResult> for ResultPayload {
    fn from(result: &ProgressResult) -> Self {
        Self {
            id: result.id,
            user_id: result.user_id.clone(),
            question_id: result.question_id.clone(),
            session_id: result.session_id,
            answer: result.answer.clone(),
            is_correct: result.is_correct,
            time_spent_seconds: result.time_spent_seconds,
            answered_at: result.answered_at,
            last_modified: result.last_modified,
        }
    }
}

/// Batch upload of every pending record for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncRequest {
    pub sessions: Vec<SessionPayload>,
    pub results: Vec<ResultPayload>,
    /// Server-issued timestamp of the previous acknowledged upload, used
    /// by the server as a delta hint. Null on first sync.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Server acknowledgement for a batch upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncResponse {
    pub synced_sessions: usize,
    pub synced_results: usize,
    #[serde(default)]
    pub failed_sessions: usize,
    #[serde(default)]
    pub failed_results: usize,
    pub synced_at: DateTime<Utc>,
}

/// Remote content-version descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentVersionResponse {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub total_questions: u32,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// One content item from the content-data endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub id: String,
    pub category: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: u32,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl From<QuestionPayload> for QuizQuestion {
    fn from(payload: QuestionPayload) -> Self {
        Self {
            id: payload.id,
            category: payload.category,
            prompt: payload.prompt,
            choices: payload.choices,
            correct_index: payload.correct_index,
            explanation: payload.explanation,
        }
    }
}

/// One leaderboard row from the leaderboard endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntryPayload {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
}

impl From<LeaderboardEntryPayload> for LeaderboardEntry {
    fn from(payload: LeaderboardEntryPayload) -> Self {
        Self {
            rank: payload.rank,
            user_id: payload.user_id,
            display_name: payload.display_name,
            score: payload.score,
        }
    }
}

/// Ranked list plus the requesting user's own rank.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntryPayload>,
    #[serde(default)]
    pub user_rank: Option<u32>,
}
