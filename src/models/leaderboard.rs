use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the ranked leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
}

/// Cached copy of the remote leaderboard aggregate.
///
/// At most one snapshot is held. The expiry is fixed at fetch time;
/// readers treat an expired snapshot as absent even if the rate gate has
/// not allowed a refresh yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
    /// Rank of the requesting user, if they appear on the board.
    pub user_rank: Option<u32>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LeaderboardSnapshot {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
