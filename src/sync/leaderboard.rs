//! Rate-gated leaderboard cache.
//!
//! The leaderboard is expensive to compute remotely and changes slowly,
//! so it is fetched at most once per window. The gate timestamp is
//! persisted separately from the snapshot: clearing the cached snapshot
//! does not re-open the gate, and a failed fetch leaves both untouched so
//! an outage cannot turn into a retry storm.

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::db::{get_json, get_timestamp, keys, set_json, set_timestamp, KvStore};
use crate::error::Result;
use crate::models::LeaderboardSnapshot;
use crate::remote::RemoteApi;

#[derive(Debug, Clone)]
pub struct LeaderboardCache<K, A, C> {
    kv: K,
    api: A,
    clock: C,
    /// Minimum spacing between fetches.
    refresh_window: Duration,
    /// How long a fetched snapshot stays servable.
    expiry_window: Duration,
}

impl<K, A, C> LeaderboardCache<K, A, C>
where
    K: KvStore,
    A: RemoteApi,
    C: Clock,
{
    pub fn new(kv: K, api: A, clock: C, refresh_window: Duration) -> Self {
        Self {
            kv,
            api,
            clock,
            refresh_window,
            expiry_window: refresh_window,
        }
    }

    /// Fetches a fresh leaderboard if the window has elapsed since the
    /// last successful fetch. Returns whether a fetch happened. Remote
    /// failures are absorbed: the previous snapshot and gate timestamp
    /// stay as they were.
    pub async fn refresh_if_due(&self, user_id: &str) -> Result<bool> {
        let now = self.clock.now();
        if let Some(last) = get_timestamp(&self.kv, keys::LEADERBOARD_FETCHED_AT).await? {
            if now < last + self.refresh_window {
                debug!("leaderboard refresh gated until {}", last + self.refresh_window);
                return Ok(false);
            }
        }

        let response = match self.api.fetch_leaderboard(user_id).await {
            Ok(response) => response,
            Err(e) if e.is_remote() => {
                warn!("leaderboard refresh failed, keeping cached snapshot: {e}");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let snapshot = LeaderboardSnapshot {
            entries: response.entries.into_iter().map(Into::into).collect(),
            user_rank: response.user_rank,
            fetched_at: now,
            expires_at: now + self.expiry_window,
        };
        set_json(&self.kv, keys::LEADERBOARD_SNAPSHOT, &snapshot).await?;
        set_timestamp(&self.kv, keys::LEADERBOARD_FETCHED_AT, now).await?;
        info!(entries = snapshot.entries.len(), "refreshed leaderboard");
        Ok(true)
    }

    /// The cached snapshot, or `None` if none was ever fetched or the
    /// held one has expired.
    pub async fn get_cached(&self) -> Result<Option<LeaderboardSnapshot>> {
        let snapshot: Option<LeaderboardSnapshot> =
            get_json(&self.kv, keys::LEADERBOARD_SNAPSHOT).await?;
        Ok(snapshot.filter(|s| s.is_fresh(self.clock.now())))
    }

    /// Time remaining until the gate opens. Zero means due now.
    pub async fn time_until_next_refresh(&self) -> Result<Duration> {
        match get_timestamp(&self.kv, keys::LEADERBOARD_FETCHED_AT).await? {
            None => Ok(Duration::zero()),
            Some(last) => {
                let due = last + self.refresh_window;
                let now = self.clock.now();
                if now >= due {
                    Ok(Duration::zero())
                } else {
                    Ok(due - now)
                }
            }
        }
    }
}
