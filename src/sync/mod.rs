//! The synchronization services.
//!
//! Three single-purpose services - content, progress, leaderboard - are
//! composed by [`SyncService`], which owns the per-user single-flight
//! discipline and the state the presentation layer reads.

mod content_sync;
mod leaderboard;
mod orchestrator;
mod progress_sync;

#[cfg(test)]
pub(crate) mod harness;

pub use content_sync::ContentSynchronizer;
pub use leaderboard::LeaderboardCache;
pub use orchestrator::{DefaultSyncService, SyncReport, SyncRun, SyncService, SyncStatus};
pub use progress_sync::{ProgressSynchronizer, UploadOutcome};

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Derived connectivity state, shared by the services that talk to the
/// network.
///
/// Set when the most recent content check or upload failed with a
/// connectivity error, cleared when one succeeds. It never blocks a sync
/// attempt; the presentation layer uses it to show an offline indicator.
#[derive(Debug, Default)]
pub struct OfflineFlag(AtomicBool);

impl OfflineFlag {
    pub fn is_offline(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn set_offline(&self) {
        if !self.0.swap(true, Ordering::Relaxed) {
            info!("entering offline mode");
        }
    }

    pub(crate) fn set_online(&self) {
        if self.0.swap(false, Ordering::Relaxed) {
            info!("connectivity restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_flag_toggles() {
        let flag = OfflineFlag::default();
        assert!(!flag.is_offline());

        flag.set_offline();
        assert!(flag.is_offline());

        // idempotent
        flag.set_offline();
        assert!(flag.is_offline());

        flag.set_online();
        assert!(!flag.is_offline());
    }
}
