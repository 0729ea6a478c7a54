//! Content version synchronizer.
//!
//! Keeps the bulk question set current with the remote version. The
//! replace itself is atomic (see [`QuestionStore::replace_all`]); this
//! service decides *when* to replace and how failures surface: a network
//! failure during a version check is "no update available", never fatal,
//! while an empty local store plus a failed download is fatal to startup.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::OfflineFlag;
use crate::clock::Clock;
use crate::db::QuestionStore;
use crate::error::{Result, SyncError};
use crate::models::{compare_versions, ContentVersion, QuizQuestion};
use crate::remote::RemoteApi;

/// Consecutive background-update failures before the log escalates.
const BACKGROUND_FAILURE_WARN_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct ContentSynchronizer<Q, A, C> {
    questions: Q,
    api: A,
    clock: C,
    offline: Arc<OfflineFlag>,
    background_failures: Arc<AtomicU32>,
}

impl<Q, A, C> ContentSynchronizer<Q, A, C>
where
    Q: QuestionStore + Clone + 'static,
    A: RemoteApi + Clone + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(questions: Q, api: A, clock: C, offline: Arc<OfflineFlag>) -> Self {
        Self {
            questions,
            api,
            clock,
            offline,
            background_failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// True if the remote version tag differs from the local one, or no
    /// local version exists yet. A failed remote call reports "no update"
    /// so offline use continues on stale content.
    pub async fn check_for_update(&self) -> Result<bool> {
        let local = self.questions.current_version().await?;

        let remote = match self.api.fetch_content_version().await {
            Ok(remote) => {
                self.offline.set_online();
                remote
            }
            Err(e) if e.is_connectivity() => {
                self.offline.set_offline();
                debug!("content version check unreachable: {e}");
                return Ok(false);
            }
            Err(e) if e.is_remote() => {
                warn!("content version check failed: {e}");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        match local {
            None => Ok(true),
            Some(local) => {
                let differs =
                    compare_versions(&remote.version, &local.version) != Ordering::Equal;
                if differs {
                    debug!(local = %local.version, remote = %remote.version, "content is stale");
                }
                Ok(differs)
            }
        }
    }

    /// Fetches the latest item set and atomically swaps it in, returning
    /// the installed item count. Errors propagate to the caller.
    pub async fn download_and_replace(&self) -> Result<u64> {
        let info = self.track(self.api.fetch_content_version().await)?;
        let payloads = self.track(self.api.fetch_questions(&info.version).await)?;

        let questions: Vec<QuizQuestion> = payloads.into_iter().map(Into::into).collect();
        let version = ContentVersion {
            version: info.version,
            fetched_at: self.clock.now(),
            total_questions: questions.len() as u32,
        };

        let count = self.questions.replace_all(&questions, &version).await?;
        info!(version = %version.version, count, "installed content snapshot");
        Ok(count)
    }

    /// Orchestrated refresh step: replace the snapshot if the remote
    /// version differs, absorbing remote failures (stale-but-usable
    /// content is acceptable mid-run). Local store errors propagate.
    pub async fn sync_if_stale(&self) -> Result<bool> {
        match self.refresh_stale_content().await {
            Ok(updated) => Ok(updated),
            Err(e) if e.is_remote() => {
                debug!("content refresh skipped: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// First-run hook. With no local content the download blocks and a
    /// failure is fatal (the app cannot start without questions). With
    /// content already present the update check runs on a background task
    /// and its failure is swallowed.
    pub async fn initial_load(&self) -> Result<()> {
        if self.questions.count().await? == 0 {
            return match self.download_and_replace().await {
                Ok(_) => Ok(()),
                Err(e) if e.is_remote() => Err(SyncError::NoContent(e.to_string())),
                Err(e) => Err(e),
            };
        }

        let this = self.clone();
        tokio::spawn(async move {
            match this.refresh_stale_content().await {
                Ok(_) => {
                    this.background_failures.store(0, AtomicOrdering::Relaxed);
                }
                Err(e) => {
                    let failures =
                        this.background_failures.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                    if failures >= BACKGROUND_FAILURE_WARN_THRESHOLD {
                        warn!(failures, "background content update keeps failing: {e}");
                    } else {
                        debug!("background content update failed: {e}");
                    }
                }
            }
        });
        Ok(())
    }

    async fn refresh_stale_content(&self) -> Result<bool> {
        if !self.check_for_update().await? {
            return Ok(false);
        }
        self.download_and_replace().await?;
        Ok(true)
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.offline.set_online(),
            Err(e) if e.is_connectivity() => self.offline.set_offline(),
            Err(_) => {}
        }
        result
    }
}
