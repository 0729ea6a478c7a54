//! Progress batch synchronizer.
//!
//! Drains pending records for one user in a single batch call. The server
//! acknowledges by count, so submission order must be deterministic:
//! oldest `last_modified` first, id as tie-break, both here and in the
//! store query. Conflict losers are acknowledged too - the server copy is
//! authoritative and the local write is retired without retry.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::OfflineFlag;
use crate::clock::Clock;
use crate::db::{get_timestamp, keys, set_timestamp, KvStore, SyncStateStore};
use crate::error::Result;
use crate::models::{ProgressResult, ProgressSession, SyncableRecord};
use crate::remote::{BatchSyncRequest, ResultPayload, SessionPayload};
use crate::remote::RemoteApi;

/// What one batch upload accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Records the server accepted.
    pub synced_sessions: usize,
    pub synced_results: usize,
    /// Records the server already held a newer copy of. Marked synced
    /// locally, never retried.
    pub conflict_sessions: usize,
    pub conflict_results: usize,
    /// Malformed local records skipped without upload.
    pub skipped: usize,
}

impl UploadOutcome {
    pub fn total_acknowledged(&self) -> usize {
        self.synced_sessions + self.synced_results + self.conflict_sessions + self.conflict_results
    }
}

#[derive(Debug, Clone)]
pub struct ProgressSynchronizer<S, K, A, C> {
    store: S,
    kv: K,
    api: A,
    clock: C,
    offline: Arc<OfflineFlag>,
}

impl<S, K, A, C> ProgressSynchronizer<S, K, A, C>
where
    S: SyncStateStore,
    K: KvStore,
    A: RemoteApi,
    C: Clock,
{
    pub fn new(store: S, kv: K, api: A, clock: C, offline: Arc<OfflineFlag>) -> Self {
        Self {
            store,
            kv,
            api,
            clock,
            offline,
        }
    }

    /// Uploads every pending record for the user.
    ///
    /// Returns immediately with a zero outcome when nothing is pending.
    /// If the network call fails, nothing is marked synced and every
    /// record stays pending; resending is safe because the server dedupes
    /// by id.
    pub async fn upload(&self, user_id: &str) -> Result<UploadOutcome> {
        let (mut sessions, mut results) = self.store.list_pending(user_id).await?;
        sessions.sort_by_key(SyncableRecord::submission_key);
        results.sort_by_key(SyncableRecord::submission_key);

        let mut outcome = UploadOutcome::default();
        let sessions = retain_valid(sessions, &mut outcome.skipped, valid_session);
        let results = retain_valid(results, &mut outcome.skipped, valid_result);

        if sessions.is_empty() && results.is_empty() {
            debug!(user_id, skipped = outcome.skipped, "nothing pending to upload");
            return Ok(outcome);
        }

        let last_sync_key = keys::last_sync_at_key(user_id);
        let request = BatchSyncRequest {
            sessions: sessions.iter().map(SessionPayload::from).collect(),
            results: results.iter().map(ResultPayload::from).collect(),
            last_sync_at: get_timestamp(&self.kv, &last_sync_key).await?,
        };

        let response = match self.api.upload_progress(user_id, &request).await {
            Ok(response) => {
                self.offline.set_online();
                response
            }
            Err(e) => {
                if e.is_connectivity() {
                    self.offline.set_offline();
                }
                return Err(e);
            }
        };

        let session_ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
        let result_ids: Vec<Uuid> = results.iter().map(|r| r.id).collect();

        let (synced_s, conflict_s) =
            ack_split(session_ids.len(), response.synced_sessions, response.failed_sessions);
        let (synced_r, conflict_r) =
            ack_split(result_ids.len(), response.synced_results, response.failed_results);

        if conflict_s + conflict_r > 0 {
            info!(
                user_id,
                sessions = conflict_s,
                results = conflict_r,
                "server kept newer copies; retiring local writes"
            );
        }

        // Acknowledged prefix covers accepted records and conflict losers
        // alike; everything past it stays pending for the next run.
        self.store
            .mark_synced(
                &session_ids[..synced_s + conflict_s],
                &result_ids[..synced_r + conflict_r],
                self.clock.now(),
            )
            .await?;
        set_timestamp(&self.kv, &last_sync_key, response.synced_at).await?;

        outcome.synced_sessions = synced_s;
        outcome.synced_results = synced_r;
        outcome.conflict_sessions = conflict_s;
        outcome.conflict_results = conflict_r;
        debug!(
            user_id,
            acknowledged = outcome.total_acknowledged(),
            pending_sessions = session_ids.len() - synced_s - conflict_s,
            pending_results = result_ids.len() - synced_r - conflict_r,
            "batch upload finished"
        );
        Ok(outcome)
    }
}

/// Clamps the server's counts to the submitted batch: `synced` accepted
/// records first, then `failed` conflict losers.
fn ack_split(submitted: usize, synced: usize, failed: usize) -> (usize, usize) {
    let synced = synced.min(submitted);
    let conflicts = failed.min(submitted - synced);
    (synced, conflicts)
}

fn retain_valid<T: SyncableRecord>(
    records: Vec<T>,
    skipped: &mut usize,
    valid: fn(&T) -> std::result::Result<(), &'static str>,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| match valid(record) {
            Ok(()) => true,
            Err(reason) => {
                warn!(id = %record.record_id(), reason, "skipping invalid record");
                *skipped += 1;
                false
            }
        })
        .collect()
}

fn valid_session(session: &ProgressSession) -> std::result::Result<(), &'static str> {
    if session.user_id.trim().is_empty() {
        return Err("empty user id");
    }
    Ok(())
}

fn valid_result(result: &ProgressResult) -> std::result::Result<(), &'static str> {
    if result.user_id.trim().is_empty() {
        return Err("empty user id");
    }
    if result.question_id.trim().is_empty() {
        return Err("empty question id");
    }
    Ok(())
}
