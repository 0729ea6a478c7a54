//! Sync orchestrator.
//!
//! Entry point for the host application. All sync mutation for one user
//! is serialized behind a per-user lock; operations for different users
//! run independently. The lock is released on every exit path, success or
//! failure, because the guard is owned by the call frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{
    ContentSynchronizer, LeaderboardCache, OfflineFlag, ProgressSynchronizer, UploadOutcome,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::{
    get_timestamp, keys, set_timestamp, KvStore, QuestionStore, SqliteKvStore,
    SqliteProgressStore, SqliteQuestionStore, SyncStateStore,
};
use crate::error::{Result, SyncError};
use crate::models::LeaderboardSnapshot;
use crate::remote::{HttpRemoteApi, RemoteApi};

const PROGRESS_CONTENT: f64 = 0.3;
const PROGRESS_UPLOAD: f64 = 0.7;
const PROGRESS_DONE: f64 = 1.0;

/// Where a sync run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// In-flight state of one orchestrated sync. Transient; the last terminal
/// run stays readable until the next one starts.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub status: SyncStatus,
    /// 0.0 to 1.0.
    pub progress: f64,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            progress: 0.0,
            error: None,
            finished_at: None,
        }
    }

    fn running() -> Self {
        Self {
            status: SyncStatus::Running,
            progress: 0.0,
            error: None,
            finished_at: None,
        }
    }
}

/// What one completed run accomplished.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub content_updated: bool,
    pub upload: UploadOutcome,
    pub leaderboard_refreshed: bool,
    pub completed_at: DateTime<Utc>,
}

struct UserSlot {
    guard: Arc<tokio::sync::Mutex<()>>,
    run: SyncRun,
}

impl Default for UserSlot {
    fn default() -> Self {
        Self {
            guard: Arc::new(tokio::sync::Mutex::new(())),
            run: SyncRun::idle(),
        }
    }
}

/// The engine facade the presentation layer talks to. It never calls the
/// individual synchronizers directly.
#[derive(Clone)]
pub struct SyncService<S, Q, K, A, C> {
    content: ContentSynchronizer<Q, A, C>,
    progress: ProgressSynchronizer<S, K, A, C>,
    leaderboard: LeaderboardCache<K, A, C>,
    store: S,
    kv: K,
    clock: C,
    offline: Arc<OfflineFlag>,
    users: Arc<Mutex<HashMap<String, UserSlot>>>,
}

impl<S, Q, K, A, C> SyncService<S, Q, K, A, C>
where
    S: SyncStateStore + Clone + 'static,
    Q: QuestionStore + Clone + 'static,
    K: KvStore + Clone + 'static,
    A: RemoteApi + Clone + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(
        store: S,
        questions: Q,
        kv: K,
        api: A,
        clock: C,
        leaderboard_refresh: Duration,
    ) -> Self {
        let offline = Arc::new(OfflineFlag::default());
        Self {
            content: ContentSynchronizer::new(
                questions,
                api.clone(),
                clock.clone(),
                offline.clone(),
            ),
            progress: ProgressSynchronizer::new(
                store.clone(),
                kv.clone(),
                api.clone(),
                clock.clone(),
                offline.clone(),
            ),
            leaderboard: LeaderboardCache::new(kv.clone(), api, clock.clone(), leaderboard_refresh),
            store,
            kv,
            clock,
            offline,
            users: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs one full sync for the user: content refresh, progress upload,
    /// leaderboard refresh, in that order.
    ///
    /// At most one run per user at a time. A call while another run is in
    /// flight fails immediately with [`SyncError::SyncInProgress`] without
    /// touching the running sync; callers retry later.
    pub async fn manual_sync(&self, user_id: &str) -> Result<SyncReport> {
        let _guard = {
            let mut users = self.lock_users();
            let slot = users.entry(user_id.to_string()).or_default();
            let guard = slot
                .guard
                .clone()
                .try_lock_owned()
                .map_err(|_| SyncError::SyncInProgress(user_id.to_string()))?;
            slot.run = SyncRun::running();
            guard
        };

        let result = self.run_exclusive(user_id).await;

        let finished_at = self.clock.now();
        let mut users = self.lock_users();
        let slot = users.entry(user_id.to_string()).or_default();
        match &result {
            Ok(_) => {
                slot.run.status = SyncStatus::Completed;
                slot.run.progress = PROGRESS_DONE;
                slot.run.error = None;
                slot.run.finished_at = Some(finished_at);
            }
            Err(e) => {
                warn!(user_id, "sync failed: {e}");
                slot.run.status = SyncStatus::Failed;
                slot.run.error = Some(e.to_string());
                slot.run.finished_at = Some(finished_at);
            }
        }

        result
    }

    /// First-run content bootstrap; see
    /// [`ContentSynchronizer::initial_load`].
    pub async fn initial_load(&self) -> Result<()> {
        self.content.initial_load().await
    }

    /// The current (or last terminal) run for the user.
    pub fn sync_status(&self, user_id: &str) -> SyncRun {
        self.lock_users()
            .get(user_id)
            .map(|slot| slot.run.clone())
            .unwrap_or_else(SyncRun::idle)
    }

    /// True while the most recent content check or upload failed from
    /// connectivity. Never blocks a sync attempt.
    pub fn is_offline_mode(&self) -> bool {
        self.offline.is_offline()
    }

    /// Cached leaderboard, if one is held and unexpired.
    pub async fn cached_leaderboard(&self) -> Result<Option<LeaderboardSnapshot>> {
        self.leaderboard.get_cached().await
    }

    /// Time remaining until the leaderboard gate opens.
    pub async fn leaderboard_refresh_in(&self) -> Result<Duration> {
        self.leaderboard.time_until_next_refresh().await
    }

    /// (pending sessions, pending results) for UI badges.
    pub async fn pending_counts(&self, user_id: &str) -> Result<(u64, u64)> {
        self.store.pending_counts(user_id).await
    }

    /// Wall-clock time the last orchestrated run completed for this user.
    pub async fn last_completed_sync(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        get_timestamp(&self.kv, &keys::last_completed_sync_key(user_id)).await
    }

    async fn run_exclusive(&self, user_id: &str) -> Result<SyncReport> {
        debug!(user_id, "sync started");

        let content_updated = self.content.sync_if_stale().await?;
        self.set_progress(user_id, PROGRESS_CONTENT);

        let upload = self.progress.upload(user_id).await?;
        self.set_progress(user_id, PROGRESS_UPLOAD);

        let leaderboard_refreshed = self.leaderboard.refresh_if_due(user_id).await?;
        self.set_progress(user_id, PROGRESS_DONE);

        let completed_at = self.clock.now();
        set_timestamp(
            &self.kv,
            &keys::last_completed_sync_key(user_id),
            completed_at,
        )
        .await?;

        info!(
            user_id,
            content_updated,
            acknowledged = upload.total_acknowledged(),
            leaderboard_refreshed,
            "sync completed"
        );
        Ok(SyncReport {
            content_updated,
            upload,
            leaderboard_refreshed,
            completed_at,
        })
    }

    fn set_progress(&self, user_id: &str, progress: f64) {
        let mut users = self.lock_users();
        let slot = users.entry(user_id.to_string()).or_default();
        if slot.run.status == SyncStatus::Running {
            slot.run.progress = progress;
        }
    }

    fn lock_users(&self) -> MutexGuard<'_, HashMap<String, UserSlot>> {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The production wiring: SQLite stores, HTTP remote, system clock.
pub type DefaultSyncService = SyncService<
    SqliteProgressStore,
    SqliteQuestionStore,
    SqliteKvStore,
    HttpRemoteApi,
    SystemClock,
>;

impl DefaultSyncService {
    /// Builds the engine from loaded configuration and an initialized
    /// database pool.
    pub fn from_config(config: &Config, pool: SqlitePool) -> Result<Self> {
        let server_url = config
            .remote
            .server_url
            .clone()
            .ok_or(SyncError::NotConfigured)?;
        let api_key = config.remote.api_key.clone().ok_or(SyncError::NotConfigured)?;

        Ok(Self::new(
            SqliteProgressStore::new(pool.clone()),
            SqliteQuestionStore::new(pool.clone()),
            SqliteKvStore::new(pool),
            HttpRemoteApi::new(server_url, api_key)?,
            SystemClock,
            Duration::hours(config.leaderboard_refresh_hours.value as i64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::init_db;
    use crate::models::ProgressSession;
    use crate::sync::harness::MockApi;

    type TestService = SyncService<
        SqliteProgressStore,
        SqliteQuestionStore,
        SqliteKvStore,
        MockApi,
        ManualClock,
    >;

    struct Ctx {
        service: TestService,
        store: SqliteProgressStore,
        api: MockApi,
        clock: ManualClock,
        _temp: TempDir,
    }

    async fn setup() -> Ctx {
        let temp = TempDir::new().unwrap();
        let pool = init_db(&temp.path().join("test.db")).await.unwrap();
        let store = SqliteProgressStore::new(pool.clone());
        let api = MockApi::new();
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        let service = SyncService::new(
            store.clone(),
            SqliteQuestionStore::new(pool.clone()),
            SqliteKvStore::new(pool),
            api.clone(),
            clock.clone(),
            Duration::hours(24),
        );
        Ctx {
            service,
            store,
            api,
            clock,
            _temp: temp,
        }
    }

    fn pending_session(user_id: &str) -> ProgressSession {
        ProgressSession::new(user_id, "geography", "timed", 10)
    }

    #[tokio::test]
    async fn full_run_completes_and_reports() {
        let ctx = setup().await;
        ctx.store
            .upsert_session(&pending_session("user1"))
            .await
            .unwrap();
        ctx.api.set_version("1.0.0", 1);
        ctx.api.set_questions(vec![("q-1", "geography")]);
        ctx.api.push_batch_response(1, 0, 0, 0);
        ctx.api.set_leaderboard(vec![("user1", 800)], Some(1));

        let report = ctx.service.manual_sync("user1").await.unwrap();
        assert!(report.content_updated);
        assert_eq!(report.upload.synced_sessions, 1);
        assert!(report.leaderboard_refreshed);

        let run = ctx.service.sync_status("user1");
        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.progress, 1.0);
        assert!(run.error.is_none());

        assert_eq!(
            ctx.service.last_completed_sync("user1").await.unwrap(),
            Some(ctx.clock.now())
        );
        assert_eq!(ctx.service.pending_counts("user1").await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn status_is_idle_for_unknown_user() {
        let ctx = setup().await;
        let run = ctx.service.sync_status("nobody");
        assert_eq!(run.status, SyncStatus::Idle);
        assert_eq!(run.progress, 0.0);
    }

    #[tokio::test]
    async fn upload_failure_fails_run_and_flags_offline() {
        let ctx = setup().await;
        ctx.store
            .upsert_session(&pending_session("user1"))
            .await
            .unwrap();
        // Content check and upload both hit a dead network.
        ctx.api.fail_upload_with_connectivity();

        let err = ctx.service.manual_sync("user1").await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(ctx.service.is_offline_mode());

        let run = ctx.service.sync_status("user1");
        assert_eq!(run.status, SyncStatus::Failed);
        assert_eq!(run.progress, PROGRESS_CONTENT);
        assert!(run.error.is_some());

        // Leaderboard step was aborted.
        assert_eq!(ctx.api.leaderboard_calls(), 0);
        // No record lost.
        assert_eq!(ctx.service.pending_counts("user1").await.unwrap(), (1, 0));

        // Next successful run clears offline mode.
        ctx.api.push_batch_response(1, 0, 0, 0);
        ctx.service.manual_sync("user1").await.unwrap();
        assert!(!ctx.service.is_offline_mode());
        assert_eq!(ctx.service.sync_status("user1").status, SyncStatus::Completed);
    }

    #[tokio::test]
    async fn content_check_failure_does_not_abort_the_run() {
        let ctx = setup().await;
        ctx.store
            .upsert_session(&pending_session("user1"))
            .await
            .unwrap();
        // Version endpoint unreachable, upload fine.
        ctx.api.fail_version_with_connectivity();
        ctx.api.push_batch_response(1, 0, 0, 0);

        let report = ctx.service.manual_sync("user1").await.unwrap();
        assert!(!report.content_updated);
        assert_eq!(report.upload.synced_sessions, 1);
        // Upload success supersedes the earlier connectivity failure.
        assert!(!ctx.service.is_offline_mode());
    }

    #[tokio::test]
    async fn second_sync_while_running_is_rejected() {
        let ctx = setup().await;
        ctx.store
            .upsert_session(&pending_session("user1"))
            .await
            .unwrap();
        let gate = ctx.api.block_uploads();
        ctx.api.push_batch_response(1, 0, 0, 0);

        let service = ctx.service.clone();
        let first = tokio::spawn(async move { service.manual_sync("user1").await });

        // Wait until the first run is parked inside the upload call.
        ctx.api.wait_for_upload().await;
        assert_eq!(ctx.api.upload_calls(), 1);

        let err = ctx.service.manual_sync("user1").await.unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress(_)));

        // The rejection did not disturb the in-flight run.
        assert_eq!(ctx.service.sync_status("user1").status, SyncStatus::Running);

        gate.notify_one();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.upload.synced_sessions, 1);
        assert_eq!(ctx.service.sync_status("user1").status, SyncStatus::Completed);
    }

    #[tokio::test]
    async fn different_users_sync_independently() {
        let ctx = setup().await;
        ctx.store
            .upsert_session(&pending_session("user1"))
            .await
            .unwrap();
        ctx.store
            .upsert_session(&pending_session("user2"))
            .await
            .unwrap();
        ctx.api.push_batch_response(1, 0, 0, 0);
        ctx.api.push_batch_response(1, 0, 0, 0);

        ctx.service.manual_sync("user1").await.unwrap();
        ctx.service.manual_sync("user2").await.unwrap();

        assert_eq!(ctx.service.sync_status("user1").status, SyncStatus::Completed);
        assert_eq!(ctx.service.sync_status("user2").status, SyncStatus::Completed);
        assert_eq!(ctx.service.pending_counts("user1").await.unwrap(), (0, 0));
        assert_eq!(ctx.service.pending_counts("user2").await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn from_config_requires_remote_settings() {
        let temp = TempDir::new().unwrap();
        let pool = init_db(&temp.path().join("test.db")).await.unwrap();
        let config = Config::load(Some(temp.path().join("missing.yaml"))).unwrap();

        let err = match DefaultSyncService::from_config(&config, pool) {
            Ok(_) => panic!("expected from_config to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, SyncError::NotConfigured));
    }
}
