//! Trivio Sync Engine
//!
//! Local-first synchronization for the Trivio quiz app: progress records
//! accumulate on the device and drain to the remote service in batches,
//! bulk question content is version-checked and replaced atomically, and
//! the leaderboard is cached behind a rate gate. [`SyncService`] is the
//! entry point; the presentation layer never talks to the individual
//! synchronizers.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;

pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError, ConfigSource, ConfigValue, RemoteConfig};
pub use db::{
    init_db, KvStore, QuestionStore, SqliteKvStore, SqliteProgressStore, SqliteQuestionStore,
    SyncStateStore,
};
pub use error::{Result, SyncError};
pub use models::{
    compare_versions, ContentVersion, LeaderboardEntry, LeaderboardSnapshot, ProgressResult,
    ProgressSession, QuizQuestion, SyncableRecord,
};
pub use remote::{HttpRemoteApi, RemoteApi};
pub use sync::{
    ContentSynchronizer, DefaultSyncService, LeaderboardCache, OfflineFlag, ProgressSynchronizer,
    SyncReport, SyncRun, SyncService, SyncStatus, UploadOutcome,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
