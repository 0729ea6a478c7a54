pub mod client;
pub mod protocol;

pub use client::{HttpRemoteApi, RemoteApi};
pub use protocol::{
    BatchSyncRequest, BatchSyncResponse, ContentVersionResponse, LeaderboardEntryPayload,
    LeaderboardResponse, QuestionPayload, ResultPayload, SessionPayload,
};
