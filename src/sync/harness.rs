//! Scripted in-memory [`RemoteApi`] for service tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::error::{Result, SyncError};
use crate::remote::{
    BatchSyncRequest, BatchSyncResponse, ContentVersionResponse, LeaderboardEntryPayload,
    LeaderboardResponse, QuestionPayload, RemoteApi,
};

/// One scripted reply.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Value(T),
    Connectivity,
    Api(u16),
}

impl<T: Clone> Scripted<T> {
    fn eval(&self) -> Result<T> {
        match self {
            Scripted::Value(value) => Ok(value.clone()),
            Scripted::Connectivity => {
                Err(SyncError::Connectivity("connection refused".to_string()))
            }
            Scripted::Api(status) => Err(SyncError::Api {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

fn default_synced_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

struct Inner {
    version: Mutex<Scripted<ContentVersionResponse>>,
    questions: Mutex<Scripted<Vec<QuestionPayload>>>,
    batch_queue: Mutex<VecDeque<Scripted<BatchSyncResponse>>>,
    leaderboard: Mutex<Scripted<LeaderboardResponse>>,
    version_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    leaderboard_calls: AtomicUsize,
    upload_requests: Mutex<Vec<BatchSyncRequest>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    upload_entered: Notify,
}

/// Fake remote with per-endpoint scripting. Everything defaults to a
/// connectivity failure, as if the device were offline.
#[derive(Clone)]
pub struct MockApi {
    inner: Arc<Inner>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                version: Mutex::new(Scripted::Connectivity),
                questions: Mutex::new(Scripted::Connectivity),
                batch_queue: Mutex::new(VecDeque::new()),
                leaderboard: Mutex::new(Scripted::Connectivity),
                version_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
                leaderboard_calls: AtomicUsize::new(0),
                upload_requests: Mutex::new(Vec::new()),
                upload_gate: Mutex::new(None),
                upload_entered: Notify::new(),
            }),
        }
    }

    pub fn set_version(&self, tag: &str, total_questions: u32) {
        *self.inner.version.lock().unwrap() = Scripted::Value(ContentVersionResponse {
            version: tag.to_string(),
            last_updated: default_synced_at(),
            total_questions,
            categories: vec![],
        });
    }

    pub fn fail_version_with_connectivity(&self) {
        *self.inner.version.lock().unwrap() = Scripted::Connectivity;
    }

    pub fn set_questions(&self, items: Vec<(&str, &str)>) {
        let payloads = items
            .into_iter()
            .map(|(id, category)| QuestionPayload {
                id: id.to_string(),
                category: category.to_string(),
                prompt: format!("prompt for {id}"),
                choices: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_index: 0,
                explanation: None,
            })
            .collect();
        *self.inner.questions.lock().unwrap() = Scripted::Value(payloads);
    }

    pub fn fail_questions_with_connectivity(&self) {
        *self.inner.questions.lock().unwrap() = Scripted::Connectivity;
    }

    pub fn push_batch_response(
        &self,
        synced_sessions: usize,
        synced_results: usize,
        failed_sessions: usize,
        failed_results: usize,
    ) {
        self.push_batch_response_at(
            synced_sessions,
            synced_results,
            failed_sessions,
            failed_results,
            default_synced_at(),
        );
    }

    pub fn push_batch_response_at(
        &self,
        synced_sessions: usize,
        synced_results: usize,
        failed_sessions: usize,
        failed_results: usize,
        synced_at: DateTime<Utc>,
    ) {
        self.inner
            .batch_queue
            .lock()
            .unwrap()
            .push_back(Scripted::Value(BatchSyncResponse {
                synced_sessions,
                synced_results,
                failed_sessions,
                failed_results,
                synced_at,
            }));
    }

    pub fn fail_upload_with_connectivity(&self) {
        self.inner
            .batch_queue
            .lock()
            .unwrap()
            .push_back(Scripted::Connectivity);
    }

    pub fn fail_upload_with_status(&self, status: u16) {
        self.inner
            .batch_queue
            .lock()
            .unwrap()
            .push_back(Scripted::Api(status));
    }

    pub fn set_leaderboard(&self, entries: Vec<(&str, i64)>, user_rank: Option<u32>) {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, (user_id, score))| LeaderboardEntryPayload {
                rank: index as u32 + 1,
                user_id: user_id.to_string(),
                display_name: user_id.to_string(),
                score,
            })
            .collect();
        *self.inner.leaderboard.lock().unwrap() =
            Scripted::Value(LeaderboardResponse { entries, user_rank });
    }

    pub fn fail_leaderboard_with_connectivity(&self) {
        *self.inner.leaderboard.lock().unwrap() = Scripted::Connectivity;
    }

    pub fn version_calls(&self) -> usize {
        self.inner.version_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.inner.upload_calls.load(Ordering::SeqCst)
    }

    pub fn leaderboard_calls(&self) -> usize {
        self.inner.leaderboard_calls.load(Ordering::SeqCst)
    }

    pub fn last_upload_request(&self) -> Option<BatchSyncRequest> {
        self.inner.upload_requests.lock().unwrap().last().cloned()
    }

    /// Makes every upload wait until the returned handle is notified, so
    /// tests can hold a sync mid-flight.
    pub fn block_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once an upload call has been received (immediately if one
    /// already was).
    pub async fn wait_for_upload(&self) {
        self.inner.upload_entered.notified().await;
    }
}

impl RemoteApi for MockApi {
    async fn fetch_content_version(&self) -> Result<ContentVersionResponse> {
        self.inner.version_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.inner.version.lock().unwrap().clone();
        scripted.eval()
    }

    async fn fetch_questions(&self, _version: &str) -> Result<Vec<QuestionPayload>> {
        let scripted = self.inner.questions.lock().unwrap().clone();
        scripted.eval()
    }

    async fn upload_progress(
        &self,
        _user_id: &str,
        request: &BatchSyncRequest,
    ) -> Result<BatchSyncResponse> {
        self.inner.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .upload_requests
            .lock()
            .unwrap()
            .push(request.clone());
        self.inner.upload_entered.notify_one();

        let gate = self.inner.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self
            .inner
            .batch_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Connectivity);
        scripted.eval()
    }

    async fn fetch_leaderboard(&self, _user_id: &str) -> Result<LeaderboardResponse> {
        self.inner.leaderboard_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.inner.leaderboard.lock().unwrap().clone();
        scripted.eval()
    }
}
