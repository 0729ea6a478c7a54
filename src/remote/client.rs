//! HTTP client for the Trivio sync service.

use std::future::Future;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::protocol::{
    BatchSyncRequest, BatchSyncResponse, ContentVersionResponse, LeaderboardResponse,
    QuestionPayload,
};
use crate::error::{Result, SyncError};

/// Remote service contract the synchronizers run against.
///
/// The production implementation is [`HttpRemoteApi`]; tests substitute a
/// scripted fake.
pub trait RemoteApi: Send + Sync {
    /// Current content-version descriptor.
    fn fetch_content_version(&self)
        -> impl Future<Output = Result<ContentVersionResponse>> + Send;

    /// Full ordered item set for a content version.
    fn fetch_questions(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<Vec<QuestionPayload>>> + Send;

    /// Uploads every pending record for a user in one call.
    fn upload_progress(
        &self,
        user_id: &str,
        request: &BatchSyncRequest,
    ) -> impl Future<Output = Result<BatchSyncResponse>> + Send;

    /// Ranked leaderboard plus the requesting user's rank.
    fn fetch_leaderboard(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<LeaderboardResponse>> + Send;
}

/// Per-request timeout. Hitting it is a retryable connectivity failure;
/// pending records stay pending.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// reqwest-backed [`RemoteApi`] implementation.
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = server_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }
        Ok(response.json::<T>().await?)
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> SyncError {
    let body = response.text().await.unwrap_or_default();
    let message = body.trim();
    SyncError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            message.to_string()
        },
    }
}

impl RemoteApi for HttpRemoteApi {
    async fn fetch_content_version(&self) -> Result<ContentVersionResponse> {
        let response = self
            .client
            .get(self.endpoint("/api/content/version"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn fetch_questions(&self, version: &str) -> Result<Vec<QuestionPayload>> {
        let response = self
            .client
            .get(self.endpoint("/api/content/questions"))
            .query(&[("version", version)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn upload_progress(
        &self,
        user_id: &str,
        request: &BatchSyncRequest,
    ) -> Result<BatchSyncResponse> {
        let response = self
            .client
            .post(self.endpoint("/api/progress/sync"))
            .query(&[("userId", user_id)])
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn fetch_leaderboard(&self, user_id: &str) -> Result<LeaderboardResponse> {
        let response = self
            .client
            .get(self.endpoint("/api/leaderboard"))
            .query(&[("userId", user_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }
}
