//! Small typed key/value store.
//!
//! Holds the leaderboard rate-gate timestamp, the cached snapshot, and the
//! per-user last-sync markers. Modeled as an explicit injected interface
//! so tests can observe and preload it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{format_ts, parse_ts};
use crate::error::Result;

/// Well-known keys. Per-user keys are built with the `*_key` functions.
pub mod keys {
    pub const LEADERBOARD_SNAPSHOT: &str = "leaderboard:snapshot";
    pub const LEADERBOARD_FETCHED_AT: &str = "leaderboard:fetched_at";

    /// Server-issued timestamp of the last acknowledged upload, sent back
    /// as the delta hint on the next batch.
    pub fn last_sync_at_key(user_id: &str) -> String {
        format!("sync:last_sync_at:{user_id}")
    }

    /// Wall-clock time the last orchestrated run completed.
    pub fn last_completed_sync_key(user_id: &str) -> String {
        format!("sync:last_completed:{user_id}")
    }
}

/// String key/value persistence contract.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Reads a JSON-encoded value.
pub async fn get_json<S: KvStore, T: DeserializeOwned>(store: &S, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Writes a JSON-encoded value.
pub async fn set_json<S: KvStore, T: Serialize>(store: &S, key: &str, value: &T) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?).await
}

/// Reads an RFC 3339 timestamp.
pub async fn get_timestamp<S: KvStore>(store: &S, key: &str) -> Result<Option<DateTime<Utc>>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(parse_ts(&raw, key)?)),
        None => Ok(None),
    }
}

/// Writes an RFC 3339 timestamp.
pub async fn set_timestamp<S: KvStore>(store: &S, key: &str, ts: DateTime<Utc>) -> Result<()> {
    store.set(key, &format_ts(ts)).await
}

/// `SQLite` implementation of [`KvStore`].
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
