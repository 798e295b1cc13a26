//! Store traits describing the cache state persistence adapter.
//!
//! A [`CacheStateStore`] hands out short-lived [`CacheSession`]s. Callers open a
//! session for one logical group of operations (the rewrite of one chunk, or the
//! bookkeeping for one cached delivery), use it, and close it. Sessions are never
//! shared across requests.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CacheLookup, QueueEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open cache store `{location}`: {message}")]
    Open { location: String, message: String },
    #[error("cache store query failed: {0}")]
    Query(String),
    #[error("cache store returned malformed data: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn open(location: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Open {
            location: location.into(),
            message: err.to_string(),
        }
    }

    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }
}

#[async_trait]
pub trait CacheStateStore: Send + Sync {
    /// Open a session backed by a dedicated connection.
    async fn open(&self) -> Result<Box<dyn CacheSession>, StoreError>;
}

#[async_trait]
pub trait CacheSession: Send {
    /// Report what the store knows about `url`.
    async fn lookup_attributes(&mut self, url: &str) -> Result<CacheLookup, StoreError>;

    /// Queue `url` for capture unless it is excluded or already checked.
    /// Repeated calls for the same URL leave exactly one queue entry.
    async fn enqueue_for_caching(&mut self, url: &str, now: i64) -> Result<(), StoreError>;

    /// Count a view of the cached item `cache_id` and stamp it with `now`.
    async fn log_activity(&mut self, cache_id: &str, now: i64) -> Result<(), StoreError>;

    /// Declared media type of the cached item, when recorded.
    async fn content_type(&mut self, cache_id: &str) -> Result<Option<String>, StoreError>;

    /// Oldest unclaimed queue entries first.
    async fn pending_queue(&mut self, limit: u32) -> Result<Vec<QueueEntry>, StoreError>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}
