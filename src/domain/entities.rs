//! Records owned by the cache state store.

use serde::Serialize;

use super::types::LinkStatus;

/// A URL the store knows about, with the location of its cached copy.
///
/// An empty `location` means the URL has been checked but nothing has been
/// captured yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheRecord {
    pub url: String,
    pub location: String,
    pub status: LinkStatus,
    pub date: i64,
}

/// Result of looking a URL up in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Checked and captured.
    Found(CacheRecord),
    /// Checked, no cached copy yet.
    Empty,
    /// Never seen.
    NotFound,
}

/// A URL waiting for the external capture job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub url: String,
    pub created: i64,
}
