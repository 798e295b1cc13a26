//! In-memory cache store used by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::application::repos::{CacheSession, CacheStateStore, StoreError};
use crate::domain::entities::{CacheLookup, CacheRecord, QueueEntry};
use crate::domain::types::LinkStatus;

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub lookups: HashMap<String, CacheLookup>,
    pub failing: HashSet<String>,
    pub excluded: HashSet<String>,
    pub queue: Vec<QueueEntry>,
    pub activity: BTreeMap<String, (i64, i64)>,
    pub content_types: HashMap<String, String>,
    pub opens: usize,
    pub closes: usize,
    pub fail_open: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    pub state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn with_found(self, url: &str, location: &str, status: LinkStatus, date: i64) -> Self {
        self.lock().lookups.insert(
            url.to_string(),
            CacheLookup::Found(CacheRecord {
                url: url.to_string(),
                location: location.to_string(),
                status,
                date,
            }),
        );
        self
    }

    pub fn with_empty(self, url: &str) -> Self {
        self.lock()
            .lookups
            .insert(url.to_string(), CacheLookup::Empty);
        self
    }

    pub fn with_failing(self, url: &str) -> Self {
        self.lock().failing.insert(url.to_string());
        self
    }

    pub fn with_content_type(self, cache_id: &str, content_type: &str) -> Self {
        self.lock()
            .content_types
            .insert(cache_id.to_string(), content_type.to_string());
        self
    }

    pub fn failing_open(self) -> Self {
        self.lock().fail_open = true;
        self
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn session(&self) -> MemorySession {
        MemorySession {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl CacheStateStore for MemoryStore {
    async fn open(&self) -> Result<Box<dyn CacheSession>, StoreError> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(StoreError::open("memory", "refused"));
        }
        state.opens += 1;
        drop(state);
        Ok(Box::new(self.session()))
    }
}

pub(crate) struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl CacheSession for MemorySession {
    async fn lookup_attributes(&mut self, url: &str) -> Result<CacheLookup, StoreError> {
        let state = self.lock();
        if state.failing.contains(url) {
            return Err(StoreError::query(format!("lookup of {url} failed")));
        }
        Ok(state
            .lookups
            .get(url)
            .cloned()
            .unwrap_or(CacheLookup::NotFound))
    }

    async fn enqueue_for_caching(&mut self, url: &str, now: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let known = state.lookups.contains_key(url)
            || state.excluded.contains(url)
            || state.queue.iter().any(|entry| entry.url == url);
        if !known {
            state.queue.push(QueueEntry {
                url: url.to_string(),
                created: now,
            });
        }
        Ok(())
    }

    async fn log_activity(&mut self, cache_id: &str, now: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let entry = state.activity.entry(cache_id.to_string()).or_insert((now, 0));
        entry.0 = now;
        entry.1 += 1;
        Ok(())
    }

    async fn content_type(&mut self, cache_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().content_types.get(cache_id).cloned())
    }

    async fn pending_queue(&mut self, limit: u32) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self
            .lock()
            .queue
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.lock().closes += 1;
        Ok(())
    }
}
