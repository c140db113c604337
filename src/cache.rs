//! Process-lifetime key/value store shared by the snapshot fetcher and the
//! default-city pointer.
//!
//! Every entry carries its own [`ExpirationPolicy`]. Expiration is enforced
//! lazily by moka on read, there is no sweeper task of our own.

use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::weather::types::WeatherSnapshot;

/// Informational only; moka does not weigh entries by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePriority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub absolute: Duration,
    pub sliding: Option<Duration>,
    pub priority: CachePriority,
}

impl ExpirationPolicy {
    pub fn absolute(ttl: Duration) -> Self {
        Self {
            absolute: ttl,
            sliding: None,
            priority: CachePriority::Normal,
        }
    }

    pub fn with_sliding(mut self, idle: Duration) -> Self {
        self.sliding = Some(idle);
        self
    }

    pub fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Time left for an entry of age `age` that was just touched.
    fn remaining(&self, age: Duration) -> Duration {
        let absolute_left = self.absolute.saturating_sub(age);
        match self.sliding {
            Some(idle) => absolute_left.min(idle),
            None => absolute_left,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Snapshot(Arc<WeatherSnapshot>),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: CachedValue,
    policy: ExpirationPolicy,
}

struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.policy.remaining(Duration::ZERO))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        entry: &CacheEntry,
        read_at: Instant,
        duration_until_expiry: Option<Duration>,
        last_modified_at: Instant,
    ) -> Option<Duration> {
        // Only a sliding window moves on reads; the absolute deadline is
        // measured from the last write.
        if entry.policy.sliding.is_none() {
            return duration_until_expiry;
        }
        let age = read_at.saturating_duration_since(last_modified_at);
        Some(entry.policy.remaining(age))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.policy.remaining(Duration::ZERO))
    }
}

#[derive(Clone)]
pub struct CacheStore {
    inner: Cache<String, CacheEntry>,
}

impl CacheStore {
    /// `max_capacity` of `None` leaves the store bounded by time alone.
    pub fn new(max_capacity: Option<u64>) -> Self {
        let mut builder = Cache::<String, CacheEntry>::builder().expire_after(EntryExpiry);
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }
        Self {
            inner: builder.build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    pub async fn set(&self, key: impl Into<String>, value: CachedValue, policy: ExpirationPolicy) {
        let key = key.into();
        tracing::trace!(key = %key, priority = ?policy.priority, "Caching entry");
        self.inner.insert(key, CacheEntry { value, policy }).await;
    }

    pub async fn get_snapshot(&self, key: &str) -> Option<Arc<WeatherSnapshot>> {
        match self.get(key).await? {
            CachedValue::Snapshot(snapshot) => Some(snapshot),
            CachedValue::Text(_) => None,
        }
    }

    pub async fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key).await? {
            CachedValue::Text(text) => Some(text),
            CachedValue::Snapshot(_) => None,
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(None)
    }
}
