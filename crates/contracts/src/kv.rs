//! KeyValueStore - shared store used for cross-instance coordination
//!
//! Only the downlink de-duplication lock depends on it. `MemoryStore` covers the
//! single-process case and tests.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key-value store error: {0}")]
pub struct StoreError(pub String);

/// Minimal key-value contract
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Set `key`, expiring after `ttl` when given
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Set `key` only if absent; returns whether the value was written
    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove every key
    async fn flush(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| t > now)
    }
}

/// In-process store; expired entries are evicted lazily on access
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone());

        if value.is_none() {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut written = false;

        self.entries
            .entry(key.to_string())
            .and_modify(|e| {
                if !e.is_live(now) {
                    e.value = value.clone();
                    e.expires_at = Some(now + ttl);
                    written = true;
                }
            })
            .or_insert_with(|| {
                written = true;
                Entry {
                    value: value.clone(),
                    expires_at: Some(now + ttl),
                }
            });

        Ok(written)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}
