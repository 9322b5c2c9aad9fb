//! Device authentication dedup cache.
//!
//! # Purpose
//! Devices re-authenticate often. A short-lived entry keyed by the device
//! fingerprint lets a repeated request be answered from the cache without
//! touching the store.
//!
//! # Notes
//! - The cache is built explicitly from `DedupCacheConfig` and injected into the
//!   resolver; there is no process-global handle.
//! - Entries are advisory. Lost updates and evictions only cost a store round
//!   trip.
//! - Only the in-process `memory://` backend ships; other URL schemes are
//!   rejected when the cache is built.
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_DEDUP_CAPACITY: u64 = 100_000;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("unsupported cache backend: {0}")]
    UnsupportedBackend(String),
    #[error("invalid cache url: {0}")]
    InvalidUrl(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// What a repeated authentication needs to answer without the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDevice {
    pub name: String,
    pub namespace: String,
}

#[async_trait]
pub trait DedupCache: Send + Sync {
    async fn get(&self, uid: &str) -> CacheResult<Option<CachedDevice>>;
    async fn insert(&self, uid: &str, entry: CachedDevice) -> CacheResult<()>;
    async fn invalidate(&self, uid: &str) -> CacheResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupCacheConfig {
    pub url: String,
    pub ttl: Duration,
    pub capacity: u64,
}

impl Default for DedupCacheConfig {
    fn default() -> Self {
        Self {
            url: "memory://".to_string(),
            ttl: DEFAULT_DEDUP_TTL,
            capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

impl DedupCacheConfig {
    pub fn build(&self) -> CacheResult<Arc<dyn DedupCache>> {
        let (scheme, _) = self
            .url
            .split_once("://")
            .ok_or_else(|| CacheError::InvalidUrl(self.url.clone()))?;
        match scheme {
            "memory" => Ok(Arc::new(MemoryDedupCache::new(self.ttl, self.capacity))),
            other => Err(CacheError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Process-local cache with a fixed time-to-live per entry.
pub struct MemoryDedupCache {
    entries: Cache<String, CachedDevice>,
}

impl MemoryDedupCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
        }
    }
}

#[async_trait]
impl DedupCache for MemoryDedupCache {
    async fn get(&self, uid: &str) -> CacheResult<Option<CachedDevice>> {
        Ok(self.entries.get(uid).await)
    }

    async fn insert(&self, uid: &str, entry: CachedDevice) -> CacheResult<()> {
        self.entries.insert(uid.to_string(), entry).await;
        Ok(())
    }

    async fn invalidate(&self, uid: &str) -> CacheResult<()> {
        self.entries.invalidate(uid).await;
        Ok(())
    }
}
