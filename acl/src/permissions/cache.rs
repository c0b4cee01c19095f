//! Permission Cache
//!
//! Read-through cache of the full permission set (each permission with its
//! roles) under a single key. Any mutation of roles, permissions or their
//! grants drops the whole entry; the next read reloads it.
//!
//! A generation counter is bumped on every invalidation. A load that started
//! before an invalidation is not written back, and one whose write raced an
//! invalidation is dropped again once the write returns. Readers starting
//! after that reload from the backing store.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use fred::prelude::*;
use tracing::{debug, warn};

use super::error::AclResult;
use super::models::{PermissionSnapshot, PermissionWithRoles};
use super::store::AclStore;

/// Default cache key for the permission snapshot.
pub const CACHE_KEY: &str = "acl:permissions";

/// Shared cache store holding permission snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AclResult<Option<Arc<PermissionSnapshot>>>;
    async fn put(&self, key: &str, snapshot: Arc<PermissionSnapshot>, ttl: Duration)
        -> AclResult<()>;
    async fn forget(&self, key: &str) -> AclResult<()>;
}

/// Cached snapshot paired with its expiry.
struct CachedSnapshot {
    snapshot: Arc<PermissionSnapshot>,
    expires_at: Instant,
}

/// Process-local cache store.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CachedSnapshot>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> AclResult<Option<Arc<PermissionSnapshot>>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(Arc::clone(&entry.snapshot)));
            }
        }

        // Expired entries are dropped on read
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        snapshot: Arc<PermissionSnapshot>,
        ttl: Duration,
    ) -> AclResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }

        self.entries.insert(
            key.to_string(),
            CachedSnapshot {
                snapshot,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn forget(&self, key: &str) -> AclResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed cache store, shared by every process using the same server.
///
/// Snapshots are stored as JSON with an `EX` expiry.
pub struct RedisCacheStore {
    redis: Client,
}

impl RedisCacheStore {
    pub const fn new(redis: Client) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AclResult<Option<Arc<PermissionSnapshot>>> {
        let raw: Option<String> = self.redis.get(key).await?;
        match raw {
            Some(json) => Ok(Some(Arc::new(serde_json::from_str(&json)?))),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        snapshot: Arc<PermissionSnapshot>,
        ttl: Duration,
    ) -> AclResult<()> {
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        if secs == 0 {
            return Ok(());
        }

        let json = serde_json::to_string(snapshot.as_ref())?;
        let _: () = self
            .redis
            .set(key, json, Some(Expiration::EX(secs)), None, false)
            .await?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> AclResult<()> {
        let _: () = self.redis.del(key).await?;
        Ok(())
    }
}

/// Read-through cache of the permission snapshot.
pub struct PermissionCache {
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
    /// Incremented on invalidation so in-flight loads from stale data are
    /// discarded instead of cached.
    generation: AtomicU64,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn CacheStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached snapshot, loading it from `source` on a miss.
    pub async fn remember(&self, source: &dyn AclStore) -> AclResult<Arc<PermissionSnapshot>> {
        self.remember_with(|| source.load_permissions_with_roles())
            .await
    }

    /// Return the cached snapshot, calling `supplier` on a miss and caching
    /// its result for the configured TTL.
    #[tracing::instrument(skip(self, supplier), fields(key = %self.key))]
    pub async fn remember_with<F, Fut>(&self, supplier: F) -> AclResult<Arc<PermissionSnapshot>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AclResult<Vec<PermissionWithRoles>>> + Send,
    {
        // Fast path: snapshot already cached
        if let Some(snapshot) = self.store.get(&self.key).await? {
            return Ok(snapshot);
        }

        // Capture generation before reading the backing store
        let gen_before = self.generation.load(Ordering::Acquire);

        let snapshot = Arc::new(PermissionSnapshot::new(supplier().await?));
        debug!(permissions = snapshot.len(), "Loaded permission snapshot");

        // Only publish if no invalidation happened since we started
        if self.generation.load(Ordering::Acquire) != gen_before {
            warn!("Permission snapshot invalidated during load, not caching it");
            return Ok(snapshot);
        }

        self.store
            .put(&self.key, Arc::clone(&snapshot), self.ttl)
            .await?;

        // An invalidation may have completed while the write was in flight
        if self.generation.load(Ordering::Acquire) != gen_before {
            warn!("Permission snapshot invalidated during write, dropping it");
            self.store.forget(&self.key).await?;
        }

        Ok(snapshot)
    }

    /// Drop the cached snapshot. The next [`Self::remember`] reloads it.
    pub async fn invalidate(&self) -> AclResult<()> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.store.forget(&self.key).await?;
        debug!(key = %self.key, "Permission cache invalidated");
        Ok(())
    }
}
