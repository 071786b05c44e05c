//! Per-user resource cache on top of a key/value backend.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{CacheKey, ResourceKind};
use crate::error::Error;
use crate::storage::KeyValueStore;

/// A cached resource payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub payload: Value,
    pub written_at: DateTime<Utc>,
}

/// Cache-aside layer keyed by `(user_id, kind, id?)`.
///
/// Entries never expire on their own. They stay valid until a consumer
/// invalidates them or the owning user logs out.
#[derive(Clone)]
pub struct ResourceCache {
    backend: Arc<dyn KeyValueStore>,
}

impl ResourceCache {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Look up the full entry for a key. No network access.
    pub async fn entry(
        &self,
        user_id: &str,
        kind: ResourceKind,
        id: Option<&str>,
    ) -> Result<Option<CacheEntry>, Error> {
        let key = CacheKey::new(user_id, kind, id);
        let Some(raw) = self.backend.get(&key.storage_key()).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Look up the payload cached for a key.
    pub async fn read(
        &self,
        user_id: &str,
        kind: ResourceKind,
        id: Option<&str>,
    ) -> Result<Option<Value>, Error> {
        Ok(self
            .entry(user_id, kind, id)
            .await?
            .map(|entry| entry.payload))
    }

    /// Store `payload` under the key, overwriting any previous entry.
    pub async fn write(
        &self,
        user_id: &str,
        kind: ResourceKind,
        id: Option<&str>,
        payload: Value,
    ) -> Result<(), Error> {
        let key = CacheKey::new(user_id, kind, id);
        let entry = CacheEntry {
            payload,
            written_at: Utc::now(),
        };
        self.backend
            .set(&key.storage_key(), serde_json::to_string(&entry)?)
            .await?;
        trace!("Cached {}", key);
        Ok(())
    }

    /// Serve the cached payload, or run `loader`, cache its result and return it.
    ///
    /// Empty results are cached like any other value. A failing loader leaves the
    /// cache untouched.
    pub async fn fetch_or_load<F, Fut>(
        &self,
        user_id: &str,
        kind: ResourceKind,
        id: Option<&str>,
        loader: F,
    ) -> Result<Value, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, Error>>,
    {
        if let Some(payload) = self.read(user_id, kind, id).await? {
            debug!("Cache hit for {}", CacheKey::new(user_id, kind, id));
            return Ok(payload);
        }

        let payload = loader().await?;
        self.write(user_id, kind, id, payload.clone()).await?;
        Ok(payload)
    }

    /// Warm the cache in the background.
    ///
    /// Does nothing if an entry already exists. Loader failures are logged and
    /// dropped. The returned handle may be ignored.
    pub fn prefetch<F, Fut>(&self, user_id: &str, kind: ResourceKind, id: &str, loader: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let cache = self.clone();
        let key = CacheKey::new(user_id, kind, Some(id));

        tokio::spawn(async move {
            let id = key.id.as_deref();
            match cache.read(&key.user_id, key.kind, id).await {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(e) => {
                    warn!("Prefetch lookup failed for {}: {}", key, e);
                    return;
                }
            }

            match loader().await {
                Ok(payload) => {
                    if let Err(e) = cache.write(&key.user_id, key.kind, id, payload).await {
                        warn!("Prefetch failed to cache {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Prefetch failed for {}: {}", key, e),
            }
        })
    }

    /// Drop a single entry.
    pub async fn invalidate(&self, user_id: &str, kind: ResourceKind, id: Option<&str>) -> Result<(), Error> {
        let key = CacheKey::new(user_id, kind, id);
        self.backend.remove(&key.storage_key()).await
    }

    /// Drop every entry owned by `user_id`, leaving other users untouched.
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate_all(&self, user_id: &str) -> Result<usize, Error> {
        let owned: Vec<String> = self
            .backend
            .keys()
            .await?
            .into_iter()
            .filter(|key| CacheKey::belongs_to(key, user_id))
            .collect();

        self.backend.remove_many(&owned).await?;
        debug!("Invalidated {} cache entries for user {}", owned.len(), user_id);
        Ok(owned.len())
    }
}
