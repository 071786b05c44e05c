//! Durable client-side key/value storage.
//!
//! Credentials and cached resource payloads are persisted as string values under
//! string keys, so a restarted process picks up where the previous one left off.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Trait for a string key/value backend.
///
/// Implementations must handle concurrent access safely. Writes are
/// unconditional overwrites.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;

    /// List every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Remove several keys at once.
    async fn remove_many(&self, keys: &[String]) -> Result<(), Error> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}
