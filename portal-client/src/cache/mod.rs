//! Cache-aside layer for read-mostly resources, namespaced per user.

mod key;
mod resource_cache;

pub use key::{CacheKey, ResourceKind};
pub use resource_cache::{CacheEntry, ResourceCache};
