//! Caching for the WAL read path.
//!
//! The blob cache holds payloads reconstructed from fragmented log
//! records. It is the only shared mutable state on the read side and is
//! safe for concurrent use.

mod blob_cache;
mod lru;

pub use blob_cache::{Blob, BlobCache, CachedBlob};
pub use lru::{CacheStats, LruCache};
