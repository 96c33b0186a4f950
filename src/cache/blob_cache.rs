//! Blob cache for reconstructed WAL payloads.
//!
//! Caches the contiguous payloads rebuilt by the blob reader so repeated
//! lookups through the same handle hit memory instead of disk.

use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;

use super::lru::{CacheStats, LruCache};

/// A reconstructed, contiguous WAL payload owned by the cache.
pub struct Blob {
    data: Vec<u8>,
}

impl Blob {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The contiguous logical payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Logical payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A borrowed view of a cached [`Blob`].
///
/// Holding a `CachedBlob` keeps the underlying payload alive even if the
/// cache evicts the entry; dropping it releases the pin.
#[derive(Clone)]
pub struct CachedBlob {
    blob: Arc<Blob>,
}

impl CachedBlob {
    fn new(blob: Arc<Blob>) -> Self {
        Self { blob }
    }

    /// The contiguous payload bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.blob.data()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.blob.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}

impl Deref for CachedBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for CachedBlob {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for CachedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedBlob").field("len", &self.len()).finish()
    }
}

/// Capacity-bounded cache of reconstructed payloads.
///
/// Keys are `file unique ID || raw handle bytes`; every entry is charged
/// `size_of::<Blob>()` plus its payload length.
pub struct BlobCache {
    cache: LruCache<Bytes, Arc<Blob>>,
    capacity: usize,
}

impl BlobCache {
    /// Create a blob cache with the given byte capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            capacity,
        }
    }

    /// Look up a cached payload.
    pub fn lookup(&self, key: &Bytes) -> Option<CachedBlob> {
        self.cache.get(key).map(CachedBlob::new)
    }

    /// Insert a payload and return a pinned view of it.
    ///
    /// Concurrent inserts for the same key collapse to the last writer;
    /// earlier borrowers keep their own valid copy.
    pub fn insert(&self, key: Bytes, blob: Blob) -> CachedBlob {
        let charge = mem::size_of::<Blob>() + blob.len();
        let blob = Arc::new(blob);
        self.cache.insert(key, Arc::clone(&blob), charge);
        CachedBlob::new(blob)
    }

    /// Byte capacity of the cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total charge of resident entries.
    pub fn usage(&self) -> usize {
        self.cache.usage()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }
}

impl fmt::Debug for BlobCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCache")
            .field("capacity", &self.capacity)
            .field("usage", &self.usage())
            .field("entries", &self.len())
            .finish()
    }
}
