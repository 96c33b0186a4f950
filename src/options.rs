//! Configuration options for walblob.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::BlobCache;
use crate::wal::{HEADER_SIZE, RECYCLABLE_HEADER_SIZE};

/// Default blob cache capacity (8MB).
pub const DEFAULT_BLOB_CACHE_CAPACITY: usize = 8 * 1024 * 1024;

/// WAL subsystem configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding both WAL files and their index files.
    pub wal_dir: PathBuf,

    /// Number of log files kept for recycling.
    ///
    /// A non-zero value makes readers assume the 11-byte recyclable
    /// record header. The writer never emits recyclable records.
    pub recycle_log_file_num: usize,

    /// Suppress the per-record flush on the writer.
    ///
    /// When set, flushing is the caller's responsibility; the writer
    /// still flushes on drop as a safety net.
    pub manual_flush: bool,

    /// Shared cache for reconstructed payloads.
    pub blob_cache: Arc<BlobCache>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("."),
            recycle_log_file_num: 0,
            manual_flush: false,
            blob_cache: Arc::new(BlobCache::new(DEFAULT_BLOB_CACHE_CAPACITY)),
        }
    }
}

impl Options {
    /// The record header size readers of this configuration assume.
    pub fn wal_header_size(&self) -> usize {
        if self.recycle_log_file_num > 0 {
            RECYCLABLE_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }
}
