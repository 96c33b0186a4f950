//! # walblob
//!
//! The write-ahead log blob subsystem of a log-structured key-value
//! engine: a block-fragmented, checksummed append path and a handle-based
//! read path with a shared blob cache and per-column-family index files.
//!
//! ## Features
//!
//! - **Block-based append path**: records are fragmented across fixed
//!   32KB blocks with per-fragment masked CRC32C checksums
//! - **Batch offsets**: the writer reports the absolute offset where a
//!   batch's payload begins, so readers can address it without scanning
//! - **Handle-based reads**: a compact `(offset, length, head CRC,
//!   tail CRC)` handle is enough to rebuild the contiguous payload
//! - **Blob cache**: reconstructed payloads are cached under a
//!   file-unique key and shared across threads
//! - **Per-CF index files**: sorted `(key, value, sequence)` tuples per
//!   column family, served through an ordered iterator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use walblob::{LogHandle, LogWriter, Options, WalBlobReader, WriterHandle};
//!
//! // Append a record and learn where its payload starts.
//! let mut writer = LogWriter::create(&log_path, 1, false, false)?;
//! let mut wh = WriterHandle::new();
//! writer.add_record(payload, 1, Some(&mut wh))?;
//!
//! // Resolve it back through a reader.
//! let handle = LogHandle::from_payload(wh.payload_offset().unwrap(), payload, walblob::HEADER_SIZE);
//! let reader = WalBlobReader::new(src, 1, &Options::default());
//! let blob = reader.get_blob(&handle)?;
//! assert_eq!(&blob[..], payload);
//! ```

// Public modules
pub mod error;
pub mod options;
pub mod types;

// Internal modules
mod cache;
mod env;
mod util;
mod wal;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, DEFAULT_BLOB_CACHE_CAPACITY};
pub use types::{
    pack_sequence_and_type, unpack_sequence_and_type, GetContext, ParsedInternalKey, ValueType,
    MAX_SEQUENCE,
};

// Cache
pub use cache::{Blob, BlobCache, CacheStats, CachedBlob, LruCache};

// File capability seams
pub use env::{FsRandomAccessFile, FsWritableFile, RandomAccessFile, WritableFile, MAX_UNIQUE_ID_SIZE};

// Checksums, comparators, file naming
pub use util::comparator::{BytewiseComparator, Comparator};
pub use util::crc::{crc16, crc32c, crc32c_extend, mask_crc, unmask_crc};
pub use util::filename::{log_file_path, log_index_file_path};

// WAL core
pub use wal::{
    decode_header, encode_header, physical_length, DecodedHeader, LogHandle, LogWriter,
    RecordType, WalBlobIterator, WalBlobReader, WalCfIndex, WalEntry, WalIndexFooter,
    WalIndexWriter, WriterHandle, BLOCK_SIZE, HEADER_SIZE, LOG_HANDLE_SIZE, MAX_RECORD_TYPE,
    RECYCLABLE_HEADER_SIZE, WAL_CF_INDEX_SIZE, WAL_ENTRY_SIZE, WAL_INDEX_FOOTER_SIZE,
};
