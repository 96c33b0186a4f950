//! Write-ahead log blob subsystem.
//!
//! The append path fragments opaque records across fixed 32KB blocks,
//! checksums each fragment, and reports where a batch's payload begins.
//! The read path reverses the fragmenter: given a compact handle
//! `(offset, length, head_crc, tail_crc)` it rebuilds the contiguous
//! payload, validates three independent checksum domains, and caches the
//! result. A per-log index file maps column families to sorted
//! `(key handle, value handle, sequence || type)` tuples.
//!
//! # Record format
//!
//! Each fragment carries a header:
//!
//! ```text
//! legacy (7 bytes):      CRC32C (4) | length (2, LE) | type (1)
//! recyclable (11 bytes): legacy header | log_number low 32 bits (4)
//! ```
//!
//! The stored CRC is a masked CRC32C over `type || [log_number] ||
//! payload`. Records that do not fit the current block are split into
//! FIRST, MIDDLE*, LAST fragments; blocks too short for a header are
//! NUL-padded.

mod blob_reader;
mod handle;
mod index_writer;
mod iterator;
pub mod record;
mod writer;

pub use blob_reader::WalBlobReader;
pub use handle::{
    LogHandle, WalCfIndex, WalEntry, WalIndexFooter, LOG_HANDLE_SIZE, WAL_CF_INDEX_SIZE,
    WAL_ENTRY_SIZE, WAL_INDEX_FOOTER_SIZE,
};
pub use index_writer::WalIndexWriter;
pub use iterator::WalBlobIterator;
pub use record::{decode_header, encode_header, physical_length, DecodedHeader};
pub use writer::{LogWriter, WriterHandle};

/// Block size for the WAL (32KB). Files are a concatenation of blocks;
/// the final block may be short.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Legacy header size: CRC (4) + length (2) + type (1) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Recyclable header size: legacy header + low 32 bits of the log
/// number = 11 bytes.
pub const RECYCLABLE_HEADER_SIZE: usize = 11;

/// Highest valid record type value.
pub const MAX_RECORD_TYPE: u8 = RecordType::RecyclableLast as u8;

/// NUL bytes used to pad a block trailer. Both header sizes must fit in
/// this literal.
pub(crate) const BLOCK_PAD: [u8; RECYCLABLE_HEADER_SIZE] = [0; RECYCLABLE_HEADER_SIZE];

const _: () = assert!(HEADER_SIZE <= BLOCK_PAD.len());
const _: () = assert!(RECYCLABLE_HEADER_SIZE <= BLOCK_PAD.len());

/// Record types for WAL fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Zero is reserved for preallocated files and block padding.
    Zero = 0,
    /// Complete record in a single fragment.
    Full = 1,
    /// First fragment of a record.
    First = 2,
    /// Middle fragment(s) of a record.
    Middle = 3,
    /// Last fragment of a record.
    Last = 4,
    /// Recyclable variant of `Full`.
    RecyclableFull = 5,
    /// Recyclable variant of `First`.
    RecyclableFirst = 6,
    /// Recyclable variant of `Middle`.
    RecyclableMiddle = 7,
    /// Recyclable variant of `Last`.
    RecyclableLast = 8,
}

impl RecordType {
    /// Create from byte value.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordType::Zero),
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            5 => Some(RecordType::RecyclableFull),
            6 => Some(RecordType::RecyclableFirst),
            7 => Some(RecordType::RecyclableMiddle),
            8 => Some(RecordType::RecyclableLast),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether this type carries the recyclable header.
    pub fn is_recyclable(self) -> bool {
        self.to_byte() >= RecordType::RecyclableFull.to_byte()
    }

    /// Header size implied by this record type.
    pub fn header_size(self) -> usize {
        if self.is_recyclable() {
            RECYCLABLE_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }
}
