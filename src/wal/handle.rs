//! Fixed-width on-disk entities: log handles and index structs.
//!
//! All layouts are packed little-endian with no alignment padding and
//! are decoded through explicit byte loads.

use crate::util::coding::{
    read_fixed16, read_fixed32, read_fixed64, write_fixed16, write_fixed32, write_fixed64,
};
use crate::util::crc::crc16;
use crate::{Error, Result};

use super::record::physical_length;
use super::BLOCK_SIZE;

/// Encoded size of a [`LogHandle`].
pub const LOG_HANDLE_SIZE: usize = 16;

/// Encoded size of a [`WalEntry`]: two handles plus the packed
/// sequence/type word.
pub const WAL_ENTRY_SIZE: usize = 2 * LOG_HANDLE_SIZE + 8;

/// Encoded size of a [`WalCfIndex`].
pub const WAL_CF_INDEX_SIZE: usize = 24;

/// Encoded size of a [`WalIndexFooter`].
pub const WAL_INDEX_FOOTER_SIZE: usize = 8;

/// Self-describing pointer into one log file.
///
/// `offset` addresses the first payload byte of the record's first
/// fragment, past that fragment's header. The two CRC16 fields cover the
/// leading and trailing partial-block spans of the reconstructed
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHandle {
    /// Absolute file offset of the first payload byte.
    pub offset: u64,
    /// Logical payload length (sum over all fragments).
    pub length: u32,
    /// CRC16 over the first `head_size` payload bytes.
    pub head_crc: u16,
    /// CRC16 over the last `tail_size` payload bytes.
    pub tail_crc: u16,
}

impl LogHandle {
    /// Create a handle for a payload written at `offset`, computing the
    /// head and tail checksums the way the read path will verify them.
    pub fn from_payload(offset: u64, payload: &[u8], header_size: usize) -> Self {
        let length = payload.len() as u64;
        let (head_size, tail_size) = head_tail_sizes(offset, length, header_size as u64);
        let head_crc = if head_size > 0 {
            crc16(&payload[..head_size as usize])
        } else {
            0
        };
        let tail_crc = if tail_size > 0 {
            crc16(&payload[payload.len() - tail_size as usize..])
        } else {
            0
        };
        Self {
            offset,
            length: length as u32,
            head_crc,
            tail_crc,
        }
    }

    /// Encode into the packed 16-byte form.
    pub fn encode(&self) -> [u8; LOG_HANDLE_SIZE] {
        let mut buf = [0u8; LOG_HANDLE_SIZE];
        write_fixed64(&mut buf, self.offset);
        write_fixed32(&mut buf[8..], self.length);
        write_fixed16(&mut buf[12..], self.head_crc);
        write_fixed16(&mut buf[14..], self.tail_crc);
        buf
    }

    /// Decode from the packed form.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < LOG_HANDLE_SIZE {
            return Err(Error::invalid_format("log handle truncated"));
        }
        Ok(Self {
            offset: read_fixed64(data).expect("length checked"),
            length: read_fixed32(&data[8..]).expect("length checked"),
            head_crc: read_fixed16(&data[12..]).expect("length checked"),
            tail_crc: read_fixed16(&data[14..]).expect("length checked"),
        })
    }
}

/// Head and tail span sizes of a payload at `offset`, as defined by the
/// fragmenter: the head runs to the end of the starting block when the
/// record spans blocks, and the tail is the final partial per-block
/// remainder.
pub(crate) fn head_tail_sizes(offset: u64, length: u64, header_size: u64) -> (u64, u64) {
    if physical_length(length, offset, header_size) <= length {
        return (length, 0);
    }
    let head = BLOCK_SIZE as u64 - offset % BLOCK_SIZE as u64;
    let tail = (length - head) % (BLOCK_SIZE as u64 - header_size);
    (head, tail)
}

/// One index tuple: where a key and its value live in the log, plus the
/// packed sequence/type word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalEntry {
    /// Handle of the user key bytes.
    pub key_handle: LogHandle,
    /// Handle of the value bytes.
    pub value_handle: LogHandle,
    /// `(sequence << 8) | value_type`.
    pub packed_seq_type: u64,
}

impl WalEntry {
    /// Create a new tuple.
    pub fn new(key_handle: LogHandle, value_handle: LogHandle, packed_seq_type: u64) -> Self {
        Self {
            key_handle,
            value_handle,
            packed_seq_type,
        }
    }

    /// Encode into the packed 40-byte form.
    pub fn encode(&self) -> [u8; WAL_ENTRY_SIZE] {
        let mut buf = [0u8; WAL_ENTRY_SIZE];
        buf[..LOG_HANDLE_SIZE].copy_from_slice(&self.key_handle.encode());
        buf[LOG_HANDLE_SIZE..2 * LOG_HANDLE_SIZE].copy_from_slice(&self.value_handle.encode());
        write_fixed64(&mut buf[2 * LOG_HANDLE_SIZE..], self.packed_seq_type);
        buf
    }

    /// Decode from the packed form.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < WAL_ENTRY_SIZE {
            return Err(Error::invalid_format("wal entry truncated"));
        }
        Ok(Self {
            key_handle: LogHandle::decode(data)?,
            value_handle: LogHandle::decode(&data[LOG_HANDLE_SIZE..])?,
            packed_seq_type: read_fixed64(&data[2 * LOG_HANDLE_SIZE..]).expect("length checked"),
        })
    }
}

/// Directory entry locating one column family's tuple array inside the
/// index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalCfIndex {
    /// Column family identifier.
    pub cf_id: u32,
    /// Byte offset of the tuple array inside the index file.
    pub offset: u64,
    /// Number of tuples in the array.
    pub count: u64,
    /// CRC32C over the tuple array bytes.
    pub crc32: u32,
}

impl WalCfIndex {
    /// Encode into the packed 24-byte form.
    pub fn encode(&self) -> [u8; WAL_CF_INDEX_SIZE] {
        let mut buf = [0u8; WAL_CF_INDEX_SIZE];
        write_fixed32(&mut buf, self.cf_id);
        write_fixed64(&mut buf[4..], self.offset);
        write_fixed64(&mut buf[12..], self.count);
        write_fixed32(&mut buf[20..], self.crc32);
        buf
    }

    /// Decode from the packed form.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < WAL_CF_INDEX_SIZE {
            return Err(Error::invalid_format("cf index entry truncated"));
        }
        Ok(Self {
            cf_id: read_fixed32(data).expect("length checked"),
            offset: read_fixed64(&data[4..]).expect("length checked"),
            count: read_fixed64(&data[12..]).expect("length checked"),
            crc32: read_fixed32(&data[20..]).expect("length checked"),
        })
    }
}

/// Footer at the end of the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalIndexFooter {
    /// Number of directory entries preceding the footer.
    pub count: u32,
    /// CRC32C chained over the directory entries and `count`.
    pub crc32: u32,
}

impl WalIndexFooter {
    /// Encode into the packed 8-byte form.
    pub fn encode(&self) -> [u8; WAL_INDEX_FOOTER_SIZE] {
        let mut buf = [0u8; WAL_INDEX_FOOTER_SIZE];
        write_fixed32(&mut buf, self.count);
        write_fixed32(&mut buf[4..], self.crc32);
        buf
    }

    /// Decode from the packed form.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < WAL_INDEX_FOOTER_SIZE {
            return Err(Error::invalid_format("index footer truncated"));
        }
        Ok(Self {
            count: read_fixed32(data).expect("length checked"),
            crc32: read_fixed32(&data[4..]).expect("length checked"),
        })
    }
}
