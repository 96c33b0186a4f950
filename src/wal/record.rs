//! Fragment header codec and physical sizing.
//!
//! Pure functions over the on-disk fragment format; the writer and blob
//! reader both defer to the layout rules here.

use crate::util::coding::{read_fixed16, read_fixed32, write_fixed16, write_fixed32};
use crate::util::crc::{crc32c, crc32c_extend, mask_crc};
use crate::{Error, Result};

use super::{RecordType, BLOCK_SIZE, HEADER_SIZE, RECYCLABLE_HEADER_SIZE};

/// A decoded fragment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    /// Fragment tag.
    pub record_type: RecordType,
    /// Payload length of this fragment.
    pub length: u16,
    /// Low 32 bits of the log number (recyclable headers only).
    pub log_number: Option<u32>,
    /// Stored (masked) CRC32C.
    pub crc: u32,
}

impl DecodedHeader {
    /// Header size of the decoded variant.
    pub fn header_size(&self) -> usize {
        self.record_type.header_size()
    }
}

/// Encode a fragment header for the given payload.
///
/// Returns the header buffer and the number of valid bytes in it
/// (7 for legacy types, 11 for recyclable types). The stored CRC is the
/// masked CRC32C over `type || [log_number] || payload`.
pub fn encode_header(
    record_type: RecordType,
    payload: &[u8],
    log_number: u32,
) -> ([u8; RECYCLABLE_HEADER_SIZE], usize) {
    debug_assert!(payload.len() <= 0xffff);

    let mut buf = [0u8; RECYCLABLE_HEADER_SIZE];
    write_fixed16(&mut buf[4..], payload.len() as u16);
    buf[6] = record_type.to_byte();

    let mut crc = crc32c(&buf[6..7]);
    let header_size = record_type.header_size();
    if record_type.is_recyclable() {
        write_fixed32(&mut buf[7..], log_number);
        crc = crc32c_extend(crc, &buf[7..11]);
    }
    crc = crc32c_extend(crc, payload);
    write_fixed32(&mut buf, mask_crc(crc));

    (buf, header_size)
}

/// Decode a fragment header.
///
/// The header variant is inferred from the type byte; recyclable types
/// yield a `log_number`. The CRC is returned still masked and is not
/// verified here.
pub fn decode_header(data: &[u8]) -> Result<DecodedHeader> {
    if data.len() < HEADER_SIZE {
        return Err(Error::invalid_format("record header truncated"));
    }

    let crc = read_fixed32(data).expect("length checked");
    let length = read_fixed16(&data[4..]).expect("length checked");
    let record_type = RecordType::from_byte(data[6])
        .ok_or_else(|| Error::corruption(format!("invalid record type: {}", data[6])))?;

    let log_number = if record_type.is_recyclable() {
        if data.len() < RECYCLABLE_HEADER_SIZE {
            return Err(Error::invalid_format("recyclable record header truncated"));
        }
        Some(read_fixed32(&data[7..]).expect("length checked"))
    } else {
        None
    };

    Ok(DecodedHeader {
        record_type,
        length,
        log_number,
        crc,
    })
}

/// Number of bytes the fragmented form of a record occupies on disk.
///
/// `offset` is the file position of the first payload byte (past the
/// first fragment's header). A record that fits the starting block is
/// stored verbatim; otherwise every further block contributes one header
/// and the final block only as many bytes as the tail needs.
pub fn physical_length(logical_length: u64, offset: u64, header_size: u64) -> u64 {
    let avail_first = BLOCK_SIZE as u64 - offset % BLOCK_SIZE as u64;
    if logical_length <= avail_first {
        return logical_length;
    }

    let rest = logical_length - avail_first;
    let per_block = BLOCK_SIZE as u64 - header_size;
    let full = rest / per_block;
    let tail = rest % per_block;

    avail_first
        + full * BLOCK_SIZE as u64
        + if tail == 0 { 0 } else { header_size + tail }
}
