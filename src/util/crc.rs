//! CRC32C and CRC16 checksum utilities.
//!
//! The WAL format stores CRC32C (Castagnoli) checksums in record headers
//! and index structures, and CRC-16/T10-DIF checksums in log handles.

use crc::{Crc, CRC_16_T10_DIF};

const CRC16_ALG: Crc<u16> = Crc::<u16>::new(&CRC_16_T10_DIF);

/// Delta applied when masking a CRC for storage.
const MASK_DELTA: u32 = 0xa282_ead8;

/// Compute the CRC32C checksum of the given data.
pub fn crc32c(data: &[u8]) -> u32 {
    ::crc32c::crc32c(data)
}

/// Extend an existing CRC32C with more data.
pub fn crc32c_extend(crc: u32, data: &[u8]) -> u32 {
    ::crc32c::crc32c_append(crc, data)
}

/// Compute the CRC16 checksum of the given data.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16_ALG.checksum(data)
}

/// Mask a CRC value for storage.
///
/// Motivation: it is problematic to compute the CRC of a string that
/// contains embedded CRCs, so stored CRCs are rotated and offset.
pub fn mask_crc(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Unmask a masked CRC value.
pub fn unmask_crc(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

/// Verify that data matches an expected masked CRC32C.
pub fn verify_masked_crc(data: &[u8], masked: u32) -> bool {
    crc32c(data) == unmask_crc(masked)
}
