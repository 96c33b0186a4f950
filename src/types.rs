//! Core types shared between the WAL writer and read path.

use bytes::Bytes;

use crate::cache::CachedBlob;

/// Maximum sequence number (56 bits).
pub const MAX_SEQUENCE: u64 = (1 << 56) - 1;

/// Value type indicator packed together with the sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// Deletion marker (tombstone).
    Deletion = 0,
    /// Normal value.
    Value = 1,
    /// Merge operand.
    Merge = 2,
}

impl ValueType {
    /// Create from byte value.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            2 => Some(ValueType::Merge),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Pack a sequence number and value type into a single u64.
///
/// The sequence occupies the high 56 bits, the type the low 8.
pub fn pack_sequence_and_type(sequence: u64, value_type: ValueType) -> u64 {
    debug_assert!(sequence <= MAX_SEQUENCE);
    (sequence << 8) | value_type.to_byte() as u64
}

/// Unpack a `(sequence, value_type)` pair from its packed form.
///
/// Returns `None` if the type byte is not a known value type.
pub fn unpack_sequence_and_type(packed: u64) -> Option<(u64, ValueType)> {
    let value_type = ValueType::from_byte((packed & 0xff) as u8)?;
    Some((packed >> 8, value_type))
}

/// A decoded internal key: user key plus versioning metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInternalKey {
    /// The user-provided key.
    pub user_key: Bytes,
    /// Sequence number (version).
    pub sequence: u64,
    /// Value type.
    pub value_type: ValueType,
}

impl ParsedInternalKey {
    /// Create a new parsed internal key.
    pub fn new(user_key: impl Into<Bytes>, sequence: u64, value_type: ValueType) -> Self {
        debug_assert!(sequence <= MAX_SEQUENCE);
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }
}

/// Result sink for point lookups served from the WAL read path.
///
/// `save_value` receives the resolved key and value; returning `false`
/// tells the caller no further candidates are needed.
pub trait GetContext {
    /// Deliver a resolved value. Returns whether the caller should keep
    /// searching other sources.
    fn save_value(
        &mut self,
        key: &ParsedInternalKey,
        value: CachedBlob,
        merge_in_progress: &mut bool,
    ) -> bool;
}
