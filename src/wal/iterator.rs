//! Ordered iteration over one column family's index tuples.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::CachedBlob;
use crate::types::{unpack_sequence_and_type, ParsedInternalKey, ValueType};
use crate::util::comparator::Comparator;
use crate::{Error, Result};

use super::blob_reader::{WalBlobReader, WalIndex};
use super::handle::{WalEntry, WAL_ENTRY_SIZE};

/// Iterator over a column family's `(key, value, sequence, type)` tuples.
///
/// Each step resolves the key and value handles through the reader's
/// blob path, so yielded slices are backed by the blob cache. The
/// iterator borrows its reader and cannot outlive it.
pub struct WalBlobIterator<'r> {
    reader: &'r WalBlobReader,
    index: Arc<WalIndex>,
    comparator: Arc<dyn Comparator>,
    /// Byte offset of the tuple array inside the index file.
    cf_offset: u64,
    /// Number of tuples.
    cf_count: u64,
    /// Cursor in `[0, cf_count]`.
    i: u64,
    /// Previous key, for sort enforcement.
    last_key: Vec<u8>,
    key: Option<CachedBlob>,
    value: Option<CachedBlob>,
    sequence: u64,
    value_type: ValueType,
}

impl<'r> std::fmt::Debug for WalBlobIterator<'r> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalBlobIterator")
            .field("cf_offset", &self.cf_offset)
            .field("cf_count", &self.cf_count)
            .field("i", &self.i)
            .field("sequence", &self.sequence)
            .field("value_type", &self.value_type)
            .finish()
    }
}

impl<'r> WalBlobIterator<'r> {
    pub(crate) fn new(
        reader: &'r WalBlobReader,
        index: Arc<WalIndex>,
        comparator: Arc<dyn Comparator>,
        cf_offset: u64,
        cf_count: u64,
    ) -> Self {
        Self {
            reader,
            index,
            comparator,
            cf_offset,
            cf_count,
            i: cf_count,
            last_key: Vec::new(),
            key: None,
            value: None,
            sequence: 0,
            value_type: ValueType::Value,
        }
    }

    /// Whether the cursor points at a tuple.
    pub fn valid(&self) -> bool {
        self.i < self.cf_count
    }

    /// Position at the first tuple.
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.i = 0;
        self.last_key.clear();
        if self.valid() {
            self.fetch()?;
            self.remember_key();
        }
        Ok(())
    }

    /// Advance to the next tuple, enforcing strictly increasing keys.
    pub fn next(&mut self) -> Result<()> {
        self.i += 1;
        if self.valid() {
            self.fetch()?;
            let key = self.key.as_ref().map(|k| k.as_slice()).unwrap_or(&[]);
            if !self.last_key.is_empty()
                && self.comparator.compare(key, &self.last_key) != std::cmp::Ordering::Greater
            {
                return Err(Error::corruption("wal index keys out of order"));
            }
            self.remember_key();
        }
        Ok(())
    }

    /// The current user key.
    pub fn key(&self) -> &[u8] {
        self.key.as_ref().map(|k| k.as_slice()).unwrap_or(&[])
    }

    /// The current value.
    pub fn value(&self) -> &[u8] {
        self.value.as_ref().map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Sequence number of the current tuple.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Value type of the current tuple.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The current key with its versioning metadata.
    pub fn parsed_internal_key(&self) -> ParsedInternalKey {
        ParsedInternalKey::new(
            Bytes::copy_from_slice(self.key()),
            self.sequence,
            self.value_type,
        )
    }

    /// Decode the tuple under the cursor and resolve both handles.
    fn fetch(&mut self) -> Result<()> {
        let base = (self.cf_offset + self.i * WAL_ENTRY_SIZE as u64) as usize;
        let data = self.index.data();
        if base + WAL_ENTRY_SIZE > data.len() {
            return Err(Error::corruption("wal entry outside index file"));
        }
        let entry = WalEntry::decode(&data[base..base + WAL_ENTRY_SIZE])?;

        let (sequence, value_type) = unpack_sequence_and_type(entry.packed_seq_type)
            .ok_or_else(|| Error::corruption("invalid value type in wal entry"))?;
        if !matches!(value_type, ValueType::Value | ValueType::Merge) {
            return Err(Error::corruption(format!(
                "unexpected value type {} in wal entry",
                value_type.to_byte()
            )));
        }

        // Keys are stored without a length prefix; the handle points at
        // the raw user key bytes.
        let key = self.reader.get_blob(&entry.key_handle)?;
        if key.is_empty() {
            return Err(Error::corruption("empty key in wal entry"));
        }
        let value = self.reader.get_blob(&entry.value_handle)?;

        self.sequence = sequence;
        self.value_type = value_type;
        self.key = Some(key);
        self.value = Some(value);
        Ok(())
    }

    fn remember_key(&mut self) {
        let key = self.key.as_ref().map(|k| k.as_slice()).unwrap_or(&[]);
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
    }
}
