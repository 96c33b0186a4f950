//! WAL index file writer.
//!
//! The index file is a sequence of per-CF tuple arrays followed by a
//! directory of [`WalCfIndex`] entries and an 8-byte footer. Readers
//! locate the directory by walking back from the footer.

use std::path::Path;

use crate::env::{FsWritableFile, WritableFile};
use crate::util::crc::crc32c_extend;
use crate::util::filename::log_index_file_path;
use crate::{Error, Result};

use super::handle::{WalCfIndex, WalEntry, WalIndexFooter, WAL_ENTRY_SIZE};

/// Sequential writer of a WAL index file.
pub struct WalIndexWriter {
    /// Destination index file.
    dest: Box<dyn WritableFile>,
    /// Directory entries accumulated by `write_cf`.
    cf_indexes: Vec<WalCfIndex>,
}

impl WalIndexWriter {
    /// Create a writer over an already-open destination file.
    pub fn new(dest: Box<dyn WritableFile>) -> Self {
        Self {
            dest,
            cf_indexes: Vec::new(),
        }
    }

    /// Create the index file paired with log `log_number` in `wal_dir`.
    pub fn create(wal_dir: &Path, log_number: u64) -> Result<Self> {
        let dest = FsWritableFile::create(&log_index_file_path(wal_dir, log_number))?;
        Ok(Self::new(Box::new(dest)))
    }

    /// Append one column family's tuple array.
    ///
    /// `sorted_entries` must be ordered by user key under the engine
    /// comparator; the iterator enforces the order on the way back out.
    pub fn write_cf(&mut self, cf_id: u32, sorted_entries: &[WalEntry]) -> Result<()> {
        let offset = self.dest.file_size();
        debug_assert_eq!(offset % WAL_ENTRY_SIZE as u64, 0);

        let mut crc32 = 0u32;
        for entry in sorted_entries {
            if entry.key_handle.length == 0 {
                return Err(Error::invalid_format("wal entry with empty key handle"));
            }
            let bytes = entry.encode();
            self.dest.append(&bytes)?;
            crc32 = crc32c_extend(crc32, &bytes);
        }

        self.cf_indexes.push(WalCfIndex {
            cf_id,
            offset,
            count: sorted_entries.len() as u64,
            crc32,
        });
        Ok(())
    }

    /// Append the directory and footer, then flush.
    pub fn write_footer(&mut self) -> Result<()> {
        let mut crc32 = 0u32;
        for wci in &self.cf_indexes {
            let bytes = wci.encode();
            self.dest.append(&bytes)?;
            crc32 = crc32c_extend(crc32, &bytes);
        }

        let count = self.cf_indexes.len() as u32;
        let footer = WalIndexFooter {
            count,
            crc32: crc32c_extend(crc32, &count.to_le_bytes()),
        };
        self.dest.append(&footer.encode())?;
        self.dest.flush()
    }

    /// Flush and force bytes to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.dest.sync()
    }
}

impl Drop for WalIndexWriter {
    fn drop(&mut self) {
        let _ = self.dest.flush();
    }
}
