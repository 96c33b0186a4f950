//! Blob reader: resolves log handles back into contiguous payloads.

use std::fs::File;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::cache::{Blob, BlobCache, CachedBlob};
use crate::env::{self, RandomAccessFile, MAX_UNIQUE_ID_SIZE};
use crate::options::Options;
use crate::types::{GetContext, ParsedInternalKey, ValueType, MAX_SEQUENCE};
use crate::util::comparator::Comparator;
use crate::util::crc::{crc16, crc32c, crc32c_extend, unmask_crc};
use crate::util::filename::log_index_file_path;
use crate::{Error, Result};

use super::handle::{
    head_tail_sizes, LogHandle, WalCfIndex, WalIndexFooter, LOG_HANDLE_SIZE, WAL_CF_INDEX_SIZE,
    WAL_ENTRY_SIZE, WAL_INDEX_FOOTER_SIZE,
};
use super::iterator::WalBlobIterator;
use super::record::{decode_header, physical_length};
use super::{RecordType, BLOCK_SIZE, RECYCLABLE_HEADER_SIZE};

/// Reader over one WAL file and its paired index file.
///
/// `get_blob` may be called from many threads; the blob cache is the
/// only shared mutable state. The index file is mapped lazily on the
/// first per-CF iterator request.
pub struct WalBlobReader {
    /// The log file.
    src: Box<dyn RandomAccessFile>,
    /// Shared cache of reconstructed payloads.
    blob_cache: Arc<BlobCache>,
    /// Record header size assumed for this file.
    wal_header_size: usize,
    /// Log number of this file.
    log_number: u64,
    /// Directory holding the index file.
    wal_dir: std::path::PathBuf,
    /// Lazily mapped index file.
    index: Mutex<Option<Arc<WalIndex>>>,
}

impl WalBlobReader {
    /// Create a reader over an open log file.
    pub fn new(src: Box<dyn RandomAccessFile>, log_number: u64, options: &Options) -> Self {
        Self {
            src,
            blob_cache: Arc::clone(&options.blob_cache),
            wal_header_size: options.wal_header_size(),
            log_number,
            wal_dir: options.wal_dir.clone(),
            index: Mutex::new(None),
        }
    }

    /// Get the log number.
    pub fn log_number(&self) -> u64 {
        self.log_number
    }

    /// The record header size this reader assumes.
    pub fn wal_header_size(&self) -> usize {
        self.wal_header_size
    }

    /// Cache key for a handle: the file's unique ID followed by the raw
    /// handle bytes.
    fn generate_cache_unique_id(&self, raw_handle: &[u8; LOG_HANDLE_SIZE]) -> Bytes {
        let mut prefix = [0u8; MAX_UNIQUE_ID_SIZE];
        let prefix_length = self.src.unique_id(&mut prefix);

        let mut uid = BytesMut::with_capacity(prefix_length + LOG_HANDLE_SIZE);
        uid.put_slice(&prefix[..prefix_length]);
        uid.put_slice(raw_handle);
        uid.freeze()
    }

    /// Resolve a handle to its contiguous payload.
    ///
    /// On a cache miss this issues one positional read of the record's
    /// physical extent, validates the head/tail CRC16 pair and every
    /// interior MIDDLE fragment's CRC32C, compacts the fragments in
    /// place, and inserts the result into the blob cache.
    pub fn get_blob(&self, handle: &LogHandle) -> Result<CachedBlob> {
        let header_size = self.wal_header_size as u64;
        if handle.offset % (BLOCK_SIZE as u64) < header_size {
            return Err(Error::corruption(
                "log handle points into a record header",
            ));
        }

        let raw = handle.encode();
        let uid = self.generate_cache_unique_id(&raw);
        if let Some(blob) = self.blob_cache.lookup(&uid) {
            return Ok(blob);
        }

        let length = handle.length as u64;
        let blob_physical_length = physical_length(length, handle.offset, header_size);
        let (head_size, tail_size) = head_tail_sizes(handle.offset, length, header_size);

        let mut buf = vec![0u8; blob_physical_length as usize];
        let read = self.src.read(handle.offset, &mut buf)?;
        if read != buf.len() {
            return Err(Error::Io(format!(
                "short read: wanted {} bytes at offset {}, got {}",
                buf.len(),
                handle.offset,
                read
            )));
        }

        if head_size > 0 {
            let actual = crc16(&buf[..head_size as usize]);
            if actual != handle.head_crc {
                return Err(Error::CrcMismatch {
                    expected: handle.head_crc as u32,
                    actual: actual as u32,
                });
            }
        }
        if tail_size > 0 {
            let actual = crc16(&buf[buf.len() - tail_size as usize..]);
            if actual != handle.tail_crc {
                return Err(Error::CrcMismatch {
                    expected: handle.tail_crc as u32,
                    actual: actual as u32,
                });
            }
        }
        self.check_middle_fragments(&buf, head_size as usize)?;

        // Cross-block records carry interior headers; squeeze them out
        // so the blob holds exactly `length` contiguous bytes.
        if head_size != length {
            compact_fragments(&mut buf, head_size as usize, self.wal_header_size);
            debug_assert_eq!(buf.len() as u64, length);
        }

        let blob = Blob::new(buf);
        Ok(self.blob_cache.insert(uid, blob))
    }

    /// Validate every interior MIDDLE fragment in the raw physical
    /// buffer: tag and masked CRC32C over `type || [log_number] ||
    /// payload`.
    fn check_middle_fragments(&self, buf: &[u8], head_size: usize) -> Result<()> {
        let middle_type = if self.wal_header_size == RECYCLABLE_HEADER_SIZE {
            RecordType::RecyclableMiddle
        } else {
            RecordType::Middle
        };

        let mut pos = head_size;
        // The final fragment ends the buffer; anything a whole block
        // before that is an interior MIDDLE.
        while pos + BLOCK_SIZE < buf.len() {
            let header = decode_header(&buf[pos..])?;
            if header.record_type != middle_type {
                return Err(Error::corruption(format!(
                    "unexpected fragment type {} in middle scan",
                    header.record_type.to_byte()
                )));
            }

            let crc_end = pos + self.wal_header_size + header.length as usize;
            if crc_end > buf.len() {
                return Err(Error::corruption("middle fragment overruns record"));
            }
            let expected = unmask_crc(header.crc);
            let actual = crc32c(&buf[pos + 6..crc_end]);
            if actual != expected {
                return Err(Error::CrcMismatch { expected, actual });
            }

            pos += BLOCK_SIZE;
        }
        Ok(())
    }

    /// Resolve a handle and hand the value to a point-lookup sink.
    ///
    /// The raw handle bytes stand in for the user key; the sink is
    /// expected to consume the value and stop.
    pub fn get_from_handle(
        &self,
        handle: &LogHandle,
        get_context: &mut dyn GetContext,
    ) -> Result<()> {
        let value = self.get_blob(handle)?;
        let ikey = ParsedInternalKey::new(
            Bytes::copy_from_slice(&handle.encode()),
            MAX_SEQUENCE,
            ValueType::Value,
        );
        let mut merge_in_progress = false;
        let read_more = get_context.save_value(&ikey, value, &mut merge_in_progress);
        debug_assert!(!read_more);
        Ok(())
    }

    /// Create an iterator over one column family's index tuples.
    ///
    /// The index file is mapped on first use and shared by all
    /// iterators. A missing `cf_id` yields an empty iterator only when
    /// the directory itself is empty.
    pub fn new_iterator_with_cf(
        &self,
        cf_id: u32,
        comparator: Arc<dyn Comparator>,
    ) -> Result<WalBlobIterator<'_>> {
        let index = self.index_data()?;

        let (cf_offset, cf_count) = match index.find_cf(cf_id) {
            Some(wci) => {
                index.verify_cf_tuples(&wci)?;
                (wci.offset, wci.count)
            }
            None if index.cf_count() == 0 => (0, 0),
            None => {
                return Err(Error::corruption(format!(
                    "column family {} not in wal index",
                    cf_id
                )))
            }
        };
        debug_assert_eq!(cf_offset % WAL_ENTRY_SIZE as u64, 0);

        Ok(WalBlobIterator::new(
            self, index, comparator, cf_offset, cf_count,
        ))
    }

    /// Map the index file, validating its size and footer chain.
    fn index_data(&self) -> Result<Arc<WalIndex>> {
        let mut guard = self.index.lock();
        if let Some(index) = guard.as_ref() {
            return Ok(Arc::clone(index));
        }

        let path = log_index_file_path(&self.wal_dir, self.log_number);
        let file_size = env::file_size(&path)?;
        let file = File::open(&path)?;
        // The index is always read through a shared mapping.
        let map = unsafe { Mmap::map(&file)? };
        if map.len() as u64 != file_size || map.len() < WAL_INDEX_FOOTER_SIZE {
            return Err(Error::Io("Invalid file size".into()));
        }

        let index = Arc::new(WalIndex::parse(map)?);
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }
}

/// A mapped, footer-validated WAL index file.
pub(crate) struct WalIndex {
    map: Mmap,
    /// Byte offset of the directory (CF entry array).
    dir_offset: usize,
    /// Number of directory entries.
    count: u32,
}

impl WalIndex {
    /// Parse and validate the directory from a mapped index file.
    fn parse(map: Mmap) -> Result<Self> {
        let footer = WalIndexFooter::decode(&map[map.len() - WAL_INDEX_FOOTER_SIZE..])?;

        let dir_size = footer.count as usize * WAL_CF_INDEX_SIZE;
        let Some(dir_offset) = map
            .len()
            .checked_sub(WAL_INDEX_FOOTER_SIZE + dir_size)
        else {
            return Err(Error::corruption("wal index directory truncated"));
        };

        // The footer CRC chains over the directory bytes and the count.
        let crc = crc32c(&map[dir_offset..dir_offset + dir_size]);
        let crc = crc32c_extend(crc, &footer.count.to_le_bytes());
        if crc != footer.crc32 {
            return Err(Error::CrcMismatch {
                expected: footer.crc32,
                actual: crc,
            });
        }

        Ok(Self {
            map,
            dir_offset,
            count: footer.count,
        })
    }

    /// All mapped bytes of the index file.
    pub(crate) fn data(&self) -> &[u8] {
        &self.map
    }

    /// Number of directory entries.
    fn cf_count(&self) -> u32 {
        self.count
    }

    /// Resolve a column family by linear scan, in insertion order.
    fn find_cf(&self, cf_id: u32) -> Option<WalCfIndex> {
        for i in 0..self.count as usize {
            let at = self.dir_offset + i * WAL_CF_INDEX_SIZE;
            let wci = WalCfIndex::decode(&self.map[at..at + WAL_CF_INDEX_SIZE]).ok()?;
            if wci.cf_id == cf_id {
                return Some(wci);
            }
        }
        None
    }

    /// Check a column family's tuple array against its directory CRC.
    fn verify_cf_tuples(&self, wci: &WalCfIndex) -> Result<()> {
        let start = wci.offset as usize;
        let len = wci.count as usize * WAL_ENTRY_SIZE;
        let Some(end) = start.checked_add(len) else {
            return Err(Error::corruption("cf tuple array overruns index file"));
        };
        if end > self.dir_offset {
            return Err(Error::corruption("cf tuple array overruns index file"));
        }

        let actual = crc32c(&self.map[start..end]);
        if actual != wci.crc32 {
            return Err(Error::CrcMismatch {
                expected: wci.crc32,
                actual,
            });
        }
        Ok(())
    }
}

/// Shift every post-head fragment's payload left over its header so the
/// buffer holds the contiguous logical bytes, then drop the slack.
///
/// A single left-to-right pass is enough: each destination range starts
/// at or before its source range.
fn compact_fragments(buf: &mut Vec<u8>, head_size: usize, header_size: usize) {
    let mut write = head_size;
    let mut read = head_size;
    while read < buf.len() {
        let chunk = (buf.len() - read).min(BLOCK_SIZE);
        let payload = chunk - header_size;
        buf.copy_within(read + header_size..read + chunk, write);
        write += payload;
        read += chunk;
    }
    buf.truncate(write);
}
