//! File system capability seams.
//!
//! The WAL core is polymorphic over an append-only file and a
//! random-access file rather than touching `std::fs` directly, so tests
//! and the embedding engine can substitute their own implementations.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{Error, Result};

/// Maximum number of bytes a file's unique ID may occupy in a cache key.
pub const MAX_UNIQUE_ID_SIZE: usize = 24;

/// An append-only file.
pub trait WritableFile: Send {
    /// Append bytes at the end of the file.
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Flush buffered bytes to the OS.
    fn flush(&mut self) -> Result<()>;

    /// Flush and force bytes to stable storage.
    fn sync(&mut self) -> Result<()>;

    /// Logical size of the file, including buffered bytes.
    fn file_size(&self) -> u64;
}

/// A file supporting positional reads from multiple threads.
pub trait RandomAccessFile: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is smaller than the
    /// buffer only at end of file.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write a unique identifier for this file into `out`.
    ///
    /// Returns the number of bytes written (at most
    /// [`MAX_UNIQUE_ID_SIZE`]). The ID is stable for the life of the
    /// open file but need not survive renames.
    fn unique_id(&self, out: &mut [u8]) -> usize;
}

/// Get the size of a file on disk.
pub fn file_size(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

/// Buffered append-only file backed by `std::fs::File`.
pub struct FsWritableFile {
    writer: BufWriter<File>,
    size: u64,
}

impl FsWritableFile {
    /// Buffer capacity for appends.
    const BUFFER_CAPACITY: usize = 64 * 1024;

    /// Create (truncating) a writable file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::with_capacity(Self::BUFFER_CAPACITY, file),
            size: 0,
        })
    }
}

impl WritableFile for FsWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn file_size(&self) -> u64 {
        self.size
    }
}

/// Random-access file backed by `std::fs::File`.
pub struct FsRandomAccessFile {
    file: File,
    id: [u8; 16],
    id_len: usize,
}

impl FsRandomAccessFile {
    /// Open a file for positional reads.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let (id, id_len) = Self::file_id(&file)?;
        Ok(Self { file, id, id_len })
    }

    #[cfg(unix)]
    fn file_id(file: &File) -> Result<([u8; 16], usize)> {
        use std::os::unix::fs::MetadataExt;
        let meta = file.metadata()?;
        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&meta.dev().to_le_bytes());
        id[8..].copy_from_slice(&meta.ino().to_le_bytes());
        Ok((id, 16))
    }

    #[cfg(not(unix))]
    fn file_id(_file: &File) -> Result<([u8; 16], usize)> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&NEXT_ID.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        Ok((id, 8))
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

impl RandomAccessFile for FsRandomAccessFile {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_at(offset + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            }
        }
        Ok(filled)
    }

    fn unique_id(&self, out: &mut [u8]) -> usize {
        let n = self.id_len.min(out.len());
        out[..n].copy_from_slice(&self.id[..n]);
        n
    }
}
