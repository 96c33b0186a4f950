//! WAL file naming conventions.

use std::path::{Path, PathBuf};

/// Generate a log (WAL) file path.
pub fn log_file_path(wal_dir: &Path, number: u64) -> PathBuf {
    wal_dir.join(format!("{:06}.log", number))
}

/// Generate the path of the index file paired with a log file.
pub fn log_index_file_path(wal_dir: &Path, number: u64) -> PathBuf {
    wal_dir.join(format!("{:06}.walindex", number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_paths() {
        let dir = Path::new("/data/wal");
        assert_eq!(log_file_path(dir, 123), Path::new("/data/wal/000123.log"));
        assert_eq!(
            log_index_file_path(dir, 123),
            Path::new("/data/wal/000123.walindex")
        );
    }

    #[test]
    fn test_paired_files_share_number() {
        let dir = Path::new("/tmp");
        let log = log_file_path(dir, 7);
        let index = log_index_file_path(dir, 7);
        assert_eq!(
            log.file_stem().unwrap().to_str().unwrap(),
            index.file_stem().unwrap().to_str().unwrap()
        );
    }
}
