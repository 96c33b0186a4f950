//! Integration tests for the complete WAL blob workflow.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use walblob::{
    encode_header, log_file_path, physical_length, BytewiseComparator, CachedBlob, Error,
    FsRandomAccessFile, GetContext, LogHandle, LogWriter, Options, ParsedInternalKey, RecordType,
    ValueType, WalBlobReader, WalEntry, WalIndexWriter, WriterHandle, BLOCK_SIZE, HEADER_SIZE,
    MAX_SEQUENCE, RECYCLABLE_HEADER_SIZE,
};

fn test_options(dir: &Path) -> Options {
    Options {
        wal_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn open_reader(dir: &Path, log_number: u64, options: &Options) -> WalBlobReader {
    let src = FsRandomAccessFile::open(&log_file_path(dir, log_number)).unwrap();
    WalBlobReader::new(Box::new(src), log_number, options)
}

/// Write one record and build the handle a reader needs to resolve it.
fn write_record(writer: &mut LogWriter, payload: &[u8]) -> LogHandle {
    let mut wh = WriterHandle::new();
    writer.add_record(payload, 1, Some(&mut wh)).unwrap();
    LogHandle::from_payload(wh.payload_offset().unwrap(), payload, HEADER_SIZE)
}

/// A zero-length record is a lone 7-byte FULL header.
#[test]
fn integration_zero_length_record() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let handle = write_record(&mut writer, b"");
    assert_eq!(writer.block_offset(), HEADER_SIZE);
    assert_eq!(writer.file_size(), HEADER_SIZE as u64);
    writer.sync().unwrap();
    drop(writer);

    let reader = open_reader(dir.path(), 1, &options);
    let blob = reader.get_blob(&handle).unwrap();
    assert!(blob.is_empty());
}

/// A 100-byte record in a fresh file: handle fields are fully
/// predictable and the payload reads back verbatim.
#[test]
fn integration_single_block_record() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let payload: Vec<u8> = (0..100).map(|i| (i * 7 % 256) as u8).collect();
    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let handle = write_record(&mut writer, &payload);
    writer.sync().unwrap();
    drop(writer);

    assert_eq!(handle.offset, 7);
    assert_eq!(handle.length, 100);
    assert_eq!(handle.head_crc, walblob::crc16(&payload));
    assert_eq!(handle.tail_crc, 0);

    let reader = open_reader(dir.path(), 1, &options);
    let blob = reader.get_blob(&handle).unwrap();
    assert_eq!(&blob[..], &payload[..]);
}

/// A record written when the current block cannot hold another header:
/// the writer NUL-pads the trailer and the record spans two blocks.
#[test]
fn integration_two_block_record_after_trailer() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();

    // Leave 5 bytes in block 0: too small for a 7-byte header.
    writer
        .add_record(&vec![0xaau8; BLOCK_SIZE - HEADER_SIZE - 5], 1, None)
        .unwrap();
    assert_eq!(writer.block_offset(), BLOCK_SIZE - 5);

    let payload: Vec<u8> = (0..(BLOCK_SIZE - HEADER_SIZE) + 42)
        .map(|i| (i % 256) as u8)
        .collect();
    let handle = write_record(&mut writer, &payload);
    writer.sync().unwrap();
    drop(writer);

    // The record begins at offset 7 of block 1, past the padded trailer.
    assert_eq!(handle.offset, BLOCK_SIZE as u64 + HEADER_SIZE as u64);
    assert_eq!(
        physical_length(payload.len() as u64, handle.offset, HEADER_SIZE as u64),
        (BLOCK_SIZE - HEADER_SIZE) as u64 + HEADER_SIZE as u64 + 42
    );

    // On-disk tags: FIRST fills block 1, LAST carries the 42-byte tail.
    let data = std::fs::read(log_file_path(dir.path(), 1)).unwrap();
    assert_eq!(&data[BLOCK_SIZE - 5..BLOCK_SIZE], &[0u8; 5]);
    assert_eq!(data[BLOCK_SIZE + 6], RecordType::First.to_byte());
    assert_eq!(data[2 * BLOCK_SIZE + 6], RecordType::Last.to_byte());

    let reader = open_reader(dir.path(), 1, &options);
    let blob = reader.get_blob(&handle).unwrap();
    assert_eq!(&blob[..], &payload[..]);
}

/// A record spanning four fragments; the interior MIDDLE checksums must
/// validate during reconstruction.
#[test]
fn integration_multi_block_record() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let per_block = BLOCK_SIZE - HEADER_SIZE;
    let payload: Vec<u8> = (0..3 * per_block + 5).map(|i| (i * 13 % 256) as u8).collect();

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let handle = write_record(&mut writer, &payload);
    writer.sync().unwrap();
    drop(writer);

    let reader = open_reader(dir.path(), 1, &options);
    let blob = reader.get_blob(&handle).unwrap();
    assert_eq!(blob.len(), payload.len());
    assert_eq!(&blob[..], &payload[..]);
}

/// Flipping any payload byte of a multi-block record fails the read
/// with a CRC error, wherever the byte lands.
#[test]
fn integration_corruption_detected() {
    let per_block = BLOCK_SIZE - HEADER_SIZE;
    let payload: Vec<u8> = (0..3 * per_block + 5).map(|i| (i % 256) as u8).collect();

    // One probe per checksum domain: head, first middle, second middle,
    // tail.
    let probes = [
        HEADER_SIZE + 100,
        BLOCK_SIZE + HEADER_SIZE + 100,
        2 * BLOCK_SIZE + HEADER_SIZE + 100,
        3 * BLOCK_SIZE + HEADER_SIZE + 2,
    ];

    for &probe in &probes {
        let dir = TempDir::new().unwrap();
        let options = test_options(dir.path());
        let log_path = log_file_path(dir.path(), 1);

        let mut writer = LogWriter::create(&log_path, 1, false, false).unwrap();
        let handle = write_record(&mut writer, &payload);
        writer.sync().unwrap();
        drop(writer);

        let mut data = std::fs::read(&log_path).unwrap();
        data[probe] ^= 0x40;
        std::fs::write(&log_path, &data).unwrap();

        let reader = open_reader(dir.path(), 1, &options);
        let err = reader.get_blob(&handle).unwrap_err();
        assert!(err.is_corruption(), "probe at {}: {:?}", probe, err);
    }
}

/// Full index round-trip: two column families written through the index
/// writer come back in written order and strictly increasing key order.
#[test]
fn integration_index_round_trip() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());
    let log_number = 12;

    let mut writer =
        LogWriter::create(&log_file_path(dir.path(), log_number), log_number, false, false)
            .unwrap();

    let cf1_pairs: [(&[u8], &[u8]); 3] = [
        (b"apple", b"fruit"),
        (b"carrot", b"vegetable"),
        (b"walnut", b"nut"),
    ];
    let cf7_pairs: [(&[u8], &[u8]); 1] = [(b"zebra", b"animal")];

    let mut build_entries = |pairs: &[(&[u8], &[u8])]| -> Vec<WalEntry> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (key, value))| {
                let key_handle = write_record(&mut writer, key);
                let value_handle = write_record(&mut writer, value);
                WalEntry::new(
                    key_handle,
                    value_handle,
                    walblob::pack_sequence_and_type(100 + i as u64, ValueType::Value),
                )
            })
            .collect()
    };

    let cf1_entries = build_entries(&cf1_pairs);
    let cf7_entries = build_entries(&cf7_pairs);
    writer.sync().unwrap();
    drop(writer);

    let mut index_writer = WalIndexWriter::create(dir.path(), log_number).unwrap();
    index_writer.write_cf(1, &cf1_entries).unwrap();
    index_writer.write_cf(7, &cf7_entries).unwrap();
    index_writer.write_footer().unwrap();
    index_writer.sync().unwrap();
    drop(index_writer);

    let reader = open_reader(dir.path(), log_number, &options);
    let comparator = Arc::new(BytewiseComparator::new());

    // cf 1 yields its three tuples in order.
    let mut iter = reader.new_iterator_with_cf(1, comparator.clone()).unwrap();
    iter.seek_to_first().unwrap();
    let mut seen = Vec::new();
    while iter.valid() {
        seen.push((iter.key().to_vec(), iter.value().to_vec(), iter.sequence()));
        assert_eq!(iter.value_type(), ValueType::Value);
        iter.next().unwrap();
    }
    assert_eq!(seen.len(), 3);
    for (i, (key, value, sequence)) in seen.iter().enumerate() {
        assert_eq!(&key[..], cf1_pairs[i].0);
        assert_eq!(&value[..], cf1_pairs[i].1);
        assert_eq!(*sequence, 100 + i as u64);
    }
    for pair in seen.windows(2) {
        assert!(pair[0].0 < pair[1].0);
    }

    // cf 7 yields exactly one tuple.
    let mut iter = reader.new_iterator_with_cf(7, comparator.clone()).unwrap();
    iter.seek_to_first().unwrap();
    assert!(iter.valid());
    assert_eq!(iter.key(), b"zebra");
    assert_eq!(iter.value(), b"animal");
    iter.next().unwrap();
    assert!(!iter.valid());

    // An unknown cf in a non-empty directory is corruption.
    let err = reader.new_iterator_with_cf(42, comparator).unwrap_err();
    assert!(err.is_corruption());
}

/// An index with an empty directory yields an empty iterator for any cf.
#[test]
fn integration_empty_index() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    write_record(&mut writer, b"data");
    writer.sync().unwrap();
    drop(writer);

    let mut index_writer = WalIndexWriter::create(dir.path(), 1).unwrap();
    index_writer.write_footer().unwrap();
    drop(index_writer);

    let reader = open_reader(dir.path(), 1, &options);
    let iter = reader
        .new_iterator_with_cf(5, Arc::new(BytewiseComparator::new()))
        .unwrap();
    assert!(!iter.valid());
}

/// Keys out of comparator order in the index are a corruption, caught
/// as the iterator crosses them.
#[test]
fn integration_iterator_order_violation() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let entries: Vec<WalEntry> = [b"zzz".as_slice(), b"aaa".as_slice()]
        .iter()
        .map(|key| {
            let key_handle = write_record(&mut writer, key);
            let value_handle = write_record(&mut writer, b"v");
            WalEntry::new(
                key_handle,
                value_handle,
                walblob::pack_sequence_and_type(1, ValueType::Value),
            )
        })
        .collect();
    writer.sync().unwrap();
    drop(writer);

    let mut index_writer = WalIndexWriter::create(dir.path(), 1).unwrap();
    index_writer.write_cf(3, &entries).unwrap();
    index_writer.write_footer().unwrap();
    drop(index_writer);

    let reader = open_reader(dir.path(), 1, &options);
    let mut iter = reader
        .new_iterator_with_cf(3, Arc::new(BytewiseComparator::new()))
        .unwrap();
    iter.seek_to_first().unwrap();
    assert_eq!(iter.key(), b"zzz");

    let err = iter.next().unwrap_err();
    assert!(err.is_corruption());
}

/// Point lookup through `get_from_handle` delivers the value to the
/// sink at maximum sequence with no further candidates requested.
#[test]
fn integration_get_from_handle() {
    struct CaptureContext {
        value: Option<Vec<u8>>,
        sequence: u64,
        value_type: Option<ValueType>,
    }

    impl GetContext for CaptureContext {
        fn save_value(
            &mut self,
            key: &ParsedInternalKey,
            value: CachedBlob,
            _merge_in_progress: &mut bool,
        ) -> bool {
            self.sequence = key.sequence;
            self.value_type = Some(key.value_type);
            self.value = Some(value.as_slice().to_vec());
            false
        }
    }

    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let handle = write_record(&mut writer, b"looked-up value");
    writer.sync().unwrap();
    drop(writer);

    let reader = open_reader(dir.path(), 1, &options);
    let mut ctx = CaptureContext {
        value: None,
        sequence: 0,
        value_type: None,
    };
    reader.get_from_handle(&handle, &mut ctx).unwrap();

    assert_eq!(ctx.value.as_deref(), Some(b"looked-up value".as_slice()));
    assert_eq!(ctx.sequence, MAX_SEQUENCE);
    assert_eq!(ctx.value_type, Some(ValueType::Value));
}

/// Concurrent readers over one file share the cache and all see the
/// same bytes.
#[test]
fn integration_concurrent_get_blob() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let payloads: Vec<Vec<u8>> = (0..16)
        .map(|i| vec![i as u8; 512 + i * 97])
        .collect();
    let handles: Vec<LogHandle> = payloads
        .iter()
        .map(|p| write_record(&mut writer, p))
        .collect();
    writer.sync().unwrap();
    drop(writer);

    let reader = open_reader(dir.path(), 1, &options);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for (handle, payload) in handles.iter().zip(&payloads) {
                    let blob = reader.get_blob(handle).unwrap();
                    assert_eq!(&blob[..], &payload[..]);
                }
            });
        }
    });
}

/// A hand-built file in the recyclable format (11-byte headers) is
/// readable when the reader is configured for recycled logs.
#[test]
fn integration_recyclable_format_read() {
    let dir = TempDir::new().unwrap();
    let log_number = 5u64;
    let options = Options {
        wal_dir: dir.path().to_path_buf(),
        recycle_log_file_num: 2,
        ..Default::default()
    };

    let per_block = BLOCK_SIZE - RECYCLABLE_HEADER_SIZE;
    let payload: Vec<u8> = (0..2 * per_block + 5).map(|i| (i * 3 % 256) as u8).collect();

    // FIRST fills block 0, MIDDLE fills block 1, LAST holds 5 bytes.
    let mut file = Vec::new();
    let fragments = [
        (RecordType::RecyclableFirst, &payload[..per_block]),
        (RecordType::RecyclableMiddle, &payload[per_block..2 * per_block]),
        (RecordType::RecyclableLast, &payload[2 * per_block..]),
    ];
    for (record_type, fragment) in fragments {
        let (header, header_size) = encode_header(record_type, fragment, log_number as u32);
        file.extend_from_slice(&header[..header_size]);
        file.extend_from_slice(fragment);
    }
    let log_path = log_file_path(dir.path(), log_number);
    std::fs::write(&log_path, &file).unwrap();

    let handle = LogHandle::from_payload(
        RECYCLABLE_HEADER_SIZE as u64,
        &payload,
        RECYCLABLE_HEADER_SIZE,
    );

    let src = FsRandomAccessFile::open(&log_path).unwrap();
    let reader = WalBlobReader::new(Box::new(src), log_number, &options);
    let blob = reader.get_blob(&handle).unwrap();
    assert_eq!(&blob[..], &payload[..]);
}

/// Corrupting the index footer chain is detected at map time.
#[test]
fn integration_index_footer_corruption() {
    let dir = TempDir::new().unwrap();
    let options = test_options(dir.path());

    let mut writer = LogWriter::create(&log_file_path(dir.path(), 1), 1, false, false).unwrap();
    let key_handle = write_record(&mut writer, b"k");
    let value_handle = write_record(&mut writer, b"v");
    writer.sync().unwrap();
    drop(writer);

    let mut index_writer = WalIndexWriter::create(dir.path(), 1).unwrap();
    index_writer
        .write_cf(
            1,
            &[WalEntry::new(
                key_handle,
                value_handle,
                walblob::pack_sequence_and_type(1, ValueType::Value),
            )],
        )
        .unwrap();
    index_writer.write_footer().unwrap();
    drop(index_writer);

    // Flip a byte inside the directory entry, which the footer CRC
    // chain covers.
    let index_path = walblob::log_index_file_path(dir.path(), 1);
    let mut data = std::fs::read(&index_path).unwrap();
    let probe = data.len() - walblob::WAL_INDEX_FOOTER_SIZE - 4;
    data[probe] ^= 0xff;
    std::fs::write(&index_path, &data).unwrap();

    let reader = open_reader(dir.path(), 1, &options);
    let err = reader
        .new_iterator_with_cf(1, Arc::new(BytewiseComparator::new()))
        .unwrap_err();
    assert!(matches!(err, Error::CrcMismatch { .. }));
}
