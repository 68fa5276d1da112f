//! End-to-end pipeline tests against the bundled codec catalogue: archive
//! write and read back through the in-memory byte store, with and without a
//! compressor stage.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

use indexmap::IndexMap;
use repack_codecs::Catalogue;
use repack_core::{
    compress_archive, compress_file, decompress_archive, decompress_file, ArchiveCompress,
    ArchiveDecompress, ArchiveFormat, CompressionAlgorithm, Direction, Error, MemoryStore,
    MetricSink, NullMetrics, ObjectRef, SourceSpec,
};

#[derive(Default)]
struct RecordingMetrics {
    counters: Mutex<HashMap<String, u64>>,
}

impl RecordingMetrics {
    fn get(&self, name: &str) -> Option<u64> {
        self.counters.lock().unwrap().get(name).copied()
    }
}

impl MetricSink for RecordingMetrics {
    fn record_counter(&self, name: &str, value: u64) {
        self.counters.lock().unwrap().insert(name.to_string(), value);
    }
}

fn seed(store: &MemoryStore, entries: &[(&str, &[u8])]) -> IndexMap<String, ObjectRef> {
    entries
        .iter()
        .map(|(name, body)| (name.to_string(), store.insert(*body)))
        .collect()
}

fn read_back(store: &MemoryStore, reference: &ObjectRef) -> Vec<u8> {
    store.contents(reference).expect("artifact exists")
}

fn archive_round_trip(format: ArchiveFormat, compression: Option<CompressionAlgorithm>) {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("a.txt", b"alpha"), ("b.txt", b"bravo")]);

    let archive = compress_archive(&Catalogue, &store, format, compression, &entries).unwrap();
    let result =
        decompress_archive(&Catalogue, &store, &NullMetrics, format, compression, &archive)
            .unwrap();

    assert_eq!(result.count, 2, "{format} {compression:?}");
    let names: Vec<&String> = result.files.keys().collect();
    assert_eq!(names, ["a.txt", "b.txt"]);
    assert_eq!(read_back(&store, &result.files["a.txt"]), b"alpha");
    assert_eq!(read_back(&store, &result.files["b.txt"]), b"bravo");
}

#[test]
fn every_writable_format_round_trips_uncompressed() {
    for format in ArchiveFormat::ALL {
        if format.caps().write {
            archive_round_trip(format, None);
        }
    }
}

#[test]
fn tar_round_trips_under_every_encodable_algorithm() {
    for algorithm in CompressionAlgorithm::encodable() {
        archive_round_trip(ArchiveFormat::Tar, Some(algorithm));
    }
}

#[test]
fn entry_order_matches_the_request_mapping() {
    let store = MemoryStore::new();
    // Deliberately not alphabetical.
    let entries = seed(
        &store,
        &[("z/last.txt", b"z"), ("m/mid.txt", b"m"), ("a/first.txt", b"a")],
    );

    let archive =
        compress_archive(&Catalogue, &store, ArchiveFormat::Tar, None, &entries).unwrap();

    // Inspect the raw container independently of the reader pipeline.
    let bytes = read_back(&store, &archive);
    let mut tar = tar::Archive::new(Cursor::new(bytes));
    let names: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["z/last.txt", "m/mid.txt", "a/first.txt"]);
}

#[test]
fn read_only_formats_fail_before_anything_is_stored() {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("a.txt", b"alpha")]);
    let seeded = 1;

    for format in [ArchiveFormat::Arj, ArchiveFormat::Dump] {
        let err = compress_archive(&Catalogue, &store, format, None, &entries).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFormat {
                direction: Direction::Write,
                ..
            }
        ));
    }
    // Nothing beyond the seeded sources was published.
    let next = store.insert(&b""[..]);
    assert_eq!(next, ObjectRef::new(format!("mem://{seeded}")));
}

#[test]
fn decode_only_algorithms_fail_the_whole_compression_request() {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("a.txt", b"alpha")]);

    for algorithm in [
        CompressionAlgorithm::Brotli,
        CompressionAlgorithm::Deflate64,
        CompressionAlgorithm::Snappy,
        CompressionAlgorithm::Z,
    ] {
        let err = compress_archive(
            &Catalogue,
            &store,
            ArchiveFormat::Tar,
            Some(algorithm),
            &entries,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedAlgorithm {
                direction: Direction::Write,
                ..
            }
        ));
    }
}

#[test]
fn spaces_are_sanitized_in_storage_but_not_in_result_keys() {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("my report file.txt", b"cells")]);

    let archive =
        compress_archive(&Catalogue, &store, ArchiveFormat::Tar, None, &entries).unwrap();
    let result = decompress_archive(
        &Catalogue,
        &store,
        &NullMetrics,
        ArchiveFormat::Tar,
        None,
        &archive,
    )
    .unwrap();

    let reference = &result.files["my report file.txt"];
    assert!(
        reference.as_str().ends_with("/my_report_file.txt"),
        "stored under the sanitized name: {reference}"
    );
    assert_eq!(read_back(&store, reference), b"cells");
}

#[test]
fn telemetry_reports_declared_sizes_and_entry_count() {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("one", b"1"), ("two", b"22"), ("three", b"333")]);

    let archive =
        compress_archive(&Catalogue, &store, ArchiveFormat::Tar, None, &entries).unwrap();
    let metrics = RecordingMetrics::default();
    let result = decompress_archive(
        &Catalogue,
        &store,
        &metrics,
        ArchiveFormat::Tar,
        None,
        &archive,
    )
    .unwrap();

    assert_eq!(result.size, 6);
    assert_eq!(result.count, 3);
    assert_eq!(metrics.get("size"), Some(6));
    assert_eq!(metrics.get("count"), Some(3));
}

#[test]
fn directory_entries_are_skipped_on_extraction() {
    // Build a tar with an explicit directory entry, which our writer never
    // emits, directly with the tar crate.
    let mut builder = tar::Builder::new(Vec::new());
    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    builder.append_data(&mut dir, "nested/", &mut Cursor::new(b"")).unwrap();
    let mut file = tar::Header::new_gnu();
    file.set_entry_type(tar::EntryType::Regular);
    file.set_size(4);
    file.set_mode(0o644);
    builder
        .append_data(&mut file, "nested/kept.txt", &mut Cursor::new(b"data"))
        .unwrap();
    let bytes = builder.into_inner().unwrap();

    let store = MemoryStore::new();
    let archive = store.insert(bytes);
    let metrics = RecordingMetrics::default();
    let result = decompress_archive(
        &Catalogue,
        &store,
        &metrics,
        ArchiveFormat::Tar,
        None,
        &archive,
    )
    .unwrap();

    assert_eq!(result.count, 1);
    assert!(result.files.contains_key("nested/kept.txt"));
    assert!(!result.files.keys().any(|k| k.ends_with('/')));
    assert_eq!(metrics.get("count"), Some(1));
}

#[test]
fn long_tar_entry_names_survive_the_pipeline() {
    let long = format!("{}/leaf.txt", "deeply/nested".repeat(12));
    assert!(long.len() > 100);

    let store = MemoryStore::new();
    let entries = seed(&store, &[(long.as_str(), b"leaf")]);
    let archive =
        compress_archive(&Catalogue, &store, ArchiveFormat::Tar, None, &entries).unwrap();
    let result = decompress_archive(
        &Catalogue,
        &store,
        &NullMetrics,
        ArchiveFormat::Tar,
        None,
        &archive,
    )
    .unwrap();

    assert_eq!(read_back(&store, &result.files[&long]), b"leaf");
}

#[test]
fn request_surface_drives_a_tar_gzip_round_trip() {
    let store = MemoryStore::new();
    let a = store.insert(&b"1"[..]);
    let b = store.insert(&b"2"[..]);

    let compress: ArchiveCompress = serde_json::from_value(serde_json::json!({
        "archiveFormat": "TAR",
        "compressionAlgorithm": "GZIP",
        "source": { "a.txt": a.as_str(), "b.txt": b.as_str() },
    }))
    .unwrap();
    let archive = compress.run(&Catalogue, &store).unwrap();

    // The artifact really is gzip on the outside.
    let bytes = read_back(&store, &archive);
    let mut gz = flate2::read::GzDecoder::new(Cursor::new(&bytes));
    let mut inner = Vec::new();
    gz.read_to_end(&mut inner).unwrap();
    assert_eq!(inner.len() % 512, 0, "gzip wraps a whole tar stream");

    let decompress = ArchiveDecompress {
        archive_format: ArchiveFormat::Tar,
        compression_algorithm: Some(CompressionAlgorithm::Gzip),
        source: SourceSpec::Text(archive.as_str().to_string()),
    };
    let result = decompress.run(&Catalogue, &store, &NullMetrics).unwrap();
    assert_eq!(result.count, 2);
    assert_eq!(read_back(&store, &result.files["a.txt"]), b"1");
    assert_eq!(read_back(&store, &result.files["b.txt"]), b"2");
}

#[test]
fn single_file_compress_then_decompress_restores_the_payload() {
    let store = MemoryStore::new();
    let payload: Vec<u8> = b"single stream payload ".repeat(700);
    let original = store.insert(payload.clone());

    for algorithm in [
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Zstd,
        CompressionAlgorithm::Xz,
    ] {
        let packed = compress_file(&Catalogue, &store, algorithm, &original).unwrap();
        assert_ne!(read_back(&store, &packed), payload);

        let unpacked = decompress_file(&Catalogue, &store, algorithm, &packed).unwrap();
        assert_eq!(read_back(&store, &unpacked), payload);
    }
}

#[test]
fn corrupted_archive_surfaces_a_typed_error() {
    let store = MemoryStore::new();
    let entries = seed(&store, &[("a.txt", b"alpha")]);
    let archive =
        compress_archive(&Catalogue, &store, ArchiveFormat::Zip, None, &entries).unwrap();

    let mut bytes = read_back(&store, &archive);
    bytes.truncate(bytes.len() / 2);
    let truncated = store.insert(bytes);

    assert!(decompress_archive(
        &Catalogue,
        &store,
        &NullMetrics,
        ArchiveFormat::Zip,
        None,
        &truncated,
    )
    .is_err());
}
