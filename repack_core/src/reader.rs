//! Archive reader pipeline: iterate entries in container order, skip
//! directories, stage each regular file under a sanitized name, publish it
//! to the byte store, and account for declared sizes and entry count.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

use indexmap::IndexMap;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::codec::{copy_stream, CodecProvider};
use crate::compose;
use crate::error::{Error, Result};
use crate::format::{ArchiveFormat, CompressionAlgorithm};
use crate::metrics::MetricSink;
use crate::store::{ByteStore, ObjectRef};
use crate::writer::staging_path;

/// Outcome of a decompress-archive run. Mapping keys are the original,
/// unsanitized entry names; `size` sums the declared entry sizes from the
/// container headers, not the bytes actually copied.
#[derive(Debug)]
pub struct DecompressedArchive {
    pub files: IndexMap<String, ObjectRef>,
    pub size: u64,
    pub count: u64,
}

/// Replace every space with an underscore before using an entry name as a
/// staging filename. The original name stays the mapping key, so callers can
/// always recover the logical name.
pub fn sanitize_entry_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Unpack one archive artifact, optionally unwrapping a single compressor
/// stage first, into one stored artifact per regular-file entry.
///
/// An undecodable entry aborts the run at the point of failure. Artifacts
/// already published for earlier entries are left in place: the byte store
/// exposes no delete capability, and orphan handling belongs to the invoking
/// workflow. Staged intermediates are reclaimed with the staging directory
/// on every exit path.
pub fn decompress_archive(
    provider: &dyn CodecProvider,
    store: &dyn ByteStore,
    metrics: &dyn MetricSink,
    format: ArchiveFormat,
    compression: Option<CompressionAlgorithm>,
    from: &ObjectRef,
) -> Result<DecompressedArchive> {
    let staging = TempDir::new()?;
    let raw = BufReader::new(store.get(from).map_err(Error::storage)?);

    let source = compose::open_source(provider, Box::new(raw), format, compression)?;

    let mut files: IndexMap<String, ObjectRef> = IndexMap::new();
    let mut size: u64 = 0;

    source.visit_entries(&mut |meta, data| {
        if meta.is_dir {
            debug!(entry = %meta.name, "skipping directory entry");
            return Ok(());
        }

        let sanitized = sanitize_entry_name(&meta.name);
        let staged = staging_path(staging.path(), &sanitized).map_err(|source| {
            Error::UnreadableEntry {
                name: meta.name.clone(),
                source,
            }
        })?;
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::new(File::create(&staged)?);
        copy_stream(data, &mut out).map_err(|source| Error::UnreadableEntry {
            name: meta.name.clone(),
            source,
        })?;
        out.flush()?;

        let file_name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| sanitized.clone());
        let mut staged_file = File::open(&staged)?;
        let reference = store
            .put(&mut staged_file, Some(&file_name))
            .map_err(Error::storage)?;

        debug!(entry = %meta.name, declared_size = meta.size, artifact = %reference,
            "materialized archive entry");
        size += meta.size;
        files.insert(meta.name.clone(), reference);
        Ok(())
    })?;

    let count = files.len() as u64;
    metrics.record_counter("size", size);
    metrics.record_counter("count", count);
    info!(%format, ?compression, count, size, "archive decompressed");

    Ok(DecompressedArchive { files, size, count })
}
