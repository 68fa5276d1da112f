//! Archive writer pipeline: stage each named source, derive entry metadata
//! from the staged file, stream it into the composed archive sink, finalize
//! the trailer, and only then publish the artifact.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::codec::{copy_stream, CodecProvider, EntryMeta};
use crate::compose;
use crate::error::{Error, Result};
use crate::format::{ArchiveFormat, CompressionAlgorithm};
use crate::store::{ByteStore, ObjectRef};

/// Resolve a logical entry path inside the staging directory. Absolute
/// paths and `..` components would escape the request-scoped staging area
/// and are rejected.
pub(crate) fn staging_path(root: &Path, name: &str) -> io::Result<PathBuf> {
    let relative = Path::new(name);
    if relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    }) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("entry path '{name}' escapes the staging directory"),
        ));
    }
    Ok(root.join(relative))
}

/// Pack an ordered mapping of `entry path → storage reference` into one
/// archive artifact, optionally wrapped in a single compressor stage.
///
/// Entries appear in the output in mapping iteration order. If any single
/// entry fails to stage or write, the whole operation fails and nothing is
/// published.
pub fn compress_archive(
    provider: &dyn CodecProvider,
    store: &dyn ByteStore,
    format: ArchiveFormat,
    compression: Option<CompressionAlgorithm>,
    entries: &IndexMap<String, ObjectRef>,
) -> Result<ObjectRef> {
    let staging = TempDir::new()?;
    let artifact = tempfile::NamedTempFile::new()?;
    let raw = BufWriter::new(File::create(artifact.path())?);

    let mut sink = compose::open_sink(provider, Box::new(raw), format, compression)?;

    for (name, reference) in entries {
        let materialization = |source: io::Error| Error::EntryMaterialization {
            name: name.clone(),
            source,
        };
        let staged =
            stage_entry(staging.path(), name, store, reference).map_err(materialization)?;
        let meta = EntryMeta::from_fs(name.clone(), &staged.metadata().map_err(materialization)?);
        debug!(entry = %name, size = meta.size, "staged archive entry");

        let mut staged_file = File::open(&staged).map_err(materialization)?;
        // Plain I/O failures while writing this entry are attributed to it;
        // typed codec errors already carry their own context.
        sink.add_file(&meta, &mut staged_file).map_err(|err| match err {
            Error::Io(source) => materialization(source),
            other => other,
        })?;
    }

    compose::finish_sink(sink)?;

    let mut done = File::open(artifact.path())?;
    let reference = store.put(&mut done, None).map_err(Error::storage)?;
    info!(%format, ?compression, entries = entries.len(), artifact = %reference,
        "archive compressed");
    Ok(reference)
}

/// Copy one source stream into the staging area under its logical path,
/// creating any intermediate directories the path implies.
fn stage_entry(
    root: &Path,
    name: &str,
    store: &dyn ByteStore,
    reference: &ObjectRef,
) -> io::Result<PathBuf> {
    let path = staging_path(root, name)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut source = store.get(reference).map_err(io::Error::other)?;
    let mut staged = BufWriter::new(File::create(&path)?);
    copy_stream(&mut source, &mut staged)?;
    staged.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use crate::codec::{ArchiveSink, ArchiveSource, FinishWrite};
    use crate::store::MemoryStore;

    #[test]
    fn staging_path_rejects_escapes() {
        let root = Path::new("/staging");
        assert!(staging_path(root, "ok/nested/file.txt").is_ok());
        assert!(staging_path(root, "../evil").is_err());
        assert!(staging_path(root, "a/../../evil").is_err());
        assert!(staging_path(root, "/etc/passwd").is_err());
    }

    struct FailingSink;

    impl ArchiveSink for FailingSink {
        fn add_file(&mut self, _meta: &EntryMeta, _data: &mut dyn Read) -> Result<()> {
            Err(io::Error::other("disk full while writing entry").into())
        }

        fn finish(self: Box<Self>) -> Result<Box<dyn FinishWrite>> {
            unreachable!("add_file always fails first")
        }
    }

    struct FailingSinkProvider;

    impl CodecProvider for FailingSinkProvider {
        fn archive_source(
            &self,
            _format: ArchiveFormat,
            _input: Box<dyn Read>,
        ) -> Result<Box<dyn ArchiveSource>> {
            unreachable!()
        }

        fn archive_sink(
            &self,
            _format: ArchiveFormat,
            _output: Box<dyn FinishWrite>,
        ) -> Result<Box<dyn ArchiveSink>> {
            Ok(Box::new(FailingSink))
        }

        fn decoder(
            &self,
            _algorithm: CompressionAlgorithm,
            _input: Box<dyn Read>,
        ) -> Result<Box<dyn Read>> {
            unreachable!()
        }

        fn encoder(
            &self,
            _algorithm: CompressionAlgorithm,
            _output: Box<dyn Write>,
        ) -> Result<Box<dyn FinishWrite>> {
            unreachable!()
        }
    }

    #[test]
    fn sink_write_failures_are_attributed_to_the_entry() {
        let store = MemoryStore::new();
        let mut entries = IndexMap::new();
        entries.insert("a.txt".to_string(), store.insert(&b"alpha"[..]));

        let err = compress_archive(
            &FailingSinkProvider,
            &store,
            ArchiveFormat::Tar,
            None,
            &entries,
        )
        .unwrap_err();
        assert!(
            matches!(err, Error::EntryMaterialization { ref name, .. } if name == "a.txt"),
            "{err:?}"
        );
    }
}
