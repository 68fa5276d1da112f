//! Single-file codec wrapper: one byte stream through one compressor stage,
//! no archive framing. The degenerate case of the stream composer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use tempfile::NamedTempFile;
use tracing::info;

use crate::codec::{copy_stream, CodecProvider};
use crate::error::{Error, Result};
use crate::format::CompressionAlgorithm;
use crate::store::{ByteStore, ObjectRef};

/// Compress one stored object with a single compressor stage.
pub fn compress_file(
    provider: &dyn CodecProvider,
    store: &dyn ByteStore,
    algorithm: CompressionAlgorithm,
    from: &ObjectRef,
) -> Result<ObjectRef> {
    let artifact = NamedTempFile::new()?;
    let raw = BufWriter::new(File::create(artifact.path())?);
    let mut encoder = provider.encoder(algorithm, Box::new(raw))?;

    let mut source = BufReader::new(store.get(from).map_err(Error::storage)?);
    copy_stream(&mut source, &mut encoder)?;
    encoder.finish()?;

    let mut done = File::open(artifact.path())?;
    let reference = store.put(&mut done, None).map_err(Error::storage)?;
    info!(%algorithm, artifact = %reference, "file compressed");
    Ok(reference)
}

/// Decompress one stored object with a single compressor stage.
pub fn decompress_file(
    provider: &dyn CodecProvider,
    store: &dyn ByteStore,
    algorithm: CompressionAlgorithm,
    from: &ObjectRef,
) -> Result<ObjectRef> {
    let artifact = NamedTempFile::new()?;

    let raw = BufReader::new(store.get(from).map_err(Error::storage)?);
    let mut decoder = provider.decoder(algorithm, Box::new(raw))?;

    let mut out = BufWriter::new(File::create(artifact.path())?);
    copy_stream(&mut decoder, &mut out)?;
    out.flush()?;

    let mut done = File::open(artifact.path())?;
    let reference = store.put(&mut done, None).map_err(Error::storage)?;
    info!(%algorithm, artifact = %reference, "file decompressed");
    Ok(reference)
}
