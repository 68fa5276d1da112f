//! Stream composition: raw sink/source, optional single compressor stage,
//! archive framing on top.
//!
//! Acquisition order is raw → compressor → archive; release must be the
//! exact reverse on every exit path. On success that is explicit:
//! [`finish_sink`] finalizes the archive trailer first and then the
//! compressor stage it hands back. On failure it is structural: the archive
//! sink owns the compressor stage which owns the raw sink, so dropping the
//! outer value tears the layers down innermost-first without masking the
//! primary error.

use std::io::{Read, Write};

use crate::codec::{ArchiveSink, ArchiveSource, CodecProvider, FinishWrite};
use crate::error::{Error, Result};
use crate::format::{ArchiveFormat, CompressionAlgorithm};

/// Terminal stage over the raw sink when no compression is selected.
/// `finish` reduces to a flush.
struct FlushStage(Box<dyn Write>);

impl Write for FlushStage {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl FinishWrite for FlushStage {
    fn finish(self: Box<Self>) -> Result<()> {
        let mut raw = self.0;
        raw.flush().map_err(|source| Error::Teardown {
            stage: "sink",
            source,
        })
    }
}

/// Compose a writer: archive framing over an optional compressor stage over
/// the raw sink. Capability errors surface here, before any byte is written.
pub fn open_sink(
    provider: &dyn CodecProvider,
    raw: Box<dyn Write>,
    format: ArchiveFormat,
    compression: Option<CompressionAlgorithm>,
) -> Result<Box<dyn ArchiveSink>> {
    let stage: Box<dyn FinishWrite> = match compression {
        Some(algorithm) => provider.encoder(algorithm, raw)?,
        None => Box::new(FlushStage(raw)),
    };
    provider.archive_sink(format, stage)
}

/// Finalize a composed writer: archive trailer first, then the compressor
/// stage, then the raw sink flush (owned by the stage).
pub fn finish_sink(sink: Box<dyn ArchiveSink>) -> Result<()> {
    let stage = sink.finish()?;
    stage.finish()
}

/// Compose a reader: optional decompressor stage under the archive framing.
/// Decoder stages need no finalization; drop releases them in reverse order.
pub fn open_source(
    provider: &dyn CodecProvider,
    raw: Box<dyn Read>,
    format: ArchiveFormat,
    compression: Option<CompressionAlgorithm>,
) -> Result<Box<dyn ArchiveSource>> {
    let stage: Box<dyn Read> = match compression {
        Some(algorithm) => provider.decoder(algorithm, raw)?,
        None => raw,
    };
    provider.archive_source(format, stage)
}
