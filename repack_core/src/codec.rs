use std::fs;
use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::format::{ArchiveFormat, CompressionAlgorithm};

/// Metadata for one archive entry, derived from archive headers on read and
/// from the staged file on write.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Logical entry path, possibly containing `/` separators. On read this
    /// is the original container name, never the sanitized staging name.
    pub name: String,
    /// Declared byte length from the container header (read) or the staged
    /// file length (write). Telemetry sums this value, not bytes copied.
    pub size: u64,
    pub is_dir: bool,
    pub mtime: Option<SystemTime>,
}

impl EntryMeta {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
            mtime: None,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
            mtime: None,
        }
    }

    /// Derive entry metadata from a staged file.
    pub fn from_fs(name: impl Into<String>, meta: &fs::Metadata) -> Self {
        Self {
            name: name.into(),
            size: meta.len(),
            is_dir: meta.is_dir(),
            mtime: meta.modified().ok(),
        }
    }

    /// Modification time as seconds since the epoch, for containers that
    /// store only that much.
    pub fn mtime_secs(&self) -> u64 {
        self.mtime
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn with_mtime_secs(mut self, secs: u64) -> Self {
        self.mtime = Some(UNIX_EPOCH + Duration::from_secs(secs));
        self
    }
}

/// A write stage that needs an explicit finalization step: a compressor that
/// must flush its trailer, or the bare sink that only needs a flush.
///
/// `finish` consumes the stage so nothing can be written after the trailer.
/// Dropping a stage without calling `finish` abandons the output, which is
/// exactly what the failure path wants: no partial artifact, and no teardown
/// error masking the primary one.
pub trait FinishWrite: Write {
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Writer capability for one archive container format.
///
/// Entries are appended in call order; containers are order-sensitive for
/// tools that stream-read sequentially. `finish` writes the trailer or
/// central directory and hands back the underlying stage so the composer can
/// finalize layers innermost-first.
pub trait ArchiveSink {
    fn add_file(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<Box<dyn FinishWrite>>;
}

/// Reader capability for one archive container format.
///
/// Entries are visited in container order. The visitor receives every entry,
/// directories included; skipping policy belongs to the pipeline, not the
/// container codec. An entry whose data cannot be decoded aborts the visit
/// with [`Error::UnreadableEntry`](crate::Error::UnreadableEntry).
pub trait ArchiveSource {
    fn visit_entries(
        self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()>;
}

/// Static catalogue of codec constructors. Implementations resolve the
/// capability first (typed failure before any I/O) and then build the stage.
pub trait CodecProvider {
    fn archive_source(
        &self,
        format: ArchiveFormat,
        input: Box<dyn Read>,
    ) -> Result<Box<dyn ArchiveSource>>;

    fn archive_sink(
        &self,
        format: ArchiveFormat,
        output: Box<dyn FinishWrite>,
    ) -> Result<Box<dyn ArchiveSink>>;

    fn decoder(
        &self,
        algorithm: CompressionAlgorithm,
        input: Box<dyn Read>,
    ) -> Result<Box<dyn Read>>;

    fn encoder(
        &self,
        algorithm: CompressionAlgorithm,
        output: Box<dyn Write>,
    ) -> Result<Box<dyn FinishWrite>>;
}

/// Fixed-size copy loop shared by the pipelines (8 KiB, matching the
/// single-file wrapper contract). Returns bytes copied.
pub fn copy_stream(from: &mut dyn Read, to: &mut dyn Write) -> io::Result<u64> {
    let mut buffer = [0u8; 8 * 1024];
    let mut total = 0u64;
    loop {
        let n = from.read(&mut buffer)?;
        if n == 0 {
            return Ok(total);
        }
        to.write_all(&buffer[..n])?;
        total += n as u64;
    }
}
