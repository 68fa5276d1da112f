//! ZIP container codec, shared by the JAR format.
//!
//! The writer spools to an anonymous temp file because the central directory
//! needs a seekable target; local headers are patched in place, so the
//! finished archive carries exact sizes instead of data descriptors and the
//! reader side can stream it without seeking.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use repack_core::codec::{copy_stream, ArchiveSink, ArchiveSource, EntryMeta, FinishWrite};
use repack_core::error::Result;

pub struct ZipSink {
    writer: zip::ZipWriter<File>,
    out: Box<dyn FinishWrite>,
}

impl ZipSink {
    pub fn new(output: Box<dyn FinishWrite>) -> Result<Self> {
        let spool = tempfile::tempfile()?;
        Ok(Self {
            writer: zip::ZipWriter::new(spool),
            out: output,
        })
    }
}

impl ArchiveSink for ZipSink {
    fn add_file(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<()> {
        let options = zip::write::SimpleFileOptions::default()
            .unix_permissions(0o644)
            .large_file(meta.size >= u32::MAX as u64);
        self.writer
            .start_file(meta.name.as_str(), options)
            .map_err(io::Error::other)?;
        copy_stream(data, &mut self.writer)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn FinishWrite>> {
        let ZipSink { writer, mut out } = *self;
        let mut spool = writer.finish().map_err(io::Error::other)?;
        let len = spool.seek(SeekFrom::End(0))?;
        spool.seek(SeekFrom::Start(0))?;
        debug!(bytes = len, "zip central directory written, draining spool");
        copy_stream(&mut spool, &mut out)?;
        Ok(out)
    }
}

pub struct ZipSource {
    input: Box<dyn Read>,
}

impl ZipSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self { input }
    }
}

impl ArchiveSource for ZipSource {
    fn visit_entries(
        mut self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        loop {
            let entry = zip::read::read_zipfile_from_stream(&mut self.input)
                .map_err(io::Error::other)?;
            let Some(mut file) = entry else {
                return Ok(());
            };
            let meta = EntryMeta {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
                mtime: None,
            };
            // Dropping the entry at the end of the iteration drains any
            // bytes the visitor left unread.
            visit(&meta, &mut file)?;
        }
    }
}
