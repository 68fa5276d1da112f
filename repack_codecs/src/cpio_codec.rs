//! CPIO container codec (portable ASCII "newc" variant). Entry sizes ride in
//! a 32-bit header field, so anything 4 GiB or larger is rejected up front.

use std::io::{self, Read};

use repack_core::codec::{copy_stream, ArchiveSink, ArchiveSource, EntryMeta, FinishWrite};
use repack_core::error::{Error, Result};

const TRAILER_NAME: &str = "TRAILER!!!";

pub struct CpioSink {
    // Taken while an entry is being written; a failed entry leaves the sink
    // unusable, which is fine because the pipeline aborts on first error.
    out: Option<Box<dyn FinishWrite>>,
}

impl CpioSink {
    pub fn new(output: Box<dyn FinishWrite>) -> Self {
        Self { out: Some(output) }
    }

    fn take_out(&mut self) -> Result<Box<dyn FinishWrite>> {
        self.out
            .take()
            .ok_or_else(|| io::Error::other("cpio sink unusable after an earlier failure").into())
    }
}

impl ArchiveSink for CpioSink {
    fn add_file(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<()> {
        if meta.size > u64::from(u32::MAX) {
            return Err(Error::EntryMaterialization {
                name: meta.name.clone(),
                source: io::Error::other("cpio entries are limited to 4 GiB"),
            });
        }
        let out = self.take_out()?;
        let builder = cpio::newc::Builder::new(&meta.name)
            .mode(0o100644)
            .mtime(meta.mtime_secs().min(u64::from(u32::MAX)) as u32)
            .uid(0)
            .gid(0)
            .nlink(1);
        let mut writer = builder.write(out, meta.size as u32);
        copy_stream(data, &mut writer)?;
        self.out = Some(writer.finish()?);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<Box<dyn FinishWrite>> {
        let out = self.take_out()?;
        Ok(cpio::newc::trailer(out)?)
    }
}

pub struct CpioSource {
    input: Box<dyn Read>,
}

impl CpioSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self { input }
    }
}

impl ArchiveSource for CpioSource {
    fn visit_entries(
        self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut input = self.input;
        loop {
            let mut reader = cpio::newc::Reader::new(input)?;
            let entry = reader.entry();
            if entry.name() == TRAILER_NAME {
                return Ok(());
            }
            let meta = EntryMeta {
                name: entry.name().to_string(),
                size: u64::from(entry.file_size()),
                is_dir: entry.mode() & 0o170000 == 0o040000,
                mtime: None,
            }
            .with_mtime_secs(u64::from(entry.mtime()));
            visit(&meta, &mut reader)?;
            // finish drains unread payload and the inter-entry padding.
            input = reader.finish()?;
        }
    }
}
