//! Unix `ar` container codec. Member names longer than 16 bytes are written
//! with the BSD `#1/len` extended-name convention, so nothing is truncated.

use std::io::Read;

use repack_core::codec::{ArchiveSink, ArchiveSource, EntryMeta, FinishWrite};
use repack_core::error::Result;

pub struct ArSink {
    builder: ar::Builder<Box<dyn FinishWrite>>,
}

impl ArSink {
    pub fn new(output: Box<dyn FinishWrite>) -> Self {
        Self {
            builder: ar::Builder::new(output),
        }
    }
}

impl ArchiveSink for ArSink {
    fn add_file(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<()> {
        let mut header = ar::Header::new(meta.name.clone().into_bytes(), meta.size);
        header.set_mtime(meta.mtime_secs());
        header.set_mode(0o644);
        header.set_uid(0);
        header.set_gid(0);
        self.builder.append(&header, data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn FinishWrite>> {
        Ok(self.builder.into_inner()?)
    }
}

pub struct ArSource {
    archive: ar::Archive<Box<dyn Read>>,
}

impl ArSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self {
            archive: ar::Archive::new(input),
        }
    }
}

impl ArchiveSource for ArSource {
    fn visit_entries(
        mut self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        while let Some(entry) = self.archive.next_entry() {
            let mut entry = entry?;
            let header = entry.header();
            // ar stores flat file members only, never directories.
            let meta = EntryMeta::file(
                String::from_utf8_lossy(header.identifier()).into_owned(),
                header.size(),
            )
            .with_mtime_secs(header.mtime());
            visit(&meta, &mut entry)?;
        }
        Ok(())
    }
}
