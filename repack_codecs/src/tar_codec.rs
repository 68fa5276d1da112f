//! TAR container codec. The writer always enables the long-filename and
//! large-size extensions, so entry names over 100 bytes and files over 8 GiB
//! are representable.

use std::io::Read;

use repack_core::codec::{ArchiveSink, ArchiveSource, EntryMeta, FinishWrite};
use repack_core::error::Result;

pub struct TarSink {
    builder: tar::Builder<Box<dyn FinishWrite>>,
}

impl TarSink {
    pub fn new(output: Box<dyn FinishWrite>) -> Self {
        Self {
            builder: tar::Builder::new(output),
        }
    }
}

impl ArchiveSink for TarSink {
    fn add_file(&mut self, meta: &EntryMeta, data: &mut dyn Read) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(meta.size);
        header.set_mode(0o644);
        header.set_mtime(meta.mtime_secs());
        // append_data recomputes the checksum and emits a long-name record
        // when the path does not fit the header field.
        self.builder.append_data(&mut header, &meta.name, data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn FinishWrite>> {
        // into_inner writes the two terminating zero blocks.
        Ok(self.builder.into_inner()?)
    }
}

pub struct TarSource {
    archive: tar::Archive<Box<dyn Read>>,
}

impl TarSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self {
            archive: tar::Archive::new(input),
        }
    }
}

impl ArchiveSource for TarSource {
    fn visit_entries(
        mut self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        for entry in self.archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let header = entry.header();
            let meta = EntryMeta {
                name,
                size: header.size()?,
                is_dir: header.entry_type().is_dir(),
                mtime: None,
            }
            .with_mtime_secs(header.mtime()?);
            visit(&meta, &mut entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::{Arc, Mutex};

    use repack_core::error::Error;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl FinishWrite for SharedSink {
        fn finish(mut self: Box<Self>) -> Result<()> {
            Ok(self.flush()?)
        }
    }

    #[test]
    fn writes_entries_a_plain_tar_reader_can_list() {
        let sink = SharedSink::default();
        let mut tar = Box::new(TarSink::new(Box::new(sink.clone())));
        tar.add_file(&EntryMeta::file("a.txt", 5), &mut Cursor::new(b"alpha"))
            .unwrap();
        tar.add_file(&EntryMeta::file("dir/b.txt", 4), &mut Cursor::new(b"beta"))
            .unwrap();
        let out = ArchiveSink::finish(tar).unwrap();
        out.finish().unwrap();

        let bytes = sink.0.lock().unwrap().clone();
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.txt", "dir/b.txt"]);
    }

    #[test]
    fn long_entry_names_survive() {
        let long = "d/".repeat(70) + "leaf.txt";
        assert!(long.len() > 100);

        let sink = SharedSink::default();
        let mut tar = Box::new(TarSink::new(Box::new(sink.clone())));
        tar.add_file(&EntryMeta::file(&long, 2), &mut Cursor::new(b"ok"))
            .unwrap();
        ArchiveSink::finish(tar).unwrap().finish().unwrap();

        let bytes = sink.0.lock().unwrap().clone();
        let source = Box::new(TarSource::new(Box::new(Cursor::new(bytes))));
        let mut seen = Vec::new();
        source
            .visit_entries(&mut |meta, data| {
                let mut body = String::new();
                data.read_to_string(&mut body)?;
                seen.push((meta.name.clone(), body));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, [(long, "ok".to_string())]);
    }

    #[test]
    fn visitor_error_aborts_the_walk() {
        let sink = SharedSink::default();
        let mut tar = Box::new(TarSink::new(Box::new(sink.clone())));
        tar.add_file(&EntryMeta::file("a", 1), &mut Cursor::new(b"x"))
            .unwrap();
        tar.add_file(&EntryMeta::file("b", 1), &mut Cursor::new(b"y"))
            .unwrap();
        ArchiveSink::finish(tar).unwrap().finish().unwrap();

        let bytes = sink.0.lock().unwrap().clone();
        let source = Box::new(TarSource::new(Box::new(Cursor::new(bytes))));
        let mut visits = 0;
        let err = source
            .visit_entries(&mut |_, _| {
                visits += 1;
                Err(Error::Corrupt("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        assert_eq!(visits, 1);
    }
}
