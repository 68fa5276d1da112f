//! ARJ container reader. Extract-only, and only for entries stored without
//! compression (method 0); ARJ's proprietary methods 1-4 have no open
//! decoder, so such entries fail with a typed entry error instead of
//! producing garbage.
//!
//! Header layout per the ARJ technical notes: a two-byte magic, a little
//! endian basic-header size (zero marks the end of the archive), the basic
//! header itself, its CRC-32, then a list of extended headers that is in
//! practice always empty.

use std::io::{self, Read};

use tracing::trace;

use repack_core::codec::{ArchiveSource, EntryMeta};
use repack_core::error::{Error, Result};

const MAGIC: [u8; 2] = [0x60, 0xea];
const MAX_BASIC_HEADER: u16 = 2600;
const FIRST_HEADER_MIN: usize = 30;
const FLAG_GARBLED: u8 = 0x01;
const METHOD_STORED: u8 = 0;
const TYPE_MAIN: u8 = 2;
const TYPE_DIRECTORY: u8 = 3;

pub struct ArjSource {
    input: Box<dyn Read>,
}

impl ArjSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self { input }
    }
}

struct BasicHeader {
    flags: u8,
    method: u8,
    file_type: u8,
    compressed: u64,
    original: u64,
    name: String,
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::Corrupt(msg.into())
}

fn read_u16(input: &mut dyn Read) -> io::Result<u16> {
    let mut bytes = [0u8; 2];
    input.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(input: &mut dyn Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read one header block. `None` means the end-of-archive marker (a zero
/// basic-header size) was reached.
fn read_header(input: &mut dyn Read) -> Result<Option<Vec<u8>>> {
    let mut magic = [0u8; 2];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(corrupt("bad arj header magic"));
    }
    let size = read_u16(input)?;
    if size == 0 {
        return Ok(None);
    }
    if size > MAX_BASIC_HEADER {
        return Err(corrupt(format!("arj basic header of {size} bytes exceeds the format limit")));
    }
    let mut bytes = vec![0u8; size as usize];
    input.read_exact(&mut bytes)?;

    let stored = read_u32(input)?;
    let mut crc = flate2::Crc::new();
    crc.update(&bytes);
    if crc.sum() != stored {
        return Err(corrupt("arj header crc mismatch"));
    }

    // Extended headers carry their own trailing crc; none are defined by the
    // format revision in use, so they are skipped unparsed.
    loop {
        let ext = read_u16(input)?;
        if ext == 0 {
            break;
        }
        trace!(bytes = ext, "skipping arj extended header");
        let mut skip = vec![0u8; ext as usize + 4];
        input.read_exact(&mut skip)?;
    }
    Ok(Some(bytes))
}

fn parse_basic(bytes: &[u8]) -> Result<BasicHeader> {
    let first = bytes.first().copied().unwrap_or(0) as usize;
    if first < FIRST_HEADER_MIN || first > bytes.len() {
        return Err(corrupt("arj first header size out of range"));
    }
    let tail = &bytes[first..];
    let name_end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt("unterminated arj entry name"))?;
    Ok(BasicHeader {
        flags: bytes[4],
        method: bytes[5],
        file_type: bytes[6],
        compressed: u64::from(u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]])),
        original: u64::from(u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]])),
        name: String::from_utf8_lossy(&tail[..name_end]).into_owned(),
    })
}

impl ArchiveSource for ArjSource {
    fn visit_entries(
        self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut input = self.input;
        let raw = read_header(&mut input)?.ok_or_else(|| corrupt("missing arj main header"))?;
        let main = parse_basic(&raw)?;
        if main.file_type != TYPE_MAIN {
            return Err(corrupt("first arj header is not a main header"));
        }
        if main.flags & FLAG_GARBLED != 0 {
            return Err(corrupt("arj archive is password protected"));
        }

        while let Some(raw) = read_header(&mut input)? {
            let header = parse_basic(&raw)?;
            let mut data = (&mut input).take(header.compressed);
            if header.file_type == TYPE_DIRECTORY {
                visit(&EntryMeta::dir(header.name), &mut data)?;
            } else {
                if header.flags & FLAG_GARBLED != 0 {
                    return Err(Error::UnreadableEntry {
                        name: header.name,
                        source: io::Error::other("entry is password protected"),
                    });
                }
                if header.method != METHOD_STORED {
                    return Err(Error::UnreadableEntry {
                        name: header.name,
                        source: io::Error::other(format!(
                            "arj compression method {} is not supported",
                            header.method
                        )),
                    });
                }
                let meta = EntryMeta::file(header.name, header.original);
                visit(&meta, &mut data)?;
            }
            // Drain whatever the visitor left behind so the next header
            // starts at the right offset.
            io::copy(&mut data, &mut io::sink())?;
        }
        Ok(())
    }
}
