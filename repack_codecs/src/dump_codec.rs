//! 4.4BSD `dump(8)` tape reader. Extract-only.
//!
//! A dump tape is a sequence of 1024-byte records. Header records carry a
//! record type, the NFS magic, a checksum, a copy of the on-disk inode, and
//! a block-presence map; data records follow their header verbatim, with
//! absent map slots standing for holes. Directories are dumped before
//! regular files, so entry paths can be resolved from directory data that
//! has already streamed past.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};

use tracing::trace;

use repack_core::codec::{ArchiveSource, EntryMeta};
use repack_core::error::{Error, Result};

const RECORD_SIZE: usize = 1024;
const NFS_MAGIC: u32 = 60012;
const CHECKSUM: i32 = 84446;
const ADDR_SLOTS: i32 = 512;
const ROOT_INO: u32 = 2;

const TS_TAPE: i32 = 1;
const TS_INODE: i32 = 2;
const TS_BITS: i32 = 3;
const TS_ADDR: i32 = 4;
const TS_END: i32 = 5;
const TS_CLRI: i32 = 6;

const IFMT: u16 = 0o170000;
const IFDIR: u16 = 0o040000;
const IFREG: u16 = 0o100000;

type Record = [u8; RECORD_SIZE];

fn corrupt(msg: impl Into<String>) -> Error {
    Error::Corrupt(msg.into())
}

fn i32_at(rec: &Record, off: usize) -> i32 {
    i32::from_le_bytes([rec[off], rec[off + 1], rec[off + 2], rec[off + 3]])
}

fn u32_at(rec: &Record, off: usize) -> u32 {
    u32::from_le_bytes([rec[off], rec[off + 1], rec[off + 2], rec[off + 3]])
}

fn u16_at(rec: &Record, off: usize) -> u16 {
    u16::from_le_bytes([rec[off], rec[off + 1]])
}

fn u64_at(rec: &Record, off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&rec[off..off + 8]);
    u64::from_le_bytes(bytes)
}

fn record_type(rec: &Record) -> i32 {
    i32_at(rec, 0)
}

fn inode_number(rec: &Record) -> u32 {
    u32_at(rec, 20)
}

fn inode_mode(rec: &Record) -> u16 {
    u16_at(rec, 32)
}

fn inode_size(rec: &Record) -> u64 {
    u64_at(rec, 40)
}

fn block_count(rec: &Record) -> i32 {
    i32_at(rec, 160)
}

fn block_present(rec: &Record, slot: usize) -> bool {
    rec[164 + slot] != 0
}

/// Header records checksum to a fixed constant: the checksum field is set so
/// the 256 little endian words of the record sum to 84446.
fn verify_header(rec: &Record) -> Result<()> {
    if u32_at(rec, 24) != NFS_MAGIC {
        return Err(corrupt("dump header magic mismatch"));
    }
    let mut sum = 0i32;
    for off in (0..RECORD_SIZE).step_by(4) {
        sum = sum.wrapping_add(i32_at(rec, off));
    }
    if sum != CHECKSUM {
        return Err(corrupt("dump header checksum mismatch"));
    }
    Ok(())
}

/// Record reader with one slot of pushback, needed when a lookahead for an
/// address continuation finds the next inode header instead.
struct Records {
    input: Box<dyn Read>,
    pending: Option<Box<Record>>,
}

impl Records {
    fn new(input: Box<dyn Read>) -> Self {
        Self {
            input,
            pending: None,
        }
    }

    fn next(&mut self) -> Result<Option<Box<Record>>> {
        if let Some(rec) = self.pending.take() {
            return Ok(Some(rec));
        }
        let mut rec: Box<Record> = Box::new([0u8; RECORD_SIZE]);
        let mut filled = 0;
        while filled < RECORD_SIZE {
            let n = self.input.read(&mut rec[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(corrupt("dump stream ends inside a record"));
            }
            filled += n;
        }
        Ok(Some(rec))
    }

    fn push_back(&mut self, rec: Box<Record>) {
        self.pending = Some(rec);
    }
}

fn skip_records(recs: &mut Records, count: i32) -> Result<()> {
    for _ in 0..count.max(0) {
        recs.next()?
            .ok_or_else(|| corrupt("dump stream ends inside a bitmap"))?;
    }
    Ok(())
}

/// Gather one inode's file data: the blocks named by the header's presence
/// map, continued across TS_ADDR records, with absent slots read as holes.
fn read_inode_data(recs: &mut Records, header: &Record) -> Result<Vec<u8>> {
    let size = inode_size(header) as usize;
    let mut data = Vec::new();
    let mut current: Box<Record> = Box::new(*header);
    loop {
        let count = block_count(&current);
        if !(0..=ADDR_SLOTS).contains(&count) {
            return Err(corrupt("dump block count out of range"));
        }
        for slot in 0..count as usize {
            if block_present(&current, slot) {
                let block = recs
                    .next()?
                    .ok_or_else(|| corrupt("dump stream ends inside file data"))?;
                data.extend_from_slice(&block[..]);
            } else {
                data.extend_from_slice(&[0u8; RECORD_SIZE]);
            }
        }
        if data.len() >= size {
            break;
        }
        let Some(next) = recs.next()? else {
            return Err(corrupt("dump stream ends inside file data"));
        };
        if record_type(&next) == TS_ADDR {
            verify_header(&next)?;
            current = next;
        } else {
            // A tail hole: the inode ends in unstored zeros.
            recs.push_back(next);
            break;
        }
    }
    data.resize(size, 0);
    Ok(data)
}

/// Fold one directory's data into the inode name map. 4.4BSD dirents: inode,
/// record length, type, name length, then the name itself.
fn parse_dirents(parent: u32, data: &[u8], names: &mut HashMap<u32, (u32, String)>) {
    let mut off = 0;
    while off + 8 <= data.len() {
        let ino = u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        let reclen = u16::from_le_bytes([data[off + 4], data[off + 5]]) as usize;
        let namelen = data[off + 7] as usize;
        if reclen < 8 || off + reclen > data.len() {
            break;
        }
        if ino != 0 && off + 8 + namelen <= data.len() {
            let name = String::from_utf8_lossy(&data[off + 8..off + 8 + namelen]).into_owned();
            if name != "." && name != ".." {
                names.insert(ino, (parent, name));
            }
        }
        off += reclen;
    }
}

fn resolve_path(names: &HashMap<u32, (u32, String)>, ino: u32) -> String {
    let mut parts = Vec::new();
    let mut cur = ino;
    for _ in 0..64 {
        if cur == ROOT_INO {
            parts.reverse();
            return parts.join("/");
        }
        let Some((parent, name)) = names.get(&cur) else {
            break;
        };
        parts.push(name.clone());
        cur = *parent;
    }
    // Unreachable from the root: fall back to a stable synthetic name.
    format!("ino-{ino}")
}

pub struct DumpSource {
    input: Box<dyn Read>,
}

impl DumpSource {
    pub fn new(input: Box<dyn Read>) -> Self {
        Self { input }
    }
}

impl ArchiveSource for DumpSource {
    fn visit_entries(
        self: Box<Self>,
        visit: &mut dyn FnMut(&EntryMeta, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut recs = Records::new(self.input);
        let first = recs
            .next()?
            .ok_or_else(|| corrupt("empty dump stream"))?;
        verify_header(&first)?;
        if record_type(&first) != TS_TAPE {
            return Err(corrupt("dump stream does not start with a volume header"));
        }

        let mut names: HashMap<u32, (u32, String)> = HashMap::new();
        loop {
            let Some(rec) = recs
                .next()?
            else {
                return Err(corrupt("dump stream ends without an end record"));
            };
            verify_header(&rec)?;
            match record_type(&rec) {
                TS_END => return Ok(()),
                TS_CLRI | TS_BITS => skip_records(&mut recs, block_count(&rec))?,
                TS_INODE => {
                    let ino = inode_number(&rec);
                    let mode = inode_mode(&rec);
                    let data = read_inode_data(&mut recs, &rec)?;
                    match mode & IFMT {
                        IFDIR => {
                            parse_dirents(ino, &data, &mut names);
                            if ino != ROOT_INO {
                                let meta = EntryMeta::dir(resolve_path(&names, ino));
                                visit(&meta, &mut io::empty())?;
                            }
                        }
                        IFREG => {
                            let meta =
                                EntryMeta::file(resolve_path(&names, ino), data.len() as u64);
                            visit(&meta, &mut Cursor::new(data))?;
                        }
                        other => {
                            // Devices, sockets, symlinks: nothing to extract.
                            trace!(ino, mode = other, "skipping special dump inode");
                        }
                    }
                }
                TS_TAPE => return Err(corrupt("multi-volume dump archives are not supported")),
                TS_ADDR => return Err(corrupt("orphan dump address record")),
                other => return Err(corrupt(format!("unknown dump record type {other}"))),
            }
        }
    }
}
