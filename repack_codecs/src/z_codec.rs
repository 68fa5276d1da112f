//! Decoder for the legacy `compress(1)` `.Z` container (LZW with variable
//! code width). No maintained crate covers this format, so the decoder is
//! implemented here; it follows the reference `unlzw` semantics: LSB-first
//! code packing, 9..=16 bit codes, block mode with a clear code at 256, and
//! code groups padded to a byte boundary whenever the width changes.
//!
//! Decode only. The catalogue never offers a `.Z` encoder.

use std::io;

const MAGIC: [u8; 2] = [0x1f, 0x9d];
const MAX_BITS_MASK: u8 = 0x1f;
const BLOCK_MODE: u8 = 0x80;
const INIT_BITS: u32 = 9;
const CLEAR: u32 = 256;

fn corrupt(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Read the `n_bits`-wide code starting at bit offset `posbits`.
fn read_code(body: &[u8], posbits: u64, n_bits: u32) -> u32 {
    let idx = (posbits >> 3) as usize;
    let shift = (posbits & 7) as u32;
    let mut word = 0u32;
    for (i, &b) in body[idx..body.len().min(idx + 3)].iter().enumerate() {
        word |= (b as u32) << (8 * i);
    }
    (word >> shift) & ((1 << n_bits) - 1)
}

/// Round `posbits` up to the next code-group boundary. The compressor pads
/// its output to a multiple of `n_bits * 8` bits before changing the code
/// width, and the decoder must skip the same padding.
fn align_to_group(posbits: u64, n_bits: u32) -> u64 {
    let group = (n_bits as u64) << 3;
    posbits.div_ceil(group) * group
}

/// Decompress a whole `.Z` stream.
pub(crate) fn unlzw(data: &[u8]) -> io::Result<Vec<u8>> {
    if data.len() < 3 || data[..2] != MAGIC {
        return Err(corrupt("not a compress(1) .Z stream"));
    }
    let max_bits = (data[2] & MAX_BITS_MASK) as u32;
    let block_mode = data[2] & BLOCK_MODE != 0;
    if !(INIT_BITS..=16).contains(&max_bits) {
        return Err(corrupt(format!("unsupported .Z code width {max_bits}")));
    }

    let body = &data[3..];
    let total_bits = (body.len() as u64) * 8;
    let max_max_code = 1u32 << max_bits;

    let mut prefix = vec![0u16; max_max_code as usize];
    let mut suffix = vec![0u8; max_max_code as usize];
    for (i, s) in suffix.iter_mut().take(256).enumerate() {
        *s = i as u8;
    }

    let mut n_bits = INIT_BITS;
    let mut max_code = (1u32 << n_bits) - 1;
    let mut free_ent = if block_mode { CLEAR + 1 } else { CLEAR };
    let mut oldcode: Option<u32> = None;
    let mut finchar = 0u8;
    let mut posbits: u64 = 0;
    let mut out = Vec::new();
    let mut stack = Vec::new();

    while posbits + n_bits as u64 <= total_bits {
        if free_ent > max_code {
            posbits = align_to_group(posbits, n_bits);
            n_bits += 1;
            max_code = if n_bits == max_bits {
                max_max_code
            } else {
                (1 << n_bits) - 1
            };
            continue;
        }

        let code = read_code(body, posbits, n_bits);
        posbits += n_bits as u64;

        let Some(prev) = oldcode else {
            // First code must be a literal.
            if code >= 256 {
                return Err(corrupt("corrupt .Z stream: first code is not a literal"));
            }
            finchar = code as u8;
            oldcode = Some(code);
            out.push(finchar);
            continue;
        };

        if code == CLEAR && block_mode {
            prefix.iter_mut().for_each(|p| *p = 0);
            // The next table add lands on the (unused) clear slot, matching
            // the compressor's post-clear numbering.
            free_ent = CLEAR;
            posbits = align_to_group(posbits, n_bits);
            n_bits = INIT_BITS;
            max_code = (1 << n_bits) - 1;
            continue;
        }

        let incode = code;
        stack.clear();
        let mut cur = code;
        if cur >= free_ent {
            if cur > free_ent {
                return Err(corrupt(format!("corrupt .Z stream: code {cur} out of range")));
            }
            // KwKwK: the code being defined by this very step.
            stack.push(finchar);
            cur = prev;
        }
        while cur >= 256 {
            stack.push(suffix[cur as usize]);
            cur = u32::from(prefix[cur as usize]);
        }
        finchar = suffix[cur as usize];
        stack.push(finchar);
        out.extend(stack.iter().rev());

        if free_ent < max_max_code {
            prefix[free_ent as usize] = prev as u16;
            suffix[free_ent as usize] = finchar;
            free_ent += 1;
        }
        oldcode = Some(incode);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hand-packed streams: header 1f 9d 90 (block mode, 16-bit max), then
    // 9-bit codes packed LSB-first.

    #[test]
    fn single_literal() {
        let stream = [0x1f, 0x9d, 0x90, 0x61, 0x00];
        assert_eq!(unlzw(&stream).unwrap(), b"a");
    }

    #[test]
    fn two_literals() {
        // codes: 97, 98
        let stream = [0x1f, 0x9d, 0x90, 0x61, 0xc4, 0x00];
        assert_eq!(unlzw(&stream).unwrap(), b"ab");
    }

    #[test]
    fn reuses_table_entry() {
        // codes: 97, 97, 257; the second 97 defines 257 = "aa", the third
        // code replays it -> "aaaa"
        let stream = [0x1f, 0x9d, 0x90, 0x61, 0xc2, 0x04, 0x04];
        assert_eq!(unlzw(&stream).unwrap(), b"aaaa");
    }

    #[test]
    fn kwkwk_self_reference() {
        // codes: 97, 257, 97 -> "aaaa"; 257 is consumed while being defined
        let stream = [0x1f, 0x9d, 0x90, 0x61, 0x02, 0x86, 0x01];
        assert_eq!(unlzw(&stream).unwrap(), b"aaaa");
    }

    #[test]
    fn empty_body_decodes_to_nothing() {
        assert_eq!(unlzw(&[0x1f, 0x9d, 0x90]).unwrap(), b"");
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(unlzw(&[0x1f, 0x8b, 0x08, 0x00]).is_err());
        assert!(unlzw(&[]).is_err());
    }

    #[test]
    fn rejects_out_of_range_code() {
        // First code 300 (not a literal): 300 = 0b100101100, LSB-first.
        let lo = (300u16 & 0xff) as u8;
        let hi = (300u16 >> 8) as u8;
        let stream = [0x1f, 0x9d, 0x90, lo, hi];
        assert!(unlzw(&stream).is_err());
    }
}
