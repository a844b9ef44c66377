//! Mercurial's `mpatch` binary format: a concatenation of hunks, each a
//! fixed 12-byte header `(start: u32, end: u32, len: u32)` followed by
//! `len` replacement bytes. Hunks are sorted by `start` and non-overlapping
//! in source coordinates.
//!
//! `a` - start of the half-open range being replaced
//! `b` - end of that range (`b >= a`)
//! `c` - length of the replacement bytes that follow

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{RevlogError, Result};

/// One replace-this-range-with-these-bytes instruction.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub start: usize,
    pub end: usize,
    pub bytes: Vec<u8>,
}

/// Parse a raw `mpatch` byte stream into its hunks, in on-disk order (which
/// is also `start` order; the format does not store a hunk count).
pub fn parse_hunks(raw: &[u8]) -> Result<Vec<Hunk>> {
    let total_len = raw.len() as u64;
    let mut cur = Cursor::new(raw);
    let mut hunks = Vec::new();

    while cur.position() < total_len {
        if total_len - cur.position() < 12 {
            return Err(RevlogError::corrupt("truncated mpatch hunk header"));
        }
        let start = cur.read_u32::<BigEndian>().map_err(RevlogError::Io)? as usize;
        let end = cur.read_u32::<BigEndian>().map_err(RevlogError::Io)? as usize;
        let len = cur.read_u32::<BigEndian>().map_err(RevlogError::Io)? as usize;

        if end < start {
            return Err(RevlogError::corrupt(format!(
                "mpatch hunk has end {end} before start {start}"
            )));
        }

        let pos = cur.position() as usize;
        if raw.len() - pos < len {
            return Err(RevlogError::corrupt("truncated mpatch hunk body"));
        }
        let bytes = raw[pos..pos + len].to_vec();
        cur.set_position((pos + len) as u64);

        hunks.push(Hunk { start, end, bytes });
    }

    Ok(hunks)
}

/// Apply `hunks` (already parsed, in `start` order) to `base`, producing a
/// buffer of exactly `declared_output_len` bytes.
///
/// An empty hunk list is legal and yields `base` unchanged; callers on the
/// traversal hot path should special-case that before calling into here,
/// since it needs no allocation beyond the final copy.
pub fn apply(base: &[u8], hunks: &[Hunk], declared_output_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(declared_output_len);
    let mut cursor = 0usize;

    for hunk in hunks {
        if hunk.start < cursor || hunk.end > base.len() {
            return Err(RevlogError::corrupt(format!(
                "mpatch hunk [{}, {}) out of range for base of length {} at cursor {}",
                hunk.start,
                hunk.end,
                base.len(),
                cursor
            )));
        }
        out.extend_from_slice(&base[cursor..hunk.start]);
        out.extend_from_slice(&hunk.bytes);
        cursor = hunk.end;
    }
    out.extend_from_slice(&base[cursor..]);

    if out.len() != declared_output_len {
        return Err(RevlogError::corrupt(format!(
            "patched output length {} does not match declared length {declared_output_len}",
            out.len()
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk_bytes(start: u32, end: u32, bytes: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&start.to_be_bytes());
        buf.extend_from_slice(&end.to_be_bytes());
        buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(bytes);
        buf
    }

    #[test]
    fn parses_single_hunk() {
        let raw = hunk_bytes(2, 4, &[0x58]);
        let hunks = parse_hunks(&raw).unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].start, hunks[0].end), (2, 4));
        assert_eq!(hunks[0].bytes, vec![0x58]);
    }

    #[test]
    fn parses_multiple_hunks_back_to_back() {
        let mut raw = hunk_bytes(0, 0, b"XY");
        raw.extend_from_slice(&hunk_bytes(5, 6, b"Z"));
        let hunks = parse_hunks(&raw).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].start, 5);
    }

    #[test]
    fn rejects_truncated_header() {
        let raw = vec![0u8; 10];
        assert!(parse_hunks(&raw).is_err());
    }

    #[test]
    fn applies_single_replacement_in_middle() {
        let base = b"abcdef";
        let hunks = vec![Hunk { start: 2, end: 4, bytes: vec![0x58] }];
        let out = apply(base, &hunks, 5).unwrap();
        assert_eq!(out, b"abXef");
    }

    #[test]
    fn empty_hunks_yield_base_unchanged() {
        let base = b"abcdef";
        let out = apply(base, &[], base.len()).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn rejects_output_length_mismatch() {
        let base = b"abcdef";
        let hunks = vec![Hunk { start: 2, end: 4, bytes: vec![0x58] }];
        assert!(apply(base, &hunks, 99).is_err());
    }

    #[test]
    fn rejects_out_of_range_hunk() {
        let base = b"abc";
        let hunks = vec![Hunk { start: 0, end: 10, bytes: vec![] }];
        assert!(apply(base, &hunks, 0).is_err());
    }
}
