//! Parses a `.i` file exactly once into the two parallel arrays the rest of
//! the crate relies on: which revision starts each delta chain
//! (`base_revisions`), and — for inline revlogs, where payload is
//! interleaved with index records — the physical byte offset of each
//! record (`record_offsets`).

use tracing::debug;

use crate::byte_source::SeekableByteSource;
use crate::error::{RevlogError, Result};

/// Bit 16 of the revision-0 version word: payload is interleaved with the
/// index records in the `.i` file, and there is no `.d` file.
const INLINE_FLAG: u32 = 1 << 16;

/// The parsed outline of a revlog's index.
pub struct Catalog {
    pub inline: bool,
    pub base_revisions: Vec<i32>,
    /// `Some` iff `inline`; `record_offsets[ri]` is the byte offset of
    /// revision `ri`'s record within the index stream.
    pub record_offsets: Option<Vec<i32>>,
}

/// Validate and narrow a 48-bit inline offset (the accumulated `offset`
/// word read while scanning) down to a plain `i64` record offset.
fn offset_to_int(offset: u64) -> Result<i64> {
    if offset >> 32 != 0 {
        return Err(RevlogError::corrupt(format!(
            "inline data offset {offset} overflows 32 bits"
        )));
    }
    Ok(offset as i64)
}

/// Walk the index stream once and build the [`Catalog`]. `src` must be
/// positioned at the start of the file (or will be seeked there).
pub fn build<S: SeekableByteSource + ?Sized>(src: &mut S) -> Result<Catalog> {
    let total_len = src.length();
    if total_len == 0 {
        debug!("empty index file; treating as inline for future appends");
        return Ok(Catalog { inline: true, base_revisions: Vec::new(), record_offsets: Some(Vec::new()) });
    }

    src.seek_to(0)?;
    let version = src.read_i32_be()? as u32;
    let _reserved = src.read_i32_be()?;
    let inline = (version & INLINE_FLAG) != 0;

    let mut base_revisions = Vec::new();
    let mut record_offsets = if inline { Some(Vec::new()) } else { None };
    let mut offset: u64 = 0;

    loop {
        let compressed_len = src.read_i32_be()?;
        let _actual_len = src.read_i32_be()?;
        let base_rev = src.read_i32_be()?;
        src.skip(44)?; // link_rev, p1, p2, node id, reserved

        if compressed_len < 0 {
            return Err(RevlogError::corrupt(format!(
                "negative compressed length {compressed_len} for revision {}",
                base_revisions.len()
            )));
        }

        base_revisions.push(base_rev);

        if inline {
            let offsets = record_offsets.as_mut().expect("inline catalog always tracks offsets");
            let physical = offset_to_int(offset)? + 64 * offsets.len() as i64;
            offsets.push(i32::try_from(physical).map_err(|_| {
                RevlogError::corrupt(format!("inline record offset {physical} exceeds i32 range"))
            })?);

            src.skip(compressed_len as u64)?;
        }

        let pos = src.position()?;
        if pos >= total_len {
            break;
        }

        let word = src.read_u64_be()?;
        offset = word >> 16;
    }

    debug!(
        revisions = base_revisions.len(),
        inline, "revlog index catalog built"
    );

    Ok(Catalog { inline, base_revisions, record_offsets })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::VecByteSource;

    fn header(inline: bool) -> [u8; 8] {
        let version: u32 = 1 | if inline { INLINE_FLAG } else { 0 };
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&version.to_be_bytes());
        buf
    }

    fn record(offset: u64, flags: u16, compressed_len: i32, actual_len: i32, base_rev: i32) -> Vec<u8> {
        let word = (offset << 16) | flags as u64;
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&word.to_be_bytes());
        buf.extend_from_slice(&compressed_len.to_be_bytes());
        buf.extend_from_slice(&actual_len.to_be_bytes());
        buf.extend_from_slice(&base_rev.to_be_bytes());
        buf.extend_from_slice(&0i32.to_be_bytes());
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 32]);
        buf
    }

    #[test]
    fn empty_file_is_inline_with_zero_revisions() {
        let mut src = VecByteSource::new(Vec::new());
        let cat = build(&mut src).unwrap();
        assert!(cat.inline);
        assert_eq!(cat.base_revisions.len(), 0);
        assert_eq!(cat.record_offsets, Some(Vec::new()));
    }

    #[test]
    fn inline_catalog_tracks_interleaved_payload() {
        let mut buf = header(true).to_vec();
        buf.extend_from_slice(&record(0, 0, 5, 5, 0)[8..]); // rev 0 header word consumed above
        buf.extend_from_slice(b"hello"); // 5 bytes of payload

        // revision 1: self-based record of 3 bytes of payload. Its stored
        // offset field (5) is the cumulative data-only byte count, matching
        // what a non-inline revlog would have written to this field.
        buf.extend_from_slice(&record(5, 0, 3, 3, 1));
        buf.extend_from_slice(b"abc");

        let mut src = VecByteSource::new(buf);
        let cat = build(&mut src).unwrap();
        assert!(cat.inline);
        assert_eq!(cat.base_revisions, vec![0, 1]);
        assert_eq!(cat.record_offsets.unwrap(), vec![0, 69]);
    }

    #[test]
    fn separate_catalog_has_no_offsets_table() {
        let mut buf = header(false).to_vec();
        buf.extend_from_slice(&record(0, 0, 5, 5, 0)[8..]);
        buf.extend_from_slice(&record(5, 0, 3, 3, 0));

        let mut src = VecByteSource::new(buf);
        let cat = build(&mut src).unwrap();
        assert!(!cat.inline);
        assert_eq!(cat.base_revisions, vec![0, 0]);
        assert!(cat.record_offsets.is_none());
    }

    #[test]
    fn separate_catalog_rejects_negative_compressed_length() {
        let mut buf = header(false).to_vec();
        buf.extend_from_slice(&record(0, 0, 5, 5, 0)[8..]);
        buf.extend_from_slice(&record(5, 0, -1, 3, 0));

        let mut src = VecByteSource::new(buf);
        let err = build(&mut src).unwrap_err();
        assert!(matches!(err, RevlogError::CorruptIndex(_)));
    }

    #[test]
    fn inline_catalog_rejects_negative_compressed_length() {
        let mut buf = header(true).to_vec();
        buf.extend_from_slice(&record(0, 0, -1, 5, 0)[8..]);

        let mut src = VecByteSource::new(buf);
        let err = build(&mut src).unwrap_err();
        assert!(matches!(err, RevlogError::CorruptIndex(_)));
    }
}
