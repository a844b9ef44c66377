//! Decoding a single fixed-size (64-byte) revlog index record.

use crate::byte_source::ByteSource;
use crate::error::Result;

/// Size in bytes of one index record on disk.
pub const RECORD_SIZE: u64 = 64;

/// The decoded fields of one index record, independent of layout.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Byte offset of this revision's payload in the data stream (or, for
    /// inline layout, in the index stream itself, immediately after the
    /// record). Always 0 for revision 0, whose on-disk offset field is
    /// overlaid with the revlog version/feature word.
    pub offset_in_data: u64,
    pub flags: u16,
    pub compressed_len: i32,
    pub actual_len: i32,
    pub base_rev: i32,
    pub link_rev: i32,
    pub p1: i32,
    pub p2: i32,
    pub node_id: [u8; 20],
}

/// Decode one 64-byte record from `src`, which must already be positioned
/// at the record's start.
pub fn decode_record<S: ByteSource + ?Sized>(src: &mut S, ri: i32) -> Result<IndexRecord> {
    let word = src.read_u64_be()?;
    let flags = (word & 0xFFFF) as u16;
    let offset_in_data = if ri == 0 { 0 } else { word >> 16 };

    let compressed_len = src.read_i32_be()?;
    let actual_len = src.read_i32_be()?;
    let base_rev = src.read_i32_be()?;
    let link_rev = src.read_i32_be()?;
    let p1 = src.read_i32_be()?;
    let p2 = src.read_i32_be()?;

    let mut node_id = [0u8; 20];
    src.read_bytes(&mut node_id)?;
    src.skip(12)?; // reserved, always zero

    Ok(IndexRecord {
        offset_in_data,
        flags,
        compressed_len,
        actual_len,
        base_rev,
        link_rev,
        p1,
        p2,
        node_id,
    })
}

/// Byte offset of revision `ri`'s index record within the `.i` file.
pub fn record_offset_of(ri: i32, inline: bool, record_offsets: Option<&[i32]>) -> u64 {
    if inline {
        record_offsets.expect("record_offsets must be populated for an inline revlog")[ri as usize] as u64
    } else {
        ri as u64 * RECORD_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::VecByteSource;

    fn sample_record(offset_flags: u64, compressed_len: i32, actual_len: i32, base_rev: i32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&offset_flags.to_be_bytes());
        buf.extend_from_slice(&compressed_len.to_be_bytes());
        buf.extend_from_slice(&actual_len.to_be_bytes());
        buf.extend_from_slice(&base_rev.to_be_bytes());
        buf.extend_from_slice(&7i32.to_be_bytes()); // link_rev
        buf.extend_from_slice(&(-1i32).to_be_bytes()); // p1
        buf.extend_from_slice(&(-1i32).to_be_bytes()); // p2
        buf.extend_from_slice(&[0xAB; 20]); // node id
        buf.extend_from_slice(&[0u8; 12]); // reserved
        buf
    }

    #[test]
    fn decodes_revision_zero_with_offset_override() {
        // revision 0's top 32 bits carry version info, not a real offset.
        let buf = sample_record(0x0000_0001_0000_0000, 9, 9, 0);
        let mut src = VecByteSource::new(buf);
        let rec = decode_record(&mut src, 0).unwrap();
        assert_eq!(rec.offset_in_data, 0);
        assert_eq!(rec.base_rev, 0);
        assert_eq!(rec.node_id, [0xAB; 20]);
    }

    #[test]
    fn decodes_nonzero_revision_offset() {
        let buf = sample_record(1234 << 16, 9, 9, 1);
        let mut src = VecByteSource::new(buf);
        let rec = decode_record(&mut src, 1).unwrap();
        assert_eq!(rec.offset_in_data, 1234);
        assert_eq!(rec.link_rev, 7);
        assert_eq!(rec.p1, -1);
    }

    #[test]
    fn record_offset_of_separate_layout_is_dense() {
        assert_eq!(record_offset_of(3, false, None), 192);
    }

    #[test]
    fn record_offset_of_inline_layout_uses_table() {
        let offsets = vec![0, 73, 150];
        assert_eq!(record_offset_of(2, true, Some(&offsets)), 150);
    }
}
