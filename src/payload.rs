//! Turns one revision's raw on-disk chunk into the bytes the rest of the
//! crate works with, dispatching on the one-byte payload tag described in
//! the index format: a zlib stream, a literal with a skip marker, or a bare
//! literal.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{RevlogError, Result};

const SCRATCH_LEN: usize = 10 * 1024;

const TAG_ZLIB: u8 = b'x';
const TAG_LITERAL_MARKED: u8 = b'u';

/// A zlib inflator reused across every revision of a traversal, avoiding a
/// fresh allocation per record. Must be reset before each use.
pub struct Inflator {
    decompress: Decompress,
    scratch: [u8; SCRATCH_LEN],
}

impl Inflator {
    pub fn new() -> Self {
        Inflator { decompress: Decompress::new(true), scratch: [0u8; SCRATCH_LEN] }
    }

    fn inflate_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompress.reset(true);
        let mut out = Vec::new();
        let mut in_pos = 0usize;
        loop {
            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(&input[in_pos..], &mut self.scratch, FlushDecompress::Finish)
                .map_err(|e| RevlogError::corrupt(format!("zlib inflate failed: {e}")))?;
            let produced = (self.decompress.total_out() - before_out) as usize;
            out.extend_from_slice(&self.scratch[..produced]);
            in_pos += (self.decompress.total_in() - before_in) as usize;

            if status == Status::StreamEnd {
                break;
            }
            if produced == 0 {
                return Err(RevlogError::corrupt("truncated zlib stream in revlog payload"));
            }
        }
        Ok(out)
    }
}

impl Default for Inflator {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a single chunk of `compressed_len` bytes starting at the front of
/// `chunk`, per the tag-byte dispatch in the index format. `chunk` must be
/// exactly `compressed_len` bytes (the caller has already sliced or read
/// that much from the backing stream).
///
/// Returns the decoded bytes: for a known `actual_len` (a base snapshot)
/// this is the literal revision content; for a patch (`actual_len` unused
/// by the tag dispatch itself, but see [`crate::patch`]) it is the raw
/// `mpatch` hunk stream.
pub fn decode(chunk: &[u8], inflator: &mut Inflator) -> Result<Vec<u8>> {
    if chunk.is_empty() {
        return Ok(Vec::new());
    }

    match chunk[0] {
        TAG_ZLIB => inflator.inflate_all(chunk),
        TAG_LITERAL_MARKED => Ok(chunk[1..].to_vec()),
        _ => Ok(chunk.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn decodes_zlib_tagged_payload() {
        let compressed = zlib_compress(b"hello world");
        let mut inflator = Inflator::new();
        let out = decode(&compressed, &mut inflator).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn reused_inflator_decodes_successive_chunks() {
        let mut inflator = Inflator::new();
        let a = decode(&zlib_compress(b"first"), &mut inflator).unwrap();
        let b = decode(&zlib_compress(b"second, a bit longer"), &mut inflator).unwrap();
        assert_eq!(a, b"first");
        assert_eq!(b, b"second, a bit longer");
    }

    #[test]
    fn decodes_literal_marked_payload() {
        let mut chunk = vec![b'u'];
        chunk.extend_from_slice(b"abcdef");
        let mut inflator = Inflator::new();
        let out = decode(&chunk, &mut inflator).unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn decodes_bare_literal_payload() {
        let chunk = b"0abcdef".to_vec();
        let mut inflator = Inflator::new();
        let out = decode(&chunk, &mut inflator).unwrap();
        assert_eq!(out, b"0abcdef");
    }

    #[test]
    fn empty_chunk_yields_empty_payload() {
        let mut inflator = Inflator::new();
        let out = decode(&[], &mut inflator).unwrap();
        assert!(out.is_empty());
    }
}
