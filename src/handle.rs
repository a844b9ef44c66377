//! `RevlogHandle`: the entity the rest of the crate is built around. Owns a
//! path pair, the lazily-materialized index catalog, and the snapshot-reuse
//! cache that makes sequential traversal cheap. See [`crate::traversal`] for
//! the `iterate_range`/`iterate_set` entry points built on top of this.

use tracing::info;

use crate::byte_source::{FileByteSource, SeekableByteSource};
use crate::catalog;
use crate::error::{RevlogError, Result};
use crate::payload::Inflator;
use crate::record::{decode_record, record_offset_of};

/// Resolves to the last revision of the revlog in any API that accepts a
/// revision index.
pub const TIP: i32 = -1;

/// Returned by [`RevlogHandle::find_revision_index`] when no revision
/// carries the requested node id.
pub const BAD_REVISION: i32 = -1;

pub struct RevlogHandle {
    index_path: String,
    data_path: String,
    inline: bool,
    base_revisions: Vec<i32>,
    record_offsets: Option<Vec<i32>>,
    built: bool,

    // Snapshot-reuse cache, carried across traversal calls on this handle.
    pub(crate) last_snapshot: Option<Vec<u8>>,
    pub(crate) last_ri: Option<i32>,
    pub(crate) inflator: Inflator,
}

impl RevlogHandle {
    /// Open a revlog by its `.i` index path. Nothing is read until the
    /// first query forces the catalog to be built.
    pub fn open(index_path: impl Into<String>) -> Self {
        let index_path = index_path.into();
        let data_path = derive_data_path(&index_path);
        info!(index = %index_path, "opening revlog");
        RevlogHandle {
            index_path,
            data_path,
            inline: true,
            base_revisions: Vec::new(),
            record_offsets: None,
            built: false,
            last_snapshot: None,
            last_ri: None,
            inflator: Inflator::new(),
        }
    }

    pub fn index_path(&self) -> &str {
        &self.index_path
    }

    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    pub(crate) fn ensure_built(&mut self) -> Result<()> {
        if self.built {
            return Ok(());
        }
        let mut src = FileByteSource::open(&self.index_path, true)?;
        let built = catalog::build(&mut src)?;
        src.done();
        self.inline = built.inline;
        self.base_revisions = built.base_revisions;
        self.record_offsets = built.record_offsets;
        self.built = true;
        Ok(())
    }

    pub(crate) fn inline(&self) -> bool {
        self.inline
    }

    pub(crate) fn record_offsets(&self) -> Option<&[i32]> {
        self.record_offsets.as_deref()
    }

    pub(crate) fn n(&self) -> i32 {
        self.base_revisions.len() as i32
    }

    pub(crate) fn base_rev_of(&self, ri: i32) -> i32 {
        self.base_revisions[ri as usize]
    }

    /// Total number of revisions. Forces the catalog to be built.
    pub fn count(&mut self) -> Result<usize> {
        self.ensure_built()?;
        Ok(self.base_revisions.len())
    }

    pub fn is_inline(&mut self) -> Result<bool> {
        self.ensure_built()?;
        Ok(self.inline)
    }

    /// Resolve `TIP` and validate the result lies in `[0, N)`.
    pub fn resolve_rev(&mut self, requested: i32) -> Result<i32> {
        self.ensure_built()?;
        let n = self.base_revisions.len() as i32;
        let ri = if requested == TIP { n - 1 } else { requested };
        if ri < 0 || ri >= n {
            return Err(RevlogError::InvalidRevision { requested, count: n as usize });
        }
        Ok(ri)
    }

    fn read_record(&mut self, ri: i32) -> Result<crate::record::IndexRecord> {
        let ri = self.resolve_rev(ri)?;
        let mut src = FileByteSource::open(&self.index_path, true)?;
        let off = record_offset_of(ri, self.inline, self.record_offsets.as_deref());
        src.seek_to(off)?;
        let rec = decode_record(&mut src, ri)?;
        src.done();
        Ok(rec)
    }

    pub fn data_length(&mut self, ri: i32) -> Result<i32> {
        Ok(self.read_record(ri)?.actual_len)
    }

    pub fn node_id(&mut self, ri: i32) -> Result<[u8; 20]> {
        Ok(self.read_record(ri)?.node_id)
    }

    pub fn link_revision(&mut self, ri: i32) -> Result<i32> {
        Ok(self.read_record(ri)?.link_rev)
    }

    pub fn base_revision(&mut self, ri: i32) -> Result<i32> {
        Ok(self.read_record(ri)?.base_rev)
    }

    pub fn parents(&mut self, ri: i32) -> Result<(i32, i32)> {
        let rec = self.read_record(ri)?;
        Ok((rec.p1, rec.p2))
    }

    /// Linear scan of the index stream for a matching node id.
    /// Returns [`BAD_REVISION`] if absent.
    pub fn find_revision_index(&mut self, node: &[u8; 20]) -> Result<i32> {
        self.ensure_built()?;
        let n = self.base_revisions.len() as i32;
        let mut src = FileByteSource::open(&self.index_path, true)?;
        for ri in 0..n {
            let off = record_offset_of(ri, self.inline, self.record_offsets.as_deref());
            src.seek_to(off)?;
            let rec = decode_record(&mut src, ri)?;
            if &rec.node_id == node {
                src.done();
                return Ok(ri);
            }
        }
        src.done();
        Ok(BAD_REVISION)
    }

    /// The logical offset to record in the header of a freshly appended
    /// revision, derived from the current last record.
    pub fn new_entry_offset(&mut self) -> Result<i64> {
        self.ensure_built()?;
        let n = self.base_revisions.len() as i32;
        if n == 0 {
            return Ok(0);
        }
        let last = n - 1;
        let rec = self.read_record(last)?;
        if last == 0 {
            Ok(rec.compressed_len as i64)
        } else {
            Ok(rec.offset_in_data as i64 + rec.compressed_len as i64)
        }
    }

    /// Fixup hook for an out-of-scope writer: extend the in-memory catalog
    /// after a new revision has been appended to disk. A no-op if the
    /// catalog has not yet been materialized (it will pick up the new
    /// revision on its next build).
    pub fn on_revision_added(
        &mut self,
        ri: i32,
        _nodeid: [u8; 20],
        base_rev: i32,
        phys_offset: i64,
    ) -> Result<()> {
        if !self.built {
            return Ok(());
        }
        let n = self.base_revisions.len() as i32;
        if ri != n {
            return Err(RevlogError::InconsistentAppend(format!(
                "appended revision {ri} does not extend the current length {n}"
            )));
        }
        if base_rev < 0 || base_rev > n {
            return Err(RevlogError::InconsistentAppend(format!(
                "append base revision {base_rev} out of range [0, {n}]"
            )));
        }
        self.base_revisions.push(base_rev);
        if self.inline {
            let offsets = self.record_offsets.get_or_insert_with(Vec::new);
            let phys = i32::try_from(phys_offset).map_err(|_| {
                RevlogError::InconsistentAppend(format!(
                    "physical offset {phys_offset} exceeds 32-bit range"
                ))
            })?;
            offsets.push(phys);
        }
        Ok(())
    }
}

fn derive_data_path(index_path: &str) -> String {
    match index_path.strip_suffix(".i") {
        Some(stem) => format!("{stem}.d"),
        None => format!("{index_path}.d"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_data_path_from_index_suffix() {
        assert_eq!(derive_data_path("/repo/store/00changelog.i"), "/repo/store/00changelog.d");
    }

    #[test]
    fn derives_data_path_without_suffix_by_appending() {
        assert_eq!(derive_data_path("/repo/store/00changelog"), "/repo/store/00changelog.d");
    }
}
