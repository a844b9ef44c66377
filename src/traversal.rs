//! `ReaderN1` equivalent: drives ordered traversal over a [`RevlogHandle`],
//! reconstructing each visited revision's payload and handing it to the
//! caller's [`Inspector`]. Owns the snapshot-reuse optimization described in
//! the module-level docs of [`crate::handle`] — amortizing a patch-chain
//! replay across sequential reads instead of re-walking it from scratch for
//! every revision.

use tracing::{debug, trace, warn};

use crate::byte_source::{ByteSource, FileByteSource, SeekableByteSource, SliceByteSource, VecByteSource};
use crate::error::{RevlogError, Result};
use crate::handle::RevlogHandle;
use crate::patch;
use crate::payload;
use crate::record::{decode_record, record_offset_of, IndexRecord};

/// One visited revision, handed to [`Inspector::next`]. Borrowed for the
/// duration of the call only; the payload source must not be retained past
/// it.
pub struct VisitedRevision<'a> {
    pub ri: i32,
    pub actual_len: i32,
    pub base_rev: i32,
    pub link_rev: i32,
    pub p1: i32,
    pub p2: i32,
    pub node_id: [u8; 20],
    pub payload: &'a mut dyn ByteSource,
}

/// Caller-supplied callback invoked once per visited revision. The core
/// knows nothing about changesets, manifests, or file blobs; it just hands
/// back bytes.
///
/// The optional lifecycle participation (`start`/`finish`/`stop_requested`)
/// is modeled as default no-op methods rather than a separate capability
/// object the engine has to probe for dynamically — an inspector that wants
/// progress reporting or cancellation just overrides the methods it needs.
pub trait Inspector {
    type Error: std::error::Error + Send + Sync + 'static;

    fn next(&mut self, rev: VisitedRevision<'_>) -> std::result::Result<(), Self::Error>;

    /// Called once before the first revision is visited, with the number of
    /// revisions this traversal expects to visit.
    fn start(&mut self, _total_work: usize) {}

    /// Called once after the traversal completes normally (not on an early
    /// I/O or corruption error, where resource cleanup is handled by `Drop`
    /// regardless).
    fn finish(&mut self) {}

    /// Polled after every `next` call; a `true` closes the current range
    /// without visiting any further revisions.
    fn stop_requested(&self) -> bool {
        false
    }
}

/// Visit `ri ∈ [start, end]` in ascending order. `start`/`end` may be
/// [`crate::handle::TIP`]. Returns `Ok(false)` if the inspector requested an
/// early stop.
pub fn iterate_range<I: Inspector>(
    handle: &mut RevlogHandle,
    start: i32,
    end: i32,
    need_data: bool,
    inspector: &mut I,
) -> Result<bool> {
    handle.ensure_built()?;
    let n = handle.n();
    if n == 0 {
        return Ok(true);
    }
    let start = handle.resolve_rev(start)?;
    let end = handle.resolve_rev(end)?;
    if end < start {
        return Err(RevlogError::InvalidRevision { requested: end, count: n as usize });
    }

    inspector.start((end - start + 1) as usize);
    let cont = run_range(handle, start, end, need_data, inspector)?;
    if cont {
        inspector.finish();
    }
    Ok(cont)
}

/// Visit an ascending set of revision indices. Maximal runs of consecutive
/// indices are grouped and each run is handed to the same machinery as
/// [`iterate_range`], so the snapshot-reuse optimization applies within a
/// run; the cache is invalidated across runs.
pub fn iterate_set<I: Inspector>(
    handle: &mut RevlogHandle,
    sorted_ris: &[i32],
    need_data: bool,
    inspector: &mut I,
) -> Result<bool> {
    handle.ensure_built()?;
    let n = handle.n();
    if n == 0 || sorted_ris.is_empty() {
        return Ok(true);
    }
    for &ri in sorted_ris {
        if ri < 0 || ri >= n {
            return Err(RevlogError::InvalidRevision { requested: ri, count: n as usize });
        }
    }

    inspector.start(sorted_ris.len());

    let mut i = 0;
    let mut cont = true;
    while i < sorted_ris.len() {
        let mut j = i;
        while j + 1 < sorted_ris.len() && sorted_ris[j + 1] == sorted_ris[j] + 1 {
            j += 1;
        }
        let (run_start, run_end) = (sorted_ris[i], sorted_ris[j]);

        cont = run_range(handle, run_start, run_end, need_data, inspector)?;
        if !cont {
            break;
        }
        i = j + 1;
        // Across runs the snapshot cache is invalidated, even though the
        // next run's own `choose_start` would usually discard it anyway.
        handle.last_snapshot = None;
        handle.last_ri = None;
    }

    if cont {
        inspector.finish();
    }
    Ok(cont)
}

/// Decide which revision to actually start reading from, honoring the
/// snapshot-reuse cache, and whether the cache should be discarded.
fn choose_start(handle: &RevlogHandle, start: i32) -> (i32, bool) {
    let b = handle.base_rev_of(start);
    if b == start {
        trace!(start, "self-based revision, discarding any cached snapshot");
        return (start, false);
    }
    if let Some(last_ri) = handle.last_ri {
        if b <= last_ri && last_ri < start {
            debug!(start, last_ri, "reusing cached snapshot for patch chain");
            return (last_ri + 1, true);
        }
    }
    debug!(start, base = b, "no usable cached snapshot, restarting chain at base");
    (b, false)
}

/// Core executor shared by [`iterate_range`] and [`iterate_set`]'s
/// per-group dispatch. Opens fresh streams, replays the patch chain from
/// the chosen starting point, and invokes `inspector.next` for every
/// revision `i >= start`.
fn run_range<I: Inspector>(
    handle: &mut RevlogHandle,
    start: i32,
    end: i32,
    need_data: bool,
    inspector: &mut I,
) -> Result<bool> {
    let (actual_start, reuse) = if need_data { choose_start(handle, start) } else { (start, false) };
    if !reuse {
        handle.last_snapshot = None;
        handle.last_ri = None;
    }

    let mut index_src = FileByteSource::open(handle.index_path(), true)?;
    let mut data_src: Option<FileByteSource> = if need_data && !handle.inline() {
        Some(FileByteSource::open(handle.data_path(), false)?)
    } else {
        None
    };

    let mut empty_source = VecByteSource::empty();
    let mut stopped = false;

    for i in actual_start..=end {
        let off = record_offset_of(i, handle.inline(), handle.record_offsets());
        index_src.seek_to(off)?;
        let record = decode_record(&mut index_src, i)?;

        let current = if need_data {
            Some(read_revision_bytes(handle, &mut index_src, data_src.as_mut(), i, &record)?)
        } else {
            None
        };

        if i >= start {
            let result = match &current {
                Some(bytes) => {
                    let mut source = SliceByteSource::new(bytes.as_slice());
                    inspector.next(VisitedRevision {
                        ri: i,
                        actual_len: record.actual_len,
                        base_rev: record.base_rev,
                        link_rev: record.link_rev,
                        p1: record.p1,
                        p2: record.p2,
                        node_id: record.node_id,
                        payload: &mut source,
                    })
                }
                None => inspector.next(VisitedRevision {
                    ri: i,
                    actual_len: record.actual_len,
                    base_rev: record.base_rev,
                    link_rev: record.link_rev,
                    p1: record.p1,
                    p2: record.p2,
                    node_id: record.node_id,
                    payload: &mut empty_source,
                }),
            };
            if let Err(e) = result {
                warn!(ri = i, "inspector callback failed, unwinding traversal");
                return Err(RevlogError::InspectorError(Box::new(e)));
            }
        }

        if let Some(bytes) = current {
            handle.last_snapshot = Some(bytes);
            handle.last_ri = Some(i);
        }

        if i >= start && inspector.stop_requested() {
            debug!(stopped_at = i, "inspector requested stop");
            stopped = true;
            break;
        }
    }

    if let Some(src) = data_src {
        src.done();
    }
    index_src.done();

    Ok(!stopped)
}

/// Read, decode, and (if this is a patch) reconstruct revision `i`'s
/// payload, using and updating `handle`'s snapshot cache.
fn read_revision_bytes(
    handle: &mut RevlogHandle,
    index_src: &mut FileByteSource,
    data_src: Option<&mut FileByteSource>,
    i: i32,
    record: &IndexRecord,
) -> Result<Vec<u8>> {
    if record.compressed_len < 0 {
        return Err(RevlogError::corrupt(format!(
            "revision {i} has negative compressed length {}",
            record.compressed_len
        )));
    }
    if record.actual_len < 0 {
        return Err(RevlogError::corrupt(format!(
            "revision {i} has negative uncompressed length {}",
            record.actual_len
        )));
    }
    let compressed_len = record.compressed_len as usize;
    let actual_len = record.actual_len as usize;

    let mut chunk = vec![0u8; compressed_len];
    if handle.inline() {
        index_src.read_bytes(&mut chunk)?;
    } else {
        let data_src = data_src.expect("separate layout must have a data stream open");
        data_src.seek_to(record.offset_in_data)?;
        data_src.read_bytes(&mut chunk)?;
    }

    let decoded = payload::decode(&chunk, &mut handle.inflator)?;
    let is_patch = record.base_rev != i;

    if !is_patch {
        trace!(ri = i, len = decoded.len(), "materialized base snapshot");
        return Ok(decoded);
    }

    if decoded.is_empty() {
        let base = handle.last_snapshot.take().ok_or_else(|| {
            RevlogError::corrupt(format!("revision {i} is an empty patch with no cached base"))
        })?;
        if base.len() != actual_len {
            return Err(RevlogError::corrupt(format!(
                "revision {i} is an empty patch but cached base has length {} (expected {})",
                base.len(),
                actual_len
            )));
        }
        trace!(ri = i, "empty patch, reusing previous snapshot verbatim");
        return Ok(base);
    }

    let base = handle
        .last_snapshot
        .as_deref()
        .ok_or_else(|| RevlogError::corrupt(format!("revision {i} is a patch with no cached base")))?;
    let hunks = patch::parse_hunks(&decoded)?;
    trace!(ri = i, hunks = hunks.len(), "applying patch chain");
    patch::apply(base, &hunks, actual_len)
}
