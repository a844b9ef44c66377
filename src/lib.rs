//! Read-only support for Mercurial's revlog container format: the
//! append-only, content-addressed, delta-compressed sequence of revisions
//! backing changelogs, manifests, and tracked files.
//!
//! This crate owns decoding the packed binary index, reconstructing a
//! revision from a base snapshot plus a chain of binary patches, and
//! driving ordered traversal with the snapshot-reuse optimization that
//! makes scanning a revlog sequentially cheap. It knows nothing about what
//! the bytes it hands back mean — that is the caller's [`traversal::Inspector`]
//! to interpret.

pub mod byte_source;
pub mod catalog;
pub mod error;
pub mod handle;
pub mod patch;
pub mod payload;
pub mod record;
pub mod traversal;

pub use error::{RevlogError, Result};
pub use handle::{RevlogHandle, BAD_REVISION, TIP};
pub use traversal::{iterate_range, iterate_set, Inspector, VisitedRevision};
