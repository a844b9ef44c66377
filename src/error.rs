//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns `Result<T, RevlogError>`.
//! I/O failures are distinguished by which file was being read (index vs.
//! data) so a caller can tell "this revlog is corrupt" from "this revlog
//! lives on a flaky filesystem" without inspecting the source error.

use std::io;

use thiserror::Error;

/// Errors surfaced by the revlog reader.
#[derive(Error, Debug)]
pub enum RevlogError {
    /// A requested revision index was outside `[0, N)` and was not `TIP`.
    #[error("invalid revision {requested} (revlog has {count} revisions)")]
    InvalidRevision { requested: i32, count: usize },

    /// The index is malformed: a short read, an impossible field value, an
    /// inline-offset overflow, a patch/record size mismatch, and similar.
    #[error("corrupt revlog index: {0}")]
    CorruptIndex(String),

    /// An I/O failure while reading the `.i` file.
    #[error("I/O error reading index file {path}: {source}")]
    IndexIoError { path: String, source: io::Error },

    /// An I/O failure while reading the `.d` file.
    #[error("I/O error reading data file {path}: {source}")]
    DataIoError { path: String, source: io::Error },

    /// The `on_revision_added` append hook's preconditions were violated.
    #[error("inconsistent append: {0}")]
    InconsistentAppend(String),

    /// The inspector callback itself failed; the engine unwinds its
    /// buffers and re-raises this, boxed so the core stays decoupled from
    /// whatever error type the caller's inspector uses.
    #[error("inspector callback failed: {0}")]
    InspectorError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A generic I/O failure not yet attributable to a specific file
    /// (e.g. during path derivation before either file is opened).
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RevlogError>;

impl RevlogError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        RevlogError::CorruptIndex(msg.into())
    }
}
