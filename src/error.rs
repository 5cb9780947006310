//! Typed conditions callers may want to tell apart
//!
//! Everything else travels as `anyhow::Error` with context attached.
//! These variants sit in the same chain, so callers recover them with
//! `err.downcast_ref::<IndexError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("commit {commit} is not indexed")]
    NotIndexed { commit: String },

    #[error("corrupt ancestry at {commit}: {reason}")]
    CorruptAncestry { commit: String, reason: String },

    #[error("no visible blob for {path} when indexing {commit}")]
    MissingBlob { commit: String, path: String },

    #[error("indexing cancelled after {indexed} commits (tip {tip})")]
    Cancelled { indexed: usize, tip: String },
}

impl IndexError {
    /// Find an `IndexError` anywhere in an anyhow chain
    pub fn find(err: &anyhow::Error) -> Option<&IndexError> {
        err.chain().find_map(|cause| cause.downcast_ref::<IndexError>())
    }
}
