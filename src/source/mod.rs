//! Git history providers
//!
//! The indexer only sees the [`GitSource`] trait. Two implementations
//! ship with the crate:
//!
//! - **git2**: embedded libgit2, no external process
//! - **cli**: shells out to `git` and parses its `log -z --raw` stream

mod cli;
mod git2_source;

pub use cli::{parse_log, GitCliSource};
pub use git2_source::Git2Source;

use anyhow::{bail, Context, Result};

use crate::model::CommitDiff;

/// Read access to one repository's first-parent history
pub trait GitSource: Send + Sync {
    /// First-parent ancestry of `commit`, newest first; element 0 is `commit` itself
    fn rev_list(&self, commit: &str) -> Result<Vec<String>>;

    /// The `n` most recent first-parent commits up to `commit`, oldest first,
    /// each with its path changes relative to its first parent
    fn log_reverse(&self, commit: &str, n: usize) -> Result<Vec<CommitDiff>>;

    /// Raw file content of `path` at `commit`
    fn cat_file(&self, commit: &str, path: &str) -> Result<Vec<u8>>;

    /// Raw content of the blob object `oid`, as carried in [`PathStatus::blob`]
    ///
    /// [`PathStatus::blob`]: crate::model::PathStatus::blob
    fn cat_blob(&self, oid: &str) -> Result<Vec<u8>> {
        bail!("this source cannot read blob {oid} by object ID")
    }

    /// Resolve a revision expression (`HEAD`, branch, short hash) to a commit ID
    fn resolve(&self, rev: &str) -> Result<String> {
        self.rev_list(rev)?
            .into_iter()
            .next()
            .with_context(|| format!("revision {rev} has no commits"))
    }
}
