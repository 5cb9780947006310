//! Index store trait for persistence abstraction
//!
//! Decouples the indexing loop from database implementation details.

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::model::{BlobHit, Tip};

use super::types::PreparedCommit;

/// Persistence layer for the commit index
#[allow(async_fn_in_trait)]
pub trait IndexStore {
    /// Heights of whichever of `commits` are already indexed
    async fn lookup_heights(&self, repo: &str, commits: &[String]) -> Result<FxHashMap<String, i64>>;

    /// Apply one prepared commit on top of `tip` atomically and return the new tip
    async fn apply_commit(&self, repo: &str, tip: &Tip, commit: &PreparedCommit) -> Result<Tip>;

    /// Skip-chain of an indexed commit (commit first, root last)
    async fn hops(&self, repo: &str, commit: &str) -> Result<Vec<String>>;

    /// Blobs visible at `commit`, optionally restricted to one exact symbol name
    async fn search(&self, repo: &str, commit: &str, symbol: Option<&str>) -> Result<Vec<BlobHit>>;
}
