//! Database implementation of IndexStore

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::model::{BlobHit, Tip};
use crate::repository::{BlobRecord, CommitRecord, Database};

use super::store::IndexStore;
use super::types::PreparedCommit;

impl IndexStore for Database {
    async fn lookup_heights(&self, repo: &str, commits: &[String]) -> Result<FxHashMap<String, i64>> {
        self.load_heights(repo, commits).await
    }

    async fn apply_commit(&self, repo: &str, tip: &Tip, commit: &PreparedCommit) -> Result<Tip> {
        // Borrow everything from the prepared commit; nothing is copied
        let record = CommitRecord {
            commit: &commit.commit,
            closes: commit.closes.iter().map(String::as_str).collect(),
            opens: commit
                .opens
                .iter()
                .map(|blob| BlobRecord::new(blob.path.as_str(), blob.symbols.as_slice()))
                .collect(),
        };
        Database::apply_commit(self, repo, tip, &record).await
    }

    async fn hops(&self, repo: &str, commit: &str) -> Result<Vec<String>> {
        self.load_hops(repo, commit).await
    }

    async fn search(&self, repo: &str, commit: &str, symbol: Option<&str>) -> Result<Vec<BlobHit>> {
        Database::search(self, repo, commit, symbol).await
    }
}
