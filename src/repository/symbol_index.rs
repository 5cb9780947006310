//! Library entry point
//!
//! Owns the store and the per-repository locks, and keeps last-access
//! bookkeeping current. The CLI and any service layer go through here.

use anyhow::{Context, Result};
use log::info;
use std::time::Instant;

use crate::model::{BlobHit, RepoSummary};
use crate::parser::SymbolParser;
use crate::source::GitSource;

use super::indexer::{
    CancelFlag, IndexReport, IndexStore, Indexer, IndexerConfig, NoopProgress, ProgressReporter, TaskLog,
};
use super::{Database, RepoLocks};

/// Per-run knobs for `SymbolIndex::index`
pub struct IndexRun {
    pub progress: Box<dyn ProgressReporter>,
    pub cancel: CancelFlag,
}

impl Default for IndexRun {
    fn default() -> Self {
        Self {
            progress: Box::new(NoopProgress),
            cancel: CancelFlag::default(),
        }
    }
}

pub struct SymbolIndex {
    db: Database,
    locks: RepoLocks,
    config: IndexerConfig,
}

impl SymbolIndex {
    /// Open (or create) the store at `db_path` and bring its schema up to date
    pub async fn open(db_path: &str) -> Result<Self> {
        let db = Database::new(db_path)
            .await
            .with_context(|| format!("opening index at {db_path}"))?;
        db.init_schema().await?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            locks: RepoLocks::new(),
            config: IndexerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Index `repo` up to `target`, holding the repository's lock for the whole run
    pub async fn index(
        &self,
        repo: &str,
        git: &dyn GitSource,
        parser: &dyn SymbolParser,
        target: &str,
        run: IndexRun,
        tasks: &mut TaskLog,
    ) -> Result<IndexReport> {
        let _guard = self.locks.lock(repo).await;
        self.db.touch_repo(repo).await?;

        Indexer::new(&self.db, git, parser)
            .with_config(self.config.clone())
            .with_progress(run.progress)
            .with_cancel(run.cancel)
            .index(repo, target, tasks)
            .await
    }

    /// Blobs visible at `commit` in `repo`, optionally only those defining `symbol`
    pub async fn search(
        &self,
        repo: &str,
        commit: &str,
        symbol: Option<&str>,
        tasks: &mut TaskLog,
    ) -> Result<Vec<BlobHit>> {
        let start = Instant::now();
        let hits = IndexStore::search(&self.db, repo, commit, symbol).await?;
        tasks.record("search", start.elapsed());
        self.db.touch_repo(repo).await?;
        Ok(hits)
    }

    /// Skip-chain of an indexed commit
    pub async fn hops(&self, repo: &str, commit: &str) -> Result<Vec<String>> {
        IndexStore::hops(&self.db, repo, commit).await
    }

    pub async fn is_indexed(&self, repo: &str, commit: &str) -> Result<bool> {
        self.db.is_commit_indexed(repo, commit).await
    }

    pub async fn repos(&self) -> Result<Vec<RepoSummary>> {
        self.db.list_repos().await
    }

    /// Keep the `keep` most recently used repositories, delete the rest.
    ///
    /// Returns the evicted repositories.
    pub async fn evict(&self, keep: usize) -> Result<Vec<String>> {
        let stale = self.db.stale_repos(keep).await?;
        for repo in &stale {
            let guard = self.locks.lock(repo).await;
            self.db
                .delete_repo(repo)
                .await
                .with_context(|| format!("evicting {repo}"))?;
            drop(guard);
            self.locks.forget(repo);
            info!("evicted {repo}");
        }
        Ok(stale)
    }
}
