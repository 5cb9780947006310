//! Incremental commit indexer
//!
//! Extends the store from the nearest indexed ancestor of a target commit
//! up to the target, one commit per transaction.
//!
//! # Architecture
//!
//! - **types**: Domain types (PreparedCommit, IndexReport, IndexerConfig)
//! - **store**: Persistence layer trait
//! - **db_store**: Database implementation of IndexStore
//! - **progress**: Progress reporting abstraction
//! - **tasklog**: Per-call profiling context
//! - **cancel**: Cooperative cancellation between commits
//! - **Indexer**: Main orchestrator

mod cancel;
mod db_store;
mod progress;
mod store;
mod tasklog;
mod types;

pub use cancel::CancelFlag;
pub use progress::{reporter_for, IndicatifProgress, NoopProgress, ProgressHandle, ProgressReporter};
pub use store::IndexStore;
pub use tasklog::{TaskLog, TaskStat};
pub use types::{IndexReport, IndexerConfig, NewBlob, PreparedCommit};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::time::Instant;

use crate::error::IndexError;
use crate::model::{CommitDiff, Tip};
use crate::parser::SymbolParser;
use crate::source::GitSource;

/// Drives one repository's index forward
pub struct Indexer<'a, S: IndexStore> {
    store: &'a S,
    git: &'a dyn GitSource,
    parser: &'a dyn SymbolParser,
    config: IndexerConfig,
    progress: Box<dyn ProgressReporter>,
    cancel: CancelFlag,
}

impl<'a, S: IndexStore> Indexer<'a, S> {
    pub fn new(store: &'a S, git: &'a dyn GitSource, parser: &'a dyn SymbolParser) -> Self {
        Self {
            store,
            git,
            parser,
            config: IndexerConfig::default(),
            progress: Box::new(NoopProgress),
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Index `repo` up to `target`.
    ///
    /// Safe to call again after any failure: commits already applied are
    /// found as the new tip and skipped.
    pub async fn index(&self, repo: &str, target: &str, tasks: &mut TaskLog) -> Result<IndexReport> {
        // Phase 1: Resolve first-parent history of the target
        let revs = tasks
            .time("rev_list", || self.git.rev_list(target))
            .with_context(|| format!("listing history of {target}"))?;
        let Some(resolved) = revs.first().cloned() else {
            bail!("revision {target} has no commits");
        };

        // Phase 2: Locate the nearest indexed ancestor
        let phase_start = Instant::now();
        let (start, missing) = self.locate_tip(repo, &revs).await?;
        tasks.record("locate_tip", phase_start.elapsed());

        if missing == 0 {
            debug!("{repo} already indexed at {resolved} (height {})", start.height);
            return Ok(IndexReport {
                target: resolved,
                tip: start.clone(),
                start,
                indexed: 0,
            });
        }

        info!(
            "{repo}: {missing} commits to index on top of height {}",
            start.height
        );

        // Phase 3: Pull the missing history, oldest first
        let diffs = tasks
            .time("log_reverse", || self.git.log_reverse(&resolved, missing))
            .with_context(|| format!("reading {missing} commits up to {resolved}"))?;
        if diffs.len() != missing || diffs.last().map(|d| d.commit.as_str()) != Some(resolved.as_str()) {
            bail!(
                "git log returned {} commits ending at {:?}, expected {} ending at {}",
                diffs.len(),
                diffs.last().map(|d| d.commit.as_str()),
                missing,
                resolved
            );
        }

        // Phase 4: Apply commits one transaction at a time
        let pb = self.progress.start(repo, start.height, missing as u64);
        let mut tip = start.clone();
        let mut indexed = 0;
        let outcome = self
            .apply_all(repo, &diffs, &mut tip, &mut indexed, pb.as_ref(), tasks)
            .await;
        pb.finish();
        outcome?;

        info!("{repo}: indexed {indexed} commits, tip {} at height {}", tip.commit, tip.height);
        Ok(IndexReport {
            target: resolved,
            start,
            tip,
            indexed,
        })
    }

    async fn apply_all(
        &self,
        repo: &str,
        diffs: &[CommitDiff],
        tip: &mut Tip,
        indexed: &mut usize,
        pb: &dyn ProgressHandle,
        tasks: &mut TaskLog,
    ) -> Result<()> {
        for diff in diffs {
            if self.cancel.is_cancelled() {
                info!("{repo}: cancelled after {indexed} commits");
                return Err(IndexError::Cancelled {
                    indexed: *indexed,
                    tip: tip.commit.clone(),
                }
                .into());
            }

            let prepared = self
                .prepare(diff, tasks)
                .with_context(|| format!("preparing commit {}", diff.commit))?;

            let phase_start = Instant::now();
            *tip = self
                .store
                .apply_commit(repo, tip, &prepared)
                .await
                .with_context(|| format!("indexing commit {}", diff.commit))?;
            tasks.record("apply_commit", phase_start.elapsed());

            *indexed += 1;
            pb.applied(&tip.commit, tip.height);
        }
        Ok(())
    }

    /// Fetch and parse every added or modified path of one commit
    fn prepare(&self, diff: &CommitDiff, tasks: &mut TaskLog) -> Result<PreparedCommit> {
        let mut closes = Vec::new();
        let mut opens = Vec::new();

        for change in &diff.paths {
            if change.status.closes() {
                closes.push(change.path.clone());
            }
            if !change.status.opens() {
                continue;
            }

            let content = tasks
                .time("cat_file", || match &change.blob {
                    Some(oid) => self.git.cat_blob(oid),
                    None => self.git.cat_file(&diff.commit, &change.path),
                })
                .with_context(|| format!("reading {} at {}", change.path, diff.commit))?;

            let symbols = if content.len() >= self.config.max_file_bytes {
                debug!("{} is {} bytes, indexing without symbols", change.path, content.len());
                Vec::new()
            } else {
                tasks
                    .time("parse", || self.parser.parse(&change.path, &content))
                    .with_context(|| format!("parsing {} at {}", change.path, diff.commit))?
            };

            opens.push(NewBlob {
                path: change.path.clone(),
                symbols,
            });
        }

        Ok(PreparedCommit {
            commit: diff.commit.clone(),
            closes,
            opens,
        })
    }

    /// Walk the target's history back to the first indexed commit.
    ///
    /// Returns that commit (or the root sentinel) and how many commits
    /// were walked past to reach it.
    async fn locate_tip(&self, repo: &str, revs: &[String]) -> Result<(Tip, usize)> {
        let batch = self.config.lookup_batch.max(1);
        for (chunk_index, chunk) in revs.chunks(batch).enumerate() {
            let heights = self.store.lookup_heights(repo, chunk).await?;
            if heights.is_empty() {
                continue;
            }
            for (offset, commit) in chunk.iter().enumerate() {
                if let Some(&height) = heights.get(commit) {
                    return Ok((Tip::new(commit.clone(), height), chunk_index * batch + offset));
                }
            }
        }
        Ok((Tip::root(), revs.len()))
    }
}
