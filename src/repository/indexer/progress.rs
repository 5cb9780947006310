//! Progress reporting abstraction
//!
//! The indexing loop reports per-commit progress through these traits and
//! never touches indicatif directly.

use indicatif::{ProgressBar, ProgressStyle};

use crate::util::short_commit;

/// A live view of one indexing run
pub trait ProgressHandle: Send + Sync {
    /// A commit was committed to the store at `height`
    fn applied(&self, commit: &str, height: i64);
    fn finish(&self);
}

/// Factory for per-run progress handles
pub trait ProgressReporter: Send + Sync {
    /// `missing` commits are about to be applied on top of `start_height`
    fn start(&self, repo: &str, start_height: i64, missing: u64) -> Box<dyn ProgressHandle>;
}

/// Indicatif bar over the commits of a run
pub struct IndicatifProgress;

impl ProgressReporter for IndicatifProgress {
    fn start(&self, repo: &str, start_height: i64, missing: u64) -> Box<dyn ProgressHandle> {
        let pb = ProgressBar::new(missing);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix}: [{bar:40.cyan/blue}] {pos}/{len} commits ({per_sec}, eta {eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        let name = repo.rsplit(['/', '\\']).find(|part| !part.is_empty()).unwrap_or(repo);
        pb.set_prefix(name.to_string());
        pb.set_message(format!("from height {start_height}"));
        Box::new(IndicatifHandle(pb))
    }
}

struct IndicatifHandle(ProgressBar);

impl ProgressHandle for IndicatifHandle {
    fn applied(&self, commit: &str, height: i64) {
        self.0.set_message(format!("{} @ {}", short_commit(commit), height));
        self.0.inc(1);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

/// Silent reporter for tests, benchmarks, quiet and profile modes
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _repo: &str, _start_height: i64, _missing: u64) -> Box<dyn ProgressHandle> {
        Box::new(NoopHandle)
    }
}

struct NoopHandle;

impl ProgressHandle for NoopHandle {
    fn applied(&self, _commit: &str, _height: i64) {}
    fn finish(&self) {}
}

/// Pick the bar or silence from the command-line flags
pub fn reporter_for(show_progress: bool) -> Box<dyn ProgressReporter> {
    if show_progress {
        Box::new(IndicatifProgress)
    } else {
        Box::new(NoopProgress)
    }
}
