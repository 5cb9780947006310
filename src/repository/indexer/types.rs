//! Domain types for the indexing loop
//!
//! These types form the data contract between the indexer and its store.

use crate::model::{Symbol, Tip};

/// Content at or above this size is indexed without symbols
pub const DEFAULT_MAX_FILE_BYTES: usize = 1 << 20;

/// Commits looked up per ancestry query when locating the tip
pub const DEFAULT_LOOKUP_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub max_file_bytes: usize,
    pub lookup_batch: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            lookup_batch: DEFAULT_LOOKUP_BATCH,
        }
    }
}

/// A new blob with its parsed symbols
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub path: String,
    pub symbols: Vec<Symbol>,
}

/// One commit with all content fetched and parsed, ready to apply.
///
/// Preparing happens before the store transaction opens so that git and
/// parser calls never hold the write lock.
#[derive(Debug, Clone)]
pub struct PreparedCommit {
    pub commit: String,
    pub closes: Vec<String>,
    pub opens: Vec<NewBlob>,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Resolved target commit
    pub target: String,
    /// Nearest indexed ancestor found before the run
    pub start: Tip,
    /// Tip after the run (equals the target on success)
    pub tip: Tip,
    /// Commits applied by this run
    pub indexed: usize,
}

impl IndexReport {
    pub fn is_noop(&self) -> bool {
        self.indexed == 0
    }
}
