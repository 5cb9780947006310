use serde::Serialize;

use super::Symbol;

/// A blob visible at the searched commit
#[derive(Debug, Clone, Serialize)]
pub struct BlobHit {
    /// Commit that produced this content
    pub commit: String,
    pub path: String,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub symbols: Vec<Symbol>,
}

/// Per-repository bookkeeping shown by `revsym status`
#[derive(Debug, Clone)]
pub struct RepoSummary {
    pub repo: String,
    pub last_accessed_at: i64,
    pub commits: i64,
    pub max_height: i64,
}
