use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use revsym::repository::indexer::IndexerConfig;

#[derive(Parser, Debug)]
#[command(name = "revsym", version, about = "Per-commit symbol index over git history")]
pub struct Cli {
    /// Path to the SQLite index database (default: <cache dir>/revsym/index.db)
    #[arg(long, global = true, env = "REVSYM_DB")]
    pub db: Option<PathBuf>,

    /// Suppress progress bars and informational logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print per-task timings when done (disables progress bars)
    #[arg(long, global = true)]
    pub profile: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a repository's first-parent history up to a revision
    Index {
        /// Path to the git repository
        #[arg(default_value = ".")]
        repo: PathBuf,
        /// Revision to index up to
        #[arg(long, default_value = "HEAD")]
        rev: String,
        /// How to read git history
        #[arg(long, value_enum, default_value = "git2")]
        backend: Backend,
        /// universal-ctags executable
        #[arg(long, env = "REVSYM_CTAGS", default_value = "ctags")]
        ctags: PathBuf,
        /// Files at or above this size are indexed without symbols
        #[arg(long, default_value_t = IndexerConfig::default().max_file_bytes)]
        max_file_bytes: usize,
    },
    /// List files (and their symbols) visible at a revision
    Search {
        /// Path to the git repository
        #[arg(default_value = ".")]
        repo: PathBuf,
        /// Revision to search at
        #[arg(long, default_value = "HEAD")]
        rev: String,
        /// Only files defining a symbol with exactly this name
        #[arg(long)]
        symbol: Option<String>,
        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show indexed repositories
    Status,
    /// Drop all but the most recently used repositories from the index
    Evict {
        /// Number of repositories to keep
        #[arg(long)]
        keep: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Embedded libgit2
    Git2,
    /// The `git` executable on PATH
    Cli,
}
