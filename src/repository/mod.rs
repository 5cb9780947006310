mod database;
pub mod indexer;
mod locks;
mod skip;
mod symbol_index;

pub use database::{BlobRecord, CommitRecord, Database, RepoStats};
pub use indexer::{CancelFlag, IndexReport, Indexer, IndexerConfig, IndexStore, TaskLog};
pub use locks::RepoLocks;
pub use skip::{ruler, skip_pointer};
pub use symbol_index::{IndexRun, SymbolIndex};

// Re-export the schema version for callers who need it
pub const SCHEMA_VERSION: &str = "1";
