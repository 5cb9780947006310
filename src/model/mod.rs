mod ancestry;
mod blob;
mod change;
mod symbol;

pub use ancestry::{Tip, ROOT};
pub use blob::{BlobHit, RepoSummary};
pub use change::{CommitDiff, PathStatus, Status};
pub use symbol::Symbol;
