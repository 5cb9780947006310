//! Symbol extraction from file content

mod ctags;

pub use ctags::{parse_ctags_output, CtagsParser};

use anyhow::Result;

use crate::model::Symbol;

/// Turns one file's bytes into a flat symbol list.
///
/// Recoverable problems with a single file (unknown language, malformed
/// output) yield an empty list. `Err` is reserved for failures that would
/// hit every file, such as a missing parser binary.
pub trait SymbolParser: Send + Sync {
    fn parse(&self, path: &str, content: &[u8]) -> Result<Vec<Symbol>>;
}
