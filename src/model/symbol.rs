use serde::{Deserialize, Serialize};

/// A single symbol extracted from a file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// Enclosing scope name, empty at top level
    #[serde(default)]
    pub parent: String,
    pub kind: String,
    pub line: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, parent: impl Into<String>, kind: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            kind: kind.into(),
            line,
        }
    }
}
