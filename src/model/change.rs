/// How a path changed in a commit relative to its first parent
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Status {
    Added,
    Modified,
    Deleted,
}

impl Status {
    /// Whether the previously visible blob for the path must be closed
    pub fn closes(self) -> bool {
        matches!(self, Status::Modified | Status::Deleted)
    }

    /// Whether a new blob must be opened for the path
    pub fn opens(self) -> bool {
        matches!(self, Status::Added | Status::Modified)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PathStatus {
    /// Display form of the path; bytes that are not UTF-8 are replaced
    pub path: String,
    pub status: Status,
    /// Object ID of the new content, when the source knows it
    pub blob: Option<String>,
}

impl PathStatus {
    pub fn new(path: impl Into<String>, status: Status) -> Self {
        Self { path: path.into(), status, blob: None }
    }

    pub fn with_blob(mut self, blob: impl Into<String>) -> Self {
        self.blob = Some(blob.into());
        self
    }
}

/// One commit of history with its per-path change list
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommitDiff {
    pub commit: String,
    pub paths: Vec<PathStatus>,
}
