/// Skip-chain terminator. Every chain walk ends here; it has no ancestry row.
pub const ROOT: &str = "";

/// The most recently indexed commit on a target's first-parent history
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tip {
    pub commit: String,
    pub height: i64,
}

impl Tip {
    pub fn root() -> Self {
        Self {
            commit: ROOT.to_string(),
            height: 0,
        }
    }

    pub fn new(commit: impl Into<String>, height: i64) -> Self {
        Self {
            commit: commit.into(),
            height,
        }
    }

    pub fn is_root(&self) -> bool {
        self.commit == ROOT
    }
}
