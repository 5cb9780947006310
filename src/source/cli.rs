use anyhow::{bail, Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::model::{CommitDiff, PathStatus, Status};

use super::GitSource;

/// Marks the start of each commit record in `git log` output
const RECORD_SEP: u8 = 0x1e;

/// Git source that shells out to the `git` binary
pub struct GitCliSource {
    repo_path: PathBuf,
    git: PathBuf,
}

impl GitCliSource {
    pub fn new(repo_path: impl AsRef<Path>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            git: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of the one on PATH
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!("git {}", args.join(" "));
        let output = Command::new(&self.git)
            .arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .output()
            .with_context(|| format!("failed to run {}", self.git.display()))?;

        if !output.status.success() {
            bail!(
                "git {} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

impl GitSource for GitCliSource {
    fn rev_list(&self, commit: &str) -> Result<Vec<String>> {
        let out = self.run(&["rev-list", "--first-parent", commit, "--"])?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn log_reverse(&self, commit: &str, n: usize) -> Result<Vec<CommitDiff>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = format!("-n{n}");
        let out = self.run(&[
            "log",
            "--first-parent",
            "--diff-merges=first-parent",
            "--reverse",
            "--root",
            "--no-renames",
            "--raw",
            "--no-abbrev",
            "-z",
            "--format=%x1e%H",
            &limit,
            commit,
            "--",
        ])?;
        parse_log(&out)
    }

    fn cat_file(&self, commit: &str, path: &str) -> Result<Vec<u8>> {
        self.run(&["cat-file", "blob", &format!("{commit}:{path}")])
    }

    fn cat_blob(&self, oid: &str) -> Result<Vec<u8>> {
        self.run(&["cat-file", "blob", oid])
    }
}

/// Parse `git log --format=%x1e%H --raw --no-abbrev -z` output.
///
/// Each record is the hash, terminated by NUL or newline, followed by
/// NUL-separated `:oldmode newmode oldsha newsha STATUS` fields, each
/// followed by its path (two paths for copies and renames). Paths are
/// taken verbatim, so they may contain newlines.
///
/// Gitlinks are dropped, and a type change between a file and a gitlink
/// becomes a plain add or delete.
pub fn parse_log(out: &[u8]) -> Result<Vec<CommitDiff>> {
    let mut commits = Vec::new();

    for record in out.split(|b| *b == RECORD_SEP).skip(1) {
        let end = record
            .iter()
            .position(|b| *b == 0 || *b == b'\n')
            .unwrap_or(record.len());
        let commit = String::from_utf8_lossy(&record[..end]).trim().to_string();
        if commit.is_empty() {
            bail!("git log record without a commit hash");
        }

        let mut fields = record[end..].split(|b| *b == 0);
        let mut paths = Vec::new();
        while let Some(field) = fields.next() {
            let field = field.trim_ascii_start();
            if field.is_empty() {
                continue;
            }
            let Some(meta) = field.strip_prefix(b":") else {
                bail!("unexpected field {:?} in {commit}", String::from_utf8_lossy(field));
            };
            let meta = String::from_utf8_lossy(meta);
            let parts: Vec<&str> = meta.split_ascii_whitespace().collect();
            let &[old_mode, new_mode, _, new_oid, code] = parts.as_slice() else {
                bail!("malformed raw diff line :{meta} in {commit}");
            };
            let (old_file, new_file) = (is_file(old_mode), is_file(new_mode));
            let mut next_path = || {
                fields
                    .next()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .with_context(|| format!("status {code} without a path in {commit}"))
            };
            let opened = |path: String| PathStatus::new(path, Status::Added).with_blob(new_oid);

            match code.chars().next() {
                Some('A') => {
                    let path = next_path()?;
                    if new_file {
                        paths.push(opened(path));
                    }
                }
                Some('D') => {
                    let path = next_path()?;
                    if old_file {
                        paths.push(PathStatus::new(path, Status::Deleted));
                    }
                }
                Some('M' | 'T') => {
                    let path = next_path()?;
                    match (old_file, new_file) {
                        (true, true) => paths.push(PathStatus {
                            status: Status::Modified,
                            ..opened(path)
                        }),
                        (false, true) => paths.push(opened(path)),
                        (true, false) => paths.push(PathStatus::new(path, Status::Deleted)),
                        (false, false) => {}
                    }
                }
                Some('R') => {
                    let from = next_path()?;
                    let to = next_path()?;
                    if old_file {
                        paths.push(PathStatus::new(from, Status::Deleted));
                    }
                    if new_file {
                        paths.push(opened(to));
                    }
                }
                Some('C') => {
                    let _from = next_path()?;
                    let to = next_path()?;
                    if new_file {
                        paths.push(opened(to));
                    }
                }
                _ => bail!("unexpected status {code} in {commit}"),
            }
        }

        commits.push(CommitDiff { commit, paths });
    }

    Ok(commits)
}

/// Regular files and symlinks carry content; absent sides, trees and gitlinks do not
fn is_file(mode: &str) -> bool {
    !matches!(mode, "000000" | "040000" | "160000")
}
