use anyhow::{anyhow, Context, Result};
use git2::{Delta, DiffOptions, FileMode, Oid, Repository, Sort};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::model::{CommitDiff, PathStatus, Status};

use super::GitSource;

/// Git source backed by libgit2
pub struct Git2Source {
    repo: Mutex<Repository>,
}

impl Git2Source {
    pub fn open(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo_path = repo_path.as_ref();
        let repo = Repository::open(repo_path)
            .with_context(|| format!("Failed to open git repository at {}", repo_path.display()))?;
        Ok(Self { repo: Mutex::new(repo) })
    }

    fn repo(&self) -> Result<MutexGuard<'_, Repository>> {
        self.repo.lock().map_err(|_| anyhow!("git repository handle poisoned"))
    }
}

impl GitSource for Git2Source {
    fn rev_list(&self, commit: &str) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let head = resolve_commit(&repo, commit)?;
        Ok(first_parent_walk(&repo, head, usize::MAX)?
            .into_iter()
            .map(|oid| oid.to_string())
            .collect())
    }

    fn log_reverse(&self, commit: &str, n: usize) -> Result<Vec<CommitDiff>> {
        let repo = self.repo()?;
        let head = resolve_commit(&repo, commit)?;
        let mut oids = first_parent_walk(&repo, head, n)?;
        oids.reverse();

        oids.into_iter()
            .map(|oid| diff_first_parent(&repo, oid).with_context(|| format!("diffing commit {oid}")))
            .collect()
    }

    fn cat_file(&self, commit: &str, path: &str) -> Result<Vec<u8>> {
        let repo = self.repo()?;
        let commit_obj = repo
            .find_commit(Oid::from_str(commit)?)
            .with_context(|| format!("commit {commit} not found"))?;
        let entry = commit_obj
            .tree()?
            .get_path(Path::new(path))
            .with_context(|| format!("{path} not found at {commit}"))?;
        let blob = entry
            .to_object(&repo)?
            .peel_to_blob()
            .with_context(|| format!("{path} at {commit} is not a file"))?;
        Ok(blob.content().to_vec())
    }

    fn cat_blob(&self, oid: &str) -> Result<Vec<u8>> {
        let repo = self.repo()?;
        let blob = repo
            .find_blob(Oid::from_str(oid)?)
            .with_context(|| format!("blob {oid} not found"))?;
        Ok(blob.content().to_vec())
    }

    fn resolve(&self, rev: &str) -> Result<String> {
        let repo = self.repo()?;
        Ok(resolve_commit(&repo, rev)?.to_string())
    }
}

fn resolve_commit(repo: &Repository, rev: &str) -> Result<Oid> {
    let commit = repo
        .revparse_single(rev)
        .with_context(|| format!("unknown revision {rev}"))?
        .peel_to_commit()
        .with_context(|| format!("{rev} does not name a commit"))?;
    Ok(commit.id())
}

/// Newest-first first-parent chain starting at `head`, at most `limit` commits
fn first_parent_walk(repo: &Repository, head: Oid, limit: usize) -> Result<Vec<Oid>> {
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::NONE)?;
    walk.push(head)?;
    walk.simplify_first_parent()?;

    let mut oids = Vec::new();
    for oid in walk.take(limit) {
        oids.push(oid?);
    }
    Ok(oids)
}

fn diff_first_parent(repo: &Repository, oid: Oid) -> Result<CommitDiff> {
    let commit = repo.find_commit(oid)?;
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };

    let mut opts = DiffOptions::new();
    opts.include_typechange(true).ignore_submodules(true);
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

    let mut paths = Vec::new();
    for delta in diff.deltas() {
        let old_file = is_file(delta.old_file().mode());
        let new_file = is_file(delta.new_file().mode());
        let status = match (delta.status(), old_file, new_file) {
            (Delta::Added, _, true) => Status::Added,
            (Delta::Deleted, true, _) => Status::Deleted,
            (Delta::Modified | Delta::Typechange, true, true) => Status::Modified,
            (Delta::Modified | Delta::Typechange, false, true) => Status::Added,
            (Delta::Modified | Delta::Typechange, true, false) => Status::Deleted,
            // Submodules and anything libgit2 reports without a file on either side
            _ => continue,
        };

        let file = if status == Status::Deleted { delta.old_file() } else { delta.new_file() };
        let Some(path) = file.path_bytes() else { continue };
        let change = PathStatus::new(String::from_utf8_lossy(path), status);
        paths.push(if status.opens() { change.with_blob(file.id().to_string()) } else { change });
    }

    Ok(CommitDiff {
        commit: oid.to_string(),
        paths,
    })
}

/// Regular files and symlinks carry content; trees and gitlinks do not
fn is_file(mode: FileMode) -> bool {
    !matches!(mode, FileMode::Unreadable | FileMode::Tree | FileMode::Commit)
}
