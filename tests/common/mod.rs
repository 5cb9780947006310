// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use git2::{Repository, Signature};
use revsym::model::{CommitDiff, PathStatus, Status, Symbol};
use revsym::parser::SymbolParser;
use revsym::repository::{CancelFlag, Database};
use revsym::source::GitSource;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create an in-memory test database
pub async fn create_test_db() -> Database {
    Database::new(":memory:").await.unwrap()
}

/// Create an in-memory test database with initialized schema
pub async fn setup_db() -> Database {
    let db = create_test_db().await;
    db.init_schema().await.unwrap();
    db
}

/// Create a temporary git repository
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Write files, stage them and create a commit
pub fn add_commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();

    for (path, content) in files {
        // Write file to working directory
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();

        // Add to index
        index.add_path(std::path::Path::new(path)).unwrap();
    }

    index.write().unwrap();
    commit_index(repo, &mut index, message)
}

/// Remove a file from the repository and create a commit
pub fn remove_file_commit(repo: &Repository, path: &str, message: &str) -> git2::Oid {
    // Remove from working directory
    let full_path = repo.workdir().unwrap().join(path);
    if full_path.exists() {
        std::fs::remove_file(&full_path).unwrap();
    }

    // Remove from index
    let mut index = repo.index().unwrap();
    index.remove_path(std::path::Path::new(path)).unwrap();
    index.write().unwrap();
    commit_index(repo, &mut index, message)
}

/// Create a commit on top of `parent` without moving HEAD (top-level files only)
pub fn side_commit(repo: &Repository, parent: git2::Oid, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let parent = repo.find_commit(parent).unwrap();
    let base = parent.tree().unwrap();

    let mut builder = repo.treebuilder(Some(&base)).unwrap();
    for (path, content) in files {
        let blob = repo.blob(content).unwrap();
        builder.insert(*path, blob, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    repo.commit(None, &sig, &sig, message, &tree, &[&parent]).unwrap()
}

/// Commit top-level tree entries on top of HEAD without going through the index.
///
/// Names are raw bytes and `mode` is the git file mode, so this can write
/// gitlinks (`0o160000`) and names that are not UTF-8. Later `add_commit`
/// calls start from the index and do not see these entries.
pub fn tree_commit(
    repo: &Repository,
    entries: &[(&[u8], git2::Oid, i32)],
    removals: &[&[u8]],
    message: &str,
) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let base = parent.as_ref().map(|c| c.tree().unwrap());

    let mut builder = repo.treebuilder(base.as_ref()).unwrap();
    for (name, oid, mode) in entries {
        builder.insert(name.to_vec(), *oid, *mode).unwrap();
    }
    for name in removals {
        builder.remove(name.to_vec()).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Object ID git assigns to a blob with this content
pub fn blob_id(content: &[u8]) -> String {
    git2::Oid::hash_object(git2::ObjectType::Blob, content).unwrap().to_string()
}

/// Merge `other` into HEAD, bringing in `files` from it
pub fn merge_commit(repo: &Repository, other: git2::Oid, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        std::fs::write(&full_path, content).unwrap();
        index.add_path(std::path::Path::new(path)).unwrap();
    }
    index.write().unwrap();

    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let other = repo.find_commit(other).unwrap();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head, &other])
        .unwrap()
}

fn commit_index(repo: &Repository, index: &mut git2::Index, message: &str) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    // Get parent commit if exists
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Every file path in a commit's tree, via an independent tree walk
pub fn tree_paths(repo: &Repository, commit: git2::Oid) -> Vec<String> {
    let tree = repo.find_commit(commit).unwrap().tree().unwrap();
    let mut paths = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(git2::ObjectType::Blob) {
            paths.push(format!("{}{}", dir, String::from_utf8_lossy(entry.name_bytes())));
        }
        git2::TreeWalkResult::Ok
    })
    .unwrap();
    paths.sort();
    paths
}

/// Toy parser: every line `fn Name` or `type Name` defines a symbol,
/// `  fn Name` (indented) is a method of the last type seen
pub struct WordParser;

impl SymbolParser for WordParser {
    fn parse(&self, _path: &str, content: &[u8]) -> Result<Vec<Symbol>> {
        Ok(parse_words(content))
    }
}

pub fn parse_words(content: &[u8]) -> Vec<Symbol> {
    let text = String::from_utf8_lossy(content);
    let mut symbols = Vec::new();
    let mut current_type = String::new();
    for (i, line) in text.lines().enumerate() {
        let indented = line.starts_with(' ');
        let mut words = line.split_whitespace();
        let (Some(kind), Some(name)) = (words.next(), words.next()) else { continue };
        let line_no = i as u32 + 1;
        match kind {
            "type" => {
                current_type = name.to_string();
                symbols.push(Symbol::new(name, "", "type", line_no));
            }
            "fn" if indented => symbols.push(Symbol::new(name, current_type.clone(), "method", line_no)),
            "fn" => symbols.push(Symbol::new(name, "", "function", line_no)),
            _ => {}
        }
    }
    symbols
}

/// Parser that fails hard once for content containing `marker`
pub struct FlakyParser {
    marker: String,
    armed: Mutex<bool>,
}

impl FlakyParser {
    pub fn new(marker: &str) -> Self {
        Self { marker: marker.to_string(), armed: Mutex::new(true) }
    }
}

impl SymbolParser for FlakyParser {
    fn parse(&self, path: &str, content: &[u8]) -> Result<Vec<Symbol>> {
        let mut armed = self.armed.lock().unwrap();
        if *armed && String::from_utf8_lossy(content).contains(&self.marker) {
            *armed = false;
            bail!("parser crashed on {path}");
        }
        Ok(parse_words(content))
    }
}

/// Parser that raises a cancel flag when it sees content containing `marker`
pub struct CancellingParser {
    pub marker: String,
    pub flag: CancelFlag,
}

impl SymbolParser for CancellingParser {
    fn parse(&self, _path: &str, content: &[u8]) -> Result<Vec<Symbol>> {
        if String::from_utf8_lossy(content).contains(&self.marker) {
            self.flag.cancel();
        }
        Ok(parse_words(content))
    }
}

/// Scripted linear history held in memory
#[derive(Default)]
pub struct MemorySource {
    ids: Vec<String>,
    trees: Vec<BTreeMap<String, Vec<u8>>>,
    cat_calls: Mutex<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit that writes `writes` and removes `deletes`; returns its ID
    pub fn commit(&mut self, writes: &[(&str, &str)], deletes: &[&str]) -> String {
        let mut tree = self.trees.last().cloned().unwrap_or_default();
        for (path, content) in writes {
            tree.insert(path.to_string(), content.as_bytes().to_vec());
        }
        for path in deletes {
            assert!(tree.remove(*path).is_some(), "deleting missing {path}");
        }
        let id = format!("{:040x}", self.ids.len() + 1);
        self.ids.push(id.clone());
        self.trees.push(tree);
        id
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn head(&self) -> &str {
        self.ids.last().expect("empty history")
    }

    pub fn tree(&self, commit: &str) -> &BTreeMap<String, Vec<u8>> {
        &self.trees[self.position(commit).unwrap()]
    }

    pub fn cat_calls(&self) -> usize {
        *self.cat_calls.lock().unwrap()
    }

    fn position(&self, commit: &str) -> Result<usize> {
        self.ids
            .iter()
            .position(|id| id == commit)
            .with_context(|| format!("unknown commit {commit}"))
    }

    fn diff(&self, i: usize) -> CommitDiff {
        let empty = BTreeMap::new();
        let before = if i == 0 { &empty } else { &self.trees[i - 1] };
        let after = &self.trees[i];

        let mut paths = Vec::new();
        for (path, content) in after {
            match before.get(path) {
                None => paths.push(PathStatus::new(path.clone(), Status::Added)),
                Some(old) if old != content => paths.push(PathStatus::new(path.clone(), Status::Modified)),
                Some(_) => {}
            }
        }
        for path in before.keys().filter(|p| !after.contains_key(*p)) {
            paths.push(PathStatus::new(path.clone(), Status::Deleted));
        }
        CommitDiff { commit: self.ids[i].clone(), paths }
    }
}

impl GitSource for MemorySource {
    fn rev_list(&self, commit: &str) -> Result<Vec<String>> {
        let pos = self.position(commit)?;
        Ok(self.ids[..=pos].iter().rev().cloned().collect())
    }

    fn log_reverse(&self, commit: &str, n: usize) -> Result<Vec<CommitDiff>> {
        let pos = self.position(commit)?;
        let first = (pos + 1).saturating_sub(n);
        Ok((first..=pos).map(|i| self.diff(i)).collect())
    }

    fn cat_file(&self, commit: &str, path: &str) -> Result<Vec<u8>> {
        *self.cat_calls.lock().unwrap() += 1;
        let pos = self.position(commit)?;
        self.trees[pos]
            .get(path)
            .cloned()
            .with_context(|| format!("{path} not found at {commit}"))
    }
}

/// Deterministic pseudo-random generator for scripted histories
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Build a random linear history of `commits` commits over a pool of paths
pub fn random_history(seed: u64, commits: usize) -> MemorySource {
    let mut rng = Lcg::new(seed);
    let mut source = MemorySource::new();
    let mut live: BTreeMap<String, ()> = BTreeMap::new();

    for i in 0..commits {
        let mut writes: Vec<(String, String)> = Vec::new();
        let mut deletes: Vec<String> = Vec::new();

        for path in live.keys() {
            match rng.below(100) {
                0..=7 => deletes.push(path.clone()),
                8..=19 => writes.push((path.clone(), format!("fn V{i}\ntype T{i}\n  fn M{i}\n"))),
                _ => {}
            }
        }
        for _ in 0..rng.below(3) {
            let path = format!("dir{}/f{}.src", rng.below(4), rng.below(40));
            if !live.contains_key(&path) && !writes.iter().any(|(p, _)| *p == path) {
                writes.push((path.clone(), format!("fn New{i}\n")));
            }
        }
        if writes.is_empty() && deletes.is_empty() {
            writes.push((format!("seed/s{i}.src"), format!("fn Seed{i}\n")));
        }

        for path in &deletes {
            live.remove(path);
        }
        for (path, _) in &writes {
            live.insert(path.clone(), ());
        }

        let writes_ref: Vec<(&str, &str)> = writes.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let deletes_ref: Vec<&str> = deletes.iter().map(String::as_str).collect();
        source.commit(&writes_ref, &deletes_ref);
    }
    source
}
