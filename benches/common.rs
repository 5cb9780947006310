// Shared benchmark helpers
// Functions here are used across different benchmark files
#![allow(dead_code)]

use anyhow::{Context, Result};
use criterion::async_executor::AsyncExecutor;
use revsym::model::{CommitDiff, PathStatus, Status, Symbol};
use revsym::parser::SymbolParser;
use revsym::repository::{Database, IndexRun, SymbolIndex, TaskLog};
use revsym::source::GitSource;
use tokio::runtime::Runtime;

pub struct TokioExecutor<'a>(pub &'a Runtime);

impl AsyncExecutor for TokioExecutor<'_> {
    fn block_on<T>(&self, future: impl std::future::Future<Output = T>) -> T {
        self.0.block_on(future)
    }
}

/// Create an in-memory database with initialized schema
pub async fn setup_bench_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// Linear history where commit `i` rewrites `touch` files out of `files`
/// and every 10th commit deletes one and adds a fresh one
pub struct SyntheticHistory {
    ids: Vec<String>,
    diffs: Vec<Vec<PathStatus>>,
}

impl SyntheticHistory {
    pub fn new(commits: usize, files: usize, touch: usize) -> Self {
        let mut ids = Vec::with_capacity(commits);
        let mut diffs = Vec::with_capacity(commits);
        let mut live: Vec<String> = (0..files).map(|f| format!("src/mod{}/file{f}.src", f % 16)).collect();

        for i in 0..commits {
            ids.push(format!("{:040x}", i + 1));
            let mut paths = Vec::new();
            if i == 0 {
                paths.extend(live.iter().map(|p| PathStatus::new(p.clone(), Status::Added)));
            } else {
                for k in 0..touch {
                    let path = &live[(i * 7 + k * 13) % live.len()];
                    if !paths.iter().any(|p: &PathStatus| &p.path == path) {
                        paths.push(PathStatus::new(path.clone(), Status::Modified));
                    }
                }
                if i % 10 == 0 {
                    let victim = (i * 31) % live.len();
                    let old = live[victim].clone();
                    paths.retain(|p| p.path != old);
                    paths.push(PathStatus::new(old, Status::Deleted));
                    live[victim] = format!("src/new/file{i}.src");
                    paths.push(PathStatus::new(live[victim].clone(), Status::Added));
                }
            }
            diffs.push(paths);
        }
        Self { ids, diffs }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn head(&self) -> &str {
        &self.ids[self.ids.len() - 1]
    }

    fn position(&self, commit: &str) -> Result<usize> {
        self.ids
            .iter()
            .position(|id| id == commit)
            .with_context(|| format!("unknown commit {commit}"))
    }
}

impl GitSource for SyntheticHistory {
    fn rev_list(&self, commit: &str) -> Result<Vec<String>> {
        let pos = self.position(commit)?;
        Ok(self.ids[..=pos].iter().rev().cloned().collect())
    }

    fn log_reverse(&self, commit: &str, n: usize) -> Result<Vec<CommitDiff>> {
        let pos = self.position(commit)?;
        let first = (pos + 1).saturating_sub(n);
        Ok((first..=pos)
            .map(|i| CommitDiff { commit: self.ids[i].clone(), paths: self.diffs[i].clone() })
            .collect())
    }

    fn cat_file(&self, commit: &str, path: &str) -> Result<Vec<u8>> {
        let pos = self.position(commit)?;
        Ok(format!("fn Sym{pos}\nfn {}\n", path.replace(['/', '.'], "_")).into_bytes())
    }
}

/// One symbol per non-empty line, named by the line's last word
pub struct LineParser;

impl SymbolParser for LineParser {
    fn parse(&self, _path: &str, content: &[u8]) -> Result<Vec<Symbol>> {
        Ok(String::from_utf8_lossy(content)
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                line.split_whitespace()
                    .last()
                    .map(|name| Symbol::new(name, "", "function", i as u32 + 1))
            })
            .collect())
    }
}

/// Build a fully indexed store for `history`
pub async fn indexed_store(history: &SyntheticHistory) -> SymbolIndex {
    let si = SymbolIndex::from_database(setup_bench_db().await);
    si.index("bench", history, &LineParser, history.head(), IndexRun::default(), &mut TaskLog::new())
        .await
        .unwrap();
    si
}
