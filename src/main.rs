mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use cli::{Backend, Cli, Commands};
use revsym::error::IndexError;
use revsym::model::BlobHit;
use revsym::parser::CtagsParser;
use revsym::repository::indexer::{reporter_for, IndexerConfig};
use revsym::repository::{CancelFlag, IndexRun, SymbolIndex, TaskLog};
use revsym::source::{Git2Source, GitCliSource, GitSource};
use revsym::util::{format_timestamp, short_commit};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let db_path = resolve_db_path(cli.db.as_deref())?;
    let db_path_str = db_path.to_str().context("Invalid path encoding")?;
    let mut tasks = TaskLog::new();

    match cli.command {
        Commands::Index { repo, rev, backend, ctags, max_file_bytes } => {
            let repo_key = repo_key(&repo)?;
            let git: Box<dyn GitSource> = match backend {
                Backend::Git2 => Box::new(Git2Source::open(&repo)?),
                Backend::Cli => Box::new(GitCliSource::new(&repo)),
            };
            let parser = CtagsParser::new(ctags);
            let config = IndexerConfig {
                max_file_bytes,
                ..IndexerConfig::default()
            };
            let index = SymbolIndex::open(db_path_str).await?.with_config(config);

            let cancel = CancelFlag::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Interrupted, stopping after the current commit...");
                    on_interrupt.cancel();
                }
            });

            let progress = reporter_for(!cli.quiet && !cli.profile);

            let report = index
                .index(&repo_key, git.as_ref(), &parser, &rev, IndexRun { progress, cancel }, &mut tasks)
                .await;
            match report {
                Ok(report) if report.is_noop() => {
                    eprintln!("Index is up to date ({})", short_commit(&report.target));
                }
                Ok(report) => {
                    eprintln!(
                        "Indexed {} commits, now at {} (height {})",
                        report.indexed,
                        short_commit(&report.tip.commit),
                        report.tip.height
                    );
                }
                Err(err) => {
                    if let Some(IndexError::Cancelled { .. }) = IndexError::find(&err) {
                        warn!("run the same command again to resume");
                    }
                    return Err(err);
                }
            }
        }
        Commands::Search { repo, rev, symbol, json } => {
            let repo_key = repo_key(&repo)?;
            let commit = Git2Source::open(&repo)?.resolve(&rev)?;
            let index = SymbolIndex::open(db_path_str).await?;

            let hits = match index.search(&repo_key, &commit, symbol.as_deref(), &mut tasks).await {
                Err(err) if matches!(IndexError::find(&err), Some(IndexError::NotIndexed { .. })) => {
                    return Err(err.context(format!(
                        "run `revsym index {}` first",
                        repo.display()
                    )));
                }
                other => other?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits, symbol.as_deref());
            }
        }
        Commands::Status => {
            let index = SymbolIndex::open(db_path_str).await?;
            eprintln!("Index: {}", db_path.display());
            for repo in index.repos().await? {
                println!(
                    "{}  commits={}  height={}  last used {}",
                    repo.repo,
                    repo.commits,
                    repo.max_height,
                    format_timestamp(repo.last_accessed_at)
                );
            }
        }
        Commands::Evict { keep } => {
            let index = SymbolIndex::open(db_path_str).await?;
            let evicted = index.evict(keep).await?;
            for repo in &evicted {
                println!("evicted {repo}");
            }
            eprintln!("{} repositories evicted", evicted.len());
        }
    }

    if cli.profile && !tasks.is_empty() {
        for line in tasks.summary() {
            eprintln!("[PROFILE] {line}");
        }
    }

    Ok(())
}

fn init_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Explicit path, or a shared index in the user's cache directory
fn resolve_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::cache_dir()
            .context("Could not determine cache directory")?
            .join("revsym")
            .join("index.db"),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    Ok(path)
}

/// Repositories are keyed by their absolute path
fn repo_key(repo: &Path) -> Result<String> {
    let abs = fs::canonicalize(repo)
        .with_context(|| format!("Could not resolve path: {}", repo.display()))?;
    Ok(abs.to_string_lossy().into_owned())
}

fn print_hits(hits: &[BlobHit], symbol: Option<&str>) {
    for hit in hits {
        println!("{}", hit.path);
        for s in hit.symbols.iter().filter(|s| symbol.is_none_or(|name| s.name == name)) {
            if s.parent.is_empty() {
                println!("  {:>6}  {:<10} {}", s.line, s.kind, s.name);
            } else {
                println!("  {:>6}  {:<10} {}.{}", s.line, s.kind, s.parent, s.name);
            }
        }
    }
}
