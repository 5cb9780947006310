use anyhow::{Context, Result};
use log::{debug, info};
use rustc_hash::FxHashMap;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, QueryBuilder, Row, Sqlite, SqliteConnection,
};
use std::borrow::Cow;
use std::str::FromStr;

use crate::error::IndexError;
use crate::model::{BlobHit, RepoSummary, Symbol, Tip, ROOT};

use super::skip::{skip_pointer, MAX_CHAIN};
use super::SCHEMA_VERSION;

/// `blob_hops.kind` for the `added` set
const ADDED: i64 = 0;
/// `blob_hops.kind` for the `deleted` set
const DELETED: i64 = 1;

const BATCH_SIZE: usize = 5000;
const ID_BATCH: usize = 500;

/// A blob to open at the commit being applied (zero-copy friendly)
#[derive(Debug, Clone)]
pub struct BlobRecord<'a> {
    pub path: Cow<'a, str>,
    pub symbols: Cow<'a, [Symbol]>,
}

impl<'a> BlobRecord<'a> {
    pub fn new(path: impl Into<Cow<'a, str>>, symbols: impl Into<Cow<'a, [Symbol]>>) -> Self {
        Self { path: path.into(), symbols: symbols.into() }
    }
}

/// Everything one commit changes in the store
#[derive(Debug, Clone)]
pub struct CommitRecord<'a> {
    pub commit: &'a str,
    /// Paths whose visible blob gets closed at this commit
    pub closes: Vec<&'a str>,
    pub opens: Vec<BlobRecord<'a>>,
}

/// Row counts for one repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStats {
    pub commits: i64,
    pub blobs: i64,
    pub hops: i64,
}

/// Database abstraction for SQLite operations
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Configure connection options with PRAGMAs applied to every connection
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-64000"); // 64MB cache

        // An in-memory database lives only as long as its connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Initialize database schema, returns true if schema was rebuilt
    pub async fn init_schema(&self) -> Result<bool> {
        // Create metadata table first (needed to check version)
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        // Check schema version
        let stored_version = self.get_metadata("schema_version").await?;

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                info!("Schema version changed ({} -> {}), rebuilding index...", old, SCHEMA_VERSION);
            }
            for table in ["blob_symbols", "blob_hops", "blobs", "ancestry", "repos"] {
                sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                    .execute(&self.pool)
                    .await?;
            }
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ancestry (
                repo TEXT NOT NULL,
                commit_id TEXT NOT NULL,
                height INTEGER NOT NULL,
                ancestor TEXT NOT NULL,
                PRIMARY KEY (repo, commit_id)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                commit_id TEXT NOT NULL,
                path TEXT NOT NULL,
                symbol_data TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS blobs_repo_path ON blobs (repo, path)")
            .execute(&self.pool)
            .await?;

        // Join-table form of the added/deleted hop sets
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blob_hops (
                blob_id INTEGER NOT NULL,
                kind INTEGER NOT NULL,
                hop TEXT NOT NULL,
                PRIMARY KEY (blob_id, kind, hop)
            )"
        ).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS blob_hops_hop ON blob_hops (hop, kind)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blob_symbols (
                blob_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                PRIMARY KEY (blob_id, name)
            )"
        ).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS blob_symbols_name ON blob_symbols (name)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS repos (
                repo TEXT PRIMARY KEY,
                last_accessed_at INTEGER NOT NULL
            )"
        ).execute(&self.pool).await?;

        // Store current schema version
        if needs_rebuild {
            self.set_metadata("schema_version", SCHEMA_VERSION).await?;
        }

        Ok(needs_rebuild)
    }

    /// Get metadata value by key
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Heights of whichever of `commits` are already indexed
    pub async fn load_heights(&self, repo: &str, commits: &[String]) -> Result<FxHashMap<String, i64>> {
        let mut heights = FxHashMap::default();
        for chunk in commits.chunks(ID_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT commit_id, height FROM ancestry WHERE repo = "
            );
            qb.push_bind(repo.to_string());
            qb.push(" AND commit_id IN ");
            push_in_list(&mut qb, chunk);
            for row in qb.build().fetch_all(&self.pool).await? {
                heights.insert(row.get("commit_id"), row.get("height"));
            }
        }
        Ok(heights)
    }

    /// Check if a commit has been indexed
    pub async fn is_commit_indexed(&self, repo: &str, commit: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM ancestry WHERE repo = ? AND commit_id = ?")
            .bind(repo)
            .bind(commit)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Skip-chain of an indexed commit, the commit first and the root last
    pub async fn load_hops(&self, repo: &str, commit: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        load_hops(&mut conn, repo, commit).await
    }

    /// Apply one commit in ONE transaction: propagate hop sets along the
    /// skip structure, close and open blobs, drop same-commit add/delete
    /// pairs, then record the commit's ancestry row.
    ///
    /// Returns the new tip. On error nothing of this commit is persisted.
    pub async fn apply_commit(&self, repo: &str, tip: &Tip, record: &CommitRecord<'_>) -> Result<Tip> {
        let mut tx = self.pool.begin().await?;

        let hops = load_hops(&mut tx, repo, &tip.commit)
            .await
            .with_context(|| format!("loading skip-chain of tip {}", tip.commit))?;
        let height = tip.height + 1;
        let (r, ancestor) = skip_pointer(&hops, height)?;

        if r > 0 {
            propagate(&mut tx, repo, &hops[..r], record.commit).await?;
        }

        for path in &record.closes {
            close_visible(&mut tx, repo, &hops, path, record.commit)
                .await
                .with_context(|| format!("closing {} at {}", path, record.commit))?;
        }

        for blob in &record.opens {
            insert_blob(&mut tx, repo, record.commit, blob)
                .await
                .with_context(|| format!("opening {} at {}", blob.path, record.commit))?;
        }

        drop_redundant(&mut tx, repo, record.commit).await?;

        sqlx::query("INSERT INTO ancestry (repo, commit_id, height, ancestor) VALUES (?, ?, ?, ?)")
            .bind(repo)
            .bind(record.commit)
            .bind(height)
            .bind(ancestor)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("recording ancestry of {}", record.commit))?;

        tx.commit().await?;

        debug!(
            "applied {} at height {} (fan-out {}, -{} +{})",
            record.commit,
            height,
            r,
            record.closes.len(),
            record.opens.len()
        );
        Ok(Tip::new(record.commit, height))
    }

    /// Blobs visible at `commit`, optionally only those defining `symbol`
    pub async fn search(&self, repo: &str, commit: &str, symbol: Option<&str>) -> Result<Vec<BlobHit>> {
        let mut conn = self.pool.acquire().await?;
        let hops = load_hops(&mut conn, repo, commit).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT b.id, b.commit_id, b.path, b.symbol_data FROM blobs b WHERE b.repo = "
        );
        qb.push_bind(repo.to_string());
        push_visible_filter(&mut qb, &hops);
        if let Some(name) = symbol {
            qb.push(" AND b.id IN (SELECT blob_id FROM blob_symbols WHERE name = ");
            qb.push_bind(name.to_string());
            qb.push(")");
        }
        qb.push(" ORDER BY b.path");
        let rows = qb.build().fetch_all(&mut *conn).await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
        let mut hop_sets = load_hop_sets(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let path: String = row.get("path");
                let data: String = row.get("symbol_data");
                let symbols: Vec<Symbol> = serde_json::from_str(&data)
                    .with_context(|| format!("decoding symbols of {path}"))?;
                let (added, deleted) = hop_sets.remove(&id).unwrap_or_default();
                Ok(BlobHit {
                    commit: row.get("commit_id"),
                    path,
                    added,
                    deleted,
                    symbols,
                })
            })
            .collect()
    }

    /// Record that a repository was just indexed or searched
    pub async fn touch_repo(&self, repo: &str) -> Result<()> {
        self.touch_repo_at(repo, time::OffsetDateTime::now_utc().unix_timestamp()).await
    }

    pub async fn touch_repo_at(&self, repo: &str, timestamp: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO repos (repo, last_accessed_at) VALUES (?, ?) \
             ON CONFLICT(repo) DO UPDATE SET last_accessed_at = excluded.last_accessed_at"
        )
        .bind(repo)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All known repositories, most recently accessed first
    pub async fn list_repos(&self) -> Result<Vec<RepoSummary>> {
        let rows = sqlx::query(
            "SELECT r.repo, r.last_accessed_at, \
                COUNT(a.commit_id) AS commits, COALESCE(MAX(a.height), 0) AS max_height \
             FROM repos r LEFT JOIN ancestry a ON a.repo = r.repo \
             GROUP BY r.repo, r.last_accessed_at \
             ORDER BY r.last_accessed_at DESC, r.repo"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| RepoSummary {
            repo: row.get("repo"),
            last_accessed_at: row.get("last_accessed_at"),
            commits: row.get("commits"),
            max_height: row.get("max_height"),
        }).collect())
    }

    /// Repositories beyond the `keep` most recently accessed
    pub async fn stale_repos(&self, keep: usize) -> Result<Vec<String>> {
        let repos = sqlx::query_scalar(
            "SELECT repo FROM repos ORDER BY last_accessed_at DESC, repo LIMIT -1 OFFSET ?"
        )
        .bind(keep as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(repos)
    }

    /// Row counts for one repository
    pub async fn repo_stats(&self, repo: &str) -> Result<RepoStats> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM ancestry WHERE repo = ?) AS commits, \
                (SELECT COUNT(*) FROM blobs WHERE repo = ?) AS blobs, \
                (SELECT COUNT(*) FROM blob_hops h JOIN blobs b ON b.id = h.blob_id WHERE b.repo = ?) AS hops"
        )
        .bind(repo)
        .bind(repo)
        .bind(repo)
        .fetch_one(&self.pool)
        .await?;

        Ok(RepoStats {
            commits: row.get("commits"),
            blobs: row.get("blobs"),
            hops: row.get("hops"),
        })
    }

    /// Remove every row belonging to a repository
    pub async fn delete_repo(&self, repo: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM blob_hops WHERE blob_id IN (SELECT id FROM blobs WHERE repo = ?)")
            .bind(repo)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM blob_symbols WHERE blob_id IN (SELECT id FROM blobs WHERE repo = ?)")
            .bind(repo)
            .execute(&mut *tx)
            .await?;
        for table in ["blobs", "ancestry", "repos"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE repo = ?"))
                .bind(repo)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Walk ancestor pointers from `commit` to the root sentinel
async fn load_hops(conn: &mut SqliteConnection, repo: &str, commit: &str) -> Result<Vec<String>> {
    let mut hops = vec![commit.to_string()];
    let mut current = commit.to_string();

    while current != ROOT {
        let ancestor: Option<String> = sqlx::query_scalar(
            "SELECT ancestor FROM ancestry WHERE repo = ? AND commit_id = ?"
        )
        .bind(repo)
        .bind(&current)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(ancestor) = ancestor else {
            if hops.len() == 1 {
                return Err(IndexError::NotIndexed { commit: current }.into());
            }
            return Err(IndexError::CorruptAncestry {
                commit: commit.to_string(),
                reason: format!("chain reaches unindexed commit {current}"),
            }
            .into());
        };

        hops.push(ancestor.clone());
        if hops.len() > MAX_CHAIN {
            return Err(IndexError::CorruptAncestry {
                commit: commit.to_string(),
                reason: format!("chain longer than {MAX_CHAIN} hops"),
            }
            .into());
        }
        current = ancestor;
    }

    Ok(hops)
}

/// Append `commit` to every hop set that intersects `prefix`
async fn propagate(conn: &mut SqliteConnection, repo: &str, prefix: &[String], commit: &str) -> Result<()> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT OR IGNORE INTO blob_hops (blob_id, kind, hop) SELECT DISTINCT h.blob_id, h.kind, "
    );
    qb.push_bind(commit.to_string());
    qb.push(" FROM blob_hops h JOIN blobs b ON b.id = h.blob_id WHERE b.repo = ");
    qb.push_bind(repo.to_string());
    qb.push(" AND h.hop IN ");
    push_in_list(&mut qb, prefix);

    let result = qb.build().execute(&mut *conn).await?;
    debug!("propagated {} hop entries to {}", result.rows_affected(), commit);
    Ok(())
}

/// Close the blob of `path` visible at the tip (whose chain is `hops`)
async fn close_visible(
    conn: &mut SqliteConnection,
    repo: &str,
    hops: &[String],
    path: &str,
    commit: &str,
) -> Result<()> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT b.id FROM blobs b WHERE b.repo = ");
    qb.push_bind(repo.to_string());
    qb.push(" AND b.path = ");
    qb.push_bind(path.to_string());
    push_visible_filter(&mut qb, hops);
    qb.push(" LIMIT 1");

    let id: Option<i64> = qb
        .build_query_scalar()
        .fetch_optional(&mut *conn)
        .await?;
    let Some(id) = id else {
        return Err(IndexError::MissingBlob {
            commit: commit.to_string(),
            path: path.to_string(),
        }
        .into());
    };

    sqlx::query("INSERT OR IGNORE INTO blob_hops (blob_id, kind, hop) VALUES (?, ?, ?)")
        .bind(id)
        .bind(DELETED)
        .bind(commit)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_blob(conn: &mut SqliteConnection, repo: &str, commit: &str, blob: &BlobRecord<'_>) -> Result<()> {
    let data = serde_json::to_string(&*blob.symbols)?;
    let id = sqlx::query("INSERT INTO blobs (repo, commit_id, path, symbol_data) VALUES (?, ?, ?, ?)")
        .bind(repo)
        .bind(commit)
        .bind(blob.path.as_ref())
        .bind(data)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    sqlx::query("INSERT INTO blob_hops (blob_id, kind, hop) VALUES (?, ?, ?)")
        .bind(id)
        .bind(ADDED)
        .bind(commit)
        .execute(&mut *conn)
        .await?;

    for chunk in blob.symbols.chunks(BATCH_SIZE) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO blob_symbols (blob_id, name) "
        );
        qb.push_values(chunk, |mut row, symbol| {
            row.push_bind(id).push_bind(symbol.name.clone());
        });
        qb.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Remove `commit` from both hop sets of blobs that got it in both.
///
/// Only the commit just applied is touched.
async fn drop_redundant(conn: &mut SqliteConnection, repo: &str, commit: &str) -> Result<()> {
    let result = sqlx::query(
        "DELETE FROM blob_hops WHERE hop = ? AND blob_id IN ( \
            SELECT a.blob_id FROM blob_hops a \
            JOIN blob_hops d ON d.blob_id = a.blob_id AND d.kind = ? AND d.hop = a.hop \
            JOIN blobs b ON b.id = a.blob_id \
            WHERE a.kind = ? AND a.hop = ? AND b.repo = ?)"
    )
    .bind(commit)
    .bind(DELETED)
    .bind(ADDED)
    .bind(commit)
    .bind(repo)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        debug!("dropped {} redundant hop entries at {}", result.rows_affected(), commit);
    }
    Ok(())
}

/// Added and deleted hop lists per blob id, in insertion order
async fn load_hop_sets(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<FxHashMap<i64, (Vec<String>, Vec<String>)>> {
    let mut sets: FxHashMap<i64, (Vec<String>, Vec<String>)> = FxHashMap::default();
    for chunk in ids.chunks(ID_BATCH) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT blob_id, kind, hop FROM blob_hops WHERE blob_id IN "
        );
        qb.push("(");
        let mut list = qb.separated(", ");
        for id in chunk {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
        qb.push(" ORDER BY rowid");

        for row in qb.build().fetch_all(&mut *conn).await? {
            let entry = sets.entry(row.get("blob_id")).or_default();
            let hop: String = row.get("hop");
            if row.get::<i64, _>("kind") == ADDED {
                entry.0.push(hop);
            } else {
                entry.1.push(hop);
            }
        }
    }
    Ok(sets)
}

/// `added` intersects `hops` and `deleted` does not
fn push_visible_filter(qb: &mut QueryBuilder<'_, Sqlite>, hops: &[String]) {
    qb.push(" AND b.id IN (SELECT blob_id FROM blob_hops WHERE kind = ");
    qb.push_bind(ADDED);
    qb.push(" AND hop IN ");
    push_in_list(qb, hops);
    qb.push(") AND b.id NOT IN (SELECT blob_id FROM blob_hops WHERE kind = ");
    qb.push_bind(DELETED);
    qb.push(" AND hop IN ");
    push_in_list(qb, hops);
    qb.push(")");
}

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    qb.push("(");
    let mut list = qb.separated(", ");
    for value in values {
        list.push_bind(value.clone());
    }
    list.push_unseparated(")");
}
