//! SQLite-backed store for synced delivery records.
//!
//! Incremental upsert semantics: records are inserted on first observation
//! and only their designated mutable fields are ever written again. Each
//! upsert batch commits in its own transaction, so a failure while writing
//! one table leaves tables committed earlier in the run intact.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Issue, PullRequest, Release, Snapshot};

/// SQL schema for the metrics database.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS releases (
    release_id TEXT PRIMARY KEY,
    version TEXT NOT NULL,
    name TEXT NOT NULL,
    author TEXT NOT NULL,
    body TEXT NOT NULL,
    published_at TEXT NOT NULL,
    time_since_last_release INTEGER NOT NULL DEFAULT 0,
    pr_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pull_requests (
    pr_id TEXT PRIMARY KEY,
    repo TEXT NOT NULL,
    author TEXT NOT NULL,
    created_at TEXT NOT NULL,
    merged_at TEXT,
    time_to_merge REAL,
    release_id TEXT
);

CREATE TABLE IF NOT EXISTS issues (
    issue_id TEXT PRIMARY KEY,
    repo TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pull_requests_release ON pull_requests(release_id);
CREATE INDEX IF NOT EXISTS idx_releases_published ON releases(published_at);
"#;

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_timestamp_opt(
    value: Option<String>,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn release_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Release, rusqlite::Error> {
    let published: String = row.get(5)?;
    Ok(Release {
        release_id: row.get(0)?,
        version: row.get(1)?,
        name: row.get(2)?,
        author: row.get(3)?,
        body: row.get(4)?,
        published_at: parse_timestamp(&published)?,
        time_since_last_release: row.get(6)?,
        pr_count: row.get(7)?,
    })
}

fn pull_request_from_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<PullRequest, rusqlite::Error> {
    let created: String = row.get(3)?;
    let merged: Option<String> = row.get(4)?;
    Ok(PullRequest {
        pr_id: row.get(0)?,
        repo: row.get(1)?,
        author: row.get(2)?,
        created_at: parse_timestamp(&created)?,
        merged_at: parse_timestamp_opt(merged)?,
        time_to_merge: row.get(5)?,
        release_id: row.get(6)?,
    })
}

fn issue_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Issue, rusqlite::Error> {
    let created: String = row.get(4)?;
    let updated: String = row.get(5)?;
    Ok(Issue {
        issue_id: row.get(0)?,
        repo: row.get(1)?,
        title: row.get(2)?,
        status: row.get(3)?,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
    })
}

/// SQLite connection scoped to one sync run. The underlying handle is
/// released when the store is dropped, on every exit path.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at the given path, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Identifiers of all stored releases, for the fetcher's early-stop set.
    pub fn release_ids(&self) -> Result<HashSet<String>> {
        self.string_set("SELECT release_id FROM releases")
    }

    /// Identifiers of all stored pull requests.
    pub fn pull_request_ids(&self) -> Result<HashSet<String>> {
        self.string_set("SELECT pr_id FROM pull_requests")
    }

    fn string_set(&self, sql: &str) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// All stored releases in ascending publish order.
    pub fn releases(&self) -> Result<Vec<Release>> {
        let mut stmt = self.conn.prepare(
            "SELECT release_id, version, name, author, body, published_at,
                    time_since_last_release, pr_count
             FROM releases ORDER BY published_at",
        )?;
        let releases = stmt
            .query_map([], release_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    pub fn pull_requests(&self) -> Result<Vec<PullRequest>> {
        let mut stmt = self.conn.prepare(
            "SELECT pr_id, repo, author, created_at, merged_at, time_to_merge, release_id
             FROM pull_requests ORDER BY created_at",
        )?;
        let pulls = stmt
            .query_map([], pull_request_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pulls)
    }

    /// Stored pull requests still awaiting attribution; candidates for the
    /// next attribution pass alongside newly fetched PRs.
    pub fn unattributed_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let mut stmt = self.conn.prepare(
            "SELECT pr_id, repo, author, created_at, merged_at, time_to_merge, release_id
             FROM pull_requests WHERE release_id IS NULL ORDER BY created_at",
        )?;
        let pulls = stmt
            .query_map([], pull_request_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pulls)
    }

    pub fn issues(&self) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(
            "SELECT issue_id, repo, title, status, created_at, updated_at
             FROM issues ORDER BY issue_id",
        )?;
        let issues = stmt
            .query_map([], issue_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    /// Insert unseen releases and refresh the derived cadence on stored ones.
    /// Source attributes of a stored release are never rewritten.
    pub fn upsert_releases(&mut self, releases: &[Release]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for release in releases {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT time_since_last_release FROM releases WHERE release_id = ?1",
                    params![release.release_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO releases (release_id, version, name, author, body,
                         published_at, time_since_last_release, pr_count)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            release.release_id,
                            release.version,
                            release.name,
                            release.author,
                            release.body,
                            release.published_at.to_rfc3339(),
                            release.time_since_last_release,
                            release.pr_count,
                        ],
                    )?;
                }
                Some(cadence) if cadence != release.time_since_last_release => {
                    tx.execute(
                        "UPDATE releases SET time_since_last_release = ?1 WHERE release_id = ?2",
                        params![release.time_since_last_release, release.release_id],
                    )?;
                }
                Some(_) => {}
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert unseen pull requests; on stored ones, write only a changed
    /// attribution. An assigned `release_id` never reverts to NULL.
    pub fn upsert_pull_requests(&mut self, pulls: &[PullRequest]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for pr in pulls {
            let existing: Option<Option<String>> = tx
                .query_row(
                    "SELECT release_id FROM pull_requests WHERE pr_id = ?1",
                    params![pr.pr_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO pull_requests (pr_id, repo, author, created_at,
                         merged_at, time_to_merge, release_id)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            pr.pr_id,
                            pr.repo,
                            pr.author,
                            pr.created_at.to_rfc3339(),
                            pr.merged_at.map(|t| t.to_rfc3339()),
                            pr.time_to_merge,
                            pr.release_id,
                        ],
                    )?;
                }
                Some(stored) if pr.release_id.is_some() && stored != pr.release_id => {
                    tx.execute(
                        "UPDATE pull_requests SET release_id = ?1 WHERE pr_id = ?2",
                        params![pr.release_id, pr.pr_id],
                    )?;
                }
                Some(_) => {}
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert unseen issues; on stored ones, a status change rewrites status
    /// and stamps `updated_at` with the run timestamp. An unchanged status
    /// produces no write at all.
    pub fn upsert_issues(&mut self, issues: &[Issue], run_at: DateTime<Utc>) -> Result<()> {
        let tx = self.conn.transaction()?;
        for issue in issues {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT status FROM issues WHERE issue_id = ?1",
                    params![issue.issue_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO issues (issue_id, repo, title, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            issue.issue_id,
                            issue.repo,
                            issue.title,
                            issue.status,
                            issue.created_at.to_rfc3339(),
                            run_at.to_rfc3339(),
                        ],
                    )?;
                }
                Some(status) if status != issue.status => {
                    tx.execute(
                        "UPDATE issues SET status = ?1, updated_at = ?2 WHERE issue_id = ?3",
                        params![issue.status, run_at.to_rfc3339(), issue.issue_id],
                    )?;
                }
                Some(_) => {}
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Recount every release's `pr_count` from the attributed pull requests.
    /// Recounting keeps re-runs idempotent: a PR whose attribution moved
    /// between releases is counted once, under its current release.
    pub fn refresh_pr_counts(&mut self) -> Result<()> {
        self.conn.execute(
            "UPDATE releases SET pr_count = (
                 SELECT COUNT(*) FROM pull_requests
                 WHERE pull_requests.release_id = releases.release_id
             )",
            [],
        )?;
        Ok(())
    }

    /// Full current contents of all three tables, for the snapshot exporter.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            releases: self.releases()?,
            pull_requests: self.pull_requests()?,
            issues: self.issues()?,
        })
    }
}
