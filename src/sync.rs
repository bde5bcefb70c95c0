//! One run-to-completion sync: fetch, attribute, store, snapshot.

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::attribution;
use crate::error::Result;
use crate::github::GitHubClient;
use crate::models::Snapshot;
use crate::store::Store;

/// Counts reported after a successful sync.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub repo: String,
    pub new_releases: usize,
    pub new_pull_requests: usize,
    pub project_issues_seen: usize,
    pub pending_attribution: usize,
}

pub struct SyncRunner {
    client: GitHubClient,
    org: String,
    repo: String,
    project: i64,
}

impl SyncRunner {
    pub fn new(client: GitHubClient, org: String, repo: String, project: i64) -> Self {
        Self {
            client,
            org,
            repo,
            project,
        }
    }

    /// Perform one full sync cycle against the store.
    ///
    /// Each record type commits in its own transaction as the run proceeds;
    /// a failure aborts the run but leaves earlier commits in place. All
    /// timestamps stamped during the run share one run timestamp.
    pub async fn run(&self, store: &mut Store) -> Result<(SyncReport, Snapshot)> {
        let run_at = Utc::now();
        info!("Starting sync for {}", self.repo);

        let known_releases = store.release_ids()?;
        let new_releases = self.client.fetch_releases(&self.repo, &known_releases).await?;

        let known_pulls = store.pull_request_ids()?;
        let new_pulls = self.client.fetch_pulls(&self.repo, &known_pulls).await?;

        let issues = self
            .client
            .fetch_project_issues(&self.org, self.project, &self.repo, run_at)
            .await?;

        // Attribution runs over the full chronological release set and over
        // new PRs plus stored PRs still awaiting a release.
        let new_release_count = new_releases.len();
        let mut releases = store.releases()?;
        releases.extend(new_releases);

        if releases.is_empty() {
            warn!("No releases known for {}; merged PRs stay pending", self.repo);
        }

        let new_pull_count = new_pulls.len();
        let mut candidates = new_pulls;
        candidates.extend(store.unattributed_pull_requests()?);

        attribution::attribute(&mut releases, &mut candidates);

        store.upsert_releases(&releases)?;
        store.upsert_pull_requests(&candidates)?;
        store.refresh_pr_counts()?;
        store.upsert_issues(&issues, run_at)?;

        let pending_attribution = candidates
            .iter()
            .filter(|pr| pr.is_merged() && pr.release_id.is_none())
            .count();

        let report = SyncReport {
            repo: self.repo.clone(),
            new_releases: new_release_count,
            new_pull_requests: new_pull_count,
            project_issues_seen: issues.len(),
            pending_attribution,
        };

        info!(
            "Sync complete: {} new releases, {} new PRs, {} issues, {} pending attribution",
            report.new_releases,
            report.new_pull_requests,
            report.project_issues_seen,
            report.pending_attribution
        );

        let snapshot = store.snapshot()?;
        Ok((report, snapshot))
    }
}
