use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;

use super::client::{GitHubClient, PagedRecord};
use super::types::RawUser;
use crate::error::Result;
use crate::models::PullRequest;

/// Pull request payload as returned by the repository pulls listing.
#[derive(Debug, Deserialize)]
pub struct RawPull {
    pub number: i64,
    pub user: Option<RawUser>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PagedRecord for RawPull {
    fn record_id(&self) -> String {
        self.number.to_string()
    }
}

impl RawPull {
    fn into_pull_request(self, repo: &str) -> PullRequest {
        // Merge latency in hours, fixed at the moment the PR is observed merged
        let time_to_merge = self
            .merged_at
            .map(|merged| (merged - self.created_at).num_seconds() as f64 / 3600.0);

        PullRequest {
            pr_id: self.number.to_string(),
            repo: repo.to_string(),
            author: self.user.map(|u| u.login).unwrap_or_default(),
            created_at: self.created_at,
            merged_at: self.merged_at,
            time_to_merge,
            release_id: None,
        }
    }
}

impl GitHubClient {
    /// Fetch pull requests (open and closed) newer than anything in the
    /// known-identifier set.
    pub async fn fetch_pulls(
        &self,
        repo: &str,
        known: &HashSet<String>,
    ) -> Result<Vec<PullRequest>> {
        info!("Fetching new pull requests for {repo}...");

        let url = self.repo_url(repo, "pulls")?;
        let raw: Vec<RawPull> = self
            .fetch_incremental(url, &[("state", "all")], known)
            .await?;

        let pulls: Vec<PullRequest> = raw
            .into_iter()
            .map(|pr| pr.into_pull_request(repo))
            .collect();
        info!("Fetched {} new pull requests", pulls.len());

        Ok(pulls)
    }
}
