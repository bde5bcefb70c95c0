use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;

use super::client::{GitHubClient, PagedRecord};
use super::types::RawUser;
use crate::error::Result;
use crate::models::Release;

/// Release payload as returned by the repository releases listing.
#[derive(Debug, Deserialize)]
pub struct RawRelease {
    pub id: i64,
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub author: Option<RawUser>,
    pub published_at: Option<DateTime<Utc>>,
}

impl PagedRecord for RawRelease {
    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl RawRelease {
    /// Drafts carry no `published_at` and are skipped: chronological
    /// ordering is defined by publish time.
    fn into_release(self) -> Option<Release> {
        let published_at = self.published_at?;

        Some(Release {
            release_id: self.id.to_string(),
            version: self.tag_name,
            name: self.name.unwrap_or_default(),
            author: self.author.map(|u| u.login).unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            published_at,
            time_since_last_release: 0,
            pr_count: 0,
        })
    }
}

impl GitHubClient {
    /// Fetch releases newer than anything in the known-identifier set.
    pub async fn fetch_releases(
        &self,
        repo: &str,
        known: &HashSet<String>,
    ) -> Result<Vec<Release>> {
        info!("Fetching new releases for {repo}...");

        let url = self.repo_url(repo, "releases")?;
        let raw: Vec<RawRelease> = self.fetch_incremental(url, &[], known).await?;

        let releases: Vec<Release> = raw.into_iter().filter_map(RawRelease::into_release).collect();
        info!("Fetched {} new releases", releases.len());

        Ok(releases)
    }
}
