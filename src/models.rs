use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published release, keyed by the source-assigned release id.
///
/// `time_since_last_release` and `pr_count` are derived during attribution
/// and recomputed on every sync; everything else is immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub release_id: String,
    pub version: String,
    pub name: String,
    pub author: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    /// Whole days since the previous release by publish time; 0 for the
    /// first release ever.
    pub time_since_last_release: i64,
    pub pr_count: i64,
}

/// A pull request, keyed by its number within the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub pr_id: String,
    pub repo: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    /// Hours between creation and merge, fixed once merged.
    pub time_to_merge: Option<f64>,
    /// The earliest release containing this PR; absent until a qualifying
    /// release is observed.
    pub release_id: Option<String>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

/// A tracked issue, keyed by `repo#number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: String,
    pub repo: String,
    pub title: String,
    /// Project status label; the taxonomy is defined remotely, so this is
    /// stored opaquely.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full persisted state, as handed to the snapshot exporter after a sync.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub releases: Vec<Release>,
    pub pull_requests: Vec<PullRequest>,
    pub issues: Vec<Issue>,
}
