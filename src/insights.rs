use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryInsights {
    pub repo: String,
    pub collected_at: DateTime<Utc>,
    pub releases: ReleaseSummary,
    pub pull_requests: PullRequestSummary,
    pub issues: IssueSummary,
    pub leaderboard: Leaderboard,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub total_releases: usize,
    pub total_attributed_prs: i64,
    pub avg_days_between_releases: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub total_pull_requests: usize,
    pub merged_pull_requests: usize,
    pub avg_time_to_merge_hours: f64,
    pub pending_attribution: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total_issues: usize,
    pub by_status: IndexMap<String, usize>,
}

/// Per-author contribution counts, highest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct Leaderboard {
    pub releases_by_author: IndexMap<String, usize>,
    pub merged_prs_by_author: IndexMap<String, usize>,
}
