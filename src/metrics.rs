//! Delivery metric summaries computed from a persisted snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::insights::{
    DeliveryInsights, IssueSummary, Leaderboard, PullRequestSummary, ReleaseSummary,
};
use crate::models::{Issue, PullRequest, Release, Snapshot};

pub fn delivery_insights(snapshot: &Snapshot, collected_at: DateTime<Utc>) -> DeliveryInsights {
    DeliveryInsights {
        repo: snapshot_repo(snapshot),
        collected_at,
        releases: release_summary(&snapshot.releases),
        pull_requests: pull_request_summary(&snapshot.pull_requests),
        issues: issue_summary(&snapshot.issues),
        leaderboard: leaderboard(&snapshot.releases, &snapshot.pull_requests),
    }
}

fn snapshot_repo(snapshot: &Snapshot) -> String {
    snapshot
        .pull_requests
        .first()
        .map(|pr| pr.repo.clone())
        .or_else(|| snapshot.issues.first().map(|i| i.repo.clone()))
        .unwrap_or_default()
}

fn release_summary(releases: &[Release]) -> ReleaseSummary {
    let total_attributed_prs = releases.iter().map(|r| r.pr_count).sum();

    // The chronologically first release has no predecessor; its zero is
    // excluded from the cadence average.
    let cadences: Vec<i64> = releases
        .iter()
        .skip(1)
        .map(|r| r.time_since_last_release)
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let avg_days_between_releases = if cadences.is_empty() {
        0.0
    } else {
        cadences.iter().sum::<i64>() as f64 / cadences.len() as f64
    };

    ReleaseSummary {
        total_releases: releases.len(),
        total_attributed_prs,
        avg_days_between_releases,
    }
}

fn pull_request_summary(pulls: &[PullRequest]) -> PullRequestSummary {
    let latencies: Vec<f64> = pulls.iter().filter_map(|pr| pr.time_to_merge).collect();

    #[allow(clippy::cast_precision_loss)]
    let avg_time_to_merge_hours = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let pending_attribution = pulls
        .iter()
        .filter(|pr| pr.is_merged() && pr.release_id.is_none())
        .count();

    PullRequestSummary {
        total_pull_requests: pulls.len(),
        merged_pull_requests: pulls.iter().filter(|pr| pr.is_merged()).count(),
        avg_time_to_merge_hours,
        pending_attribution,
    }
}

fn issue_summary(issues: &[Issue]) -> IssueSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for issue in issues {
        *counts.entry(issue.status.as_str()).or_insert(0) += 1;
    }

    IssueSummary {
        total_issues: issues.len(),
        by_status: rank(counts),
    }
}

fn leaderboard(releases: &[Release], pulls: &[PullRequest]) -> Leaderboard {
    let mut release_counts: HashMap<&str, usize> = HashMap::new();
    for release in releases {
        *release_counts.entry(release.author.as_str()).or_insert(0) += 1;
    }

    let mut pr_counts: HashMap<&str, usize> = HashMap::new();
    for pr in pulls.iter().filter(|pr| pr.is_merged()) {
        *pr_counts.entry(pr.author.as_str()).or_insert(0) += 1;
    }

    Leaderboard {
        releases_by_author: rank(release_counts),
        merged_prs_by_author: rank(pr_counts),
    }
}

/// Order counts highest first, ties broken by name for stable output.
fn rank(counts: HashMap<&str, usize>) -> IndexMap<String, usize> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn release(id: &str, author: &str, cadence: i64, pr_count: i64) -> Release {
        Release {
            release_id: id.to_string(),
            version: format!("v{id}"),
            name: String::new(),
            author: author.to_string(),
            body: String::new(),
            published_at: ts("2024-01-01T00:00:00Z"),
            time_since_last_release: cadence,
            pr_count,
        }
    }

    fn pull(id: &str, author: &str, time_to_merge: Option<f64>) -> PullRequest {
        PullRequest {
            pr_id: id.to_string(),
            repo: "acme/app".to_string(),
            author: author.to_string(),
            created_at: ts("2024-01-02T00:00:00Z"),
            merged_at: time_to_merge.map(|_| ts("2024-01-05T00:00:00Z")),
            time_to_merge,
            release_id: None,
        }
    }

    fn issue(id: &str, status: &str) -> Issue {
        Issue {
            issue_id: id.to_string(),
            repo: "acme/app".to_string(),
            title: String::new(),
            status: status.to_string(),
            created_at: ts("2024-02-01T00:00:00Z"),
            updated_at: ts("2024-02-01T00:00:00Z"),
        }
    }

    #[test]
    fn test_release_summary_averages_cadence_after_first() {
        let releases = vec![
            release("a", "octocat", 0, 1),
            release("b", "octocat", 10, 2),
            release("c", "hubot", 4, 0),
        ];
        let summary = release_summary(&releases);

        assert_eq!(summary.total_releases, 3);
        assert_eq!(summary.total_attributed_prs, 3);
        assert!((summary.avg_days_between_releases - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_release_summary_empty() {
        let summary = release_summary(&[]);

        assert_eq!(summary.total_releases, 0);
        assert_eq!(summary.avg_days_between_releases, 0.0);
    }

    #[test]
    fn test_pull_request_summary_counts_and_latency() {
        let pulls = vec![
            pull("1", "octocat", Some(72.0)),
            pull("2", "hubot", Some(24.0)),
            pull("3", "hubot", None),
        ];
        let summary = pull_request_summary(&pulls);

        assert_eq!(summary.total_pull_requests, 3);
        assert_eq!(summary.merged_pull_requests, 2);
        assert!((summary.avg_time_to_merge_hours - 48.0).abs() < f64::EPSILON);
        // Both merged PRs are still unattributed
        assert_eq!(summary.pending_attribution, 2);
    }

    #[test]
    fn test_issue_summary_ranks_statuses() {
        let issues = vec![
            issue("acme/app#1", "Done"),
            issue("acme/app#2", "Done"),
            issue("acme/app#3", "Todo"),
        ];
        let summary = issue_summary(&issues);

        assert_eq!(summary.total_issues, 3);
        let entries: Vec<_> = summary.by_status.iter().collect();
        assert_eq!(entries[0], (&"Done".to_string(), &2));
        assert_eq!(entries[1], (&"Todo".to_string(), &1));
    }

    #[test]
    fn test_leaderboard_counts_merged_prs_only() {
        let releases = vec![release("a", "octocat", 0, 0)];
        let pulls = vec![
            pull("1", "hubot", Some(10.0)),
            pull("2", "hubot", Some(20.0)),
            pull("3", "octocat", None),
        ];
        let board = leaderboard(&releases, &pulls);

        assert_eq!(board.releases_by_author.get("octocat"), Some(&1));
        assert_eq!(board.merged_prs_by_author.get("hubot"), Some(&2));
        assert_eq!(board.merged_prs_by_author.get("octocat"), None);
    }
}
