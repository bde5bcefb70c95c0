//! Release cadence and pull-request attribution.
//!
//! Operates on the full chronological release set (stored + newly fetched)
//! so that re-runs are idempotent and pending pull requests can attach to
//! releases observed in earlier syncs.

use chrono::{DateTime, Utc};

use crate::models::{PullRequest, Release};

/// Annotate releases with cadence and assign unattributed merged pull
/// requests to their earliest containing release.
///
/// Releases are sorted ascending by publish time in place; candidate pull
/// requests must carry `release_id: None` (already-attributed PRs are not
/// reconsidered).
pub fn attribute(releases: &mut Vec<Release>, pulls: &mut [PullRequest]) {
    releases.sort_by_key(|r| r.published_at);
    compute_cadence(releases);
    attribute_pull_requests(releases, pulls);
}

/// Compute `time_since_last_release` as whole days between consecutive
/// releases in ascending publish-time order. The first release ever gets 0.
fn compute_cadence(releases: &mut [Release]) {
    let mut last_published: Option<DateTime<Utc>> = None;

    for release in releases {
        release.time_since_last_release = match last_published {
            Some(prev) => (release.published_at - prev).num_days(),
            None => 0,
        };
        last_published = Some(release.published_at);
    }
}

/// Assign each candidate pull request to the first release (ascending by
/// publish time) whose cut is at or after the merge timestamp. Unmerged
/// pull requests are never attributed; a merged PR newer than every known
/// release stays pending until a qualifying release appears.
fn attribute_pull_requests(releases: &mut [Release], pulls: &mut [PullRequest]) {
    for pr in pulls {
        if pr.release_id.is_some() {
            continue;
        }

        let Some(merged_at) = pr.merged_at else {
            continue;
        };

        if let Some(release) = releases.iter_mut().find(|r| merged_at <= r.published_at) {
            pr.release_id = Some(release.release_id.clone());
            release.pr_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn release(id: &str, published_at: &str) -> Release {
        Release {
            release_id: id.to_string(),
            version: format!("v{id}"),
            name: String::new(),
            author: "octocat".to_string(),
            body: String::new(),
            published_at: ts(published_at),
            time_since_last_release: 0,
            pr_count: 0,
        }
    }

    fn pull(id: &str, created_at: &str, merged_at: Option<&str>) -> PullRequest {
        PullRequest {
            pr_id: id.to_string(),
            repo: "acme/app".to_string(),
            author: "octocat".to_string(),
            created_at: ts(created_at),
            merged_at: merged_at.map(ts),
            time_to_merge: None,
            release_id: None,
        }
    }

    #[test]
    fn test_cadence_first_release_is_zero() {
        let mut releases = vec![release("1", "2024-01-01T00:00:00Z")];
        attribute(&mut releases, &mut []);

        assert_eq!(releases[0].time_since_last_release, 0);
    }

    #[test]
    fn test_cadence_whole_days_between_consecutive_releases() {
        let mut releases = vec![
            release("b", "2024-01-11T00:00:00Z"),
            release("a", "2024-01-01T00:00:00Z"),
        ];
        attribute(&mut releases, &mut []);

        // Sorted ascending regardless of input order
        assert_eq!(releases[0].release_id, "a");
        assert_eq!(releases[0].time_since_last_release, 0);
        assert_eq!(releases[1].release_id, "b");
        assert_eq!(releases[1].time_since_last_release, 10);
    }

    #[test]
    fn test_cadence_truncates_partial_days() {
        let mut releases = vec![
            release("a", "2024-01-01T00:00:00Z"),
            release("b", "2024-01-04T23:00:00Z"),
        ];
        attribute(&mut releases, &mut []);

        assert_eq!(releases[1].time_since_last_release, 3);
    }

    #[test]
    fn test_attributes_to_earliest_containing_release() {
        let mut releases = vec![
            release("a", "2024-01-01T00:00:00Z"),
            release("b", "2024-01-11T00:00:00Z"),
        ];
        let mut pulls = vec![pull("1", "2023-12-20T00:00:00Z", Some("2023-12-25T00:00:00Z"))];
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id.as_deref(), Some("a"));
        assert_eq!(releases[0].pr_count, 1);
        assert_eq!(releases[1].pr_count, 0);
    }

    #[test]
    fn test_merge_at_release_cut_is_included() {
        let mut releases = vec![release("a", "2024-01-05T00:00:00Z")];
        let mut pulls = vec![pull("1", "2024-01-02T00:00:00Z", Some("2024-01-05T00:00:00Z"))];
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_unmerged_pull_request_is_never_attributed() {
        let mut releases = vec![release("a", "2024-01-11T00:00:00Z")];
        let mut pulls = vec![pull("1", "2024-01-02T00:00:00Z", None)];
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id, None);
        assert_eq!(releases[0].pr_count, 0);
    }

    #[test]
    fn test_merge_after_every_release_stays_pending() {
        let mut releases = vec![
            release("a", "2024-01-01T00:00:00Z"),
            release("b", "2024-01-11T00:00:00Z"),
        ];
        let mut pulls = vec![pull("2", "2024-01-12T00:00:00Z", Some("2024-01-15T00:00:00Z"))];
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id, None);
    }

    #[test]
    fn test_already_attributed_pull_request_is_untouched() {
        let mut releases = vec![release("a", "2024-01-11T00:00:00Z")];
        let mut pulls = vec![pull("1", "2024-01-02T00:00:00Z", Some("2024-01-05T00:00:00Z"))];
        pulls[0].release_id = Some("older".to_string());
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id.as_deref(), Some("older"));
        assert_eq!(releases[0].pr_count, 0);
    }

    #[test]
    fn test_attribution_is_deterministic_across_reruns() {
        let mut releases = vec![
            release("a", "2024-01-01T00:00:00Z"),
            release("b", "2024-01-11T00:00:00Z"),
        ];
        let mut first = vec![pull("1", "2023-12-20T00:00:00Z", Some("2023-12-30T00:00:00Z"))];
        attribute(&mut releases.clone(), &mut first);

        let mut second = vec![pull("1", "2023-12-20T00:00:00Z", Some("2023-12-30T00:00:00Z"))];
        attribute(&mut releases, &mut second);

        assert_eq!(first[0].release_id, second[0].release_id);
    }

    #[test]
    fn test_documented_release_scenario() {
        // Release A 2024-01-01, Release B 2024-01-11; PR #1 merged 01-05
        // lands in A; PR #2 merged 01-15 stays pending; B's cadence is 10.
        let mut releases = vec![
            release("A", "2024-01-01T00:00:00Z"),
            release("B", "2024-01-11T00:00:00Z"),
        ];
        let mut pulls = vec![
            pull("1", "2024-01-02T00:00:00Z", Some("2024-01-05T00:00:00Z")),
            pull("2", "2024-01-12T00:00:00Z", Some("2024-01-15T00:00:00Z")),
        ];
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[0].release_id.as_deref(), Some("A"));
        assert_eq!(pulls[1].release_id, None);
        assert_eq!(releases[0].pr_count, 1);
        assert_eq!(releases[1].time_since_last_release, 10);

        // A later Release C at the merge instant picks up the pending PR
        releases.push(release("C", "2024-01-15T00:00:00Z"));
        attribute(&mut releases, &mut pulls);

        assert_eq!(pulls[1].release_id.as_deref(), Some("C"));
        assert_eq!(releases[2].time_since_last_release, 4);
    }
}
