//! Issue statuses from an organization ProjectV2 board, fetched over the
//! GraphQL API with cursor pagination.

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;

use super::client::GitHubClient;
use crate::error::{Result, ShipLensError};
use crate::models::Issue;

const PAGE_SIZE: i64 = 50;

const PROJECT_ITEMS_QUERY: &str = r#"
query($org: String!, $project: Int!, $first: Int!, $after: String) {
  organization(login: $org) {
    projectV2(number: $project) {
      items(first: $first, after: $after) {
        nodes {
          content {
            __typename
            ... on Issue {
              number
              title
              repository {
                nameWithOwner
              }
            }
          }
          fieldValues(first: 20) {
            nodes {
              ... on ProjectV2ItemFieldSingleSelectValue {
                name
              }
            }
          }
        }
        pageInfo {
          hasNextPage
          endCursor
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(rename = "projectV2")]
    project_v2: Option<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    items: Items,
}

#[derive(Debug, Deserialize)]
struct Items {
    nodes: Vec<Item>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    content: Option<ItemContent>,
    #[serde(rename = "fieldValues")]
    field_values: FieldValues,
}

#[derive(Debug, Default, Deserialize)]
struct ItemContent {
    number: Option<i64>,
    title: Option<String>,
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FieldValues {
    nodes: Vec<FieldValue>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldValue {
    name: Option<String>,
}

impl Item {
    /// Project items whose content is not an issue, or that carry no
    /// single-select status, are skipped.
    fn into_issue(self, fallback_repo: &str, run_at: DateTime<Utc>) -> Option<Issue> {
        let content = self.content?;
        let number = content.number?;
        let status = self
            .field_values
            .nodes
            .into_iter()
            .find_map(|fv| fv.name)?;

        let repo = content
            .repository
            .and_then(|r| r.name_with_owner)
            .unwrap_or_else(|| fallback_repo.to_string());

        Some(Issue {
            issue_id: format!("{repo}#{number}"),
            repo,
            title: content.title.unwrap_or_default(),
            status,
            created_at: run_at,
            updated_at: run_at,
        })
    }
}

impl GitHubClient {
    /// Fetch every issue on the organization's project board along with its
    /// current status label. Unlike the release and PR listings this is a
    /// full scan each run; the store reconciles changed statuses.
    pub async fn fetch_project_issues(
        &self,
        org: &str,
        project: i64,
        fallback_repo: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Vec<Issue>> {
        info!("Fetching project {project} issues for organization {org}...");

        let url = self.graphql_url()?;
        let mut issues = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = json!({
                "query": PROJECT_ITEMS_QUERY,
                "variables": {
                    "org": org,
                    "project": project,
                    "first": PAGE_SIZE,
                    "after": cursor,
                },
            });

            let request = self.client.post(url.clone()).json(&body);
            let request = self.auth_request(request);

            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(ShipLensError::ApiError(format!(
                    "Failed to fetch project items: {status} - {text}"
                )));
            }

            let response_body: GraphQlResponse = response.json().await?;

            if let Some(errors) = response_body.errors {
                let joined = errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ShipLensError::ApiError(format!("GraphQL errors: {joined}")));
            }

            let data = response_body
                .data
                .ok_or_else(|| ShipLensError::ApiError("GraphQL response contained no data".to_string()))?;

            let organization = data.organization.ok_or_else(|| {
                ShipLensError::ConfigError(format!("Organization '{org}' not found"))
            })?;

            let Some(project_data) = organization.project_v2 else {
                return Err(ShipLensError::ConfigError(format!(
                    "Project {project} not found for organization '{org}'"
                )));
            };

            let page_info = project_data.items.page_info;
            issues.extend(
                project_data
                    .items
                    .nodes
                    .into_iter()
                    .filter_map(|item| item.into_issue(fallback_repo, run_at)),
            );

            if !page_info.has_next_page {
                break;
            }

            cursor = page_info.end_cursor;

            if cursor.is_none() {
                break;
            }
        }

        info!("Fetched {} project issues", issues.len());
        Ok(issues)
    }
}
