use std::collections::HashSet;

use log::info;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, ShipLensError};

const PER_PAGE: usize = 100;

/// A record returned by a paginated REST listing, carrying its stable
/// source-assigned identifier.
pub trait PagedRecord {
    fn record_id(&self) -> String;
}

pub struct GitHubClient {
    pub(super) client: Client,
    pub(super) api_url: Url,
    pub(super) token: Option<Token>,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shiplens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ShipLensError::ConfigError(format!("Failed to create HTTP client: {e}"))
            })?;

        let api_url = Url::parse(base_url)
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    pub(super) fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    pub(super) fn repo_url(&self, repo: &str, endpoint: &str) -> Result<Url> {
        self.api_url
            .join(&format!("repos/{repo}/{endpoint}"))
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid repository URL: {e}")))
    }

    pub(super) fn graphql_url(&self) -> Result<Url> {
        self.api_url
            .join("graphql")
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid GraphQL URL: {e}")))
    }

    /// Page through a REST listing until the source runs out of records or a
    /// previously-seen identifier appears, returning only new records.
    ///
    /// Precondition: the endpoint returns records newest-first (GitHub's
    /// default listing order). Early-stop relies on it; every record ahead of
    /// a known one is then guaranteed to be unseen.
    pub(super) async fn fetch_incremental<T>(
        &self,
        url: Url,
        extra_params: &[(&str, &str)],
        known: &HashSet<String>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + PagedRecord,
    {
        let mut collected = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(url.clone())
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
                .query(extra_params);
            let request = self.auth_request(request);

            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ShipLensError::ApiError(format!(
                    "Failed to fetch {url}: {status} - {body}"
                )));
            }

            let records: Vec<T> = response.json().await?;

            // An empty page terminates pagination
            if records.is_empty() {
                break;
            }

            for record in records {
                if known.contains(&record.record_id()) {
                    info!(
                        "Reached known record {} on page {page}, stopping early",
                        record.record_id()
                    );
                    return Ok(collected);
                }
                collected.push(record);
            }

            page += 1;
        }

        Ok(collected)
    }
}
