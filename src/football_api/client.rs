use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::models::{FixtureResult, FixtureSearch, FixturesResponse};
use super::provider::FixtureProvider;

const API_KEY_HEADER: &str = "x-rapidapi-key";

/// Client for the api-football v3 `fixtures` endpoint.
/// Docs: <https://www.api-football.com/documentation-v3#tag/Fixtures>
#[derive(Clone)]
pub struct FootballApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl FootballApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(FootballApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl FixtureProvider for FootballApiClient {
    fn name(&self) -> &str {
        "api-football"
    }

    async fn search_fixtures(&self, search: &FixtureSearch) -> Result<Vec<FixtureResult>> {
        let url = format!("{}/fixtures", self.base_url);
        debug!("Searching fixtures at {} with {:?}", url, search);

        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&search.query_pairs())
            .send()
            .await
            .context("api-football request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("api-football error {}: {}", status, body);
        }

        let parsed: FixturesResponse = resp
            .json()
            .await
            .context("Failed to parse api-football response")?;

        Ok(parsed.response)
    }
}
