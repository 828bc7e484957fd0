//! Structured search tier backed by the SerpAPI Google engine.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use dossier_shared::{DossierError, Result, SearchHit};

use crate::SearchTier;

/// Structured JSON search API. Requires an API key.
pub struct SerpApiTier {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl SerpApiTier {
    pub fn new(client: Client, endpoint: &str, api_key: String) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl SearchTier for SerpApiTier {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        let num = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("engine", "google"),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("serpapi: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DossierError::Network(format!("serpapi: HTTP {status}")));
        }

        let body: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| DossierError::parse(format!("serpapi: invalid JSON: {e}")))?;

        if let Some(error) = body.error {
            return Err(DossierError::Network(format!("serpapi: {error}")));
        }

        let hits: Vec<SearchHit> = body
            .organic_results
            .into_iter()
            .take(count)
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                link: r.link.unwrap_or_default(),
                snippet: r.snippet.unwrap_or_default(),
            })
            .collect();

        debug!(hits = hits.len(), "serpapi results parsed");
        Ok(hits)
    }
}
