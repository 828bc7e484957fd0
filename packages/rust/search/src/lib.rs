//! Web search with an ordered fallback chain.
//!
//! A [`SearchProvider`] tries each configured [`SearchTier`] in order and
//! returns the hits of the first one that succeeds. When every tier fails
//! (or none is configured) it answers from a fixed synthetic result set
//! derived from the query, so a search never fails outward.

mod scrape;
mod serpapi;
mod synthetic;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use dossier_shared::{DossierError, Result, SearchConfig, SearchHit};

pub use scrape::ScrapeTier;
pub use serpapi::SerpApiTier;
pub use synthetic::synthetic_hits;

/// Browser-like User-Agent; the HTML search page rejects obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// ---------------------------------------------------------------------------
// SearchTier
// ---------------------------------------------------------------------------

/// One alternative in the search fallback chain.
#[async_trait]
pub trait SearchTier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return up to `count` hits for `query`, in the backend's own order.
    ///
    /// An `Err` tells the provider to move on to the next tier.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// SearchProvider
// ---------------------------------------------------------------------------

/// Ordered chain of search tiers ending in the synthetic result set.
pub struct SearchProvider {
    tiers: Vec<Box<dyn SearchTier>>,
}

impl SearchProvider {
    /// Build a provider from an explicit tier list (tried in order).
    pub fn new(tiers: Vec<Box<dyn SearchTier>>) -> Self {
        Self { tiers }
    }

    /// A provider with no live tiers: always answers synthetically.
    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    /// Build the standard chain: SerpAPI (only when a key is present), then
    /// the HTML scraping tier (unless disabled).
    pub fn from_config(config: &SearchConfig, api_key: Option<String>) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let mut tiers: Vec<Box<dyn SearchTier>> = Vec::new();

        match api_key {
            Some(key) => tiers.push(Box::new(SerpApiTier::new(
                client.clone(),
                &config.serpapi_url,
                key,
            ))),
            None => debug!(env = %config.api_key_env, "no search API key, skipping SerpAPI tier"),
        }

        if config.enable_scrape {
            tiers.push(Box::new(ScrapeTier::new(client, &config.scrape_url)));
        }

        Ok(Self::new(tiers))
    }

    /// Names of the configured live tiers, in order.
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Search for `query`, returning at most `count` hits.
    ///
    /// Never fails: the first successful tier wins, otherwise the synthetic
    /// set is returned. Hits keep the order of the tier that produced them.
    #[instrument(skip_all, fields(query = %query, count = count))]
    pub async fn search(&self, query: &str, count: usize) -> Vec<SearchHit> {
        for tier in &self.tiers {
            match tier.search(query, count).await {
                Ok(mut hits) => {
                    hits.truncate(count);
                    info!(tier = tier.name(), hits = hits.len(), "search tier succeeded");
                    return hits;
                }
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "search tier failed, trying next");
                }
            }
        }

        info!("all search tiers unavailable, using synthetic results");
        synthetic_hits(query, count)
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTier;

    #[async_trait]
    impl SearchTier for FailingTier {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<SearchHit>> {
            Err(DossierError::Network("connection refused".into()))
        }
    }

    struct FixedTier(Vec<SearchHit>);

    #[async_trait]
    impl SearchTier for FixedTier {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<SearchHit>> {
            Ok(self.0.clone())
        }
    }

    fn hit(n: usize) -> SearchHit {
        SearchHit::new(format!("title {n}"), format!("https://example.com/{n}"), "")
    }

    #[tokio::test]
    async fn offline_provider_is_synthetic() {
        let provider = SearchProvider::offline();
        let hits = provider.search("rust", 3).await;
        assert_eq!(hits, synthetic_hits("rust", 3));
    }

    #[tokio::test]
    async fn failing_tiers_fall_through_in_order() {
        let provider = SearchProvider::new(vec![
            Box::new(FailingTier),
            Box::new(FixedTier(vec![hit(1), hit(2)])),
            Box::new(FixedTier(vec![hit(9)])),
        ]);
        let hits = provider.search("q", 5).await;
        assert_eq!(hits, vec![hit(1), hit(2)]);
    }

    #[tokio::test]
    async fn tier_output_is_truncated_to_count() {
        let provider = SearchProvider::new(vec![Box::new(FixedTier((0..10).map(hit).collect()))]);
        let hits = provider.search("q", 4).await;
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0], hit(0));
        assert_eq!(hits[3], hit(3));
    }

    #[tokio::test]
    async fn all_tiers_failing_yields_synthetic() {
        let provider = SearchProvider::new(vec![Box::new(FailingTier), Box::new(FailingTier)]);
        let hits = provider.search("soil health", 2).await;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.title.contains("soil health")));
    }

    #[test]
    fn from_config_without_key_skips_serpapi() {
        let config = SearchConfig::default();
        let provider = SearchProvider::from_config(&config, None).expect("build provider");
        assert_eq!(provider.tier_names(), vec!["duckduckgo-html"]);

        let provider =
            SearchProvider::from_config(&config, Some("key".into())).expect("build provider");
        assert_eq!(provider.tier_names(), vec!["serpapi", "duckduckgo-html"]);

        let config = SearchConfig {
            enable_scrape: false,
            ..SearchConfig::default()
        };
        let provider = SearchProvider::from_config(&config, None).expect("build provider");
        assert!(provider.tier_names().is_empty());
    }
}
