//! Stage 1: search the topic and compress the snippets into key points.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use dossier_search::SearchProvider;
use dossier_shared::{ResearchRecord, Result, SearchHit};

use crate::generator::DEFAULT_MAX_BULLETS;
use crate::keypoints::{KeyPointExtractor, fallback_bullets};

/// The research step as seen by the driver.
#[async_trait]
pub trait ResearchStage: Send + Sync {
    async fn research(&self, topic: &str, max_results: usize) -> Result<ResearchRecord>;
}

/// Default research stage: [`SearchProvider`] plus a [`KeyPointExtractor`].
pub struct Researcher {
    search: SearchProvider,
    extractor: Arc<dyn KeyPointExtractor>,
}

impl Researcher {
    pub fn new(search: SearchProvider, extractor: Arc<dyn KeyPointExtractor>) -> Self {
        Self { search, extractor }
    }
}

#[async_trait]
impl ResearchStage for Researcher {
    #[instrument(skip_all, fields(topic = %topic, max_results = max_results))]
    async fn research(&self, topic: &str, max_results: usize) -> Result<ResearchRecord> {
        if topic.trim().is_empty() {
            debug!("blank topic, returning empty research record");
            return Ok(ResearchRecord::empty(topic));
        }

        let mut hits: Vec<SearchHit> = self
            .search
            .search(topic, max_results)
            .await
            .into_iter()
            .take(max_results)
            .map(normalize_hit)
            .collect();
        let mut excerpts = excerpts_of(&hits);

        if excerpts.is_empty() {
            warn!("search produced no usable snippets, using placeholder research");
            hits = placeholder_hits(topic, max_results);
            excerpts = excerpts_of(&hits);
        }

        let (summary, key_points) = match self.extractor.extract(&excerpts, DEFAULT_MAX_BULLETS).await {
            Ok(key_points) => {
                let summary = key_points.lines().next().unwrap_or_default().to_string();
                (summary, key_points)
            }
            Err(e) => {
                warn!(error = %e, "key-point extraction failed, summarizing from excerpts");
                let summary = excerpts
                    .iter()
                    .take(2)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                let key_points = fallback_bullets(&excerpts, DEFAULT_MAX_BULLETS);
                (summary, key_points)
            }
        };

        info!(hits = hits.len(), excerpts = excerpts.len(), "research complete");

        Ok(ResearchRecord {
            query: topic.to_string(),
            hits,
            excerpts,
            summary,
            key_points,
        })
    }
}

/// Trim the snippet and fall back to the link when the title is blank.
fn normalize_hit(hit: SearchHit) -> SearchHit {
    let title = if hit.title.trim().is_empty() {
        hit.link.clone()
    } else {
        hit.title
    };
    let snippet = hit.snippet.trim().to_string();
    SearchHit { title, snippet, ..hit }
}

fn excerpts_of(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .filter(|h| !h.snippet.is_empty())
        .map(|h| h.snippet.clone())
        .collect()
}

/// Three link-less hits covering overview, impacts, and policy, truncated
/// to `max_results` but never to zero.
fn placeholder_hits(topic: &str, max_results: usize) -> Vec<SearchHit> {
    let hits = [
        SearchHit::new(
            format!("Overview: {topic}"),
            "",
            format!("{topic} draws attention from researchers and practitioners alike. Existing work describes its scope and the main forces shaping it."),
        ),
        SearchHit::new(
            format!("Impacts and adaptation: {topic}"),
            "",
            format!("The impacts of {topic} vary by region and sector. Adaptation measures focus on resilience and early planning."),
        ),
        SearchHit::new(
            format!("Policy responses: {topic}"),
            "",
            format!("Policy responses to {topic} range from local programs to national strategies. Coordination and funding remain recurring challenges."),
        ),
    ];

    hits.into_iter().take(max_results.max(1)).collect()
}
