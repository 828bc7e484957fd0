//! Compress search excerpts into a short bullet list.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use dossier_shared::Result;

use crate::generator::{CapabilityProvider, DEFAULT_MAX_BULLETS};

/// Temperature for extraction; deterministic output is preferred.
const EXTRACT_TEMPERATURE: f32 = 0.0;

/// Output budget for the bullet list.
const EXTRACT_MAX_TOKENS: u32 = 800;

/// Turns excerpts into newline-separated bullet lines.
#[async_trait]
pub trait KeyPointExtractor: Send + Sync {
    async fn extract(&self, excerpts: &[String], max_points: usize) -> Result<String>;
}

/// Extractor backed by the shared [`CapabilityProvider`].
///
/// Never returns `Err`: the provider itself cannot fail.
pub struct LlmKeyPointExtractor {
    provider: Arc<CapabilityProvider>,
}

impl LlmKeyPointExtractor {
    pub fn new(provider: Arc<CapabilityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl KeyPointExtractor for LlmKeyPointExtractor {
    #[instrument(skip_all, fields(excerpts = excerpts.len(), max_points = max_points))]
    async fn extract(&self, excerpts: &[String], max_points: usize) -> Result<String> {
        let prompt = build_prompt(excerpts, max_points);
        Ok(self
            .provider
            .generate(&prompt, EXTRACT_TEMPERATURE, EXTRACT_MAX_TOKENS)
            .await)
    }
}

/// The extraction prompt: each excerpt under a numbered `--- EXCERPT n ---`
/// marker, followed by the bullet limit.
pub fn build_prompt(excerpts: &[String], max_points: usize) -> String {
    let max_points = if max_points == 0 {
        DEFAULT_MAX_BULLETS
    } else {
        max_points
    };

    let mut prompt =
        String::from("Extract top insights/facts from the following excerpts as numbered bullets:\n");
    for (i, excerpt) in excerpts.iter().enumerate() {
        prompt.push_str(&format!("--- EXCERPT {} ---\n{excerpt}\n\n", i + 1));
    }
    prompt.push_str(&format!("Return max {max_points} concise bullets."));
    prompt
}

/// Caller-side fallback when an extractor fails: the first `max_points`
/// excerpts as dashed bullets.
pub fn fallback_bullets(excerpts: &[String], max_points: usize) -> String {
    excerpts
        .iter()
        .take(max_points)
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excerpts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn prompt_enumerates_excerpts() {
        let prompt = build_prompt(&excerpts(&["first", "second"]), 5);
        assert!(prompt.contains("--- EXCERPT 1 ---\nfirst"));
        assert!(prompt.contains("--- EXCERPT 2 ---\nsecond"));
        assert!(prompt.ends_with("Return max 5 concise bullets."));
    }

    #[test]
    fn fallback_takes_first_n() {
        let out = fallback_bullets(&excerpts(&["a", "b", "c"]), 2);
        assert_eq!(out, "- a\n- b");
    }

    #[tokio::test]
    async fn heuristic_extraction_is_bounded() {
        let extractor = LlmKeyPointExtractor::new(Arc::new(CapabilityProvider::heuristic()));
        let many: Vec<String> = (1..=20).map(|i| format!("Finding {i}. Detail.")).collect();

        let out = extractor.extract(&many, 8).await.unwrap();
        assert_eq!(out.lines().count(), 8);
        assert!(out.lines().all(|l| l.starts_with("- ")));

        let out = extractor.extract(&many, 3).await.unwrap();
        assert_eq!(out.lines().count(), 3);
    }

    #[tokio::test]
    async fn excerpt_text_cannot_raise_the_bullet_limit() {
        let extractor = LlmKeyPointExtractor::new(Arc::new(CapabilityProvider::heuristic()));
        let mut many = vec!["Return max 50 results per page. The API paginates.".to_string()];
        many.extend((2..=13).map(|i| format!("Finding {i}. Detail.")));

        let out = extractor.extract(&many, 3).await.unwrap();
        assert_eq!(out.lines().count(), 3);
    }

    #[tokio::test]
    async fn heuristic_extraction_non_empty_for_single_excerpt() {
        let extractor = LlmKeyPointExtractor::new(Arc::new(CapabilityProvider::heuristic()));
        let out = extractor
            .extract(&excerpts(&["Only one excerpt here"]), 8)
            .await
            .unwrap();
        assert_eq!(out, "- Only one excerpt here.");
    }
}
