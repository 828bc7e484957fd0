//! Text generation with a deterministic local fallback.
//!
//! [`CapabilityProvider`] wraps an optional live [`TextGenerator`] and a
//! [`HeuristicGenerator`]. The live backend is chosen at construction time
//! when credentials are configured; at call time any live failure drops to
//! the heuristic, which never fails and never touches the network.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use dossier_shared::{DossierError, GenerationConfig, Result};

/// Prompt phrases that mark a bullet-extraction task.
pub const BULLET_TASK_MARKERS: [&str; 2] = ["Extract top insights", "Return max"];

/// Prompt phrases that mark a structured-report task.
pub const REPORT_TASK_MARKERS: [&str; 2] = ["Create structured report JSON", "Return ONLY valid JSON"];

/// Bullet cap when the prompt does not state one.
pub const DEFAULT_MAX_BULLETS: usize = 8;

/// Minimum length of the echo fallback.
const MIN_ECHO_CHARS: usize = 200;

static EXCERPT_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- EXCERPT \d+ ---").unwrap());

static BULLET_LIMIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Return max (\d+)").unwrap());

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

/// A backend that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String>;
}

// ---------------------------------------------------------------------------
// LiveGenerator (Generative Language API)
// ---------------------------------------------------------------------------

/// Calls the Generative Language `generateContent` endpoint.
pub struct LiveGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl LiveGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(DossierError::config("generation API key is empty"));
        }
        if config.default_model.trim().is_empty() {
            return Err(DossierError::config("generation model is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.default_model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for LiveGenerator {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DossierError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(DossierError::Generation(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DossierError::Generation(format!("invalid response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "live generation complete");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// HeuristicGenerator
// ---------------------------------------------------------------------------

/// Deterministic, offline stand-in for a language model.
///
/// Recognizes the bullet-extraction and structured-report prompts built by
/// this crate; anything else is echoed back, truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    /// Total: returns a string for any input.
    pub fn generate_text(&self, prompt: &str, max_tokens: u32) -> String {
        if BULLET_TASK_MARKERS.iter().any(|m| prompt.contains(m)) {
            return bullets_from_excerpts(prompt);
        }

        if REPORT_TASK_MARKERS.iter().any(|m| prompt.contains(m)) {
            return report_json_from_prompt(prompt);
        }

        let limit = (max_tokens as usize).max(MIN_ECHO_CHARS);
        let echo: String = prompt.chars().take(limit).collect();
        if echo.trim().is_empty() {
            "No content available.".into()
        } else {
            echo
        }
    }
}

#[async_trait]
impl TextGenerator for HeuristicGenerator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn generate(&self, prompt: &str, _temperature: f32, max_tokens: u32) -> Result<String> {
        Ok(self.generate_text(prompt, max_tokens))
    }
}

/// One `- first sentence.` bullet per excerpt, capped at the prompt's
/// `Return max N` (or [`DEFAULT_MAX_BULLETS`]).
fn bullets_from_excerpts(prompt: &str) -> String {
    // Excerpt text precedes the instruction and may contain the same phrase,
    // so only the last match is the caller's limit.
    let cap = BULLET_LIMIT
        .captures_iter(prompt)
        .last()
        .and_then(|c| c[1].parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_BULLETS);

    let bullets: Vec<String> = EXCERPT_BOUNDARY
        .split(prompt)
        .skip(1)
        .filter_map(first_sentence)
        .map(|s| format!("- {s}."))
        .take(cap)
        .collect();

    if bullets.is_empty() {
        return "- Key point: no excerpts available.".into();
    }
    bullets.join("\n")
}

/// First sentence of an excerpt block, without the trailing period.
///
/// The block ends at the first blank line, which separates it from the next
/// excerpt or the closing instruction.
fn first_sentence(block: &str) -> Option<String> {
    let text = block.trim_start_matches(['\r', '\n']);
    let paragraph = text.split("\n\n").next().unwrap_or(text);
    let sentence = paragraph.split('.').next().unwrap_or(paragraph);
    let sentence = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    (!sentence.is_empty()).then_some(sentence)
}

/// Minimal report JSON: first prompt line as title, prompt bullets as a
/// "Key Points" section, or a generic "Overview" section.
fn report_json_from_prompt(prompt: &str) -> String {
    let mut lines = prompt.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines.next().unwrap_or("Report").to_string();

    let summary = prompt
        .lines()
        .find_map(|l| l.trim().strip_prefix("Summary:"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Summary generated without a live model.");

    let bullets: Vec<&str> = prompt
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('-'))
        .collect();

    let section = if bullets.is_empty() {
        serde_json::json!({ "heading": "Overview", "content": "No key points were available." })
    } else {
        serde_json::json!({ "heading": "Key Points", "content": bullets.join("\n") })
    };

    serde_json::json!({
        "title": title,
        "summary": summary,
        "sections": [section],
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// CapabilityProvider
// ---------------------------------------------------------------------------

/// The text generation capability handed to the extractor and stages.
///
/// Construct once per process and share it behind an `Arc`.
pub struct CapabilityProvider {
    live: Option<Box<dyn TextGenerator>>,
    fallback: HeuristicGenerator,
}

impl CapabilityProvider {
    /// Heuristic-only provider (no credentials, or tests).
    pub fn heuristic() -> Self {
        Self {
            live: None,
            fallback: HeuristicGenerator,
        }
    }

    /// Provider that tries `live` first.
    pub fn with_live(live: Box<dyn TextGenerator>) -> Self {
        Self {
            live: Some(live),
            fallback: HeuristicGenerator,
        }
    }

    /// Select the backend from configuration: a live generator when an API
    /// key is present and the client can be built, the heuristic otherwise.
    pub fn from_config(config: &GenerationConfig, api_key: Option<String>) -> Self {
        let Some(key) = api_key else {
            info!(env = %config.api_key_env, "no generation API key, using heuristic generator");
            return Self::heuristic();
        };

        match LiveGenerator::new(config, key) {
            Ok(live) => {
                info!(model = %config.default_model, "live text generation configured");
                Self::with_live(Box::new(live))
            }
            Err(e) => {
                warn!(error = %e, "live generator unavailable, using heuristic generator");
                Self::heuristic()
            }
        }
    }

    /// Whether a live backend is configured.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Generate text for `prompt`. Never fails.
    ///
    /// A live response is returned unmodified (including an empty string);
    /// any live error falls back to the heuristic.
    pub async fn generate(&self, prompt: &str, temperature: f32, max_tokens: u32) -> String {
        if let Some(live) = &self.live {
            match live.generate(prompt, temperature, max_tokens).await {
                Ok(text) => return text,
                Err(e) => {
                    warn!(backend = live.name(), error = %e, "generation failed, falling back to heuristic");
                }
            }
        }

        debug!("using heuristic generator");
        self.fallback.generate_text(prompt, max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const BULLET_PROMPT: &str = "Extract top insights/facts from the following excerpts as numbered bullets:\n\
        --- EXCERPT 1 ---\nRainfall is shifting. Yields vary.\n\n\
        --- EXCERPT 2 ---\nDroughts are more frequent\n\n\
        --- EXCERPT 3 ---\n   \n\n\
        Return max 8 concise bullets.";

    fn live_config(server: &MockServer) -> GenerationConfig {
        GenerationConfig {
            base_url: server.uri(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn heuristic_bullets_take_first_sentences() {
        let out = HeuristicGenerator.generate_text(BULLET_PROMPT, 800);
        assert_eq!(
            out,
            "- Rainfall is shifting.\n- Droughts are more frequent."
        );
    }

    #[test]
    fn heuristic_bullets_respect_requested_cap() {
        let mut prompt = String::from("Extract top insights:\n");
        for i in 1..=12 {
            prompt.push_str(&format!("--- EXCERPT {i} ---\nFact number {i}. More.\n\n"));
        }
        prompt.push_str("Return max 3 concise bullets.");
        let out = HeuristicGenerator.generate_text(&prompt, 800);
        assert_eq!(out.lines().count(), 3);
        assert!(out.starts_with("- Fact number 1."));
    }

    #[test]
    fn heuristic_bullet_cap_ignores_limits_inside_excerpts() {
        let mut prompt = String::from("Extract top insights:\n");
        prompt.push_str("--- EXCERPT 1 ---\nReturn max 50 results per page. Paging is cursor based.\n\n");
        for i in 2..=13 {
            prompt.push_str(&format!("--- EXCERPT {i} ---\nFact number {i}. More.\n\n"));
        }
        prompt.push_str("Return max 3 concise bullets.");

        let out = HeuristicGenerator.generate_text(&prompt, 800);
        assert_eq!(out.lines().count(), 3);
        assert!(out.starts_with("- Return max 50 results per page."));
    }

    #[test]
    fn heuristic_bullets_default_cap_is_eight() {
        let mut prompt = String::from("Extract top insights:\n");
        for i in 1..=12 {
            prompt.push_str(&format!("--- EXCERPT {i} ---\nFact {i}.\n\n"));
        }
        let out = HeuristicGenerator.generate_text(&prompt, 800);
        assert_eq!(out.lines().count(), DEFAULT_MAX_BULLETS);
    }

    #[test]
    fn heuristic_bullets_without_excerpts() {
        let out = HeuristicGenerator.generate_text("Extract top insights from nothing", 800);
        assert_eq!(out, "- Key point: no excerpts available.");
    }

    #[test]
    fn heuristic_report_json_uses_title_and_bullets() {
        let prompt = "Soil erosion\nSummary: Soil is washing away.\n\n- Point one\n- Point two\n\n\
                      Task: Create structured report JSON object.";
        let out = HeuristicGenerator.generate_text(prompt, 1000);
        let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(value["title"], "Soil erosion");
        assert_eq!(value["summary"], "Soil is washing away.");
        assert_eq!(value["sections"][0]["heading"], "Key Points");
        assert_eq!(value["sections"][0]["content"], "- Point one\n- Point two");
    }

    #[test]
    fn heuristic_report_json_without_bullets() {
        let out = HeuristicGenerator.generate_text("Title\nReturn ONLY valid JSON.", 1000);
        let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(value["sections"][0]["heading"], "Overview");
    }

    #[test]
    fn heuristic_echo_is_truncated() {
        let prompt = "x".repeat(5000);
        assert_eq!(HeuristicGenerator.generate_text(&prompt, 10).len(), 200);
        assert_eq!(HeuristicGenerator.generate_text(&prompt, 300).len(), 300);
        assert_eq!(HeuristicGenerator.generate_text("short", 10), "short");
        assert!(!HeuristicGenerator.generate_text("", 10).is_empty());
    }

    #[test]
    fn heuristic_echo_is_char_boundary_safe() {
        let prompt = "é".repeat(300);
        assert_eq!(HeuristicGenerator.generate_text(&prompt, 10).chars().count(), 200);
    }

    #[test]
    fn from_config_without_key_is_heuristic() {
        let provider = CapabilityProvider::from_config(&GenerationConfig::default(), None);
        assert!(!provider.is_live());

        let provider =
            CapabilityProvider::from_config(&GenerationConfig::default(), Some("  ".into()));
        assert!(!provider.is_live());
    }

    #[tokio::test]
    async fn heuristic_as_trait_object() {
        let generator: Box<dyn TextGenerator> = Box::new(HeuristicGenerator);
        assert_eq!(generator.name(), "heuristic");
        let out = generator.generate(BULLET_PROMPT, 0.0, 800).await.unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn live_generation_returns_raw_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
            ))
            .mount(&server)
            .await;

        let live = LiveGenerator::new(&live_config(&server), "secret".into()).unwrap();
        let provider = CapabilityProvider::with_live(Box::new(live));
        assert_eq!(provider.generate("hi", 0.0, 100).await, "Hello world");
    }

    #[tokio::test]
    async fn live_empty_response_is_empty_string() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"candidates":[]}"#))
            .mount(&server)
            .await;

        let live = LiveGenerator::new(&live_config(&server), "secret".into()).unwrap();
        let provider = CapabilityProvider::with_live(Box::new(live));
        assert_eq!(provider.generate("hi", 0.0, 100).await, "");
    }

    #[tokio::test]
    async fn live_failure_falls_back_to_heuristic() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let live = LiveGenerator::new(&live_config(&server), "secret".into()).unwrap();
        let provider = CapabilityProvider::with_live(Box::new(live));
        let out = provider.generate(BULLET_PROMPT, 0.0, 800).await;
        assert!(out.starts_with("- Rainfall is shifting."));
    }
}
