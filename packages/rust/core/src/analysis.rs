//! Stage 2: turn a research record into a [`StructuredReport`].
//!
//! The model is asked for a JSON object, but its answer is never trusted:
//! code fences are stripped, a failed parse gets one recovery attempt on the
//! outermost `{...}` span, and whatever comes back is normalized field by
//! field. Output that cannot be salvaged is replaced by a report built
//! directly from the research record. The stage never fails outward and
//! always returns at least one section.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use dossier_shared::{ReportSection, ResearchRecord, Result, SectionContent, StructuredReport};

use crate::generator::CapabilityProvider;

const ANALYSIS_TEMPERATURE: f32 = 0.0;
const ANALYSIS_MAX_TOKENS: u32 = 1000;

const DEFAULT_TITLE: &str = "Research Report";
const DEFAULT_HEADING: &str = "Section";

/// The analysis step as seen by the driver.
#[async_trait]
pub trait AnalysisStage: Send + Sync {
    async fn analyze(&self, research: &ResearchRecord) -> Result<StructuredReport>;
}

/// Default analysis stage backed by the shared [`CapabilityProvider`].
pub struct Analyst {
    provider: Arc<CapabilityProvider>,
}

impl Analyst {
    pub fn new(provider: Arc<CapabilityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AnalysisStage for Analyst {
    #[instrument(skip_all, fields(query = %research.query, excerpts = research.excerpts.len()))]
    async fn analyze(&self, research: &ResearchRecord) -> Result<StructuredReport> {
        let prompt = build_prompt(research);
        let raw = self
            .provider
            .generate(&prompt, ANALYSIS_TEMPERATURE, ANALYSIS_MAX_TOKENS)
            .await;

        let report = match parse_report_object(&raw) {
            Some(object) => normalize_report(object, research),
            None => {
                warn!(chars = raw.len(), "model output is not a JSON object, building report from research");
                fallback_report(research)
            }
        };

        info!(title = %report.title, sections = report.sections.len(), "analysis complete");
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

pub fn build_prompt(research: &ResearchRecord) -> String {
    format!(
        "{query}\n\
         Summary: {summary}\n\
         Bulleted points:\n{key_points}\n\n\
         Create structured report JSON with keys \"title\", \"summary\", and \"sections\" \
         (a list of objects with \"heading\" and \"content\").\n\
         IMPORTANT: Return ONLY valid JSON. Do not include markdown formatting.",
        query = research.query,
        summary = research.summary,
        key_points = research.key_points,
    )
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse model output into a JSON object, tolerating code fences and
/// surrounding prose.
pub fn parse_report_object(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(raw);
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(cleaned.trim()) {
        return Some(object);
    }
    debug!("direct parse failed, trying object recovery");
    recover_json_object(raw)
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Recovery step: parse the span from the first `{` to the last `}`.
pub fn recover_json_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Coerce a parsed object into a report, repairing missing or malformed
/// fields from the research record.
pub fn normalize_report(object: Map<String, Value>, research: &ResearchRecord) -> StructuredReport {
    let title = non_blank_str(object.get("title"))
        .map(str::to_string)
        .unwrap_or_else(|| default_title(research));

    let summary = match object.get("summary") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => research.summary.clone(),
        Some(other) => other.to_string(),
    };

    let mut sections = match object.get("sections") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| section_from_value(i, item))
            .collect(),
        Some(other) => {
            debug!(kind = value_kind(other), "sections is not a list, discarding");
            Vec::new()
        }
        None => Vec::new(),
    };

    if sections.is_empty() {
        debug!("no usable sections, injecting key points");
        sections.push(key_points_section(research));
    }

    StructuredReport {
        title,
        summary,
        sections,
    }
}

fn section_from_value(index: usize, item: &Value) -> Option<ReportSection> {
    match item {
        Value::Object(fields) => {
            let content = match fields.get("content") {
                Some(Value::String(text)) => SectionContent::Text(text.clone()),
                Some(Value::Array(items)) => {
                    SectionContent::Lines(items.iter().map(value_text).collect())
                }
                Some(Value::Null) | None => SectionContent::Text(String::new()),
                Some(other) => SectionContent::Text(other.to_string()),
            };
            let heading = match non_blank_str(fields.get("heading")) {
                Some(heading) => heading.to_string(),
                // Neither heading nor content: nothing to render.
                None if content.is_blank() => return None,
                None => numbered_heading(index),
            };
            Some(ReportSection { heading, content })
        }
        Value::String(text) if !text.trim().is_empty() => {
            Some(ReportSection::new(numbered_heading(index), text.as_str()))
        }
        _ => None,
    }
}

fn numbered_heading(index: usize) -> String {
    format!("{DEFAULT_HEADING} {}", index + 1)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Report built from the research record alone.
pub fn fallback_report(research: &ResearchRecord) -> StructuredReport {
    let summary = if research.summary.trim().is_empty() {
        research.excerpts.first().cloned().unwrap_or_default()
    } else {
        research.summary.clone()
    };

    StructuredReport {
        title: default_title(research),
        summary,
        sections: vec![key_points_section(research)],
    }
}

fn default_title(research: &ResearchRecord) -> String {
    let query = research.query.trim();
    if query.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        query.to_string()
    }
}

fn key_points_section(research: &ResearchRecord) -> ReportSection {
    if research.key_points.trim().is_empty() {
        ReportSection::new("Findings", "No key points extracted.")
    } else {
        ReportSection::new("Key Points", research.key_points.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::generator::TextGenerator;
    use dossier_shared::SearchHit;

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, _prompt: &str, _temperature: f32, _max_tokens: u32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn record() -> ResearchRecord {
        ResearchRecord {
            query: "Coastal erosion".into(),
            hits: vec![SearchHit::new("t", "", "Shorelines retreat.")],
            excerpts: vec!["Shorelines retreat.".into()],
            summary: "- Shorelines retreat.".into(),
            key_points: "- Shorelines retreat.\n- Storms intensify.".into(),
        }
    }

    fn analyst(output: &'static str) -> Analyst {
        Analyst::new(Arc::new(CapabilityProvider::with_live(Box::new(CannedGenerator(output)))))
    }

    #[tokio::test]
    async fn garbage_output_falls_back_to_research() {
        let report = analyst("I cannot help with that.").analyze(&record()).await.unwrap();
        assert_eq!(report.title, "Coastal erosion");
        assert_eq!(report.summary, "- Shorelines retreat.");
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].heading, "Key Points");
    }

    #[tokio::test]
    async fn fenced_json_is_parsed() {
        let output = "```json\n{\"title\": \"Erosion Report\", \"summary\": \"S\", \
                      \"sections\": [{\"heading\": \"Causes\", \"content\": [\"wind\", \"waves\"]}]}\n```";
        let report = analyst(output).analyze(&record()).await.unwrap();
        assert_eq!(report.title, "Erosion Report");
        assert_eq!(report.summary, "S");
        assert_eq!(report.sections[0].heading, "Causes");
        assert_eq!(
            report.sections[0].content,
            SectionContent::Lines(vec!["wind".into(), "waves".into()])
        );
    }

    #[tokio::test]
    async fn json_inside_prose_is_recovered() {
        let output = "Sure! Here it is: {\"title\": \"T\", \"sections\": [{\"heading\": \"H\", \"content\": \"c\"}]} Hope that helps.";
        let report = analyst(output).analyze(&record()).await.unwrap();
        assert_eq!(report.title, "T");
        assert_eq!(report.sections[0].content, SectionContent::Text("c".into()));
    }

    #[tokio::test]
    async fn heuristic_provider_yields_key_points_report() {
        let analyst = Analyst::new(Arc::new(CapabilityProvider::heuristic()));
        let report = analyst.analyze(&record()).await.unwrap();
        assert_eq!(report.title, "Coastal erosion");
        assert!(report.sections.iter().any(|s| s.heading == "Key Points"));
    }

    #[test]
    fn missing_sections_inject_key_points() {
        let object = parse_report_object("{\"title\": \"Only title\"}").unwrap();
        let report = normalize_report(object, &record());
        assert_eq!(report.title, "Only title");
        assert_eq!(report.summary, "- Shorelines retreat.");
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].heading, "Key Points");
    }

    #[test]
    fn malformed_fields_are_coerced() {
        let object = parse_report_object(
            r#"{"title": 42, "summary": ["a"], "sections": [
                {"content": {"nested": true}},
                "bare string section",
                7,
                {"heading": "Numbers", "content": [1, "two"]}
            ]}"#,
        )
        .unwrap();
        let report = normalize_report(object, &record());

        assert_eq!(report.title, "Coastal erosion");
        assert_eq!(report.summary, "[\"a\"]");
        assert_eq!(report.sections.len(), 3);
        assert_eq!(report.sections[0].heading, "Section 1");
        assert_eq!(report.sections[0].content, SectionContent::Text("{\"nested\":true}".into()));
        assert_eq!(report.sections[1].heading, "Section 2");
        assert_eq!(
            report.sections[2].content,
            SectionContent::Lines(vec!["1".into(), "two".into()])
        );
    }

    #[test]
    fn headingless_blank_sections_are_dropped() {
        let object = parse_report_object(
            r#"{"title": "T", "sections": [
                {"content": "   "},
                {"heading": "", "content": ["", " "]},
                {}
            ]}"#,
        )
        .unwrap();
        let report = normalize_report(object, &record());
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].heading, "Key Points");

        let object =
            parse_report_object(r#"{"sections": [{"heading": "Kept", "content": ""}]}"#).unwrap();
        let report = normalize_report(object, &record());
        assert_eq!(report.sections[0].heading, "Kept");
    }

    #[test]
    fn empty_sections_list_is_repaired() {
        let object = parse_report_object("{\"sections\": []}").unwrap();
        let report = normalize_report(object, &record());
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(parse_report_object("[1, 2, 3]").is_none());
        assert!(parse_report_object("\"just a string\"").is_none());
        assert!(recover_json_object("} backwards {").is_none());
    }

    #[test]
    fn fallback_without_key_points_uses_findings() {
        let research = ResearchRecord {
            query: "   ".into(),
            excerpts: vec!["First excerpt.".into()],
            ..Default::default()
        };
        let report = fallback_report(&research);
        assert_eq!(report.title, "Research Report");
        assert_eq!(report.summary, "First excerpt.");
        assert_eq!(report.sections[0].heading, "Findings");
        assert_eq!(
            report.sections[0].content,
            SectionContent::Text("No key points extracted.".into())
        );
    }

    #[test]
    fn prompt_carries_research_and_json_instruction() {
        let prompt = build_prompt(&record());
        assert!(prompt.starts_with("Coastal erosion\n"));
        assert!(prompt.contains("Summary: - Shorelines retreat."));
        assert!(prompt.contains("- Storms intensify."));
        assert!(prompt.contains("Create structured report JSON"));
        assert!(prompt.contains("Return ONLY valid JSON"));
    }
}
