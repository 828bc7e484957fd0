//! Pipeline data model: search hits, research records, structured reports,
//! output artifacts, and the per-run pipeline state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// One ranked search result. Immutable once produced by a search tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    /// May be empty (synthetic hits, scraped results without a link).
    #[serde(default)]
    pub link: String,
    /// May be empty (the HTML tier does not always find one).
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }
}

/// Output of the research stage.
///
/// `excerpts` holds the non-empty snippets of `hits`, in hit order, so
/// `excerpts.len() <= hits.len()` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub excerpts: Vec<String>,
    pub summary: String,
    pub key_points: String,
}

impl ResearchRecord {
    /// An empty record for `query` (blank topic, or a research stage that failed).
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Structured report
// ---------------------------------------------------------------------------

/// Section body: either one block of text or an ordered list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Text(String),
    Lines(Vec<String>),
}

impl SectionContent {
    /// Content as display lines. A text block is split on newlines.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => text.lines().collect(),
            Self::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    /// Content as paragraphs: the whole text block, or one entry per line.
    pub fn paragraphs(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => vec![text.as_str()],
            Self::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Lines(lines) => lines.iter().all(|l| l.trim().is_empty()),
        }
    }
}

impl From<&str> for SectionContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SectionContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for SectionContent {
    fn from(value: Vec<String>) -> Self {
        Self::Lines(value)
    }
}

/// A heading plus its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub content: SectionContent,
}

impl ReportSection {
    pub fn new(heading: impl Into<String>, content: impl Into<SectionContent>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}

/// The normalized report handed from analysis to the write stage.
///
/// `sections` is never empty once analysis has returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
}

impl StructuredReport {
    /// Smallest valid report: the given title and a single placeholder section.
    pub fn placeholder(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            title: if title.trim().is_empty() {
                "Untitled Report".into()
            } else {
                title
            },
            summary: String::new(),
            sections: vec![ReportSection::new("Empty", "No content available.")],
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Files actually written by the write stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docx: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PathBuf>,
}

impl OutputArtifacts {
    /// True when neither artifact was written.
    pub fn is_empty(&self) -> bool {
        self.docx.is_none() && self.pdf.is_none()
    }
}

/// What a pipeline run returns to its caller.
///
/// Serializes to `{"docx": ..., "pdf": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineOutcome {
    // Listed first so `{"error": ..}` is not swallowed by the all-optional variant.
    Failed { error: String },
    Completed(OutputArtifacts),
}

impl PipelineOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn artifacts(&self) -> Option<&OutputArtifacts> {
        match self {
            Self::Completed(artifacts) => Some(artifacts),
            Self::Failed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The single mutable record threaded through the stages of one run.
///
/// Created by the driver and passed by `&mut` to whichever stage is running,
/// so it has exactly one mutator at any time.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: RunId,
    pub topic: String,
    pub max_results: usize,
    pub research: Option<ResearchRecord>,
    pub structured: Option<StructuredReport>,
    pub output_paths: Option<OutputArtifacts>,
    /// Append-only diagnostics for the final caller. Stages never read it.
    pub messages: Vec<String>,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>, max_results: usize) -> Self {
        Self {
            run_id: RunId::new(),
            topic: topic.into(),
            max_results,
            research: None,
            structured: None,
            output_paths: None,
            messages: Vec::new(),
        }
    }

    /// Append a diagnostic message.
    pub fn note(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn section_content_accepts_both_shapes() {
        let json = r#"[
            {"heading": "Intro", "content": "one\ntwo"},
            {"heading": "Points", "content": ["a", "b", "c"]}
        ]"#;
        let sections: Vec<ReportSection> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(sections[0].content.lines(), vec!["one", "two"]);
        assert_eq!(sections[0].content.paragraphs(), vec!["one\ntwo"]);
        assert_eq!(sections[1].content.lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn blank_content_detection() {
        assert!(SectionContent::from("  ").is_blank());
        assert!(SectionContent::Lines(vec![" ".into(), String::new()]).is_blank());
        assert!(!SectionContent::from("x").is_blank());
    }

    #[test]
    fn placeholder_report_has_a_section() {
        let report = StructuredReport::placeholder("");
        assert_eq!(report.title, "Untitled Report");
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn outcome_serializes_to_caller_shapes() {
        let ok = PipelineOutcome::Completed(OutputArtifacts {
            docx: Some(PathBuf::from("outputs/a.docx")),
            pdf: None,
        });
        let json = serde_json::to_string(&ok).expect("serialize");
        assert_eq!(json, r#"{"docx":"outputs/a.docx"}"#);

        let err = PipelineOutcome::failed("no output");
        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, r#"{"error":"no output"}"#);
    }

    #[test]
    fn state_messages_append_in_order() {
        let mut state = PipelineState::new("topic", 3);
        state.note("first");
        state.note("second");
        assert_eq!(state.messages, vec!["first", "second"]);
        assert!(state.research.is_none());
    }
}
