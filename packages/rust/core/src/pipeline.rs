//! End-to-end pipeline: topic → research → analysis → write → artifacts.
//!
//! The driver runs the three stages strictly in order, once each. A stage
//! that returns `Err` does not abort the run: the driver records the error,
//! substitutes a minimal valid value for that stage's output, and moves on.
//! Only two outcomes are reported as failures: a blank topic (rejected
//! before any external call) and a run that wrote no files at all.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use dossier_artifacts::{WriteConfig, WriteOutcome};
use dossier_search::SearchProvider;
use dossier_shared::{
    AppConfig, DossierError, OutputArtifacts, PipelineOutcome, PipelineState, ResearchRecord, Result,
    StructuredReport,
};

use crate::analysis::{AnalysisStage, Analyst};
use crate::generator::CapabilityProvider;
use crate::keypoints::LlmKeyPointExtractor;
use crate::research::{ResearchStage, Researcher};

/// Error reported for a blank topic.
pub const EMPTY_TOPIC_ERROR: &str = "topic must not be empty";

/// Error reported when neither artifact was written.
pub const NO_OUTPUT_ERROR: &str = "no output";

// ---------------------------------------------------------------------------
// Stages and progress
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Research,
    Analysis,
    Write,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Research, Stage::Analysis, Stage::Write];

    pub fn label(self) -> &'static str {
        match self {
            Self::Research => "Researching topic",
            Self::Analysis => "Analyzing findings",
            Self::Write => "Writing report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage has produced its output (possibly a placeholder).
    fn stage_finished(&self, stage: Stage);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage) {}
}

/// The write step as seen by the driver.
pub trait WriteStage: Send + Sync {
    fn write(&self, report: &StructuredReport) -> Result<WriteOutcome>;
}

impl WriteStage for WriteConfig {
    fn write(&self, report: &StructuredReport) -> Result<WriteOutcome> {
        dossier_artifacts::write_report(report, self)
    }
}

/// The trimmed topic, or a validation error when nothing is left.
pub fn validate_topic(topic: &str) -> Result<&str> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(DossierError::validation(EMPTY_TOPIC_ERROR));
    }
    Ok(topic)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The assembled pipeline. Build once per process and reuse across runs;
/// concurrent runs share nothing but the output directory.
pub struct Pipeline {
    research: Box<dyn ResearchStage>,
    analysis: Box<dyn AnalysisStage>,
    writer: Box<dyn WriteStage>,
}

impl Pipeline {
    pub fn new(
        research: Box<dyn ResearchStage>,
        analysis: Box<dyn AnalysisStage>,
        writer: Box<dyn WriteStage>,
    ) -> Self {
        Self {
            research,
            analysis,
            writer,
        }
    }

    /// Standard pipeline from configuration: live tiers wherever credentials
    /// are present, heuristic and synthetic tiers everywhere else.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = Arc::new(CapabilityProvider::from_config(
            &config.generation,
            config.generation_api_key(),
        ));
        let search = SearchProvider::from_config(&config.search, config.search_api_key())?;

        info!(
            live_generation = provider.is_live(),
            search_tiers = ?search.tier_names(),
            output_dir = %config.defaults.output_dir,
            "pipeline assembled"
        );

        Ok(Self::with_provider(
            provider,
            search,
            PathBuf::from(&config.defaults.output_dir),
        ))
    }

    /// Pipeline that makes no network calls at all.
    pub fn offline(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_provider(
            Arc::new(CapabilityProvider::heuristic()),
            SearchProvider::offline(),
            output_dir.into(),
        )
    }

    fn with_provider(
        provider: Arc<CapabilityProvider>,
        search: SearchProvider,
        output_dir: PathBuf,
    ) -> Self {
        let extractor = Arc::new(LlmKeyPointExtractor::new(Arc::clone(&provider)));
        Self::new(
            Box::new(Researcher::new(search, extractor)),
            Box::new(Analyst::new(provider)),
            Box::new(WriteConfig::new(output_dir)),
        )
    }

    /// Run the pipeline for `topic`, returning only the outcome.
    pub async fn run(&self, topic: &str, max_results: usize) -> PipelineOutcome {
        self.run_with_state(topic, max_results, &SilentProgress)
            .await
            .0
    }

    /// Run the pipeline and also return the final state, including the
    /// diagnostic messages.
    pub async fn run_with_state(
        &self,
        topic: &str,
        max_results: usize,
        progress: &dyn ProgressReporter,
    ) -> (PipelineOutcome, PipelineState) {
        let mut state = PipelineState::new(topic.trim(), max_results.max(1));

        if let Err(e) = validate_topic(topic) {
            warn!(error = %e, "rejecting topic");
            state.note(format!("error: {e}"));
            return (PipelineOutcome::failed(EMPTY_TOPIC_ERROR), state);
        }

        let outcome = self.drive(&mut state, progress).await;
        (outcome, state)
    }

    #[instrument(skip_all, fields(run_id = %state.run_id, topic = %state.topic))]
    async fn drive(
        &self,
        state: &mut PipelineState,
        progress: &dyn ProgressReporter,
    ) -> PipelineOutcome {
        let start = Instant::now();
        info!(max_results = state.max_results, "starting pipeline");
        state.note(format!(
            "start: topic={:?} max_results={}",
            state.topic, state.max_results
        ));

        // --- Research ---
        progress.stage_started(Stage::Research);
        let record = match self.research.research(&state.topic, state.max_results).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "research stage failed, continuing with empty record");
                state.note(format!("{}: {e}", Stage::Research));
                ResearchRecord::empty(state.topic.clone())
            }
        };
        if record.excerpts.is_empty() {
            state.note(format!("{}: no excerpts gathered", Stage::Research));
        }
        let research = state.research.insert(record);
        progress.stage_finished(Stage::Research);

        // --- Analysis ---
        progress.stage_started(Stage::Analysis);
        let report = match self.analysis.analyze(research).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "analysis stage failed, continuing with placeholder report");
                state.note(format!("{}: {e}", Stage::Analysis));
                StructuredReport::placeholder(state.topic.clone())
            }
        };
        let report = state.structured.insert(report);
        progress.stage_finished(Stage::Analysis);

        // --- Write ---
        progress.stage_started(Stage::Write);
        let artifacts = match self.writer.write(report) {
            Ok(WriteOutcome { artifacts, notes }) => {
                for note in notes {
                    state.note(format!("{}: {note}", Stage::Write));
                }
                artifacts
            }
            Err(e) => {
                warn!(error = %e, "write stage failed");
                state.note(format!("{}: {e}", Stage::Write));
                OutputArtifacts::default()
            }
        };
        state.output_paths = Some(artifacts.clone());
        progress.stage_finished(Stage::Write);

        let outcome = if artifacts.is_empty() {
            state.note(format!("error: {NO_OUTPUT_ERROR}"));
            PipelineOutcome::failed(NO_OUTPUT_ERROR)
        } else {
            PipelineOutcome::Completed(artifacts)
        };

        info!(
            completed = outcome.is_completed(),
            elapsed_ms = start.elapsed().as_millis(),
            "pipeline finished"
        );
        outcome
    }
}
