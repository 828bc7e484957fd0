//! Core pipeline orchestration and domain logic for dossier.
//!
//! This crate ties together text generation, search, key-point extraction,
//! report analysis, and rendering into one end-to-end run ([`Pipeline`]).

pub mod analysis;
pub mod generator;
pub mod keypoints;
pub mod pipeline;
pub mod research;

pub use analysis::{AnalysisStage, Analyst};
pub use generator::{CapabilityProvider, HeuristicGenerator, LiveGenerator, TextGenerator};
pub use keypoints::{KeyPointExtractor, LlmKeyPointExtractor};
pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, Stage, WriteStage};
pub use research::{ResearchStage, Researcher};
