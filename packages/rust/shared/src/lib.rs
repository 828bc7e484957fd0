//! Shared types, error model, and configuration for dossier.
//!
//! This crate is the foundation depended on by all other dossier crates.
//! It provides:
//! - [`DossierError`], the unified error type
//! - The pipeline data model ([`SearchHit`], [`ResearchRecord`],
//!   [`StructuredReport`], [`OutputArtifacts`], [`PipelineState`])
//! - Configuration ([`AppConfig`], config loading and env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GenerationConfig, SearchConfig, apply_env_overrides, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DossierError, Result};
pub use types::{
    OutputArtifacts, PipelineOutcome, PipelineState, ReportSection, ResearchRecord, RunId,
    SearchHit, SectionContent, StructuredReport,
};
