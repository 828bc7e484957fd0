//! Report rendering: turns a [`StructuredReport`] into a `.docx` and a `.pdf`.
//!
//! Each artifact has two tiers. The rich tier (behind the `rich` feature)
//! produces a real document; when it is unavailable or fails, the plain-text
//! tier writes the flattened report under the same path so a file still
//! exists at the expected location. An artifact whose both tiers fail is
//! left out of the returned [`OutputArtifacts`].

#[cfg(feature = "rich")]
mod docx;
#[cfg(feature = "rich")]
mod pdf;
mod plain;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use dossier_shared::{DossierError, OutputArtifacts, Result, StructuredReport};

pub use plain::render_plain_text;

/// Longest sanitized title kept in a file name.
const MAX_TITLE_CHARS: usize = 50;

/// Base name used when the title sanitizes to nothing.
const FALLBACK_BASE_NAME: &str = "report";

/// Where rendered reports go.
#[derive(Debug, Clone)]
pub struct WriteConfig {
    pub output_dir: PathBuf,
}

impl WriteConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// The two artifacts produced per report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Docx,
    Pdf,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which tier produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTier {
    Rich,
    PlainText,
}

/// Result of [`write_report`]: the files written plus degradation notes
/// (one per artifact that did not come from the rich tier).
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub artifacts: OutputArtifacts,
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// `{sanitized title}_{YYYYMMDDHHMMSS}` for the given instant.
///
/// The title keeps only alphanumerics, spaces, and hyphens, is cut to
/// 50 characters, and becomes `report` when nothing survives.
pub fn base_name(title: &str, at: DateTime<Utc>) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect();
    let safe: String = safe.trim_end().chars().take(MAX_TITLE_CHARS).collect();
    let safe = safe.trim();

    let stem = if safe.is_empty() {
        FALLBACK_BASE_NAME
    } else {
        safe
    };
    format!("{stem}_{}", at.format("%Y%m%d%H%M%S"))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Render `report` into `config.output_dir`.
///
/// Only fails when the output directory cannot be created; per-artifact
/// failures are absorbed and reported through the returned paths and notes.
pub fn write_report(report: &StructuredReport, config: &WriteConfig) -> Result<WriteOutcome> {
    write_report_at(report, config, Utc::now())
}

/// [`write_report`] with the file-name timestamp fixed to `at`.
pub fn write_report_at(
    report: &StructuredReport,
    config: &WriteConfig,
    at: DateTime<Utc>,
) -> Result<WriteOutcome> {
    write_with(report, config, at, render_rich)
}

/// Signature of a rich-tier renderer.
type RichRenderer = fn(ArtifactKind, &StructuredReport, &Path) -> Result<()>;

#[instrument(skip_all, fields(title = %report.title, dir = %config.output_dir.display()))]
fn write_with(
    report: &StructuredReport,
    config: &WriteConfig,
    at: DateTime<Utc>,
    rich: RichRenderer,
) -> Result<WriteOutcome> {
    ensure_dir(&config.output_dir)?;

    let base = base_name(&report.title, at);
    let mut outcome = WriteOutcome::default();

    for kind in [ArtifactKind::Docx, ArtifactKind::Pdf] {
        let path = config
            .output_dir
            .join(format!("{base}.{}", kind.extension()));

        match render_artifact(kind, report, &path, rich) {
            Some(RenderTier::Rich) => {}
            Some(RenderTier::PlainText) => outcome
                .notes
                .push(format!("{kind} written as plain text")),
            None => {
                outcome.notes.push(format!("{kind} could not be written"));
                continue;
            }
        }

        match kind {
            ArtifactKind::Docx => outcome.artifacts.docx = Some(path),
            ArtifactKind::Pdf => outcome.artifacts.pdf = Some(path),
        }
    }

    info!(
        docx = outcome.artifacts.docx.is_some(),
        pdf = outcome.artifacts.pdf.is_some(),
        "report written"
    );
    Ok(outcome)
}

/// Try the rich tier, then plain text. `None` means nothing was written.
fn render_artifact(
    kind: ArtifactKind,
    report: &StructuredReport,
    path: &Path,
    rich: RichRenderer,
) -> Option<RenderTier> {
    match rich(kind, report, path) {
        Ok(()) => {
            debug!(%kind, path = %path.display(), "rich render complete");
            return Some(RenderTier::Rich);
        }
        Err(e) => warn!(%kind, error = %e, "rich render unavailable, writing plain text"),
    }

    match plain::write_plain_text(report, path) {
        Ok(()) => Some(RenderTier::PlainText),
        Err(e) => {
            error!(%kind, error = %e, "plain-text render failed, omitting artifact");
            None
        }
    }
}

#[cfg(feature = "rich")]
fn render_rich(kind: ArtifactKind, report: &StructuredReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    match kind {
        ArtifactKind::Docx => docx::render_docx(report, path),
        ArtifactKind::Pdf => pdf::render_pdf(report, path),
    }
}

#[cfg(not(feature = "rich"))]
fn render_rich(_kind: ArtifactKind, _report: &StructuredReport, _path: &Path) -> Result<()> {
    Err(DossierError::Render(
        "built without the `rich` feature".into(),
    ))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| DossierError::io(dir, e))
}
