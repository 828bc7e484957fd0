//! Plain-text tier: the report flattened into paragraphs.

use std::path::Path;

use dossier_shared::{DossierError, Result, StructuredReport};

/// Title, summary, then each heading and its content, as non-empty
/// paragraphs separated by blank lines.
pub fn render_plain_text(report: &StructuredReport) -> String {
    let mut parts: Vec<&str> = vec![report.title.as_str(), report.summary.as_str()];
    for section in &report.sections {
        parts.push(section.heading.as_str());
        parts.extend(section.content.paragraphs());
    }

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write the plain-text rendering to `path`, whatever its extension.
pub(crate) fn write_plain_text(report: &StructuredReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DossierError::io(parent, e))?;
    }
    std::fs::write(path, render_plain_text(report)).map_err(|e| DossierError::io(path, e))
}
