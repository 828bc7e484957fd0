//! Rich DOCX tier via `docx-rs`.

use std::fs::File;
use std::path::Path;

use docx_rs::{Docx, Paragraph, Run};

use dossier_shared::{DossierError, Result, StructuredReport};

// Sizes are in half-points.
const TITLE_SIZE: usize = 40;
const HEADING_SIZE: usize = 28;
const BODY_SIZE: usize = 22;

pub(crate) fn render_docx(report: &StructuredReport, path: &Path) -> Result<()> {
    let mut doc = Docx::new().add_paragraph(bold_paragraph(&report.title, TITLE_SIZE));

    if !report.summary.trim().is_empty() {
        doc = doc.add_paragraph(body_paragraph(&report.summary));
    }

    for section in &report.sections {
        doc = doc.add_paragraph(bold_paragraph(&section.heading, HEADING_SIZE));
        for line in section.content.lines() {
            doc = doc.add_paragraph(body_paragraph(line));
        }
    }

    let file = File::create(path).map_err(|e| DossierError::io(path, e))?;
    doc.build()
        .pack(file)
        .map_err(|e| DossierError::Render(format!("docx packaging failed: {e}")))
}

fn bold_paragraph(text: &str, size: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(size))
}

fn body_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).size(BODY_SIZE))
}
