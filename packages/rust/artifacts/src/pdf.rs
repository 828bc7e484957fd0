//! Rich PDF tier via `printpdf`.
//!
//! Layout is computed first in points (origin bottom-left, US Letter) as a
//! list of pages of placed lines, then drawn with the built-in Helvetica
//! faces. Pagination happens whenever the cursor drops below the bottom
//! margin.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::{BuiltinFont, Mm, PdfDocument};

use dossier_shared::{DossierError, Result, StructuredReport};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const LEFT_MARGIN: f32 = 50.0;
const TOP_START: f32 = PAGE_HEIGHT - 50.0;
const BOTTOM_MARGIN: f32 = 60.0;

/// Characters per wrapped line; Helvetica 10 at ~5 pt average width.
const WRAP_COLUMNS: usize = 95;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Style {
    Title,
    Summary,
    Heading,
    Body,
}

impl Style {
    fn size(self) -> f32 {
        match self {
            Self::Title => 16.0,
            Self::Summary => 11.0,
            Self::Heading => 12.0,
            Self::Body => 10.0,
        }
    }

    /// Distance the cursor moves after a line in this style.
    fn leading(self) -> f32 {
        match self {
            Self::Title => 30.0,
            Self::Summary => 14.0,
            Self::Heading => 18.0,
            Self::Body => 12.0,
        }
    }

    fn bold(self) -> bool {
        matches!(self, Self::Title | Self::Heading)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    style: Style,
    y: f32,
}

type Page = Vec<PlacedLine>;

struct Layout {
    pages: Vec<Page>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: TOP_START,
        }
    }

    fn place(&mut self, text: &str, style: Style) {
        if self.y < BOTTOM_MARGIN {
            self.pages.push(Vec::new());
            self.y = TOP_START;
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine {
                text: text.to_string(),
                style,
                y: self.y,
            });
        }
        self.y -= style.leading();
    }

    fn place_wrapped(&mut self, text: &str, style: Style) {
        for line in wrap(text, WRAP_COLUMNS) {
            self.place(&line, style);
        }
    }

    fn gap(&mut self, points: f32) {
        self.y -= points;
    }
}

fn layout(report: &StructuredReport) -> Vec<Page> {
    let mut layout = Layout::new();
    layout.place(&report.title, Style::Title);

    for line in report.summary.lines() {
        layout.place_wrapped(line, Style::Summary);
    }
    layout.gap(10.0);

    for section in &report.sections {
        layout.place(&section.heading, Style::Heading);
        for line in section.content.lines() {
            layout.place_wrapped(line, Style::Body);
        }
    }

    layout.pages
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn pt(value: f32) -> Mm {
    Mm(value * 25.4 / 72.0)
}

pub(crate) fn render_pdf(report: &StructuredReport, path: &Path) -> Result<()> {
    let render_err = |e: printpdf::Error| DossierError::Render(format!("pdf render failed: {e}"));

    let (doc, first_page, first_layer) =
        PdfDocument::new(report.title.as_str(), pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_err)?;

    for (i, page) in layout(report).iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_idx, layer_idx) =
                doc.add_page(pt(PAGE_WIDTH), pt(PAGE_HEIGHT), format!("Page {}", i + 1));
            doc.get_page(page_idx).get_layer(layer_idx)
        };

        for line in page {
            let font = if line.style.bold() { &bold } else { &regular };
            layer.use_text(
                line.text.as_str(),
                line.style.size(),
                pt(LEFT_MARGIN),
                pt(line.y),
                font,
            );
        }
    }

    let file = File::create(path).map_err(|e| DossierError::io(path, e))?;
    doc.save(&mut BufWriter::new(file)).map_err(render_err)
}
