//! Core data model: the document being split and the section boundaries
//! found inside it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// MIME type of a PDF upload.
pub const PDF_MIME: &str = "application/pdf";

/// A normalised document, ready for detection.
///
/// Word-processor documents arrive as HTML (see
/// [`crate::pipeline::input::normalize`]); PDFs stay opaque binary blobs that
/// only the LLM can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    /// An opaque PDF, forwarded inline to the LLM.
    Pdf { bytes: Vec<u8>, mime_type: String },
    /// HTML markup produced from a DOCX (or supplied directly).
    Html { markup: String },
}

impl DocumentInput {
    /// Wrap PDF bytes.
    pub fn pdf(bytes: impl Into<Vec<u8>>) -> Self {
        DocumentInput::Pdf {
            bytes: bytes.into(),
            mime_type: PDF_MIME.to_string(),
        }
    }

    /// Wrap HTML markup.
    pub fn html(markup: impl Into<String>) -> Self {
        DocumentInput::Html {
            markup: markup.into(),
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, DocumentInput::Html { .. })
    }

    /// The markup when this is an HTML document.
    pub fn markup(&self) -> Option<&str> {
        match self {
            DocumentInput::Html { markup } => Some(markup),
            DocumentInput::Pdf { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentInput::Pdf { .. } => "pdf",
            DocumentInput::Html { .. } => "html",
        }
    }
}

/// Half-open byte range `[start, end)` into the HTML markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlRange {
    pub start: usize,
    pub end: usize,
}

impl HtmlRange {
    /// Slice `markup` to this range, clamped to the markup length.
    pub fn slice<'a>(&self, markup: &'a str) -> &'a str {
        let end = self.end.min(markup.len());
        let start = self.start.min(end);
        markup.get(start..end).unwrap_or("")
    }
}

/// One detected tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBoundary {
    /// 1-based position in document order.
    pub ordinal: usize,
    pub title: String,
    pub suggested_file_name: String,
    pub page_start: usize,
    pub page_end: usize,
    /// Known only when the boundary's position in the HTML source was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_range: Option<HtmlRange>,
}

impl SectionBoundary {
    /// Build a boundary whose file name is derived from `title`.
    pub fn new(ordinal: usize, title: impl Into<String>, page_start: usize, page_end: usize) -> Self {
        let title = title.into();
        let suggested_file_name = file_name_for(&title, ordinal);
        Self {
            ordinal,
            title,
            suggested_file_name,
            page_start,
            page_end,
            html_range: None,
        }
    }

    pub fn with_html_range(mut self, start: usize, end: usize) -> Self {
        self.html_range = Some(HtmlRange { start, end });
        self
    }
}

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derive a file name from a section title.
///
/// Lowercase, every run of non `[a-z0-9]` characters collapsed to one hyphen,
/// leading/trailing hyphens trimmed, `.md` appended. Titles with nothing
/// left after that (e.g. only CJK or punctuation) become `section-<ordinal>.md`.
pub fn file_name_for(title: &str, ordinal: usize) -> String {
    let lowered = title.to_lowercase();
    let slug = RE_NON_ALNUM.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("section-{ordinal}.md")
    } else {
        format!("{slug}.md")
    }
}

/// Recompute `page_end` from the sorted starts.
///
/// Boundary *i* ends one page before boundary *i+1* starts; the last one ends
/// at `total_pages`. Ends never precede their own start.
pub fn recompute_page_ends(boundaries: &mut [SectionBoundary], total_pages: usize) {
    let starts: Vec<usize> = boundaries.iter().map(|b| b.page_start).collect();
    for (i, boundary) in boundaries.iter_mut().enumerate() {
        let end = match starts.get(i + 1) {
            Some(next) => next.saturating_sub(1),
            None => total_pages,
        };
        boundary.page_end = end.max(boundary.page_start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(name: &str) -> bool {
        let stem = name.strip_suffix(".md").unwrap_or("");
        !stem.is_empty()
            && !stem.starts_with('-')
            && !stem.ends_with('-')
            && stem
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn file_name_basic() {
        assert_eq!(file_name_for("Getting Started", 1), "getting-started.md");
        assert_eq!(file_name_for("Setup Guide", 2), "setup-guide.md");
        assert_eq!(file_name_for("_nav-guide", 1), "nav-guide.md");
        assert_eq!(file_name_for("00-intro", 1), "00-intro.md");
        assert_eq!(file_name_for("system_prompt", 1), "system-prompt.md");
    }

    #[test]
    fn file_name_collapses_runs_and_trims() {
        assert_eq!(file_name_for("  Q&A -- Part #2!  ", 4), "q-a-part-2.md");
        assert_eq!(file_name_for("Ünïcode Tïtle", 1), "n-code-t-tle.md");
    }

    #[test]
    fn file_name_empty_stem_falls_back_to_ordinal() {
        assert_eq!(file_name_for("日本語", 3), "section-3.md");
        assert_eq!(file_name_for("---", 7), "section-7.md");
    }

    #[test]
    fn file_names_are_always_safe() {
        for title in [
            "Overview",
            "Chapter 1: The Start",
            "../../etc/passwd",
            "a/b\\c",
            "__init__",
            "Tab 3 (draft)",
            "x",
        ] {
            let name = file_name_for(title, 1);
            assert!(is_safe(&name), "{title:?} -> {name:?}");
        }
    }

    #[test]
    fn recompute_page_ends_from_starts() {
        let mut b = vec![
            SectionBoundary::new(1, "A", 1, 99),
            SectionBoundary::new(2, "B", 4, 2),
            SectionBoundary::new(3, "C", 9, 9),
        ];
        recompute_page_ends(&mut b, 12);
        assert_eq!(
            b.iter().map(|s| (s.page_start, s.page_end)).collect::<Vec<_>>(),
            vec![(1, 3), (4, 8), (9, 12)]
        );
    }

    #[test]
    fn recompute_page_ends_never_inverts() {
        let mut b = vec![
            SectionBoundary::new(1, "A", 3, 3),
            SectionBoundary::new(2, "B", 3, 3),
        ];
        recompute_page_ends(&mut b, 2);
        assert_eq!(b[0].page_end, 3);
        assert_eq!(b[1].page_end, 3);
    }

    #[test]
    fn html_range_slice_is_clamped() {
        let r = HtmlRange { start: 2, end: 100 };
        assert_eq!(r.slice("abcdef"), "cdef");
        let r = HtmlRange { start: 9, end: 4 };
        assert_eq!(r.slice("abcdef"), "");
    }

    #[test]
    fn document_input_accessors() {
        let d = DocumentInput::html("<p>x</p>");
        assert!(d.is_html());
        assert_eq!(d.markup(), Some("<p>x</p>"));
        let p = DocumentInput::pdf(b"%PDF-1.7".to_vec());
        assert_eq!(p.kind(), "pdf");
        assert!(p.markup().is_none());
    }
}
