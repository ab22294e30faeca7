//! Local boundary detection: find tab separators in HTML without any network.
//!
//! Word processors turn bookmarks into empty anchors, so a document whose
//! tabs start with a bookmarked one-line paragraph converts to
//! `<p><a id="x"></a>Title</p>`. That shape is the primary signal. Documents
//! without bookmarks often still use file-like separators (`system-prompt`,
//! `00_intro`), which the second strategy picks up.
//!
//! Strategies are tried in [`LocalStrategy::ORDER`]; the first one that yields
//! at least one accepted separator wins. Remote detection is the pipeline's
//! last layer and lives in [`crate::pipeline::structure`].

use crate::config::SeparatorRules;
use crate::model::SectionBoundary;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One local scanning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStrategy {
    /// `<p><a id="…"></a>Title</p>`: bookmark-anchored paragraphs.
    AnchoredParagraph,
    /// `<p>kebab-or_snake-token</p>`, optionally numeric-prefixed.
    TokenParagraph,
}

impl LocalStrategy {
    /// Priority order.
    pub const ORDER: [LocalStrategy; 2] = [
        LocalStrategy::AnchoredParagraph,
        LocalStrategy::TokenParagraph,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            LocalStrategy::AnchoredParagraph => &RE_ANCHORED_PARAGRAPH,
            LocalStrategy::TokenParagraph => &RE_TOKEN_PARAGRAPH,
        }
    }
}

// Quoted, single-quoted or bare `id` values.
static RE_ANCHORED_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<p[^>]*><a\s+id=(?:"[^"]+"|'[^']+'|[^\s>"']+)\s*></a>([^<]+)</p>"#).unwrap()
});

static RE_TOKEN_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<p[^>]*>(?:<a[^>]*></a>)?([\d_-]*[a-z]\w*(?:[-_]\w+)+)\s*</p>").unwrap()
});

static RE_LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•]\s").unwrap());

/// A separator found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Byte offset of the enclosing `<p` tag.
    pub offset: usize,
}

/// Detect section boundaries in `markup`.
///
/// Returns boundaries sorted by offset, each with an `html_range` that runs
/// to the next boundary (or the end of the markup), or an empty list.
/// Never fails: a document without separators is a valid outcome.
pub fn detect_local(markup: &str, rules: &SeparatorRules) -> Vec<SectionBoundary> {
    for strategy in LocalStrategy::ORDER {
        let candidates = scan(strategy, markup, rules);
        debug!(
            "Local detection {:?}: {} candidates",
            strategy,
            candidates.len()
        );
        if !candidates.is_empty() {
            return into_boundaries(candidates, markup.len());
        }
    }
    Vec::new()
}

/// Run a single strategy and return the accepted candidates, sorted.
pub fn scan(strategy: LocalStrategy, markup: &str, rules: &SeparatorRules) -> Vec<Candidate> {
    let mut found: Vec<Candidate> = strategy
        .regex()
        .captures_iter(markup)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = decode_entities(caps.get(1)?.as_str()).trim().to_string();
            is_likely_separator(&title, rules).then(|| Candidate {
                title,
                offset: whole.start(),
            })
        })
        .collect();
    found.sort_by_key(|c| c.offset);
    found
}

/// Whether a paragraph's text looks like a tab separator rather than content.
pub fn is_likely_separator(text: &str, rules: &SeparatorRules) -> bool {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < rules.min_len || len > rules.max_len {
        return false;
    }
    if trimmed.ends_with('.') || trimmed.contains(". ") {
        return false;
    }
    if RE_LIST_MARKER.is_match(trimmed) {
        return false;
    }
    !trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Turn sorted candidates into boundaries with contiguous ranges.
fn into_boundaries(candidates: Vec<Candidate>, doc_len: usize) -> Vec<SectionBoundary> {
    let ends: Vec<usize> = candidates
        .iter()
        .skip(1)
        .map(|c| c.offset)
        .chain(std::iter::once(doc_len))
        .collect();

    candidates
        .into_iter()
        .zip(ends)
        .enumerate()
        .map(|(i, (candidate, end))| {
            // HTML has no pages; the position doubles as a pseudo page.
            SectionBoundary::new(i + 1, candidate.title, i + 1, i + 1)
                .with_html_range(candidate.offset, end)
        })
        .collect()
}

/// Decode HTML entities in element text, folding non-breaking spaces into
/// plain ones.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).replace('\u{a0}', " ")
}
