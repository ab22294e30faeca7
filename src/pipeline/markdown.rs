//! Local section rendering ("quick" mode): HTML → Markdown, then cut at the
//! section titles. No network.
//!
//! The whole document is converted once. Each boundary's title is then looked
//! up in the Markdown (as a heading, a bold line or a bare line) and the
//! document is cut at those positions. Titles are searched for through
//! [`title_forms`], the one place that knows how the converter may have
//! spelled a title.

use crate::model::SectionBoundary;
use crate::output::RenderedSection;
use crate::pipeline::postprocess::{clean_converted, escape_underscores};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Render `boundaries` from `markup`, returning `(ordinal, section)` pairs in
/// document order.
///
/// Never fails. Boundaries whose title cannot be found in the converted
/// Markdown are skipped; when none can be found the whole document becomes
/// one section under the first boundary's file name.
pub fn render_local(markup: &str, boundaries: &[SectionBoundary]) -> Vec<(usize, RenderedSection)> {
    let markdown = clean_converted(&html_to_markdown(markup));
    split_markdown(&markdown, boundaries)
}

/// Split already-cleaned Markdown at the boundary titles.
pub fn split_markdown(markdown: &str, boundaries: &[SectionBoundary]) -> Vec<(usize, RenderedSection)> {
    let Some(first) = boundaries.first() else {
        return Vec::new();
    };
    if boundaries.len() == 1 {
        return vec![(first.ordinal, whole_document(markdown, first))];
    }

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut cuts: Vec<(usize, &SectionBoundary)> = Vec::with_capacity(boundaries.len());
    for boundary in boundaries {
        match find_title(markdown, &boundary.title, &claimed) {
            Some(offset) => {
                claimed.insert(offset);
                cuts.push((offset, boundary));
            }
            None => warn!(
                "Title {:?} not found in converted Markdown; section skipped",
                boundary.title
            ),
        }
    }

    if cuts.is_empty() {
        warn!("No section titles found in converted Markdown; returning a single section");
        return vec![(first.ordinal, whole_document(markdown, first))];
    }

    cuts.sort_by_key(|&(offset, _)| offset);
    if cuts[0].0 > 0 {
        debug!("Dropping {} bytes before the first section title", cuts[0].0);
    }

    cuts.iter()
        .enumerate()
        .map(|(k, &(start, boundary))| {
            let end = cuts.get(k + 1).map_or(markdown.len(), |&(next, _)| next);
            let body = strip_title(&markdown[start..end], &boundary.title);
            let section = RenderedSection {
                file_name: boundary.suggested_file_name.clone(),
                original_title: Some(boundary.title.clone()),
                content: clean_converted(body).trim().to_string(),
            };
            (boundary.ordinal, section)
        })
        .collect()
}

fn whole_document(markdown: &str, boundary: &SectionBoundary) -> RenderedSection {
    RenderedSection {
        file_name: boundary.suggested_file_name.clone(),
        original_title: Some(boundary.title.clone()),
        content: markdown.trim().to_string(),
    }
}

// ── Title matching ───────────────────────────────────────────────────────────

/// How a section title can appear as a line of converted Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleShape {
    Heading,
    Bold,
    Bare,
}

impl TitleShape {
    const ORDER: [TitleShape; 3] = [TitleShape::Heading, TitleShape::Bold, TitleShape::Bare];

    /// Pattern matching a whole line, for locating cut points.
    fn line_pattern(self, title: &str) -> String {
        match self {
            TitleShape::Heading => format!(r"^#{{1,3}}\s*{title}\s*$"),
            TitleShape::Bold => format!(r"^\*\*{title}\*\*\s*$"),
            TitleShape::Bare => format!(r"^{title}\s*$"),
        }
    }

    /// Pattern anchored at the start of a section, for stripping the title.
    fn leading_pattern(self, title: &str) -> String {
        match self {
            TitleShape::Heading => format!(r"\A#{{1,3}}\s*{title}\s*[\r\n]*"),
            TitleShape::Bold => format!(r"\A\*\*{title}\*\*\s*[\r\n]*"),
            TitleShape::Bare => format!(r"\A{title}\s*[\r\n]*"),
        }
    }
}

/// Regex-escaped spellings of `title` the converter may have produced:
/// as written, and with underscores escaped.
pub fn title_forms(title: &str) -> Vec<String> {
    let title = title.trim();
    let plain = regex::escape(title);
    let escaped = regex::escape(&escape_underscores(title));
    if plain == escaped {
        vec![plain]
    } else {
        vec![plain, escaped]
    }
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .ok()
}

/// Start offset of the first unclaimed line holding `title`.
fn find_title(markdown: &str, title: &str, claimed: &HashSet<usize>) -> Option<usize> {
    if title.trim().is_empty() {
        return None;
    }
    let forms = title_forms(title);
    TitleShape::ORDER.iter().find_map(|shape| {
        forms.iter().find_map(|form| {
            let re = case_insensitive(&shape.line_pattern(form))?;
            let offset = re
                .find_iter(markdown)
                .map(|m| m.start())
                .find(|offset| !claimed.contains(offset));
            offset
        })
    })
}

/// Remove the title line from the start of `section`, if present.
fn strip_title<'a>(section: &'a str, title: &str) -> &'a str {
    let forms = title_forms(title);
    for shape in TitleShape::ORDER {
        for form in &forms {
            let Some(re) = case_insensitive(&shape.leading_pattern(form)) else {
                continue;
            };
            if let Some(m) = re.find(section) {
                return &section[m.end()..];
            }
        }
    }
    section
}

// ── HTML → Markdown ──────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_LINE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([-+>#])").unwrap());
static RE_LINE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\d+)\.(\s)").unwrap());
static SEL_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

/// Convert HTML to Markdown.
///
/// ATX headings, fenced code blocks, `-` bullets and `**`/`*` emphasis.
/// `<br>` becomes a newline. Text is escaped the way common converters do
/// it, so the result is expected to go through
/// [`clean_converted`](crate::pipeline::postprocess::clean_converted).
pub fn html_to_markdown(markup: &str) -> String {
    let document = Html::parse_document(markup);
    tidy(&render_children(document.root_element()))
}

fn render_children(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let collapsed = RE_WHITESPACE.replace_all(text, " ");
                out.push_str(&escape_text(&collapsed));
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&render_element(child_el));
                }
            }
            _ => {}
        }
    }
    out
}

fn render_element(el: ElementRef<'_>) -> String {
    let name = el.value().name();
    match name {
        "head" | "script" | "style" | "title" | "noscript" | "template" => String::new(),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = single_line(&render_children(el));
            if text.is_empty() {
                String::new()
            } else {
                block(&format!("{} {text}", "#".repeat(level)))
            }
        }
        "p" => {
            let inner = render_children(el);
            let inner = RE_LINE_MARKER.replace_all(inner.trim(), r"\$1");
            block(&RE_LINE_ORDINAL.replace_all(&inner, r"$1\.$2"))
        }
        "br" => "\n".to_string(),
        "hr" => block("---"),
        "strong" | "b" => wrap_inline(&render_children(el), "**"),
        "em" | "i" => wrap_inline(&render_children(el), "*"),
        "code" | "kbd" | "samp" => {
            let code: String = el.text().collect();
            if code.is_empty() {
                String::new()
            } else {
                format!("`{code}`")
            }
        }
        "pre" => {
            let code: String = el.text().collect();
            block(&format!("```\n{}\n```", code.trim_end_matches('\n')))
        }
        "a" => {
            let text = render_children(el);
            match el.value().attr("href") {
                Some(href) if !text.trim().is_empty() && !href.starts_with('#') => {
                    format!("[{}]({href})", text.trim())
                }
                // Bookmarks and in-document links keep only their text.
                _ => text,
            }
        }
        "img" => {
            let alt = el.value().attr("alt").unwrap_or("");
            match el.value().attr("src") {
                Some(src) => format!("![{}]({src})", escape_text(alt)),
                None => String::new(),
            }
        }
        "ul" => render_list(el, false),
        "ol" => render_list(el, true),
        "blockquote" => {
            let inner = tidy(&render_children(el));
            let quoted: Vec<String> = inner
                .lines()
                .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {l}") })
                .collect();
            block(&quoted.join("\n"))
        }
        "table" => render_table(el),
        "div" | "section" | "article" | "main" | "header" | "footer" | "nav" | "aside"
        | "li" | "figure" => block(&render_children(el)),
        _ => render_children(el),
    }
}

fn block(inner: &str) -> String {
    let inner = inner.trim();
    if inner.is_empty() {
        String::new()
    } else {
        format!("\n\n{inner}\n\n")
    }
}

fn wrap_inline(inner: &str, marker: &str) -> String {
    let core = inner.trim();
    if core.is_empty() {
        return inner.to_string();
    }
    let lead = &inner[..inner.len() - inner.trim_start().len()];
    let trail = &inner[inner.trim_end().len()..];
    format!("{lead}{marker}{core}{marker}{trail}")
}

fn single_line(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_list(el: ElementRef<'_>, ordered: bool) -> String {
    let start = el
        .value()
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);

    let items: Vec<String> = el
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
        .enumerate()
        .map(|(i, li)| {
            let marker = if ordered {
                format!("{}. ", start + i)
            } else {
                "- ".to_string()
            };
            let indent = " ".repeat(marker.len());
            let body = tidy(&render_children(li));
            let body = RE_MULTI_NEWLINE.replace_all(&body, "\n");
            let mut lines = body.lines();
            let mut item = format!("{marker}{}", lines.next().unwrap_or(""));
            for line in lines {
                item.push('\n');
                if !line.is_empty() {
                    item.push_str(&indent);
                }
                item.push_str(line);
            }
            item
        })
        .collect();

    block(&items.join("\n"))
}

fn render_table(el: ElementRef<'_>) -> String {
    let rows: Vec<Vec<String>> = el
        .select(&SEL_ROW)
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| single_line(&render_children(cell)).replace('|', r"\|"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let line = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(width, "");
        format!("| {} |", padded.join(" | "))
    };

    let mut out = vec![line(rows[0].as_slice())];
    out.push(format!("|{}", " --- |".repeat(width)));
    out.extend(rows[1..].iter().map(|r| line(r.as_slice())));
    block(&out.join("\n"))
}

/// Trim line ends, blank out whitespace-only lines, collapse blank runs.
fn tidy(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let joined = lines.join("\n");
    RE_BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}
