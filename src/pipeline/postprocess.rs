//! Post-processing: deterministic cleanup of generated Markdown.
//!
//! Two sources of Markdown need different fixes:
//!
//! - **Converter output** (quick mode). The HTML→Markdown converter escapes
//!   every character that *could* start Markdown syntax, so `00-intro` comes
//!   out as `00\-intro` and `system_prompt` as `system\_prompt`. In prose
//!   copied from a word processor those escapes are noise. [`clean_converted`]
//!   reverses them and collapses blank-line runs.
//!
//! - **LLM output** (enhanced mode). Models occasionally wrap the answer in a
//!   fence or leave zero-width characters behind. [`polish_generated`] strips
//!   those without touching content.
//!
//! Every rule is a pure `&str → String` function and is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean converter output: unescape over-escaped characters, then collapse
/// runs of 3+ newlines to a single blank line.
pub fn clean_converted(input: &str) -> String {
    let s = unescape_markdown(input);
    collapse_blank_lines(&s)
}

/// Polish LLM-generated Markdown.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Collapse 3+ consecutive newlines to one blank line
/// 6. Trim leading/trailing blank space
pub fn polish_generated(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Converter escapes ────────────────────────────────────────────────────────

static RE_ESCAPED_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([#*_\-.()\[\]>`~|!])").unwrap());

static RE_ESCAPED_BACKSLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\\").unwrap());

/// Undo escaping of `# * _ - . ( ) [ ] > ` ~ | !`, then of backslash itself.
pub fn unescape_markdown(input: &str) -> String {
    let s = RE_ESCAPED_PUNCT.replace_all(input, "$1");
    RE_ESCAPED_BACKSLASH.replace_all(&s, r"\").into_owned()
}

/// Escape underscores the way the converter does.
pub fn escape_underscores(text: &str) -> String {
    text.replace('_', r"\_")
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible characters ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}
