//! DOCX → HTML for the local detector.
//!
//! Only `word/document.xml` is read. The output is deliberately plain:
//!
//! - heading styles (`Heading1`..`Heading6`, `Title`) become `<h1>`..`<h6>`
//! - other paragraphs become `<p>`; a paragraph's bookmark becomes a leading
//!   empty anchor, so a bookmarked tab title reads `<p><a id="_Toc1"></a>Title</p>`
//! - bold/italic runs become `<strong>`/`<em>`, `w:br` becomes `<br>`
//! - consecutive numbered/bulleted paragraphs become one `<ul>`
//! - tables become `<table>` with one `<td>` per cell

use crate::error::TabSplitError;
use roxmltree::{Document, Node};
use std::io::{Cursor, Read};
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Bookmarks Word inserts on its own; they never mark a tab.
const IGNORED_BOOKMARKS: [&str; 1] = ["_GoBack"];

/// Convert a DOCX file to HTML.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, TabSplitError> {
    let xml = read_document_xml(bytes)?;
    let doc = Document::parse(&xml).map_err(|e| TabSplitError::CorruptDocx {
        detail: format!("word/document.xml: {e}"),
    })?;

    let body = doc
        .root_element()
        .children()
        .find(|n| n.tag_name().name() == "body")
        .ok_or_else(|| TabSplitError::CorruptDocx {
            detail: "word/document.xml has no <w:body>".to_string(),
        })?;

    let mut html = String::new();
    let mut in_list = false;
    for child in body.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "p" => {
                let para = Paragraph::read(child);
                if para.is_list_item {
                    if !in_list {
                        html.push_str("<ul>");
                        in_list = true;
                    }
                    if !para.inner.is_empty() {
                        html.push_str(&format!("<li>{}</li>", para.inner));
                    }
                    continue;
                }
                close_list(&mut html, &mut in_list);
                html.push_str(&para.to_html());
            }
            "tbl" => {
                close_list(&mut html, &mut in_list);
                html.push_str(&table_html(child));
            }
            _ => {}
        }
    }
    close_list(&mut html, &mut in_list);
    Ok(html)
}

fn read_document_xml(bytes: &[u8]) -> Result<String, TabSplitError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| TabSplitError::CorruptDocx {
        detail: e.to_string(),
    })?;
    let mut file = archive
        .by_name("word/document.xml")
        .map_err(|e| TabSplitError::CorruptDocx {
            detail: format!("word/document.xml: {e}"),
        })?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| TabSplitError::CorruptDocx {
            detail: format!("word/document.xml: {e}"),
        })?;
    Ok(xml)
}

fn close_list(html: &mut String, in_list: &mut bool) {
    if *in_list {
        html.push_str("</ul>");
        *in_list = false;
    }
}

/// One `w:p`, rendered.
struct Paragraph {
    heading: Option<u8>,
    is_list_item: bool,
    bookmark: Option<String>,
    /// Inline HTML (escaped text with emphasis tags).
    inner: String,
}

impl Paragraph {
    fn read(p: Node<'_, '_>) -> Self {
        let mut heading = None;
        let mut is_list_item = false;
        if let Some(ppr) = child(p, "pPr") {
            if let Some(style) = child(ppr, "pStyle").and_then(|s| s.attribute((W_NS, "val"))) {
                heading = heading_level(style);
                is_list_item = style.to_ascii_lowercase().starts_with("list");
            }
            if child(ppr, "numPr").is_some() && heading.is_none() {
                is_list_item = true;
            }
        }

        let bookmark = p
            .descendants()
            .filter(|n| n.tag_name().name() == "bookmarkStart")
            .filter_map(|n| n.attribute((W_NS, "name")))
            .find(|name| !IGNORED_BOOKMARKS.contains(name))
            .map(str::to_string);

        let mut spans = Vec::new();
        collect_spans(p, &mut spans);

        Self {
            heading,
            is_list_item,
            bookmark,
            inner: spans_html(&spans),
        }
    }

    fn to_html(&self) -> String {
        if self.inner.trim().is_empty() {
            return String::new();
        }
        match self.heading {
            Some(level) => format!("<h{level}>{}</h{level}>", self.inner),
            None => match &self.bookmark {
                Some(id) => format!(
                    "<p><a id=\"{}\"></a>{}</p>",
                    html_escape::encode_double_quoted_attribute(id),
                    self.inner
                ),
                None => format!("<p>{}</p>", self.inner),
            },
        }
    }
}

fn heading_level(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let digits = lower.strip_prefix("heading")?.trim();
    match digits.parse::<u8>() {
        Ok(n @ 1..=6) => Some(n),
        _ => None,
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

/// A run of text with uniform formatting, or a line break.
#[derive(Debug, PartialEq)]
enum Span {
    Text { text: String, bold: bool, italic: bool },
    Break,
}

/// Walk runs (including those nested in hyperlinks and smart tags).
fn collect_spans(node: Node<'_, '_>, spans: &mut Vec<Span>) {
    for n in node.children().filter(Node::is_element) {
        match n.tag_name().name() {
            "r" => read_run(n, spans),
            "pPr" | "rPr" => {}
            _ => collect_spans(n, spans),
        }
    }
}

fn read_run(run: Node<'_, '_>, spans: &mut Vec<Span>) {
    let rpr = child(run, "rPr");
    let bold = rpr.is_some_and(|r| toggled(r, "b"));
    let italic = rpr.is_some_and(|r| toggled(r, "i"));

    for n in run.children().filter(Node::is_element) {
        match n.tag_name().name() {
            "t" => {
                let text = n.text().unwrap_or("");
                let same_format = matches!(
                    spans.last(),
                    Some(Span::Text { bold: b, italic: i, .. }) if *b == bold && *i == italic
                );
                if same_format {
                    if let Some(Span::Text { text: prev, .. }) = spans.last_mut() {
                        prev.push_str(text);
                    }
                } else {
                    spans.push(Span::Text {
                        text: text.to_string(),
                        bold,
                        italic,
                    });
                }
            }
            "tab" => spans.push(Span::Text {
                text: " ".to_string(),
                bold: false,
                italic: false,
            }),
            "br" | "cr" => spans.push(Span::Break),
            _ => {}
        }
    }
}

/// `<w:b/>` and `<w:b w:val="1"/>` switch on; `w:val="0"`/`"false"` off.
fn toggled(rpr: Node<'_, '_>, name: &str) -> bool {
    child(rpr, name).is_some_and(|n| {
        !matches!(n.attribute((W_NS, "val")), Some("0") | Some("false") | Some("off"))
    })
}

fn spans_html(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Break => out.push_str("<br>"),
            Span::Text { text, bold, italic } => {
                let mut t = html_escape::encode_text(text).into_owned();
                if t.trim().is_empty() {
                    out.push_str(&t);
                    continue;
                }
                if *italic {
                    t = format!("<em>{t}</em>");
                }
                if *bold {
                    t = format!("<strong>{t}</strong>");
                }
                out.push_str(&t);
            }
        }
    }
    out
}

fn table_html(tbl: Node<'_, '_>) -> String {
    let mut html = String::from("<table>");
    for tr in tbl.children().filter(|n| n.tag_name().name() == "tr") {
        html.push_str("<tr>");
        for tc in tr.children().filter(|n| n.tag_name().name() == "tc") {
            let cell: Vec<String> = tc
                .children()
                .filter(|n| n.tag_name().name() == "p")
                .map(|p| Paragraph::read(p).inner)
                .filter(|inner| !inner.trim().is_empty())
                .collect();
            html.push_str(&format!("<td>{}</td>", cell.join("<br>")));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builds minimal DOCX files in memory.

    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Wrap `body` (the children of `<w:body>`) in a DOCX container.
    pub fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    /// A bookmarked one-line paragraph, the way Word saves a tab title.
    pub fn bookmarked(id: u32, title: &str) -> String {
        format!(
            r#"<w:p><w:bookmarkStart w:id="{id}" w:name="_Tab{id}"/><w:r><w:t>{title}</w:t></w:r><w:bookmarkEnd w:id="{id}"/></w:p>"#
        )
    }

    pub fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }
}
