//! Instructions and response schemas sent to the LLM.
//!
//! Centralising every prompt here keeps prompt wording out of the retry and
//! parsing logic, and lets unit tests inspect the exact text that is sent.
//!
//! Two request kinds exist:
//!
//! 1. **Structure detection**: one request per document, returns the tab
//!    list ([`TAB_DETECTION_PROMPT`], [`detection_schema`]).
//! 2. **Section rewrite**: one request per tab in enhanced mode, returns the
//!    cleaned Markdown ([`section_pdf_prompt`], [`section_html_slice_prompt`],
//!    [`section_html_full_prompt`], [`section_schema`]).

use serde_json::{json, Value};

/// System instruction framing every request as schema-constrained JSON.
///
/// `{schema}` is replaced with the pretty-printed JSON Schema of the
/// expected answer.
pub const STRUCTURED_OUTPUT_PROMPT: &str = r#"You are a precise document-structuring assistant.

Answer with a single JSON object that validates against this JSON Schema:

{schema}

Rules:
- Output ONLY the JSON object
- Do NOT wrap it in ``` fences
- Do NOT add commentary before or after it
- Every required property must be present"#;

/// Instruction for the structure detection request.
pub const TAB_DETECTION_PROMPT: &str = r#"Analyze this document and identify ALL the separate tabs/sections that should be split into individual files.

How to identify tab separators:
- Look for SHORT standalone lines/paragraphs that act as SECTION DIVIDERS
- These are typically 1-5 words, sitting alone, followed by the section's content
- They can be ANY format: "Overview", "Chapter 1", "system-prompt", "_navigation-guide", "00-intro", "Getting Started"
- In HTML: often <p>Title Here</p> or <p><a id="..."></a>Title Here</p>
- They are NOT part of the content - they DIVIDE the document into logical sections
- Each divider marks where a new file should begin

CRITICAL: Scan the ENTIRE document. Every standalone short title = 1 tab.

Return ONLY the tab structure - do NOT extract content.
For each tab:
- tabNumber: Sequential (1, 2, 3...)
- fileName: Convert to kebab-case.md (e.g., "Getting Started" -> "getting-started.md")
- originalTitle: Exact title text found
- startPage: Position in document order (1, 2, 3...)
- endPage: Position before next tab (or end)"#;

/// Cleanup rules shared by every section rewrite.
const SECTION_CLEANUP_RULES: &str = r#"CLEAN: Remove "==Start of OCR==", "==Screenshot==" and similar banners, page numbers, repeated headers/footers, and any other noise.
OUTPUT: Return clean Markdown with a proper H1/H2/H3 hierarchy and valid GFM tables."#;

/// Rewrite instruction for a page range of a PDF.
pub fn section_pdf_prompt(title: &str, start_page: usize, end_page: usize) -> String {
    format!(
        "Extract content ONLY from pages {start_page} to {end_page} of this document.\n\
         This section is titled \"{title}\".\n\n\
         {SECTION_CLEANUP_RULES}\n\
         IMPORTANT: Only process pages {start_page}-{end_page}, ignore all other pages.\n\
         DO NOT include the tab/section title \"{title}\" at the beginning - it is already used as the filename."
    )
}

/// Rewrite instruction for an HTML slice that holds exactly one section.
pub fn section_html_slice_prompt(title: &str) -> String {
    format!(
        "Convert this HTML content to clean Markdown.\n\
         This section is titled \"{title}\".\n\n\
         {SECTION_CLEANUP_RULES}\n\
         DO NOT include the tab/section title \"{title}\" at the beginning - it is already used as the filename."
    )
}

/// Rewrite instruction for the full HTML when the section could not be
/// located in the markup.
pub fn section_html_full_prompt(title: &str) -> String {
    format!(
        "This HTML document contains several sections separated by short standalone titles.\n\
         Convert ONLY the section titled \"{title}\" to clean Markdown: start right after that title \
         and stop at the next section title. Ignore every other section.\n\n\
         {SECTION_CLEANUP_RULES}\n\
         DO NOT include the tab/section title \"{title}\" at the beginning - it is already used as the filename."
    )
}

/// Label prefixed to HTML text parts.
pub fn html_content_part(markup: &str) -> String {
    format!("HTML CONTENT:\n{markup}")
}

/// Render the system instruction for a given schema.
pub fn structured_output_instruction(schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    STRUCTURED_OUTPUT_PROMPT.replace("{schema}", &rendered)
}

/// Response schema of the structure detection request.
pub fn detection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "totalPages": {
                "type": "number",
                "description": "Total number of pages in the document"
            },
            "tabs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "tabNumber": { "type": "number" },
                        "fileName": { "type": "string" },
                        "originalTitle": { "type": "string" },
                        "startPage": { "type": "number" },
                        "endPage": { "type": "number" }
                    },
                    "required": ["tabNumber", "fileName", "startPage", "endPage"]
                }
            }
        },
        "required": ["totalPages", "tabs"]
    })
}

/// Response schema of a section rewrite request.
pub fn section_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "markdownContent": {
                "type": "string",
                "description": "The extracted content in clean Markdown format"
            }
        },
        "required": ["markdownContent"]
    })
}
