//! Remote boundary detection: one structured LLM request that lists the tabs.
//!
//! Used for every PDF (the pipeline cannot read PDFs locally) and for HTML
//! whose local scan found too few separators. The request is sent exactly
//! once. Its answer gates everything downstream, so an empty or unparseable
//! answer is fatal ([`TabSplitError::DetectionFailed`]) instead of being
//! retried here or quietly turned into "zero sections".
//!
//! The model's page ranges are not trusted: boundaries are re-sorted by the
//! model's ordinal, renumbered, and their ends recomputed from the starts.

use crate::config::SplitConfig;
use crate::error::TabSplitError;
use crate::model::{file_name_for, recompute_page_ends, DocumentInput, SectionBoundary};
use crate::pipeline::llm::{parse_structured, GenerateRequest, LlmClient, Part};
use crate::prompts::{detection_schema, html_content_part, TAB_DETECTION_PROMPT};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

/// Structure reported by the remote detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedStructure {
    pub total_pages: usize,
    /// Sorted, renumbered, without `html_range`.
    pub tabs: Vec<SectionBoundary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionResponse {
    #[serde(deserialize_with = "page_number")]
    total_pages: usize,
    tabs: Vec<DetectedTab>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedTab {
    #[serde(deserialize_with = "page_number")]
    tab_number: usize,
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(deserialize_with = "page_number")]
    start_page: usize,
    // Required by the schema but recomputed; parsed only to validate shape.
    #[serde(deserialize_with = "page_number")]
    #[allow(dead_code)]
    end_page: usize,
}

/// Accept `3`, `3.0` or `"3"`; models disagree on how to write a "number".
fn page_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Num {
        Int(u64),
        Float(f64),
        Text(String),
    }
    let value = match Num::deserialize(deserializer)? {
        Num::Int(n) => n as f64,
        Num::Float(f) => f,
        Num::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s:?}")))?,
    };
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid page number {value}")));
    }
    Ok(value.round() as usize)
}

/// Build the single detection request for `input`.
pub fn detection_request(input: &DocumentInput, config: &SplitConfig) -> GenerateRequest {
    let parts = match input {
        DocumentInput::Pdf { bytes, mime_type } => vec![
            Part::Inline {
                mime_type: mime_type.clone(),
                data: bytes.clone(),
            },
            Part::Text(TAB_DETECTION_PROMPT.to_string()),
        ],
        DocumentInput::Html { markup } => vec![
            Part::Text(TAB_DETECTION_PROMPT.to_string()),
            Part::Text(html_content_part(markup)),
        ],
    };
    GenerateRequest {
        parts,
        schema: detection_schema(),
        max_tokens: config.detection_max_tokens,
    }
}

/// Ask the LLM for the document's tab structure. Single attempt.
pub async fn detect_remote(
    client: &dyn LlmClient,
    input: &DocumentInput,
    config: &SplitConfig,
) -> Result<DetectedStructure, TabSplitError> {
    info!("Remote detection via {} ({} input)", client.name(), input.kind());
    let request = detection_request(input, config);

    let body = client
        .generate(&request)
        .await
        .map_err(|e| TabSplitError::DetectionFailed {
            reason: e.to_string(),
        })?;

    let response: DetectionResponse =
        parse_structured(&body).map_err(|e| TabSplitError::DetectionFailed {
            reason: e.to_string(),
        })?;

    let structure = into_structure(response);
    info!(
        "Remote detection found {} tabs over {} pages",
        structure.tabs.len(),
        structure.total_pages
    );
    Ok(structure)
}

fn into_structure(response: DetectionResponse) -> DetectedStructure {
    let mut tabs = response.tabs;
    // Stable: ties keep the model's listing order.
    tabs.sort_by_key(|t| t.tab_number);

    let mut boundaries: Vec<SectionBoundary> = Vec::with_capacity(tabs.len());
    for tab in tabs {
        let title = tab
            .original_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| title_from_file_name(&tab.file_name));
        if title.is_empty() {
            warn!("Dropping detected tab #{} with no title or file name", tab.tab_number);
            continue;
        }
        let ordinal = boundaries.len() + 1;
        debug!("Tab {ordinal}: {title:?} from page {}", tab.start_page);
        let start = tab.start_page.max(1);
        boundaries.push(SectionBoundary::new(ordinal, title, start, start));
    }

    let total_pages = boundaries
        .iter()
        .map(|b| b.page_start)
        .max()
        .unwrap_or(0)
        .max(response.total_pages);
    recompute_page_ends(&mut boundaries, total_pages);

    // Keep file names derived from titles, never the model's own spelling.
    for b in &mut boundaries {
        b.suggested_file_name = file_name_for(&b.title, b.ordinal);
    }

    DetectedStructure {
        total_pages,
        tabs: boundaries,
    }
}

fn title_from_file_name(file_name: &str) -> String {
    file_name
        .trim()
        .strip_suffix(".md")
        .unwrap_or(file_name.trim())
        .to_string()
}
