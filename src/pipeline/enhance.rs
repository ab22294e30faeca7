//! Remote section rendering ("enhanced" mode): one LLM rewrite per section.
//!
//! ## Payload
//!
//! | Input | Boundary | Sent |
//! |---|---|---|
//! | PDF  | any            | whole PDF + "pages *a*–*b* only" |
//! | HTML | `html_range`   | just that slice of the markup |
//! | HTML | no range       | whole markup + "only the section titled …" |
//!
//! Slicing exists only to bound request size.
//!
//! ## Retry Strategy
//!
//! Transport errors, empty bodies, JSON that does not match the schema and a
//! blank `markdownContent` are all "no usable response". Each is logged and
//! retried after `retry_backoff_ms * 2^(k-1)` for retry *k*. When the budget
//! is spent the section fails with [`TabSplitError::SectionRenderFailed`];
//! nothing is silently replaced by empty content.

use crate::config::SplitConfig;
use crate::error::{GenerateError, TabSplitError};
use crate::model::{DocumentInput, SectionBoundary};
use crate::output::RenderedSection;
use crate::pipeline::llm::{parse_structured, GenerateRequest, LlmClient, Part};
use crate::pipeline::postprocess::polish_generated;
use crate::prompts::{
    html_content_part, section_html_full_prompt, section_html_slice_prompt, section_pdf_prompt,
    section_schema,
};
use serde::Deserialize;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionResponse {
    markdown_content: String,
}

/// A rendered section plus the retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRender {
    pub section: RenderedSection,
    pub retries: u32,
}

/// Build the rewrite request for one section.
pub fn section_request(
    input: &DocumentInput,
    boundary: &SectionBoundary,
    config: &SplitConfig,
) -> GenerateRequest {
    let parts = match input {
        DocumentInput::Pdf { bytes, mime_type } => vec![
            Part::Inline {
                mime_type: mime_type.clone(),
                data: bytes.clone(),
            },
            Part::Text(section_pdf_prompt(
                &boundary.title,
                boundary.page_start,
                boundary.page_end,
            )),
        ],
        DocumentInput::Html { markup } => match boundary.html_range {
            Some(range) => vec![
                Part::Text(html_content_part(range.slice(markup))),
                Part::Text(section_html_slice_prompt(&boundary.title)),
            ],
            None => vec![
                Part::Text(html_content_part(markup)),
                Part::Text(section_html_full_prompt(&boundary.title)),
            ],
        },
    };
    GenerateRequest {
        parts,
        schema: section_schema(),
        max_tokens: config.section_max_tokens,
    }
}

/// Render one section through the LLM, retrying up to `config.max_retries`
/// times.
pub async fn render_remote(
    client: &dyn LlmClient,
    input: &DocumentInput,
    boundary: &SectionBoundary,
    config: &SplitConfig,
) -> Result<RemoteRender, TabSplitError> {
    let start = Instant::now();
    let request = section_request(input, boundary, config);
    let mut last_err: Option<GenerateError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Tab {:?}: retry {}/{} after {}ms",
                boundary.title, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match attempt_once(client, &request).await {
            Ok(markdown) => {
                debug!(
                    "Tab {:?}: {} bytes in {:?}",
                    boundary.title,
                    markdown.len(),
                    start.elapsed()
                );
                return Ok(RemoteRender {
                    section: RenderedSection {
                        file_name: boundary.suggested_file_name.clone(),
                        original_title: Some(boundary.title.clone()),
                        content: strip_leading_title(&markdown, &boundary.title),
                    },
                    retries: attempt,
                });
            }
            Err(e) => {
                warn!(
                    "Tab {:?}: attempt {} failed: {}",
                    boundary.title,
                    attempt + 1,
                    e
                );
                last_err = Some(e);
            }
        }
    }

    Err(TabSplitError::SectionRenderFailed {
        title: boundary.title.clone(),
        file_name: boundary.suggested_file_name.clone(),
        attempts: config.max_retries + 1,
        detail: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}

async fn attempt_once(client: &dyn LlmClient, request: &GenerateRequest) -> Result<String, GenerateError> {
    let body = client.generate(request).await?;
    let response: SectionResponse = parse_structured(&body)?;
    let markdown = polish_generated(&response.markdown_content);
    if markdown.is_empty() {
        return Err(GenerateError::EmptyResponse);
    }
    Ok(markdown)
}

/// Drop a first line that just repeats the section title.
///
/// The prompt asks the model not to repeat it; this catches the times it
/// does anyway.
fn strip_leading_title(markdown: &str, title: &str) -> String {
    let (first, rest) = markdown.split_once('\n').unwrap_or((markdown, ""));
    let bare = first
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim();
    if !rest.trim().is_empty() && bare.eq_ignore_ascii_case(title.trim()) {
        rest.trim_start().to_string()
    } else {
        markdown.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::mock::{Reply, ScriptedClient};

    fn fast_config(retries: u32) -> SplitConfig {
        SplitConfig::builder()
            .max_retries(retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    fn ok(markdown: &str) -> Reply {
        Reply::Body(serde_json::json!({ "markdownContent": markdown }).to_string())
    }

    fn setup() -> SectionBoundary {
        SectionBoundary::new(2, "Setup Guide", 3, 5)
    }

    #[tokio::test]
    async fn succeeds_first_time() {
        let client = ScriptedClient::new(vec![ok("Install it.")]);
        let input = DocumentInput::pdf(b"%PDF".to_vec());
        let r = render_remote(&client, &input, &setup(), &fast_config(2)).await.unwrap();
        assert_eq!(r.retries, 0);
        assert_eq!(r.section.file_name, "setup-guide.md");
        assert_eq!(r.section.content, "Install it.");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds() {
        let client = ScriptedClient::new(vec![
            Reply::Fail("429 rate limited".into()),
            Reply::Body(String::new()),
            ok("## Steps\n\nDone."),
        ]);
        let input = DocumentInput::pdf(b"%PDF".to_vec());
        let r = render_remote(&client, &input, &setup(), &fast_config(2)).await.unwrap();
        assert_eq!(r.retries, 2);
        assert_eq!(r.section.content, "## Steps\n\nDone.");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_names_the_section() {
        let client = ScriptedClient::new(vec![Reply::Fail("503".into())]);
        let input = DocumentInput::pdf(b"%PDF".to_vec());
        let err = render_remote(&client, &input, &setup(), &fast_config(2))
            .await
            .unwrap_err();
        match err {
            TabSplitError::SectionRenderFailed {
                title,
                file_name,
                attempts,
                detail,
            } => {
                assert_eq!(title, "Setup Guide");
                assert_eq!(file_name, "setup-guide.md");
                assert_eq!(attempts, 3);
                assert!(detail.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn blank_markdown_content_is_retried() {
        let client = ScriptedClient::new(vec![ok("   \n "), ok("Real content")]);
        let input = DocumentInput::html("<p>x</p>");
        let r = render_remote(&client, &input, &setup(), &fast_config(1)).await.unwrap();
        assert_eq!(r.retries, 1);
        assert_eq!(r.section.content, "Real content");
    }

    #[tokio::test]
    async fn malformed_json_is_retried() {
        let client = ScriptedClient::new(vec![
            Reply::Body("not json".into()),
            ok("fine"),
        ]);
        let input = DocumentInput::html("<p>x</p>");
        let r = render_remote(&client, &input, &setup(), &fast_config(1)).await.unwrap();
        assert_eq!(r.section.content, "fine");
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let client = ScriptedClient::new(vec![Reply::Fail("boom".into()), ok("late")]);
        let input = DocumentInput::html("<p>x</p>");
        let err = render_remote(&client, &input, &setup(), &fast_config(0))
            .await
            .unwrap_err();
        assert!(matches!(err, TabSplitError::SectionRenderFailed { attempts: 1, .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn pdf_request_names_the_page_range() {
        let req = section_request(&DocumentInput::pdf(b"%PDF".to_vec()), &setup(), &fast_config(2));
        assert_eq!(req.inline_count(), 1);
        assert!(req.text().contains("pages 3 to 5"));
        assert_eq!(req.max_tokens, 32_768);
    }

    #[test]
    fn ranged_html_sends_only_the_slice() {
        let markup = "<p>Overview</p><p>intro</p><p>Setup Guide</p><p>install</p>";
        let start = markup.find("<p>Setup").unwrap();
        let boundary = setup().with_html_range(start, markup.len());
        let req = section_request(&DocumentInput::html(markup), &boundary, &fast_config(2));
        let text = req.text();
        assert!(text.contains("<p>install</p>"));
        assert!(!text.contains("intro"));
        assert!(text.contains("Convert this HTML content"));
    }

    #[test]
    fn unranged_html_sends_everything() {
        let markup = "<p>Overview</p><p>intro</p><p>Setup Guide</p><p>install</p>";
        let req = section_request(&DocumentInput::html(markup), &setup(), &fast_config(2));
        let text = req.text();
        assert!(text.contains("intro"));
        assert!(text.contains("ONLY the section titled \"Setup Guide\""));
    }

    #[test]
    fn repeated_title_line_is_dropped() {
        assert_eq!(strip_leading_title("# Setup Guide\n\nBody", "Setup Guide"), "Body");
        assert_eq!(strip_leading_title("**setup guide**\nBody", "Setup Guide"), "Body");
        assert_eq!(strip_leading_title("Setup Guide", "Setup Guide"), "Setup Guide");
        assert_eq!(strip_leading_title("## Steps\n\nBody", "Setup Guide"), "## Steps\n\nBody");
    }
}
