//! Offline integration tests for the public split API.
//!
//! The LLM is replaced by [`FakeModel`], which answers detection requests
//! with a canned tab list and section requests with `Rendered <title>`.

use edgequake_tabsplit::pipeline::input::{DOCX_MIME, HTML_MIME};
use edgequake_tabsplit::{
    detect_sections, split, split_bytes, split_to_dir, DetectionSource, DocumentInput,
    GenerateError, GenerateFuture, GenerateRequest, LlmClient, RenderMode, SplitConfig,
    TabSplitError,
};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct FakeModel {
    detection: String,
    failing: HashSet<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    fn new(detection: &str) -> Arc<Self> {
        Self::failing_on(detection, &[])
    }

    fn failing_on(detection: &str, titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            detection: detection.to_string(),
            failing: titles.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn quoted_title(prompt: &str) -> Option<String> {
    let start = prompt.find("titled \"")? + "titled \"".len();
    let len = prompt[start..].find('"')?;
    Some(prompt[start..start + len].to_string())
}

impl LlmClient for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> GenerateFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.text();
        self.prompts.lock().unwrap().push(prompt.clone());

        let reply = if request.schema["properties"].get("tabs").is_some() {
            Ok(self.detection.clone())
        } else {
            match quoted_title(&prompt) {
                Some(title) if self.failing.contains(&title) => {
                    Err(GenerateError::Request("503 unavailable".into()))
                }
                Some(title) => Ok(serde_json::json!({ "markdownContent": format!("Rendered {title}") })
                    .to_string()),
                None => Err(GenerateError::EmptyResponse),
            }
        };
        Box::pin(async move { reply })
    }
}

fn config_with(model: Arc<FakeModel>) -> SplitConfig {
    let client: Arc<dyn LlmClient> = model;
    SplitConfig::builder()
        .client(client)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

fn docx(body: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn bookmarked(id: u32, title: &str) -> String {
    format!(
        r#"<w:p><w:bookmarkStart w:id="{id}" w:name="_Tab{id}"/><w:r><w:t>{title}</w:t></w:r><w:bookmarkEnd w:id="{id}"/></w:p>"#
    )
}

fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

fn anchored_html(titles: &[&str]) -> String {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!(r#"<p><a id="_t{i}"></a>{t}</p><p>Body of {t}.</p>"#))
        .collect()
}

// ── Quick mode ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_with_bookmarks_splits_locally() {
    let body = [
        bookmarked(1, "Overview"),
        para("Welcome."),
        bookmarked(2, "Setup Guide"),
        para("Install it."),
        bookmarked(3, "FAQ"),
        para("Ask away."),
    ]
    .concat();
    let model = FakeModel::new("{}");
    let config = config_with(model.clone());

    let out = split_bytes(docx(&body), DOCX_MIME, RenderMode::Quick, &config)
        .await
        .unwrap();

    let names: Vec<&str> = out.sections.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec!["overview.md", "setup-guide.md", "faq.md"]);
    let contents: Vec<&str> = out.sections.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["Welcome.", "Install it.", "Ask away."]);
    assert_eq!(out.stats.detection, DetectionSource::Local);
    assert_eq!(out.stats.remote_sections, 0);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn token_separators_are_detected_locally() {
    let html = "<p>system-prompt</p><p>You are helpful.</p><p>user-guide</p><p>Read me.</p>";
    let found = detect_sections(&DocumentInput::html(html), &SplitConfig::default())
        .await
        .unwrap();
    assert_eq!(found.source, DetectionSource::Local);
    let titles: Vec<&str> = found.boundaries.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["system-prompt", "user-guide"]);
}

#[tokio::test]
async fn split_to_dir_writes_one_file_per_tab() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("export.html");
    std::fs::write(&src, anchored_html(&["Alpha", "Beta"])).unwrap();
    let out_dir = tmp.path().join("out");

    let stats = split_to_dir(
        src.to_str().unwrap(),
        &out_dir,
        RenderMode::Quick,
        &SplitConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(stats.total_sections, 2);
    let alpha = std::fs::read_to_string(out_dir.join("alpha.md")).unwrap();
    let beta = std::fs::read_to_string(out_dir.join("beta.md")).unwrap();
    assert_eq!(alpha, "Body of Alpha.\n");
    assert_eq!(beta, "Body of Beta.\n");
}

// ── Enhanced mode ────────────────────────────────────────────────────────────

#[tokio::test]
async fn enhanced_html_renders_every_section_in_order() {
    let titles = ["One", "Two", "Three", "Four", "Five"];
    let model = FakeModel::new("{}");
    let mut config = config_with(model.clone());
    config.batch_size = 2;

    let out = split(
        &DocumentInput::html(anchored_html(&titles)),
        RenderMode::Enhanced,
        &config,
    )
    .await
    .unwrap();

    let contents: Vec<&str> = out.sections.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["Rendered One", "Rendered Two", "Rendered Three", "Rendered Four", "Rendered Five"]
    );
    assert_eq!(out.stats.remote_sections, 5);
    assert_eq!(model.calls(), 5);

    // Ranged sections only send their own slice.
    let prompts = model.prompts.lock().unwrap();
    let two = prompts.iter().find(|p| p.contains("titled \"Two\"")).unwrap();
    assert!(two.contains("Body of Two."));
    assert!(!two.contains("Body of Four."));
}

#[tokio::test]
async fn pdf_is_detected_and_rendered_by_page_range() {
    let detection = r#"{"totalPages": 6, "tabs": [
        {"tabNumber": 2, "fileName": "setup.md", "originalTitle": "Setup", "startPage": 4, "endPage": 6},
        {"tabNumber": 1, "fileName": "intro.md", "originalTitle": "Intro", "startPage": 1, "endPage": 3}
    ]}"#;
    let model = FakeModel::new(detection);
    let config = config_with(model.clone());

    let out = split(&DocumentInput::pdf(b"%PDF-1.7".to_vec()), RenderMode::Quick, &config)
        .await
        .unwrap();

    let names: Vec<&str> = out.sections.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec!["intro.md", "setup.md"]);
    assert_eq!(out.sections[1].content, "Rendered Setup");
    assert_eq!(out.stats.mode, RenderMode::Enhanced);
    assert_eq!(model.calls(), 3);

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts.iter().any(|p| p.contains("pages 1 to 3")));
    assert!(prompts.iter().any(|p| p.contains("pages 4 to 6")));
}

#[tokio::test]
async fn one_failing_section_fails_the_split() {
    let model = FakeModel::failing_on("{}", &["Beta"]);
    let mut config = config_with(model.clone());
    config.max_retries = 1;

    let err = split(
        &DocumentInput::html(anchored_html(&["Alpha", "Beta", "Gamma"])),
        RenderMode::Enhanced,
        &config,
    )
    .await
    .unwrap_err();

    match err {
        TabSplitError::SectionRenderFailed { title, attempts, .. } => {
            assert_eq!(title, "Beta");
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Input errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_bytes_never_reach_the_model() {
    let model = FakeModel::new("{}");
    let config = config_with(model.clone());
    let err = split_bytes(b"plain text".to_vec(), "text/plain", RenderMode::Quick, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, TabSplitError::UnsupportedFormat { .. }));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn html_bytes_are_accepted() {
    let out = split_bytes(
        anchored_html(&["Alpha", "Beta"]).into_bytes(),
        HTML_MIME,
        RenderMode::Quick,
        &SplitConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(out.sections.len(), 2);
}

#[tokio::test]
async fn remote_detection_on_html_returns_document_order() {
    let detection = r#"{"totalPages": 1, "tabs": [
        {"tabNumber": 1, "fileName": "pricing.md", "originalTitle": "Pricing", "startPage": 1, "endPage": 1},
        {"tabNumber": 2, "fileName": "overview.md", "originalTitle": "Overview", "startPage": 1, "endPage": 1}
    ]}"#;
    let model = FakeModel::new(detection);
    let html = "<p>Overview</p><p>What it is.</p><p>Pricing</p><p>What it costs.</p>";

    let found = detect_sections(&DocumentInput::html(html), &config_with(model.clone()))
        .await
        .unwrap();
    assert_eq!(found.source, DetectionSource::Remote);
    let listed: Vec<(usize, &str)> = found
        .boundaries
        .iter()
        .map(|b| (b.ordinal, b.suggested_file_name.as_str()))
        .collect();
    assert_eq!(listed, vec![(1, "overview.md"), (2, "pricing.md")]);

    let out = split(&DocumentInput::html(html), RenderMode::Quick, &config_with(model))
        .await
        .unwrap();
    let contents: Vec<&str> = out.sections.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["What it is.", "What it costs."]);
}
