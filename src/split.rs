//! Top-level split entry points.
//!
//! A split is one linear session:
//!
//! ```text
//! START ──▶ DETECT ──▶ (RECONCILE) ──▶ RENDER ──▶ DONE
//!              │                          │
//!              └──────────▶ FAILED ◀──────┘
//! ```
//!
//! - **DETECT**: HTML is scanned locally first; too few separators (fewer
//!   than `local_detection_min_sections`) and the LLM is asked instead, then
//!   its titles are mapped back onto the markup. PDFs always go to the LLM.
//!   Zero boundaries is fatal.
//! - **RENDER**: quick (local) or enhanced (LLM) per the caller; quick on a
//!   PDF silently runs as enhanced.
//! - **DONE**: file names are de-duplicated and stats assembled.
//!
//! Cancellation is checked before each phase and between render batches.
//! Requests already in flight are allowed to finish.

use crate::config::{RenderMode, SplitConfig};
use crate::error::TabSplitError;
use crate::model::{DocumentInput, SectionBoundary};
use crate::output::{dedupe_file_names, DetectionSource, RenderedSection, SplitOutput, SplitStats};
use crate::pipeline::batch::render_sections;
use crate::pipeline::detect::detect_local;
use crate::pipeline::input;
use crate::pipeline::llm::ClientSlot;
use crate::pipeline::reconcile::reconcile;
use crate::pipeline::structure::detect_remote;
use crate::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Result of the DETECT phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub source: DetectionSource,
    /// Page count reported by the LLM (remote detection only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    pub boundaries: Vec<SectionBoundary>,
}

/// Split a normalised document into one Markdown section per tab.
///
/// # Errors
/// - [`TabSplitError::ProviderNotConfigured`] when the run needs the LLM and
///   no provider could be resolved
/// - [`TabSplitError::DetectionFailed`] / [`TabSplitError::NoSectionsDetected`]
/// - [`TabSplitError::SectionRenderFailed`] when any section exhausts its
///   retries (no partial result is returned)
/// - [`TabSplitError::Cancelled`]
///
/// # Example
/// ```rust,no_run
/// use edgequake_tabsplit::{split, DocumentInput, RenderMode, SplitConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let html = std::fs::read_to_string("export.html")?;
/// let output = split(&DocumentInput::html(html), RenderMode::Quick, &SplitConfig::default()).await?;
/// for section in &output.sections {
///     println!("{} ({} bytes)", section.file_name, section.content.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn split(
    input: &DocumentInput,
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<SplitOutput, TabSplitError> {
    Session::new(input, config).run(mode).await
}

/// Run only the DETECT phase (plus reconciliation).
///
/// Needs the LLM only when the document is a PDF or local detection finds
/// too few separators.
pub async fn detect_sections(
    input: &DocumentInput,
    config: &SplitConfig,
) -> Result<Detection, TabSplitError> {
    Session::new(input, config).detect().await
}

/// Read a path or URL, normalise it, and split it.
pub async fn split_path(
    input_str: impl AsRef<str>,
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<SplitOutput, TabSplitError> {
    let input_str = input_str.as_ref();
    info!("Starting split: {}", input_str);
    let (_, doc) = input::load(input_str, config.download_timeout_secs, config.max_input_bytes).await?;
    split(&doc, mode, config).await
}

/// Normalise raw bytes of a declared MIME type, then split them.
pub async fn split_bytes(
    bytes: Vec<u8>,
    mime_type: &str,
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<SplitOutput, TabSplitError> {
    let doc = input::normalize(bytes, mime_type, config.max_input_bytes)?;
    split(&doc, mode, config).await
}

/// Split a path or URL and write each section to `dir`.
///
/// Uses atomic writes (temp file + rename) so a crash never leaves a
/// half-written section behind.
pub async fn split_to_dir(
    input_str: impl AsRef<str>,
    dir: impl AsRef<Path>,
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<SplitStats, TabSplitError> {
    let output = split_path(input_str, mode, config).await?;
    write_sections(&output.sections, dir).await?;
    Ok(output.stats)
}

/// Write sections to `dir` (created if missing), returning the file paths.
pub async fn write_sections(
    sections: &[RenderedSection],
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, TabSplitError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| TabSplitError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(sections.len());
    for section in sections {
        let path = dir.join(&section.file_name);
        let tmp_path = path.with_extension("md.tmp");
        let mut content = section.content.clone();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| TabSplitError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| TabSplitError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Synchronous wrapper around [`split`].
///
/// Creates a temporary tokio runtime internally.
pub fn split_sync(
    input: &DocumentInput,
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<SplitOutput, TabSplitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TabSplitError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(split(input, mode, config))
}

/// The mode actually used: quick needs HTML.
pub fn effective_mode(input: &DocumentInput, requested: RenderMode) -> RenderMode {
    match (requested, input) {
        (RenderMode::Quick, DocumentInput::Pdf { .. }) => RenderMode::Enhanced,
        (mode, _) => mode,
    }
}

/// State for one split of one document. Nothing is shared across sessions.
struct Session<'a> {
    input: &'a DocumentInput,
    config: &'a SplitConfig,
    client: ClientSlot,
    started: Instant,
}

impl<'a> Session<'a> {
    fn new(input: &'a DocumentInput, config: &'a SplitConfig) -> Self {
        Self {
            input,
            config,
            client: ClientSlot::resolve(config),
            started: Instant::now(),
        }
    }

    async fn run(self, requested: RenderMode) -> Result<SplitOutput, TabSplitError> {
        let detection = self.detect().await?;

        // ── RENDER ───────────────────────────────────────────────────────
        self.config.check_cancelled()?;
        let mode = effective_mode(self.input, requested);
        if mode != requested {
            info!("Quick mode needs HTML input; rendering the PDF in enhanced mode");
        }
        let (mut sections, tally) = render_sections(
            &self.client,
            self.input,
            &detection.boundaries,
            mode,
            self.config,
        )
        .await?;

        // ── DONE ─────────────────────────────────────────────────────────
        dedupe_file_names(&mut sections);
        let stats = SplitStats {
            detection: detection.source,
            mode,
            total_sections: sections.len(),
            remote_sections: tally.remote_sections,
            retries: tally.retries,
            duration_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            "Split complete: {} sections ({} via LLM, {} retries) in {}ms",
            stats.total_sections, stats.remote_sections, stats.retries, stats.duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_split_complete(sections.len());
        }
        Ok(SplitOutput { sections, stats })
    }

    async fn detect(&self) -> Result<Detection, TabSplitError> {
        self.config.check_cancelled()?;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_progress(&ProgressEvent::detecting());
        }

        let detection = match self.input {
            DocumentInput::Html { markup } => {
                let local = detect_local(markup, &self.config.separator);
                if local.len() >= self.config.local_detection_min_sections.max(1) {
                    info!("Local detection found {} sections", local.len());
                    Detection {
                        source: DetectionSource::Local,
                        total_pages: None,
                        boundaries: local,
                    }
                } else {
                    info!(
                        "Local detection found {} sections (< {}); using remote detection",
                        local.len(),
                        self.config.local_detection_min_sections
                    );
                    let client = self.client.get()?;
                    let structure = detect_remote(client.as_ref(), self.input, self.config).await?;
                    let boundaries = reconcile(markup, structure.tabs);
                    Detection {
                        source: DetectionSource::Remote,
                        total_pages: Some(structure.total_pages),
                        boundaries,
                    }
                }
            }
            DocumentInput::Pdf { .. } => {
                let client = self.client.get()?;
                let structure = detect_remote(client.as_ref(), self.input, self.config).await?;
                Detection {
                    source: DetectionSource::Remote,
                    total_pages: Some(structure.total_pages),
                    boundaries: structure.tabs,
                }
            }
        };

        if detection.boundaries.is_empty() {
            return Err(TabSplitError::NoSectionsDetected);
        }
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_sections_detected(detection.boundaries.len());
        }
        Ok(detection)
    }
}
