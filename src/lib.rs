//! # edgequake-tabsplit
//!
//! Split a multi-tab document (PDF, DOCX or pre-converted HTML) into one
//! Markdown file per tab.
//!
//! ## Why this crate?
//!
//! Documents exported from tabbed editors arrive as one long file where each
//! former tab starts with a short title paragraph. This crate finds those
//! boundaries, locally when the markup carries bookmarks or file-like
//! separators and through an LLM when it doesn't, then renders every section
//! to its own Markdown file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX / HTML
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, sniff type
//!  ├─ 2. Normalise  DOCX → HTML; PDF stays opaque bytes
//!  ├─ 3. Detect     local regex scan, else LLM structure detection
//!  ├─ 4. Reconcile  map LLM titles back onto HTML offsets
//!  ├─ 5. Render     quick (local HTML → Markdown) or enhanced (LLM per section,
//!  │                batched, retried)
//!  └─ 6. Output     de-duplicated file names + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_tabsplit::{split_to_dir, RenderMode, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Quick mode on DOCX/HTML needs no API key unless detection falls
//!     // back to the LLM. PDFs always use it (GEMINI_API_KEY recommended).
//!     let config = SplitConfig::default();
//!     let stats = split_to_dir("handbook.docx", "handbook", RenderMode::Quick, &config).await?;
//!     eprintln!("{} sections ({} via LLM)", stats.total_sections, stats.remote_sections);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tabsplit` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-tabsplit = { version = "0.1", default-features = false }
//! ```
//!
//! ## Render Modes
//!
//! | Mode | Input | LLM calls | Notes |
//! |------|-------|-----------|-------|
//! | `quick`    | DOCX / HTML | 0 (or 1 for detection) | Deterministic, fast |
//! | `enhanced` | any         | 1 per section (+ detection) | Better tables and lists |
//!
//! Quick mode on a PDF runs as enhanced, since there is no markup to convert.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RenderMode, SeparatorRules, SplitConfig, SplitConfigBuilder};
pub use error::{GenerateError, TabSplitError};
pub use model::{DocumentInput, HtmlRange, SectionBoundary};
pub use output::{DetectionSource, RenderedSection, SplitOutput, SplitStats};
pub use pipeline::llm::{GenerateFuture, GenerateRequest, LlmClient, Part};
pub use progress::{NoopProgressCallback, Phase, ProgressCallback, ProgressEvent, SplitProgressCallback};
pub use split::{
    detect_sections, effective_mode, split, split_bytes, split_path, split_sync, split_to_dir,
    write_sections, Detection,
};
