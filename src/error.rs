//! Error types for the edgequake-tabsplit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TabSplitError`]: **Fatal**: the split cannot complete (input rejected,
//!   provider not configured, structure detection failed, a section exhausted
//!   its retries). Returned as `Err(TabSplitError)` from every public entry
//!   point. There is no partial delivery: a session that fails on one section
//!   returns this error, not the sections that did succeed.
//!
//! * [`GenerateError`]: **Per attempt**: one LLM request produced nothing
//!   usable. The section renderer logs it and retries; only when the retry
//!   budget is spent does it become a [`TabSplitError::SectionRenderFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-tabsplit library.
#[derive(Debug, Error)]
pub enum TabSplitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document is neither a PDF, a DOCX, nor HTML.
    #[error("Unsupported document type '{mime_type}'\nOnly PDF and DOCX (or pre-converted HTML) are accepted.")]
    UnsupportedFormat { mime_type: String },

    /// The document exceeds the configured size cap.
    #[error("Document is {size} bytes, above the {limit}-byte limit")]
    InputTooLarge { size: usize, limit: usize },

    /// The DOCX container or its `word/document.xml` part could not be read.
    #[error("DOCX document is corrupt: {detail}")]
    CorruptDocx { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The remote structure detector returned nothing usable.
    #[error("Could not detect the document structure: {reason}\nStart again with a new upload.")]
    DetectionFailed { reason: String },

    /// Detection succeeded but found zero sections.
    #[error("No tabs detected in the document.\nMake sure your document has separator pages.")]
    NoSectionsDetected,

    /// One section exhausted its retry budget; the whole split is abandoned.
    #[error("Failed to process tab \"{title}\" ({file_name}) after {attempts} attempts: {detail}")]
    SectionRenderFailed {
        title: String,
        file_name: String,
        attempts: u32,
        detail: String,
    },

    /// The caller signalled cancellation between phases or batches.
    #[error("Split cancelled")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single LLM request produced no usable answer.
///
/// An empty body and a thrown request are deliberately the same kind of
/// failure from the caller's point of view: neither carries content.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    /// Transport or provider failure (HTTP error, rate limit, timeout…).
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with an empty or whitespace-only body.
    #[error("empty response")]
    EmptyResponse,

    /// The body did not match the declared response schema.
    #[error("response did not match the expected schema: {detail}")]
    Malformed { detail: String },
}
