//! Input resolution and normalisation.
//!
//! A user-supplied path or URL is read into memory ([`resolve_input`]), its
//! type is sniffed ([`sniff_mime`]), and it is turned into a
//! [`DocumentInput`] ([`normalize`]): PDFs pass through as opaque bytes,
//! DOCX files are converted to HTML, HTML is taken as-is. Everything else is
//! rejected before any LLM call is made.
//!
//! Nothing touches the file system beyond the initial read: the LLM accepts
//! the PDF inline, so a URL download stays in memory.

use crate::error::TabSplitError;
use crate::model::{DocumentInput, PDF_MIME};
use crate::pipeline::docx::docx_to_html;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// MIME type of a Word (OOXML) document.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type of pre-converted HTML.
pub const HTML_MIME: &str = "text/html";

/// Bytes read from a path or URL, before normalisation.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// File name (last path or URL segment), used for logs and output naming.
    pub name: String,
    pub bytes: Vec<u8>,
    /// Sniffed MIME type.
    pub mime: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL into memory.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<RawDocument, TabSplitError> {
    if input.trim().is_empty() {
        return Err(TabSplitError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<RawDocument, TabSplitError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => TabSplitError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => TabSplitError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let mime = sniff_mime(&name, &bytes, None);
    debug!("Read {} ({} bytes, {})", path.display(), bytes.len(), mime);

    Ok(RawDocument { name, bytes, mime })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<RawDocument, TabSplitError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TabSplitError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            TabSplitError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            TabSplitError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(TabSplitError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let name = file_name_from_url(url);
    let bytes = response.bytes().await.map_err(map_err)?.to_vec();
    let mime = sniff_mime(&name, &bytes, declared.as_deref());

    info!("Downloaded {} bytes ({})", bytes.len(), mime);
    Ok(RawDocument { name, bytes, mime })
}

/// Last non-empty URL path segment, or `downloaded`.
fn file_name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| "downloaded".to_string())
}

/// Work out a document's MIME type from its magic bytes, then its file
/// extension, then the type the server declared.
pub fn sniff_mime(name: &str, bytes: &[u8], declared: Option<&str>) -> String {
    let lower = name.to_ascii_lowercase();
    if bytes.starts_with(b"%PDF") {
        return PDF_MIME.to_string();
    }
    if bytes.starts_with(b"PK\x03\x04") && (lower.ends_with(".docx") || declared.is_none_or(|d| d.contains("wordprocessingml"))) {
        return DOCX_MIME.to_string();
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return HTML_MIME.to_string();
    }
    if let Some(declared) = declared {
        return mime_base(declared).to_string();
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return HTML_MIME.to_string();
    }
    "application/octet-stream".to_string()
}

fn mime_base(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Turn raw bytes of a declared type into a [`DocumentInput`].
///
/// Enforces the size cap and the PDF / DOCX / HTML allow-list.
pub fn normalize(bytes: Vec<u8>, mime_type: &str, max_bytes: usize) -> Result<DocumentInput, TabSplitError> {
    if bytes.len() > max_bytes {
        return Err(TabSplitError::InputTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    match mime_base(mime_type) {
        PDF_MIME => {
            if !bytes.starts_with(b"%PDF") {
                return Err(TabSplitError::UnsupportedFormat {
                    mime_type: format!("{PDF_MIME} (missing %PDF header)"),
                });
            }
            Ok(DocumentInput::Pdf {
                bytes,
                mime_type: PDF_MIME.to_string(),
            })
        }
        DOCX_MIME => {
            let markup = docx_to_html(&bytes)?;
            debug!("DOCX converted to {} bytes of HTML", markup.len());
            Ok(DocumentInput::Html { markup })
        }
        HTML_MIME => {
            let markup = String::from_utf8(bytes).unwrap_or_else(|e| {
                warn!(
                    "HTML input is not valid UTF-8 (first bad byte at {}); invalid sequences replaced with U+FFFD",
                    e.utf8_error().valid_up_to()
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            });
            Ok(DocumentInput::Html { markup })
        }
        other => Err(TabSplitError::UnsupportedFormat {
            mime_type: other.to_string(),
        }),
    }
}

/// Resolve, sniff and normalise in one step.
pub async fn load(input: &str, timeout_secs: u64, max_bytes: usize) -> Result<(String, DocumentInput), TabSplitError> {
    let raw = resolve_input(input, timeout_secs).await?;
    let doc = normalize(raw.bytes, &raw.mime, max_bytes)?;
    Ok((raw.name, doc))
}

/// Default output directory for an input: its file stem next to the
/// current directory (`report.docx` → `report/`).
pub fn default_output_dir(name: &str) -> PathBuf {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "tabs".to_string());
    PathBuf::from(stem)
}
