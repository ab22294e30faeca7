//! Pipeline stages for splitting a tabbed document into Markdown sections.
//!
//! Each submodule implements one transformation step and is tested on its
//! own; [`crate::split`] wires them into a session.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ docx ──▶ detect ──┬──────────────────────────▶ markdown ──┐
//! (path/URL) (→HTML) (local)  │                            (quick)    ├─▶ postprocess
//!                             └─▶ structure ──▶ reconcile ─▶ enhance ──┘
//!                                 (LLM)         (offsets)    (LLM, batched)
//! ```
//!
//! 1. [`input`]: read a path or URL, sniff its type, enforce the
//!    PDF / DOCX / HTML allow-list and the size cap
//! 2. [`docx`]: unzip `word/document.xml` and emit simple HTML,
//!    turning bookmarks into `<a id>` anchors
//! 3. [`detect`]: regex strategies that find separators in HTML
//! 4. [`structure`]: ask the LLM for the tab list (PDFs, or HTML where
//!    local detection found too little)
//! 5. [`reconcile`]: map LLM-reported titles back onto HTML byte offsets
//! 6. [`markdown`]: local HTML → Markdown, then cut at section titles
//! 7. [`enhance`]: per-section LLM rewrite with retry/backoff
//! 8. [`batch`]: run renders in fixed-size concurrent batches
//! 9. [`postprocess`]: deterministic cleanup of either renderer's output
//!
//! [`llm`] is the only stage that talks to the model; [`input`] is the only
//! other one with network I/O (URL downloads).

pub mod batch;
pub mod detect;
pub mod docx;
pub mod enhance;
pub mod input;
pub mod llm;
pub mod markdown;
pub mod postprocess;
pub mod reconcile;
pub mod structure;
