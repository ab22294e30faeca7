//! Progress-callback trait for split events.
//!
//! Inject an [`Arc<dyn SplitProgressCallback>`] via
//! [`crate::config::SplitConfigBuilder::progress_callback`] to receive
//! events as the pipeline detects and renders tabs. Events are for display
//! only; nothing in the pipeline reads them back.
//!
//! # Example
//!
//! ```rust
//! use edgequake_tabsplit::{ProgressEvent, SplitConfig, SplitProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SplitProgressCallback for Printer {
//!     fn on_progress(&self, event: &ProgressEvent) {
//!         eprintln!("{:?} {}/{} {}", event.phase, event.current, event.total,
//!             event.label.as_deref().unwrap_or(""));
//!     }
//! }
//!
//! let config = SplitConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Detecting,
    Processing,
}

/// "Processing tab X of N" style progress update.
///
/// Within one phase `current` strictly increases from event to event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// 1-based position (0 while detection has not produced a count yet).
    pub current: usize,
    pub total: usize,
    pub label: Option<String>,
}

impl ProgressEvent {
    pub fn detecting() -> Self {
        Self {
            phase: Phase::Detecting,
            current: 0,
            total: 0,
            label: None,
        }
    }

    pub fn processing(current: usize, total: usize, label: impl Into<String>) -> Self {
        Self {
            phase: Phase::Processing,
            current,
            total,
            label: Some(label.into()),
        }
    }
}

/// Called by the pipeline as it moves through a split.
///
/// Implementations must be `Send + Sync`: in enhanced mode the sections of a
/// batch render concurrently, so `on_section_complete` and
/// `on_section_error` may arrive in any order within a batch. All methods
/// have no-op defaults.
pub trait SplitProgressCallback: Send + Sync {
    /// Phase updates. Fired once when detection starts and once before each
    /// section render, in document order.
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = event;
    }

    /// Called once detection has settled on the section list.
    fn on_sections_detected(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called after a section rendered successfully.
    ///
    /// # Arguments
    /// * `current`: 1-based section position
    /// * `total`: number of sections
    /// * `title`: section title
    /// * `content_len`: byte length of the produced Markdown
    fn on_section_complete(&self, current: usize, total: usize, title: &str, content_len: usize) {
        let _ = (current, total, title, content_len);
    }

    /// Called when a section exhausted its retries.
    fn on_section_error(&self, current: usize, total: usize, title: &str, error: &str) {
        let _ = (current, total, title, error);
    }

    /// Called once after every section rendered.
    fn on_split_complete(&self, total_sections: usize) {
        let _ = total_sections;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SplitProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SplitConfig`].
pub type ProgressCallback = Arc<dyn SplitProgressCallback>;


#[cfg(test)]
mod tests {
    use super::testing::RecordingCallback;
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_progress(&ProgressEvent::detecting());
        cb.on_sections_detected(2);
        cb.on_progress(&ProgressEvent::processing(1, 2, "Overview"));
        cb.on_section_complete(1, 2, "Overview", 42);
        cb.on_section_error(2, 2, "Setup", "boom");
        cb.on_split_complete(2);
    }

    #[test]
    fn recording_callback_receives_events() {
        let cb = RecordingCallback::default();
        cb.on_progress(&ProgressEvent::detecting());
        cb.on_progress(&ProgressEvent::processing(1, 2, "A"));
        cb.on_section_complete(1, 2, "A", 10);
        cb.on_section_error(2, 2, "B", "x");

        let events = cb.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, Phase::Detecting);
        assert_eq!(events[1].label.as_deref(), Some("A"));
        assert_eq!(*cb.completed.lock().unwrap(), vec![1]);
        assert_eq!(*cb.errors.lock().unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn SplitProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_split_complete(1);
    }
}
