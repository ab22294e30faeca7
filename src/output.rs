//! Output types: what a finished split hands back to the caller.

use crate::config::RenderMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One output file.
///
/// Created once per boundary and never mutated afterwards, except for the
/// file-name de-duplication pass that runs before the split returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSection {
    /// Safe relative file name (`[a-z0-9-]+.md`).
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    /// Markdown body, without the section's own title.
    pub content: String,
}

/// Where the section boundaries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Bookmark/pattern scan of the HTML, no network.
    Local,
    /// One structured LLM request.
    Remote,
}

/// Statistics for a finished split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub detection: DetectionSource,
    /// Mode actually used (quick requests on a PDF run as enhanced).
    pub mode: RenderMode,
    pub total_sections: usize,
    /// Sections rendered through the LLM.
    pub remote_sections: usize,
    /// Retries spent across all remote sections.
    pub retries: u32,
    pub duration_ms: u64,
}

/// The complete result of a split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOutput {
    /// Sections in document order.
    pub sections: Vec<RenderedSection>,
    pub stats: SplitStats,
}

/// Make every file name unique, keeping the first occurrence as-is.
///
/// `overview.md, overview.md, overview.md` becomes
/// `overview.md, overview-2.md, overview-3.md`. A generated name never
/// collides with a name that appears later in the list either.
pub fn dedupe_file_names(sections: &mut [RenderedSection]) {
    let mut taken: HashSet<String> = HashSet::with_capacity(sections.len());
    let original: HashSet<String> = sections.iter().map(|s| s.file_name.clone()).collect();

    for section in sections.iter_mut() {
        if taken.insert(section.file_name.clone()) {
            continue;
        }
        let stem = section
            .file_name
            .strip_suffix(".md")
            .unwrap_or(&section.file_name)
            .to_string();
        let mut n = 2usize;
        loop {
            let candidate = format!("{stem}-{n}.md");
            if !taken.contains(&candidate) && !original.contains(&candidate) {
                taken.insert(candidate.clone());
                section.file_name = candidate;
                break;
            }
            n += 1;
        }
    }
}
