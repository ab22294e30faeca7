//! Batch orchestration: render every boundary, in order, with bounded
//! concurrency.
//!
//! ## Quick mode (HTML)
//!
//! Boundaries that carry an `html_range` go through the local path in one
//! synchronous pass. Boundaries without one (the reconciler could not place
//! them) are rendered remotely and merged back by ordinal. Their titles still
//! cut the local Markdown, so a remote tab's text never ends up inside its
//! ranged neighbour.
//!
//! ## Enhanced mode
//!
//! Sections are rendered `batch_size` at a time. Every future of batch *n*
//! settles (success or failure) before batch *n+1* is started, so at most
//! `batch_size` requests are ever in flight. Cancellation is checked before
//! each batch. After a batch settles, the first failure in it aborts the run:
//! sections that did succeed are not returned.

use crate::config::{RenderMode, SplitConfig};
use crate::error::TabSplitError;
use crate::model::{DocumentInput, SectionBoundary};
use crate::output::RenderedSection;
use crate::pipeline::enhance::render_remote;
use crate::pipeline::llm::ClientSlot;
use crate::pipeline::markdown::render_local;
use crate::progress::ProgressEvent;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, info};

/// What rendering cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTally {
    /// Sections rendered through the LLM.
    pub remote_sections: usize,
    /// Retries spent across those sections.
    pub retries: u32,
}

/// Render `boundaries` in `mode`, returning sections in ordinal order.
///
/// `mode` must already be resolved: quick is only honoured for HTML input.
pub async fn render_sections(
    client: &ClientSlot,
    input: &DocumentInput,
    boundaries: &[SectionBoundary],
    mode: RenderMode,
    config: &SplitConfig,
) -> Result<(Vec<RenderedSection>, RenderTally), TabSplitError> {
    let markup = match (mode, input) {
        (RenderMode::Quick, DocumentInput::Html { markup }) => Some(markup.as_str()),
        _ => None,
    };

    let mut tally = RenderTally::default();
    let mut rendered: Vec<(usize, RenderedSection)> = Vec::with_capacity(boundaries.len());
    let remote: Vec<&SectionBoundary>;
    let offset: usize;
    let total: usize;

    match markup {
        Some(markup) => {
            let (ranged, unranged): (Vec<&SectionBoundary>, Vec<&SectionBoundary>) =
                boundaries.iter().partition(|b| b.html_range.is_some());
            let local = if ranged.is_empty() {
                Vec::new()
            } else {
                render_ranged(markup, boundaries, &ranged)
            };
            info!(
                "Quick render: {} local, {} remote",
                local.len(),
                unranged.len()
            );

            total = local.len() + unranged.len();
            for (i, (_, section)) in local.iter().enumerate() {
                let title = section.original_title.as_deref().unwrap_or(&section.file_name);
                notify_start(config, i + 1, total, title);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_section_complete(i + 1, total, title, section.content.len());
                }
            }
            offset = local.len();
            rendered.extend(local);
            remote = unranged;
        }
        None => {
            info!(
                "Enhanced render: {} sections in batches of {}",
                boundaries.len(),
                config.batch_size
            );
            total = boundaries.len();
            offset = 0;
            remote = boundaries.iter().collect();
        }
    }

    if !remote.is_empty() {
        let sections = render_batched(client, input, &remote, offset, total, config, &mut tally).await?;
        rendered.extend(sections);
    }

    rendered.sort_by_key(|(ordinal, _)| *ordinal);
    Ok((rendered.into_iter().map(|(_, s)| s).collect(), tally))
}

/// Render the ranged boundaries locally, cutting the Markdown at every
/// boundary's title so unranged tabs do not spill into a neighbour.
fn render_ranged(
    markup: &str,
    all: &[SectionBoundary],
    ranged: &[&SectionBoundary],
) -> Vec<(usize, RenderedSection)> {
    let keep: HashSet<usize> = ranged.iter().map(|b| b.ordinal).collect();
    let local: Vec<(usize, RenderedSection)> = render_local(markup, all)
        .into_iter()
        .filter(|(ordinal, _)| keep.contains(ordinal))
        .collect();
    if !local.is_empty() {
        return local;
    }
    // No ranged title survived the cut (e.g. the whole-document fallback
    // landed on an unranged boundary).
    debug!("Falling back to cutting at ranged titles only");
    let ranged: Vec<SectionBoundary> = ranged.iter().map(|b| (*b).clone()).collect();
    render_local(markup, &ranged)
}

/// Render `boundaries` remotely, `batch_size` at a time.
///
/// Progress positions are `offset + 1 ..= offset + boundaries.len()`.
async fn render_batched(
    client: &ClientSlot,
    input: &DocumentInput,
    boundaries: &[&SectionBoundary],
    offset: usize,
    total: usize,
    config: &SplitConfig,
    tally: &mut RenderTally,
) -> Result<Vec<(usize, RenderedSection)>, TabSplitError> {
    let client = client.get()?;
    let batch_size = config.batch_size.max(1);
    let mut out = Vec::with_capacity(boundaries.len());

    for (batch_idx, batch) in boundaries.chunks(batch_size).enumerate() {
        config.check_cancelled()?;
        let first = offset + batch_idx * batch_size;
        debug!("Batch {}: {} sections", batch_idx + 1, batch.len());

        for (i, boundary) in batch.iter().enumerate() {
            notify_start(config, first + i + 1, total, &boundary.title);
        }

        let results = join_all(
            batch
                .iter()
                .map(|boundary| render_remote(client.as_ref(), input, boundary, config)),
        )
        .await;

        let mut first_err: Option<TabSplitError> = None;
        for (i, (boundary, result)) in batch.iter().zip(results).enumerate() {
            let position = first + i + 1;
            match result {
                Ok(r) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_section_complete(position, total, &boundary.title, r.section.content.len());
                    }
                    tally.remote_sections += 1;
                    tally.retries += r.retries;
                    out.push((boundary.ordinal, r.section));
                }
                Err(e) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_section_error(position, total, &boundary.title, &e.to_string());
                    }
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
    }

    Ok(out)
}

fn notify_start(config: &SplitConfig, position: usize, total: usize, title: &str) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_progress(&ProgressEvent::processing(position, total, title));
    }
}
