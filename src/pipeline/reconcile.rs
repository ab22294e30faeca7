//! Boundary reconciliation: map remotely detected titles back onto byte
//! offsets in the HTML they came from.
//!
//! Best effort. A boundary whose title cannot be found keeps
//! `html_range: None`, and the renderer sends the full document for that one
//! section instead of a slice.
//!
//! Element text is entity-decoded before it is compared, so a model that
//! reports `Tom’s Guide` matches markup holding `Tom&#8217;s Guide`.

use crate::model::{file_name_for, HtmlRange, SectionBoundary};
use crate::pipeline::detect::decode_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Element shapes a separator title can sit in, in priority order. Group 1
/// is the element's text.
static TITLE_SHAPES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r#"(?i)<p[^>]*><a\s+id=(?:"[^"]+"|'[^']+'|[^\s>"']+)\s*></a>([^<]+)</p>"#).unwrap(),
        Regex::new(r"(?i)<p[^>]*>([^<]+)</p>").unwrap(),
        Regex::new(r"(?i)<h[1-6][^>]*>([^<]+)</h[1-6]>").unwrap(),
    ]
});

/// Attach `html_range` to every boundary whose title can be located, then
/// put the boundaries in document order.
///
/// Offsets are located per boundary; a title that occurs several times is
/// given the first occurrence no earlier boundary has claimed. Located
/// offsets are then sorted and each range ends where the next located one
/// starts (or at the end of the markup).
///
/// Located boundaries are reordered by offset among the slots they occupy;
/// unlocated ones keep their position. Ordinals are renumbered `1..=n`.
pub fn reconcile(markup: &str, boundaries: Vec<SectionBoundary>) -> Vec<SectionBoundary> {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut located: Vec<(usize, usize)> = Vec::new(); // (index, offset)

    for (index, boundary) in boundaries.iter().enumerate() {
        match locate(markup, &boundary.title, &claimed) {
            Some(offset) => {
                debug!("Located {:?} at byte {offset}", boundary.title);
                claimed.insert(offset);
                located.push((index, offset));
            }
            None => warn!(
                "Could not locate {:?} in the HTML; it will be rendered from the full document",
                boundary.title
            ),
        }
    }

    let slots: Vec<usize> = located.iter().map(|&(index, _)| index).collect();
    located.sort_by_key(|&(_, offset)| offset);

    let mut ranges: Vec<Option<HtmlRange>> = vec![None; boundaries.len()];
    for (k, &(index, start)) in located.iter().enumerate() {
        let end = located.get(k + 1).map_or(markup.len(), |&(_, next)| next);
        ranges[index] = Some(HtmlRange { start, end });
    }

    let mut placed: Vec<Option<SectionBoundary>> = boundaries
        .into_iter()
        .zip(ranges)
        .map(|(mut boundary, range)| {
            boundary.html_range = range;
            Some(boundary)
        })
        .collect();

    // Slot i of the located set (in listing order) takes the i-th boundary
    // in offset order.
    let mut order: Vec<usize> = (0..placed.len()).collect();
    for (slot, &(index, _)) in slots.iter().zip(located.iter()) {
        order[*slot] = index;
    }

    order
        .into_iter()
        .filter_map(|index| placed[index].take())
        .enumerate()
        .map(|(i, mut boundary)| {
            boundary.ordinal = i + 1;
            boundary.suggested_file_name = file_name_for(&boundary.title, boundary.ordinal);
            boundary
        })
        .collect()
}

/// First unclaimed offset of an element whose text is `title`, trying each
/// shape in order.
fn locate(markup: &str, title: &str, claimed: &HashSet<usize>) -> Option<usize> {
    let wanted = normalize(title);
    if wanted.is_empty() {
        return None;
    }
    for shape in TITLE_SHAPES.iter() {
        let found = shape
            .captures_iter(markup)
            .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())))
            .find(|&(offset, text)| {
                !claimed.contains(&offset) && normalize(&decode_entities(text)) == wanted
            });
        if let Some((offset, _)) = found {
            return Some(offset);
        }
    }
    None
}

/// Lowercase with whitespace runs collapsed to one space.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
