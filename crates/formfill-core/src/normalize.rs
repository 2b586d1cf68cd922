//! Coordinate normalization for search hits
//!
//! Search hits come back in unrotated page space. A page preview is rendered
//! in the page's displayed orientation, cropped to its crop box. These
//! functions map hits into that preview frame as fractions of its width and
//! height, so a caller can overlay highlights at any resolution.

use crate::error::FillError;
use serde::{Deserialize, Serialize};
use shared_pdf::{FormDocument, PageGeometry, Rect};

/// Minimum length (exclusive) of a word eligible as a fallback query.
const FALLBACK_MIN_LEN: usize = 3;

/// One occurrence of a query, ready for a client that draws on page previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// 1-based page number
    pub page: usize,
    /// `[x0, y0, x1, y1]` as fractions of the rendered page
    pub rect: [f64; 4],
    pub text: String,
}

/// Map a page-space rectangle into the unit square of the rendered page.
///
/// The result is sorted (`x0 <= x1`, `y0 <= y1`) and clamped to `[0, 1]`.
pub fn normalize_rect(geometry: &PageGeometry, hit: &Rect) -> [f64; 4] {
    let frame = geometry.rotated_crop_box();
    let r = hit.transform(&geometry.rotation_matrix());

    let w = frame.width();
    let h = frame.height();
    if !(w > 0.0 && h > 0.0) {
        return [0.0, 0.0, 0.0, 0.0];
    }

    let mut x0 = (r.x0 - frame.x0) / w;
    let mut y0 = (r.y0 - frame.y0) / h;
    let mut x1 = (r.x1 - frame.x0) / w;
    let mut y1 = (r.y1 - frame.y0) / h;
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
    }
    if y0 > y1 {
        std::mem::swap(&mut y0, &mut y1);
    }

    [
        x0.clamp(0.0, 1.0),
        y0.clamp(0.0, 1.0),
        x1.clamp(0.0, 1.0),
        y1.clamp(0.0, 1.0),
    ]
}

pub fn normalize_hits(geometry: &PageGeometry, hits: &[Rect]) -> Vec<[f64; 4]> {
    hits.iter().map(|hit| normalize_rect(geometry, hit)).collect()
}

/// The longest word of a multi-word query that is longer than three
/// characters. The first of several equally long words wins.
pub fn fallback_query(query: &str) -> Option<&str> {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    let mut best: Option<&str> = None;
    for word in words {
        let len = word.chars().count();
        if len > FALLBACK_MIN_LEN && best.map_or(true, |b| len > b.chars().count()) {
            best = Some(word);
        }
    }
    best
}

/// Every occurrence of `query`, page by page, in normalized coordinates.
///
/// A page with no hit for a multi-word query is searched once more for the
/// query's longest word.
pub fn search_document<D: FormDocument>(
    doc: &D,
    query: &str,
) -> Result<Vec<SearchMatch>, FillError> {
    let fallback = fallback_query(query);
    let mut results = Vec::new();

    for page in 0..doc.page_count() {
        let geometry = doc.page_geometry(page)?;
        let mut hits = doc.search_text(page, query, None)?;
        if hits.is_empty() {
            if let Some(word) = fallback {
                hits = doc.search_text(page, word, None)?;
                if !hits.is_empty() {
                    tracing::debug!(
                        "Page {}: no hit for '{}', fell back to '{}'",
                        page + 1,
                        query,
                        word
                    );
                }
            }
        }

        for hit in &hits {
            let rect = normalize_rect(&geometry, hit);
            tracing::trace!(
                "Match '{}' page {} rotation {} -> {:?} -> {:?}",
                query,
                page + 1,
                geometry.rotation.degrees(),
                hit.to_array(),
                rect
            );
            results.push(SearchMatch {
                page: page + 1,
                rect,
                text: query.to_string(),
            });
        }
    }

    tracing::debug!("Search '{}' found {} matches", query, results.len());
    Ok(results)
}
