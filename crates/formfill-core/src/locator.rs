//! Visual placement of answers next to printed labels
//!
//! When a document has no native field for a schema field, the answer is
//! written where a person would write it: on the nearest underscore or dot
//! run to the right of or below the label. Without such a run, a fixed box
//! to the right of the label is used.

use crate::config::LocatorConfig;
use serde::{Deserialize, Serialize};
use shared_pdf::{DocumentError, FormDocument, Rect};

/// Pages with less extracted text than this are probably scans.
const SPARSE_TEXT_CHARS: usize = 10;
/// Horizontal slack when joining placeholder hits into one run.
const RUN_JOIN_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateMethod {
    /// An underscore or dot run near the label
    VisualLine,
    /// Fixed-size box to the right of the label
    FallbackRight,
}

impl LocateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocateMethod::VisualLine => "visual_line",
            LocateMethod::FallbackRight => "fallback_right",
        }
    }
}

/// Where one field's answer goes, in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAssignment {
    pub field_id: String,
    pub page_index: usize,
    pub rect: Rect,
    pub method: LocateMethod,
}

#[derive(Debug, Clone, Default)]
pub struct LineLocator {
    config: LocatorConfig,
}

impl LineLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Warn about pages whose text layer is nearly empty. Returns how many
    /// such pages were found.
    pub fn check_text_layer<D: FormDocument>(&self, doc: &D) -> usize {
        let mut sparse = 0;
        for page in 0..doc.page_count() {
            let chars = match doc.page_text(page) {
                Ok(text) => text.chars().filter(|c| !c.is_whitespace()).count(),
                Err(e) => {
                    tracing::warn!("Page {}: text extraction failed: {}", page, e);
                    0
                }
            };
            if chars < SPARSE_TEXT_CHARS {
                tracing::warn!(
                    "Page {} has very little text ({} chars); it may be a scan and labels will not be found",
                    page,
                    chars
                );
                sparse += 1;
            }
        }
        sparse
    }

    /// Find the writing area for `label`. The first hit on the first page
    /// containing the label decides; `None` when no page contains it.
    pub fn locate<D: FormDocument>(
        &self,
        doc: &D,
        field_id: &str,
        label: &str,
    ) -> Result<Option<LocationAssignment>, DocumentError> {
        if label.trim().is_empty() {
            return Ok(None);
        }

        for page in 0..doc.page_count() {
            let Some(label_rect) = doc.search_text(page, label, None)?.into_iter().next() else {
                continue;
            };
            let geometry = doc.page_geometry(page)?;
            let roi = self.region_of_interest(&label_rect, geometry.crop_box.x1);

            let underscores = "_".repeat(self.config.min_pattern_len);
            let dots = ".".repeat(self.config.min_pattern_len);
            let mut hits = doc.search_text(page, &underscores, Some(roi))?;
            hits.extend(doc.search_text(page, &dots, Some(roi))?);
            let candidates = merge_runs(hits);

            let (rect, method) = self.place(&label_rect, &candidates);
            tracing::debug!(
                "Located '{}' on page {} via {} at {:?}",
                field_id,
                page,
                method.as_str(),
                rect.to_array()
            );
            return Ok(Some(LocationAssignment {
                field_id: field_id.to_string(),
                page_index: page,
                rect,
                method,
            }));
        }

        tracing::debug!("Label '{}' for '{}' not found on any page", label, field_id);
        Ok(None)
    }

    /// Search area for blanks: from just above the label, rightwards to the
    /// page edge and a little below it.
    pub fn region_of_interest(&self, label: &Rect, page_right: f64) -> Rect {
        Rect::new(
            label.x0,
            label.y0 - self.config.roi_above,
            page_right,
            label.y1 + self.config.roi_below,
        )
    }

    /// Pick the best candidate for `label`, or the fallback box.
    pub fn place(&self, label: &Rect, candidates: &[Rect]) -> (Rect, LocateMethod) {
        let mut best: Option<(&Rect, f64)> = None;

        for line in candidates {
            let score = if (line.y1 - label.y1).abs() < self.config.same_line_tolerance
                && line.x0 > label.x0
            {
                line.x0 - label.x1
            } else if line.y0 > label.y0 {
                let dx = line.x0 - label.x0;
                let dy = line.y0 - label.y1;
                (dx * dx + dy * dy).sqrt() * self.config.below_penalty
            } else {
                continue;
            };
            tracing::trace!("Candidate {:?} scored {:.2}", line.to_array(), score);

            if best.map_or(true, |(_, s)| score < s) {
                best = Some((line, score));
            }
        }

        match best {
            Some((line, _)) => (
                Rect::new(line.x0, line.y0 - self.config.line_lift, line.x1, line.y1),
                LocateMethod::VisualLine,
            ),
            None => (
                Rect::new(
                    label.x1 + self.config.fallback_gap,
                    label.y0,
                    label.x1 + self.config.fallback_gap + self.config.fallback_width,
                    label.y1,
                ),
                LocateMethod::FallbackRight,
            ),
        }
    }
}

fn same_line(a: &Rect, b: &Rect) -> bool {
    let overlap = a.y1.min(b.y1) - a.y0.max(b.y0);
    overlap > 0.5 * a.height().min(b.height())
}

/// Join placeholder hits that touch on the same line, so a long blank is one
/// candidate rather than several four-character pieces.
pub(crate) fn merge_runs(hits: Vec<Rect>) -> Vec<Rect> {
    let mut runs: Vec<Rect> = Vec::with_capacity(hits.len());
    for hit in hits {
        let joined = runs.iter_mut().find(|run| {
            same_line(run, &hit)
                && hit.x0 <= run.x1 + RUN_JOIN_TOLERANCE
                && hit.x1 >= run.x0 - RUN_JOIN_TOLERANCE
        });
        match joined {
            Some(run) => *run = run.union(&hit),
            None => runs.push(hit),
        }
    }
    runs
}
