//! The fill pipeline
//!
//! Each answer ends up in exactly one place: a native form field, a new
//! overlay field next to its printed label, or a line on an appended summary
//! page. Native fields are tried first, then visual placement, then the
//! summary.

use crate::config::EngineConfig;
use crate::error::FillError;
use crate::locator::{LineLocator, LocateMethod, LocationAssignment};
use crate::matcher::FieldMatcher;
use crate::normalize::{search_document, SearchMatch};
use crate::render::render_page;
use crate::summary::SummaryWriter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shared_pdf::{FormDocument, PdfBackend, Rect};
use shared_types::{FormData, Schema, SourceFormat};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// A partial field name for the overlay carrying `id`.
///
/// `.` separates the parts of a qualified field name, so it is replaced.
/// Names already in the document get a numeric suffix. The chosen name is
/// added to `taken`.
fn overlay_field_name(id: &str, taken: &mut HashSet<String>) -> String {
    let base = id.replace('.', "_");
    let mut name = base.clone();
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    taken.insert(name.clone());
    name
}

/// Why a value went to the summary page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum OverflowReason {
    /// The id is not part of the schema.
    NotInSchema,
    /// No native field matched and the label was not found on any page.
    LabelNotFound,
    /// A location was found but the overlay could not be created there.
    RegionInvalid(String),
}

/// Terminal state of one form data entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FieldOutcome {
    Native {
        native_name: String,
    },
    Visual {
        page_index: usize,
        rect: Rect,
        method: LocateMethod,
    },
    Overflowed {
        reason: OverflowReason,
    },
}

/// Per-field outcomes in form data order. Null values are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub outcomes: IndexMap<String, FieldOutcome>,
    /// Indices of the appended summary pages.
    pub summary_pages: Vec<usize>,
    /// Pages with too little text to locate labels on.
    pub sparse_pages: usize,
}

impl FillReport {
    fn ids_where(&self, pred: impl Fn(&FieldOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn natively_handled(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, FieldOutcome::Native { .. }))
    }

    pub fn visually_handled(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, FieldOutcome::Visual { .. }))
    }

    pub fn overflowed(&self) -> Vec<&str> {
        self.ids_where(|o| matches!(o, FieldOutcome::Overflowed { .. }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FillMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub processing_time_ms: u64,
}

/// Serialized output of a fill plus what happened to each field.
#[derive(Debug, Clone)]
pub struct FillResult {
    pub pdf: Vec<u8>,
    pub report: FillReport,
    pub metrics: FillMetrics,
}

/// Stateless entry point; holds only configuration, so one engine can serve
/// any number of independent calls.
#[derive(Debug, Clone, Default)]
pub struct FillEngine {
    config: EngineConfig,
}

impl FillEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn open<B: PdfBackend>(bytes: &[u8], format: SourceFormat) -> Result<B::Document, FillError> {
        B::open(bytes, format).map_err(|e| FillError::UnreadableDocument(e.to_string()))
    }

    /// Open `bytes`, fill in `data` and serialize the result.
    pub fn fill<B: PdfBackend>(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        schema: &Schema,
        data: &FormData,
    ) -> Result<FillResult, FillError> {
        let start = Instant::now();
        let mut doc = Self::open::<B>(bytes, format)?;
        let report = self.fill_document(&mut doc, schema, data)?;
        let pdf = doc
            .serialize()
            .map_err(|e| FillError::Serialization(e.to_string()))?;

        let metrics = FillMetrics {
            input_size_bytes: bytes.len(),
            output_size_bytes: pdf.len(),
            page_count: doc.page_count(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Filled document: {} native, {} visual, {} overflowed, {} pages, {} bytes in {}ms",
            report.natively_handled().len(),
            report.visually_handled().len(),
            report.overflowed().len(),
            metrics.page_count,
            metrics.output_size_bytes,
            metrics.processing_time_ms
        );
        Ok(FillResult {
            pdf,
            report,
            metrics,
        })
    }

    /// Fill an already open document in place.
    pub fn fill_document<D: FormDocument>(
        &self,
        doc: &mut D,
        schema: &Schema,
        data: &FormData,
    ) -> Result<FillReport, FillError> {
        let mut report = FillReport::default();

        let (native, mut taken_names) = self.fill_native(doc, schema, data);

        let pending: Vec<_> = schema
            .fields
            .iter()
            .filter(|f| !native.contains_key(f.id.as_str()) && data.present_value(&f.id).is_some())
            .collect();
        let mut locations: HashMap<&str, LocationAssignment> = HashMap::new();
        if !pending.is_empty() {
            let locator = LineLocator::new(self.config.locator.clone());
            report.sparse_pages = locator.check_text_layer(doc);
            for field in pending {
                match locator.locate(doc, &field.id, &field.label) {
                    Ok(Some(location)) => {
                        locations.insert(field.id.as_str(), location);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Locating '{}' failed: {}", field.id, e),
                }
            }
        }

        let mut overflow = Vec::new();
        for (id, value) in data.present() {
            if let Some(native_name) = native.get(id) {
                report.outcomes.insert(
                    id.to_string(),
                    FieldOutcome::Native {
                        native_name: native_name.clone(),
                    },
                );
                continue;
            }

            let reason = match locations.get(id) {
                Some(loc) => match doc.add_overlay_field(
                    loc.page_index,
                    loc.rect,
                    &overlay_field_name(id, &mut taken_names),
                    &value,
                    &self.config.overlay,
                ) {
                    Ok(()) => {
                        tracing::debug!(
                            "Overlay '{}' on page {} at {:?}",
                            id,
                            loc.page_index,
                            loc.rect.to_array()
                        );
                        report.outcomes.insert(
                            id.to_string(),
                            FieldOutcome::Visual {
                                page_index: loc.page_index,
                                rect: loc.rect,
                                method: loc.method,
                            },
                        );
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("Overlay for '{}' failed: {}", id, e);
                        OverflowReason::RegionInvalid(e.to_string())
                    }
                },
                None if schema.field(id).is_none() => OverflowReason::NotInSchema,
                None => OverflowReason::LabelNotFound,
            };

            overflow.push((schema.label_for(id).to_string(), value));
            report
                .outcomes
                .insert(id.to_string(), FieldOutcome::Overflowed { reason });
        }

        report.summary_pages = SummaryWriter::new(self.config.summary.clone()).write(doc, &overflow)?;
        Ok(report)
    }

    /// Write values into matched native fields. Returns field id to native
    /// name for every successful write, plus every native field name in the
    /// document; failed writes are left for visual placement.
    fn fill_native<D: FormDocument>(
        &self,
        doc: &mut D,
        schema: &Schema,
        data: &FormData,
    ) -> (HashMap<String, String>, HashSet<String>) {
        let mut handled = HashMap::new();

        let names: Vec<String> = match doc.native_fields() {
            Ok(fields) => fields.into_iter().map(|f| f.name).collect(),
            Err(e) => {
                tracing::warn!("Could not enumerate native fields: {}", e);
                return (handled, HashSet::new());
            }
        };
        if names.is_empty() {
            return (handled, HashSet::new());
        }

        let matcher = FieldMatcher::new(&self.config.matcher);
        for assignment in matcher.match_fields(schema, &names) {
            let Some(value) = data.present_value(&assignment.field_id) else {
                continue;
            };
            match doc.set_native_field_value(&assignment.native_name, &value) {
                Ok(()) => {
                    tracing::debug!(
                        "Filled native field '{}' for '{}'",
                        assignment.native_name,
                        assignment.field_id
                    );
                    handled.insert(assignment.field_id, assignment.native_name);
                }
                Err(e) => tracing::warn!(
                    "Native field '{}' for '{}' not filled: {}",
                    assignment.native_name,
                    assignment.field_id,
                    e
                ),
            }
        }
        (handled, names.into_iter().collect())
    }

    /// Every occurrence of `query`, normalized to the rendered page frame.
    pub fn search<B: PdfBackend>(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        query: &str,
    ) -> Result<Vec<SearchMatch>, FillError> {
        let doc = Self::open::<B>(bytes, format)?;
        search_document(&doc, query)
    }

    /// PNG preview of `page_index` (0-based).
    pub fn render<B: PdfBackend>(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        page_index: usize,
    ) -> Result<Vec<u8>, FillError> {
        let doc = Self::open::<B>(bytes, format)?;
        render_page(&doc, page_index, &self.config.render)
    }
}
