//! The document operations the fill engine is written against
//!
//! The engine never touches a PDF library directly; it drives a
//! [`FormDocument`] opened by a [`PdfBackend`]. [`crate::LopdfBackend`] is the
//! default implementation.

use crate::error::DocumentError;
use crate::geometry::{PageGeometry, Point, Rect};
use serde::{Deserialize, Serialize};
use shared_types::SourceFormat;

/// Opens documents. Conversion of raster input into a page-based document
/// happens here, before any search or fill step.
pub trait PdfBackend {
    type Document: FormDocument;

    /// Open `bytes`, trusting `format` first.
    fn open(bytes: &[u8], format: SourceFormat) -> Result<Self::Document, DocumentError>;

    /// Wrap a raster image as a single-page document.
    fn convert_image(bytes: &[u8]) -> Result<Self::Document, DocumentError>;
}

/// A natively fillable (AcroForm) field widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeField {
    pub name: String,
    pub page_index: usize,
    pub rect: Rect,
}

/// Presentation of synthesized overlay fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub font_size: f64,
    /// RGB, each component in 0..=1.
    pub color: [f64; 3],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            color: [0.0, 0.0, 1.0],
        }
    }
}

/// One open document, exclusively owned by a single fill or search call.
///
/// Page indices are 0-based. All rectangles are in page space (see
/// [`crate::geometry`]).
pub trait FormDocument {
    fn page_count(&self) -> usize;

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, DocumentError>;

    /// Plain text of the page, one line per text line.
    fn page_text(&self, page: usize) -> Result<String, DocumentError>;

    /// Case-insensitive occurrences of `query`, optionally limited to glyphs
    /// whose centers fall inside `clip`.
    fn search_text(
        &self,
        page: usize,
        query: &str,
        clip: Option<Rect>,
    ) -> Result<Vec<Rect>, DocumentError>;

    /// Every native field widget, pages in order.
    fn native_fields(&self) -> Result<Vec<NativeField>, DocumentError>;

    /// Set and commit the value of the native field named `name`.
    fn set_native_field_value(&mut self, name: &str, value: &str) -> Result<(), DocumentError>;

    /// Create a new fillable text field at `rect` carrying `value`.
    fn add_overlay_field(
        &mut self,
        page: usize,
        rect: Rect,
        name: &str,
        value: &str,
        style: &OverlayStyle,
    ) -> Result<(), DocumentError>;

    /// Append a blank page and return its index.
    fn append_page(&mut self, width: f64, height: f64) -> Result<usize, DocumentError>;

    /// Draw `text` with its baseline starting at `origin`.
    fn insert_text(
        &mut self,
        page: usize,
        origin: Point,
        text: &str,
        font_size: f64,
    ) -> Result<(), DocumentError>;

    /// PNG bytes of the page in its displayed orientation.
    fn rasterize(&self, page: usize, scale: f64) -> Result<Vec<u8>, DocumentError>;

    fn serialize(&mut self) -> Result<Vec<u8>, DocumentError>;
}
