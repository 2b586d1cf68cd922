//! PDF document capabilities for form filling
//!
//! This crate wraps lopdf behind the [`FormDocument`] trait: page geometry,
//! positioned text search, native AcroForm fields, overlay fields, appended
//! pages and a layout rasterizer. Everything is expressed in page space
//! (see [`geometry`]).

mod acroform;
pub mod capability;
mod convert;
mod encoding;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod parser;
mod raster;
mod text;
mod writer;

pub use capability::{FormDocument, NativeField, OverlayStyle, PdfBackend};
pub use error::DocumentError;
pub use geometry::{Matrix, PageGeometry, Point, Rect, Rotation};
pub use metrics::helvetica_text_width;
pub use parser::{LopdfBackend, PdfDocument};
