//! Filling schema-described answers into PDF forms
//!
//! [`FillEngine`] is the entry point. Answers go into native AcroForm fields
//! where a field name matches the schema label ([`matcher`]), otherwise into
//! overlay fields placed next to the printed label ([`locator`]), and
//! whatever is left onto an appended summary page ([`summary`]).
//! [`normalize`] maps search hits onto rendered page previews.

pub mod config;
pub mod error;
pub mod fill;
pub mod locator;
pub mod matcher;
pub mod normalize;
pub mod render;
pub mod summary;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, LocatorConfig, MatcherConfig, RenderConfig, SummaryConfig};
pub use error::FillError;
pub use fill::{FieldOutcome, FillEngine, FillMetrics, FillReport, FillResult, OverflowReason};
pub use locator::{LineLocator, LocateMethod, LocationAssignment};
pub use matcher::{FieldMatcher, NativeFieldAssignment};
pub use normalize::{fallback_query, normalize_hits, normalize_rect, search_document, SearchMatch};
pub use render::render_page;
pub use summary::SummaryWriter;
