pub mod form_data;
pub mod types;

pub use form_data::{FieldValue, FormData, Scalar};
pub use types::{Field, FieldKind, Schema, SourceFormat};
