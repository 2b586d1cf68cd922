use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Form field not found: {0}")]
    FieldNotFound(String),

    #[error("Form field not writable: {0}")]
    FieldNotWritable(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),
}
