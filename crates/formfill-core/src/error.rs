use shared_pdf::DocumentError;
use thiserror::Error;

/// Operation-level failures. Problems with a single field never surface
/// here; they demote that field to the summary page instead.
#[derive(Error, Debug)]
pub enum FillError {
    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    #[error("Failed to serialize document: {0}")]
    Serialization(String),

    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl FillError {
    /// True for failures that abort a whole fill: the input could not be
    /// opened or the result could not be written out.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FillError::UnreadableDocument(_) | FillError::Serialization(_)
        )
    }
}
