use crate::config::RenderConfig;
use crate::error::FillError;
use shared_pdf::FormDocument;

/// PNG preview of one page (0-based) in its displayed orientation.
pub fn render_page<D: FormDocument>(
    doc: &D,
    page_index: usize,
    config: &RenderConfig,
) -> Result<Vec<u8>, FillError> {
    let count = doc.page_count();
    if page_index >= count {
        return Err(FillError::PageOutOfRange {
            index: page_index,
            count,
        });
    }
    doc.rasterize(page_index, config.scale)
        .map_err(|e| FillError::Render(e.to_string()))
}
