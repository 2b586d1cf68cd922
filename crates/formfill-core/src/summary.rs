//! Overflow pages for answers that found no place on the form

use crate::config::SummaryConfig;
use shared_pdf::{DocumentError, FormDocument, Point};

/// Writes `"<label>: <value>"` lines onto pages appended to the document.
#[derive(Debug, Clone, Default)]
pub struct SummaryWriter {
    config: SummaryConfig,
}

impl SummaryWriter {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    /// Append summary pages holding `entries` (label, value) in order.
    ///
    /// Nothing is appended for an empty list. A continuation page is only
    /// added once another entry actually needs it. Returns the indices of
    /// the appended pages. Fails if any line cannot be written, so every
    /// entry reported as overflowed is on a summary page.
    pub fn write<D: FormDocument>(
        &self,
        doc: &mut D,
        entries: &[(String, String)],
    ) -> Result<Vec<usize>, DocumentError> {
        let cfg = &self.config;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut page = doc.append_page(cfg.page_width, cfg.page_height)?;
        let mut pages = vec![page];
        doc.insert_text(
            page,
            Point::new(cfg.margin_x, cfg.heading_y),
            &cfg.heading,
            cfg.heading_size,
        )?;

        let mut y = cfg.first_entry_y;
        for (label, value) in entries {
            if y > cfg.max_y {
                page = doc.append_page(cfg.page_width, cfg.page_height)?;
                pages.push(page);
                y = cfg.continuation_y;
            }

            let line = format!("{}: {}", label, value);
            doc.insert_text(page, Point::new(cfg.margin_x, y), &line, cfg.entry_size)
                .map_err(|e| {
                    tracing::warn!("Summary line for '{}' not written: {}", label, e);
                    e
                })?;
            y += cfg.line_height;
        }

        tracing::debug!(
            "Wrote {} overflow entries on {} summary page(s)",
            entries.len(),
            pages.len()
        );
        Ok(pages)
    }
}
