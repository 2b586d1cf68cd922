//! In-memory [`FormDocument`] for unit tests
//!
//! Text is laid out as single-line items with a fixed advance per
//! character, so hit rectangles are easy to predict.

use shared_pdf::{
    DocumentError, FormDocument, NativeField, OverlayStyle, PageGeometry, Point, Rect,
};
use std::collections::HashSet;

pub(crate) const CHAR_WIDTH: f64 = 6.0;
pub(crate) const LINE_HEIGHT: f64 = 12.0;

#[derive(Debug, Clone)]
pub(crate) struct TextItem {
    pub text: String,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub(crate) struct FakePage {
    pub geometry: PageGeometry,
    pub items: Vec<TextItem>,
}

impl FakePage {
    pub fn letter() -> Self {
        Self::sized(612.0, 792.0)
    }

    pub fn sized(width: f64, height: f64) -> Self {
        let r = Rect::new(0.0, 0.0, width, height);
        Self {
            geometry: PageGeometry::new(r, r, Default::default()),
            items: Vec::new(),
        }
    }

    /// Place `text` with its top-left corner at (`x`, `y`).
    pub fn with_text(mut self, text: &str, x: f64, y: f64) -> Self {
        let width = text.chars().count() as f64 * CHAR_WIDTH;
        self.items.push(TextItem {
            text: text.to_string(),
            rect: Rect::new(x, y, x + width, y + LINE_HEIGHT),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Overlay {
    pub page: usize,
    pub rect: Rect,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertedText {
    pub page: usize,
    pub origin: Point,
    pub text: String,
    pub font_size: f64,
}

#[derive(Debug, Default)]
pub(crate) struct FakeDocument {
    pub pages: Vec<FakePage>,
    pub native: Vec<NativeField>,
    pub failing_native: HashSet<String>,
    /// Lines `insert_text` refuses to draw.
    pub failing_text: HashSet<String>,
    pub native_values: Vec<(String, String)>,
    pub overlays: Vec<Overlay>,
    pub inserted: Vec<InsertedText>,
}

impl FakeDocument {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_native(mut self, name: &str) -> Self {
        self.native.push(NativeField {
            name: name.to_string(),
            page_index: 0,
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
        });
        self
    }

    fn page(&self, page: usize) -> Result<&FakePage, DocumentError> {
        self.pages.get(page).ok_or(DocumentError::PageOutOfRange {
            index: page,
            count: self.pages.len(),
        })
    }
}

fn find_all(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut out = Vec::new();
    if needle.is_empty() {
        return out;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack[i..i + needle.len()] == needle[..] {
            out.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    out
}

impl FormDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, DocumentError> {
        Ok(self.page(page)?.geometry)
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        let texts: Vec<&str> = self.page(page)?.items.iter().map(|i| i.text.as_str()).collect();
        Ok(texts.join("\n"))
    }

    fn search_text(
        &self,
        page: usize,
        query: &str,
        clip: Option<Rect>,
    ) -> Result<Vec<Rect>, DocumentError> {
        let needle: Vec<char> = query.to_lowercase().chars().collect();
        let mut hits = Vec::new();
        for item in &self.page(page)?.items {
            let chars: Vec<char> = item.text.to_lowercase().chars().collect();
            let center_y = (item.rect.y0 + item.rect.y1) / 2.0;
            // Characters whose centers fall inside the clip.
            let (lo, hi) = match clip {
                Some(c) if center_y < c.y0 || center_y > c.y1 => continue,
                Some(c) => {
                    let inside = |i: usize| {
                        let cx = item.rect.x0 + (i as f64 + 0.5) * CHAR_WIDTH;
                        cx >= c.x0 && cx <= c.x1
                    };
                    let lo = (0..chars.len()).find(|&i| inside(i)).unwrap_or(chars.len());
                    let hi = (lo..chars.len()).take_while(|&i| inside(i)).last().map_or(lo, |i| i + 1);
                    (lo, hi)
                }
                None => (0, chars.len()),
            };
            for start in find_all(&chars[lo..hi], &needle) {
                let start = lo + start;
                let x0 = item.rect.x0 + start as f64 * CHAR_WIDTH;
                hits.push(Rect::new(
                    x0,
                    item.rect.y0,
                    x0 + needle.len() as f64 * CHAR_WIDTH,
                    item.rect.y1,
                ));
            }
        }
        Ok(hits)
    }

    fn native_fields(&self) -> Result<Vec<NativeField>, DocumentError> {
        Ok(self.native.clone())
    }

    fn set_native_field_value(&mut self, name: &str, value: &str) -> Result<(), DocumentError> {
        if self.failing_native.contains(name) {
            return Err(DocumentError::FieldNotWritable(name.to_string()));
        }
        if !self.native.iter().any(|f| f.name == name) {
            return Err(DocumentError::FieldNotFound(name.to_string()));
        }
        self.native_values.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn add_overlay_field(
        &mut self,
        page: usize,
        rect: Rect,
        name: &str,
        value: &str,
        _style: &OverlayStyle,
    ) -> Result<(), DocumentError> {
        let media = self.page(page)?.geometry.media_box;
        if !rect.is_finite() || rect.is_empty() || !rect.intersects(&media) {
            return Err(DocumentError::InvalidRegion(format!("{:?}", rect)));
        }
        self.overlays.push(Overlay {
            page,
            rect,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn append_page(&mut self, width: f64, height: f64) -> Result<usize, DocumentError> {
        self.pages.push(FakePage::sized(width, height));
        Ok(self.pages.len() - 1)
    }

    fn insert_text(
        &mut self,
        page: usize,
        origin: Point,
        text: &str,
        font_size: f64,
    ) -> Result<(), DocumentError> {
        self.page(page)?;
        if self.failing_text.contains(text) {
            return Err(DocumentError::Parse(format!("cannot draw {:?}", text)));
        }
        self.inserted.push(InsertedText {
            page,
            origin,
            text: text.to_string(),
            font_size,
        });
        Ok(())
    }

    fn rasterize(&self, page: usize, _scale: f64) -> Result<Vec<u8>, DocumentError> {
        self.page(page)?;
        Ok(b"\x89PNG".to_vec())
    }

    fn serialize(&mut self) -> Result<Vec<u8>, DocumentError> {
        Ok(format!(
            "{:?}|{:?}|{:?}|{}",
            self.native_values,
            self.overlays,
            self.inserted,
            self.pages.len()
        )
        .into_bytes())
    }
}
