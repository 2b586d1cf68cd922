//! PDF parsing and page access using lopdf

use crate::capability::{FormDocument, NativeField, OverlayStyle, PdfBackend};
use crate::error::DocumentError;
use crate::geometry::{Matrix, PageGeometry, Point, Rect, Rotation};
use crate::text::{extract_glyphs, group_lines, search_lines, Glyph};
use crate::{acroform, convert, raster, writer};
use lopdf::{Dictionary, Document, Object, ObjectId};
use shared_types::SourceFormat;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Upper bound on `/Parent` hops when resolving inherited attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// Follow a reference to its target; non-references resolve to themselves.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_INHERIT_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

/// Extract a number from a PDF object
pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Parse a PDF rectangle array `[x1 y1 x2 y2]` with sorted corners.
pub(crate) fn parse_rect(doc: &Document, obj: &Object) -> Option<Rect> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let v: Vec<f64> = arr.iter().filter_map(|o| number(doc, o)).collect();
    if v.len() != 4 {
        return None;
    }
    let rect = Rect::new(v[0], v[1], v[2], v[3]).normalized();
    rect.is_finite().then_some(rect)
}

pub(crate) fn rect_to_object(rect: &Rect) -> Object {
    Object::Array(
        rect.to_array()
            .iter()
            .map(|v| Object::Real(*v as f32))
            .collect(),
    )
}

/// Look up `key` on a node of the page tree, walking up `/Parent` when absent.
pub(crate) fn resolve_inherited<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = dict;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        current = current
            .get(b"Parent")
            .ok()
            .and_then(|parent| resolve_dict(doc, parent))?;
    }
    None
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// one byte per character.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string, preferring the single-byte form when it suffices.
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.chars().all(|c| (c as u32) < 0x80) {
        return Object::string_literal(text.as_bytes().to_vec());
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

/// Wrapper around lopdf::Document exposing pages in page space.
pub struct PdfDocument {
    pub(crate) doc: Document,
    page_ids: Vec<ObjectId>,
    glyph_cache: RefCell<HashMap<ObjectId, Rc<Vec<Glyph>>>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.page_ids.len())
            .finish()
    }
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Parse(e.to_string()))?;
        let pdf = Self::from_document(doc);
        if pdf.page_ids.is_empty() {
            return Err(DocumentError::Parse("document has no pages".to_string()));
        }
        Ok(pdf)
    }

    pub fn from_document(doc: Document) -> Self {
        let page_ids = doc.get_pages().values().copied().collect();
        Self {
            doc,
            page_ids,
            glyph_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Re-read the page tree after pages were added.
    pub(crate) fn refresh_pages(&mut self) {
        self.page_ids = self.doc.get_pages().values().copied().collect();
    }

    pub(crate) fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// Get page object ID for a 0-based page index
    pub(crate) fn page_id(&self, page: usize) -> Result<ObjectId, DocumentError> {
        self.page_ids
            .get(page)
            .copied()
            .ok_or(DocumentError::PageOutOfRange {
                index: page,
                count: self.page_ids.len(),
            })
    }

    pub(crate) fn page_dict(&self, page: usize) -> Result<&Dictionary, DocumentError> {
        let id = self.page_id(page)?;
        self.doc
            .get_dictionary(id)
            .map_err(|e| DocumentError::Parse(format!("page {}: {}", page, e)))
    }

    /// The MediaBox in PDF user space, defaulting to US Letter.
    fn user_media_box(&self, page: usize) -> Result<Rect, DocumentError> {
        let dict = self.page_dict(page)?;
        let media_box = resolve_inherited(&self.doc, dict, b"MediaBox")
            .and_then(|o| parse_rect(&self.doc, o))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| {
                tracing::debug!("Page {} has no usable MediaBox, assuming Letter", page);
                Rect::new(0.0, 0.0, 612.0, 792.0)
            });
        Ok(media_box)
    }

    /// Maps PDF user space (y up) into page space (y down from the MediaBox top).
    pub(crate) fn user_to_page(&self, page: usize) -> Result<Matrix, DocumentError> {
        let mb = self.user_media_box(page)?;
        Ok(Matrix::new(1.0, 0.0, 0.0, -1.0, -mb.x0, mb.y1))
    }

    /// Inverse of [`Self::user_to_page`].
    pub(crate) fn page_to_user(&self, page: usize) -> Result<Matrix, DocumentError> {
        let mb = self.user_media_box(page)?;
        Ok(Matrix::new(1.0, 0.0, 0.0, -1.0, mb.x0, mb.y1))
    }

    pub fn geometry(&self, page: usize) -> Result<PageGeometry, DocumentError> {
        let dict = self.page_dict(page)?;
        let user_media = self.user_media_box(page)?;
        let to_page = self.user_to_page(page)?;
        let media_box = user_media.transform(&to_page);

        let crop_box = resolve_inherited(&self.doc, dict, b"CropBox")
            .and_then(|o| parse_rect(&self.doc, o))
            .map(|r| r.transform(&to_page).intersection(&media_box))
            .filter(|r| !r.is_empty())
            .unwrap_or(media_box);

        let degrees = resolve_inherited(&self.doc, dict, b"Rotate")
            .and_then(|o| number(&self.doc, o))
            .unwrap_or(0.0) as i64;
        let rotation = Rotation::from_degrees(degrees).unwrap_or_else(|| {
            tracing::warn!("Page {} has non-cardinal rotation {}, ignoring", page, degrees);
            Rotation::Deg0
        });

        Ok(PageGeometry::new(media_box, crop_box, rotation))
    }

    /// Positioned glyphs of a page, cached until the page content changes.
    pub(crate) fn glyphs(&self, page: usize) -> Result<Rc<Vec<Glyph>>, DocumentError> {
        let id = self.page_id(page)?;
        if let Some(cached) = self.glyph_cache.borrow().get(&id) {
            return Ok(Rc::clone(cached));
        }

        let dict = self.page_dict(page)?;
        let content = match self.doc.get_page_content(id) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Page {} has no readable content: {}", page, e);
                Vec::new()
            }
        };
        let resources =
            resolve_inherited(&self.doc, dict, b"Resources").and_then(|o| resolve_dict(&self.doc, o));
        let glyphs = Rc::new(extract_glyphs(
            &self.doc,
            &content,
            resources,
            self.user_to_page(page)?,
        ));
        tracing::trace!("Extracted {} glyphs from page {}", glyphs.len(), page);

        self.glyph_cache
            .borrow_mut()
            .insert(id, Rc::clone(&glyphs));
        Ok(glyphs)
    }

    pub(crate) fn invalidate_page(&self, page: usize) {
        if let Some(id) = self.page_ids.get(page) {
            self.glyph_cache.borrow_mut().remove(id);
        }
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, DocumentError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| DocumentError::Save(e.to_string()))?;
        Ok(buffer)
    }
}

impl FormDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, DocumentError> {
        self.geometry(page)
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        let glyphs = self.glyphs(page)?;
        let lines: Vec<String> = group_lines(glyphs.iter())
            .iter()
            .map(|line| line.text())
            .collect();
        Ok(lines.join("\n"))
    }

    fn search_text(
        &self,
        page: usize,
        query: &str,
        clip: Option<Rect>,
    ) -> Result<Vec<Rect>, DocumentError> {
        let glyphs = self.glyphs(page)?;
        let lines = match clip {
            Some(clip) => group_lines(
                glyphs
                    .iter()
                    .filter(|g| clip.contains_point(g.rect.center())),
            ),
            None => group_lines(glyphs.iter()),
        };
        Ok(search_lines(&lines, query))
    }

    fn native_fields(&self) -> Result<Vec<NativeField>, DocumentError> {
        acroform::collect_fields(self)
    }

    fn set_native_field_value(&mut self, name: &str, value: &str) -> Result<(), DocumentError> {
        acroform::set_field_value(self, name, value)
    }

    fn add_overlay_field(
        &mut self,
        page: usize,
        rect: Rect,
        name: &str,
        value: &str,
        style: &OverlayStyle,
    ) -> Result<(), DocumentError> {
        writer::add_overlay_field(self, page, rect, name, value, style)
    }

    fn append_page(&mut self, width: f64, height: f64) -> Result<usize, DocumentError> {
        writer::append_page(self, width, height)
    }

    fn insert_text(
        &mut self,
        page: usize,
        origin: Point,
        text: &str,
        font_size: f64,
    ) -> Result<(), DocumentError> {
        writer::insert_text(self, page, origin, text, font_size)
    }

    fn rasterize(&self, page: usize, scale: f64) -> Result<Vec<u8>, DocumentError> {
        raster::render_layout(self, page, scale)
    }

    fn serialize(&mut self) -> Result<Vec<u8>, DocumentError> {
        self.save_to_bytes()
    }
}

/// [`PdfBackend`] built on lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    type Document = PdfDocument;

    fn open(bytes: &[u8], format: SourceFormat) -> Result<PdfDocument, DocumentError> {
        match format {
            SourceFormat::Pdf => PdfDocument::from_bytes(bytes).or_else(|pdf_err| {
                tracing::debug!("Not a PDF ({}), trying image conversion", pdf_err);
                convert::convert_image(bytes).map_err(|_| pdf_err)
            }),
            SourceFormat::Image => convert::convert_image(bytes).or_else(|img_err| {
                tracing::debug!("Not an image ({}), trying PDF", img_err);
                PdfDocument::from_bytes(bytes).map_err(|_| img_err)
            }),
        }
    }

    fn convert_image(bytes: &[u8]) -> Result<PdfDocument, DocumentError> {
        convert::convert_image(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn single_page(media_box: Vec<Object>, extra: Dictionary, content: &str) -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        for (k, v) in extra.iter() {
            page.set(k.clone(), v.clone());
        }
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_document(doc)
    }

    #[test]
    fn test_from_bytes_garbage_fails() {
        let result = PdfDocument::from_bytes(&[0u8; 100]);
        assert!(matches!(result, Err(DocumentError::Parse(_))));
    }

    #[test]
    fn test_from_bytes_html_fails() {
        let html = b"<!DOCTYPE html><html><body>Not a PDF</body></html>";
        assert!(PdfDocument::from_bytes(html).is_err());
    }

    #[test]
    fn test_inherited_media_box_and_rotation() {
        let pdf = single_page(
            vec![0.into(), 0.into(), 300.into(), 400.into()],
            dictionary! { "Rotate" => -90 },
            "",
        );
        let geom = pdf.geometry(0).unwrap();
        assert_eq!(geom.media_box, Rect::new(0.0, 0.0, 300.0, 400.0));
        assert_eq!(geom.crop_box, geom.media_box);
        assert_eq!(geom.rotation, Rotation::Deg270);
    }

    #[test]
    fn test_crop_box_in_page_space() {
        let pdf = single_page(
            vec![0.into(), 0.into(), 612.into(), 792.into()],
            dictionary! { "CropBox" => vec![10.into(), 20.into(), 600.into(), 700.into()] },
            "",
        );
        let geom = pdf.geometry(0).unwrap();
        // User y=700 is 92 below the top edge.
        assert_eq!(geom.crop_box, Rect::new(10.0, 92.0, 600.0, 772.0));
    }

    #[test]
    fn test_page_out_of_range() {
        let pdf = single_page(vec![0.into(), 0.into(), 612.into(), 792.into()], dictionary! {}, "");
        assert!(matches!(
            pdf.geometry(3),
            Err(DocumentError::PageOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_search_and_page_text() {
        let pdf = single_page(
            vec![0.into(), 0.into(), 612.into(), 792.into()],
            dictionary! {},
            "BT /F1 12 Tf 72 700 Td (Full Name: ______) Tj ET",
        );
        assert_eq!(pdf.page_text(0).unwrap(), "Full Name: ______");
        let hits = pdf.search_text(0, "FULL NAME", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].x0 - 72.0).abs() < 1e-6);
        assert!(hits[0].y0 < 92.0 && hits[0].y1 > 92.0);

        let clip = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!(pdf.search_text(0, "Full Name", Some(clip)).unwrap().is_empty());
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Name"), "Name");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "A\u{e9}");
        assert_eq!(decode_text_string(&[0xE9]), "\u{e9}");
    }

    #[test]
    fn test_encode_text_string_uses_utf16_for_non_ascii() {
        match encode_text_string("Jos\u{e9}") {
            Object::String(bytes, _) => assert_eq!(&bytes[..2], &[0xFE, 0xFF]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            decode_text_string(encode_text_string("plain").as_str().unwrap()),
            "plain"
        );
    }
}
