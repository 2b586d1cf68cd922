//! Document mutation: overlay fields, appended pages and inserted text

use crate::capability::OverlayStyle;
use crate::encoding::unicode_to_win_ansi;
use crate::error::DocumentError;
use crate::geometry::{Point, Rect};
use crate::parser::{
    encode_text_string, rect_to_object, resolve, resolve_dict, resolve_inherited, PdfDocument,
};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Font resource name used in field appearances and `/DA` strings.
const FIELD_FONT: &str = "Helv";
/// Font resource name added to pages that receive inserted text.
const TEXT_FONT: &str = "FFill";

/// Escape `s` for a PDF string literal shown in a WinAnsi font.
///
/// Characters past ASCII are written as octal codes; those WinAnsi cannot
/// represent become `?`.
pub(crate) fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            '\n' | '\r' | '\t' => " ".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => match unicode_to_win_ansi(c) {
                Some(code) => format!("\\{:03o}", code),
                None => "?".to_string(),
            },
        })
        .collect()
}

fn helvetica() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

fn font_resources(name: &str) -> Dictionary {
    let mut fonts = Dictionary::new();
    fonts.set(name, Object::Dictionary(helvetica()));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

fn fmt_color(color: [f64; 3]) -> String {
    format!("{} {} {}", color[0], color[1], color[2])
}

/// Form XObject showing `value` on one line inside a `width`×`height` box.
pub(crate) fn text_appearance(
    width: f64,
    height: f64,
    value: &str,
    font_size: f64,
    color: [f64; 3],
) -> Stream {
    let baseline = ((height - font_size) / 2.0 + 0.21 * font_size).max(1.0);
    let content = format!(
        "/Tx BMC\n\
q\n\
BT\n\
/{font} {fs} Tf\n\
{rgb} rg\n\
2 {y} Td\n\
({text}) Tj\n\
ET\n\
Q\n\
EMC",
        font = FIELD_FONT,
        fs = font_size,
        rgb = fmt_color(color),
        y = baseline,
        text = escape_pdf_string(value),
    );

    let mut stream_dict = Dictionary::new();
    stream_dict.set("Type", Object::Name(b"XObject".to_vec()));
    stream_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    stream_dict.set("FormType", Object::Integer(1));
    stream_dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ]),
    );
    stream_dict.set("Resources", Object::Dictionary(font_resources(FIELD_FONT)));

    Stream::new(stream_dict, content.into_bytes())
}

/// Get or create the catalog's AcroForm as an indirect object.
pub(crate) fn ensure_acroform(doc: &mut Document) -> Result<ObjectId, DocumentError> {
    let existing = doc
        .catalog()
        .map_err(|e| DocumentError::Parse(format!("Failed to get catalog: {}", e)))?
        .get(b"AcroForm")
        .ok()
        .cloned();

    let acroform_id = match existing {
        Some(Object::Reference(id)) => id,
        other => {
            // Inline dictionaries are moved out so they can be shared by id.
            let acroform = match other {
                Some(Object::Dictionary(dict)) => dict,
                _ => {
                    let mut dict = Dictionary::new();
                    dict.set("Fields", Object::Array(vec![]));
                    dict
                }
            };
            let id = doc.add_object(Object::Dictionary(acroform));
            doc.catalog_mut()
                .map_err(|e| DocumentError::Parse(format!("Failed to get catalog: {}", e)))?
                .set("AcroForm", Object::Reference(id));
            id
        }
    };
    Ok(acroform_id)
}

fn add_to_acroform(doc: &mut Document, field_id: ObjectId) -> Result<(), DocumentError> {
    let acroform_id = ensure_acroform(doc)?;

    let mut fields = match doc.get_dictionary(acroform_id).ok().and_then(|f| f.get(b"Fields").ok()) {
        Some(obj) => resolve(doc, obj).as_array().cloned().unwrap_or_default(),
        None => vec![],
    };
    let has_dr = doc
        .get_dictionary(acroform_id)
        .map(|f| f.has(b"DR"))
        .unwrap_or(false);

    fields.push(Object::Reference(field_id));
    let acroform = doc
        .get_object_mut(acroform_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|_| DocumentError::Parse("AcroForm is not a dictionary".to_string()))?;
    acroform.set("Fields", Object::Array(fields));
    acroform.set("NeedAppearances", Object::Boolean(true));
    if !has_dr {
        acroform.set("DR", Object::Dictionary(font_resources(FIELD_FONT)));
        acroform.set(
            "DA",
            Object::string_literal(format!("/{} 0 Tf 0 g", FIELD_FONT)),
        );
    }
    Ok(())
}

/// Add the widget to the page's Annots array
fn add_to_page_annots(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), DocumentError> {
    let (annots_ref, mut annots) = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| DocumentError::Parse(format!("Failed to get page object: {}", e)))?;
        match page.get(b"Annots") {
            Ok(Object::Reference(id)) => (
                Some(*id),
                doc.get_object(*id)
                    .and_then(|o| o.as_array())
                    .cloned()
                    .unwrap_or_default(),
            ),
            Ok(Object::Array(arr)) => (None, arr.clone()),
            _ => (None, vec![]),
        }
    };
    annots.push(Object::Reference(annot_id));

    match annots_ref {
        Some(id) => {
            doc.objects.insert(id, Object::Array(annots));
        }
        None => {
            doc.get_object_mut(page_id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|_| DocumentError::Parse("Page is not a dictionary".to_string()))?
                .set("Annots", Object::Array(annots));
        }
    }
    Ok(())
}

/// Create a text field widget at `rect` (page space) with `value` committed.
pub(crate) fn add_overlay_field(
    pdf: &mut PdfDocument,
    page: usize,
    rect: Rect,
    name: &str,
    value: &str,
    style: &OverlayStyle,
) -> Result<(), DocumentError> {
    let geometry = pdf.geometry(page)?;
    if !rect.is_finite() || rect.is_empty() {
        return Err(DocumentError::InvalidRegion(format!(
            "{:?} is not a usable box",
            rect.to_array()
        )));
    }
    if !rect.intersects(&geometry.media_box) {
        return Err(DocumentError::InvalidRegion(format!(
            "{:?} lies outside page {}",
            rect.to_array(),
            page
        )));
    }

    let page_id = pdf.page_id(page)?;
    let user_rect = rect.transform(&pdf.page_to_user(page)?);

    let appearance = text_appearance(
        user_rect.width(),
        user_rect.height(),
        value,
        style.font_size,
        style.color,
    );
    let doc = &mut pdf.doc;
    let ap_id = doc.add_object(appearance);
    let mut ap = Dictionary::new();
    ap.set("N", Object::Reference(ap_id));

    let mut widget = Dictionary::new();
    widget.set("Type", Object::Name(b"Annot".to_vec()));
    widget.set("Subtype", Object::Name(b"Widget".to_vec()));
    widget.set("FT", Object::Name(b"Tx".to_vec()));
    widget.set("T", encode_text_string(name));
    widget.set("V", encode_text_string(value));
    widget.set(
        "DA",
        Object::string_literal(format!(
            "/{} {} Tf {} rg",
            FIELD_FONT,
            style.font_size,
            fmt_color(style.color)
        )),
    );
    widget.set("Rect", rect_to_object(&user_rect));
    // Print
    widget.set("F", Object::Integer(4));
    widget.set("P", Object::Reference(page_id));
    widget.set("AP", Object::Dictionary(ap));

    let widget_id = doc.add_object(Object::Dictionary(widget));
    add_to_page_annots(doc, page_id, widget_id)?;
    add_to_acroform(doc, widget_id)?;

    tracing::debug!(
        "Added overlay field {} on page {} at {:?}",
        name,
        page,
        rect.to_array()
    );
    Ok(())
}

fn pages_root(doc: &Document) -> Result<ObjectId, DocumentError> {
    doc.catalog()
        .map_err(|e| DocumentError::Parse(format!("Failed to get catalog: {}", e)))?
        .get(b"Pages")
        .and_then(|o| o.as_reference())
        .map_err(|_| DocumentError::Parse("Catalog has no page tree".to_string()))
}

/// Append a blank `width`×`height` page to the root page tree.
pub(crate) fn append_page(
    pdf: &mut PdfDocument,
    width: f64,
    height: f64,
) -> Result<usize, DocumentError> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(DocumentError::InvalidRegion(format!(
            "page size {}x{}",
            width, height
        )));
    }
    let doc = &mut pdf.doc;
    let pages_id = pages_root(doc)?;

    let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        rect_to_object(&Rect::new(0.0, 0.0, width, height)),
    );
    page.set("Contents", Object::Reference(content_id));
    page.set("Resources", Object::Dictionary(font_resources(TEXT_FONT)));
    let page_id = doc.add_object(Object::Dictionary(page));

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|_| DocumentError::Parse("Pages is not a dictionary".to_string()))?;
    let mut kids = pages
        .get(b"Kids")
        .and_then(|o| o.as_array())
        .cloned()
        .unwrap_or_default();
    kids.push(Object::Reference(page_id));
    let count = pages.get(b"Count").and_then(|o| o.as_i64()).unwrap_or(0);
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(count + 1));

    pdf.refresh_pages();
    let index = pdf.page_ids().len() - 1;
    tracing::debug!("Appended page {} ({}x{})", index, width, height);
    Ok(index)
}

/// Make sure the page's own resources declare the text font.
fn ensure_text_font(doc: &mut Document, page_id: ObjectId) -> Result<(), DocumentError> {
    let (resources_ref, mut resources) = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| DocumentError::Parse(format!("Failed to get page object: {}", e)))?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => (
                Some(*id),
                doc.get_dictionary(*id).cloned().unwrap_or_default(),
            ),
            _ => (
                None,
                resolve_inherited(doc, page, b"Resources")
                    .and_then(|o| resolve_dict(doc, o))
                    .cloned()
                    .unwrap_or_default(),
            ),
        }
    };

    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
        .unwrap_or_default();
    if fonts.has(TEXT_FONT.as_bytes()) {
        return Ok(());
    }
    fonts.set(TEXT_FONT, Object::Dictionary(helvetica()));
    resources.set("Font", Object::Dictionary(fonts));

    match resources_ref {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(resources));
        }
        None => {
            doc.get_object_mut(page_id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|_| DocumentError::Parse("Page is not a dictionary".to_string()))?
                .set("Resources", Object::Dictionary(resources));
        }
    }
    Ok(())
}

/// Draw one line of black Helvetica text with its baseline at `origin`.
pub(crate) fn insert_text(
    pdf: &mut PdfDocument,
    page: usize,
    origin: Point,
    text: &str,
    font_size: f64,
) -> Result<(), DocumentError> {
    let page_id = pdf.page_id(page)?;
    let user = pdf.page_to_user(page)?.apply(origin);
    let doc = &mut pdf.doc;
    ensure_text_font(doc, page_id)?;

    let existing: Vec<Object> = match doc.get_dictionary(page_id).ok().and_then(|p| p.get(b"Contents").ok()) {
        Some(Object::Array(arr)) => arr.clone(),
        Some(reference @ Object::Reference(_)) => vec![reference.clone()],
        _ => vec![],
    };

    // Isolate the page's own graphics state from the inserted text.
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let content = format!(
        "\nQ\nq\nBT\n/{font} {fs} Tf\n0 0 0 rg\n{x} {y} Td\n({text}) Tj\nET\nQ\n",
        font = TEXT_FONT,
        fs = font_size,
        x = user.x,
        y = user.y,
        text = escape_pdf_string(text),
    );
    let text_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(text_id));
    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|_| DocumentError::Parse("Page is not a dictionary".to_string()))?
        .set("Contents", Object::Array(contents));

    pdf.invalidate_page(page);
    Ok(())
}
