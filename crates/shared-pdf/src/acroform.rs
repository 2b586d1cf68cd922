//! Reading and writing native AcroForm fields
//!
//! Widgets are discovered through each page's `/Annots`, so every field
//! reported here carries the page it is drawn on. A field's fully qualified
//! name is the `/T` chain from the root field down, joined with dots.

use crate::capability::NativeField;
use crate::error::DocumentError;
use crate::geometry::Rect;
use crate::metrics::helvetica_text_width;
use crate::parser::{
    decode_text_string, encode_text_string, number, parse_rect, resolve, resolve_dict,
    PdfDocument,
};
use crate::writer::{ensure_acroform, text_appearance};
use lopdf::{Dictionary, Document, Object, ObjectId};

const MAX_FIELD_DEPTH: usize = 32;
/// Field flag bit 1.
const FLAG_READ_ONLY: i64 = 1;
const TRUTHY: [&str; 6] = ["true", "yes", "on", "1", "x", "checked"];

#[derive(Debug, Clone)]
struct Widget {
    id: ObjectId,
    page_index: usize,
    /// The object carrying the terminal `/T` (the widget itself when merged).
    field_id: ObjectId,
    name: String,
}

fn annotation_ids(doc: &Document, page: &Dictionary) -> Vec<ObjectId> {
    page.get(b"Annots")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default()
}

fn is_widget(dict: &Dictionary) -> bool {
    matches!(
        dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()),
        Some(b"Widget")
    )
}

/// Qualified name and owning field of a widget, if it has any `/T`.
fn qualified_name(doc: &Document, widget_id: ObjectId) -> Option<(String, ObjectId)> {
    let mut parts: Vec<String> = Vec::new();
    let mut field_id = None;
    let mut current = Some(widget_id);

    for _ in 0..MAX_FIELD_DEPTH {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else { break };
        if let Ok(Object::String(bytes, _)) = dict.get(b"T").map(|o| resolve(doc, o)) {
            parts.push(decode_text_string(bytes));
            field_id.get_or_insert(id);
        }
        current = dict.get(b"Parent").ok().and_then(|o| o.as_reference().ok());
    }

    let field_id = field_id?;
    parts.reverse();
    let name = parts.join(".");
    (!name.is_empty()).then_some((name, field_id))
}

/// A field attribute that may be inherited from ancestors in the field tree.
fn field_attr<'a>(doc: &'a Document, id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(id);
    for _ in 0..MAX_FIELD_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").ok().and_then(|o| o.as_reference().ok());
    }
    None
}

fn widgets(pdf: &PdfDocument) -> Vec<Widget> {
    let doc = &pdf.doc;
    let mut out = Vec::new();
    for (page_index, page_id) in pdf.page_ids().iter().enumerate() {
        let Ok(page) = doc.get_dictionary(*page_id) else {
            continue;
        };
        for id in annotation_ids(doc, page) {
            let Ok(dict) = doc.get_dictionary(id) else {
                continue;
            };
            if !is_widget(dict) {
                continue;
            }
            if let Some((name, field_id)) = qualified_name(doc, id) {
                out.push(Widget {
                    id,
                    page_index,
                    field_id,
                    name,
                });
            }
        }
    }
    out
}

/// Every named widget in page order.
pub(crate) fn collect_fields(pdf: &PdfDocument) -> Result<Vec<NativeField>, DocumentError> {
    let doc = &pdf.doc;
    let mut fields = Vec::new();
    for widget in widgets(pdf) {
        let to_page = pdf.user_to_page(widget.page_index)?;
        let rect = doc
            .get_dictionary(widget.id)
            .ok()
            .and_then(|d| d.get(b"Rect").ok())
            .and_then(|o| parse_rect(doc, o))
            .map(|r| r.transform(&to_page))
            .unwrap_or_default();
        fields.push(NativeField {
            name: widget.name,
            page_index: widget.page_index,
            rect,
        });
    }
    tracing::debug!("Found {} native field widgets", fields.len());
    Ok(fields)
}

/// The names a checkbox or radio widget can be switched to.
fn on_state(doc: &Document, widget_id: ObjectId) -> Vec<u8> {
    doc.get_dictionary(widget_id)
        .ok()
        .and_then(|d| d.get(b"AP").ok())
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|n| {
            n.iter()
                .map(|(k, _)| k.clone())
                .find(|k| k.as_slice() != b"Off")
        })
        .unwrap_or_else(|| b"Yes".to_vec())
}

/// Font size from a `/DA` string such as `/Helv 0 Tf 0 g`.
fn da_font_size(da: &str) -> Option<f64> {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let tf = tokens.iter().position(|t| *t == "Tf")?;
    tokens.get(tf.checked_sub(1)?)?.parse().ok()
}

fn default_appearance(doc: &Document, field_id: ObjectId) -> Option<String> {
    let own = field_attr(doc, field_id, b"DA");
    let form = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AcroForm").ok())
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|f| f.get(b"DA").ok())
        .map(|o| resolve(doc, o));
    match own.or(form) {
        Some(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Set and commit the value of every widget of field `name`.
pub(crate) fn set_field_value(
    pdf: &mut PdfDocument,
    name: &str,
    value: &str,
) -> Result<(), DocumentError> {
    let targets: Vec<Widget> = widgets(pdf).into_iter().filter(|w| w.name == name).collect();
    let Some(first) = targets.first() else {
        return Err(DocumentError::FieldNotFound(name.to_string()));
    };
    let field_id = first.field_id;

    let doc = &pdf.doc;
    let field_type = field_attr(doc, field_id, b"FT")
        .and_then(|o| o.as_name().ok())
        .map(|n| n.to_vec())
        .unwrap_or_else(|| b"Tx".to_vec());
    let flags = field_attr(doc, field_id, b"Ff")
        .and_then(|o| number(doc, o))
        .unwrap_or(0.0) as i64;
    if flags & FLAG_READ_ONLY != 0 {
        return Err(DocumentError::FieldNotWritable(format!("{} is read-only", name)));
    }

    match field_type.as_slice() {
        b"Btn" => set_button(pdf, field_id, &targets, value),
        b"Sig" => Err(DocumentError::FieldNotWritable(format!(
            "{} is a signature field",
            name
        ))),
        _ => set_text(pdf, field_id, &targets, value),
    }?;

    tracing::debug!("Set native field {} ({} widgets)", name, targets.len());
    Ok(())
}

fn set_button(
    pdf: &mut PdfDocument,
    field_id: ObjectId,
    targets: &[Widget],
    value: &str,
) -> Result<(), DocumentError> {
    let states: Vec<Vec<u8>> = targets.iter().map(|w| on_state(&pdf.doc, w.id)).collect();
    let wanted = value.trim();
    let truthy = TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(wanted));

    let selected = states
        .iter()
        .position(|s| String::from_utf8_lossy(s).eq_ignore_ascii_case(wanted))
        .or((truthy && !states.is_empty()).then_some(0));

    for (i, widget) in targets.iter().enumerate() {
        let state = match selected {
            Some(sel) if sel == i => states[i].clone(),
            _ => b"Off".to_vec(),
        };
        widget_dict_mut(&mut pdf.doc, widget.id)?.set("AS", Object::Name(state));
    }

    let field_value = selected
        .map(|sel| states[sel].clone())
        .unwrap_or_else(|| b"Off".to_vec());
    widget_dict_mut(&mut pdf.doc, field_id)?.set("V", Object::Name(field_value));
    Ok(())
}

fn set_text(
    pdf: &mut PdfDocument,
    field_id: ObjectId,
    targets: &[Widget],
    value: &str,
) -> Result<(), DocumentError> {
    let font_size = default_appearance(&pdf.doc, field_id)
        .as_deref()
        .and_then(da_font_size)
        .unwrap_or(0.0);

    widget_dict_mut(&mut pdf.doc, field_id)?.set("V", encode_text_string(value));

    for widget in targets {
        let rect = pdf
            .doc
            .get_dictionary(widget.id)
            .ok()
            .and_then(|d| d.get(b"Rect").ok())
            .and_then(|o| parse_rect(&pdf.doc, o));
        let Some(rect) = rect else { continue };
        let size = if font_size > 0.0 {
            font_size
        } else {
            auto_font_size(&rect, value)
        };
        let stream = text_appearance(rect.width(), rect.height(), value, size, [0.0, 0.0, 0.0]);
        let ap_id = pdf.doc.add_object(stream);
        let mut ap = Dictionary::new();
        ap.set("N", Object::Reference(ap_id));
        widget_dict_mut(&mut pdf.doc, widget.id)?.set("AP", Object::Dictionary(ap));
    }

    let acroform_id = ensure_acroform(&mut pdf.doc)?;
    widget_dict_mut(&mut pdf.doc, acroform_id)?.set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

/// Auto-sized text (`0 Tf`): fit the box height, then shrink to fit the width.
fn auto_font_size(rect: &Rect, value: &str) -> f64 {
    let by_height = (rect.height() * 0.7).clamp(4.0, 12.0);
    let unit_width = helvetica_text_width(value, 1.0);
    if unit_width <= 0.0 {
        return by_height;
    }
    by_height.min((rect.width() - 4.0) / unit_width).max(4.0)
}

fn widget_dict_mut(doc: &mut Document, id: ObjectId) -> Result<&mut Dictionary, DocumentError> {
    doc.get_object_mut(id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| DocumentError::Parse(format!("object {:?}: {}", id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::FormDocument;
    use lopdf::{dictionary, Stream};

    /// One Letter page with a text field `applicant.name`, a checkbox `agree`
    /// and a read-only `locked` field.
    fn form_pdf() -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let parent_id = doc.add_object(dictionary! {
            "T" => Object::string_literal("applicant"),
            "FT" => "Tx",
            "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
        });
        let name_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => parent_id,
            "T" => Object::string_literal("name"),
            "Rect" => vec![100.into(), 700.into(), 300.into(), 720.into()],
            "P" => page_id,
        });
        doc.get_object_mut(parent_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Kids", vec![Object::Reference(name_id)]);

        let on_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let agree_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "Rect" => vec![100.into(), 650.into(), 112.into(), 662.into()],
            "AP" => dictionary! { "N" => dictionary! { "Off" => on_id, "Accept" => on_id } },
        });
        let locked_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "Ff" => 1,
            "T" => Object::string_literal("locked"),
            "Rect" => vec![100.into(), 600.into(), 200.into(), 620.into()],
        });

        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Annots" => vec![name_id.into(), agree_id.into(), locked_id.into()],
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => vec![parent_id.into(), agree_id.into(), locked_id.into()],
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acroform_id,
        });
        doc.trailer.set("Root", catalog_id);
        PdfDocument::from_document(doc)
    }

    #[test]
    fn test_collect_fields_qualified_names_and_rects() {
        let pdf = form_pdf();
        let fields = pdf.native_fields().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["applicant.name", "agree", "locked"]);
        assert_eq!(fields[0].page_index, 0);
        assert_eq!(fields[0].rect, crate::geometry::Rect::new(100.0, 72.0, 300.0, 92.0));
    }

    #[test]
    fn test_set_text_field_value() {
        let mut pdf = form_pdf();
        pdf.set_native_field_value("applicant.name", "Jane Doe").unwrap();

        let widgets = widgets(&pdf);
        let field = pdf.doc.get_dictionary(widgets[0].field_id).unwrap();
        assert_eq!(field.get(b"V").unwrap().as_str().unwrap(), b"Jane Doe");
        assert!(field.get(b"AP").is_ok());

        let catalog = pdf.doc.catalog().unwrap();
        let form = resolve_dict(&pdf.doc, catalog.get(b"AcroForm").unwrap()).unwrap();
        assert_eq!(form.get(b"NeedAppearances").unwrap(), &Object::Boolean(true));
    }

    #[test]
    fn test_set_checkbox_uses_on_state() {
        let mut pdf = form_pdf();
        pdf.set_native_field_value("agree", "true").unwrap();
        let id = widgets(&pdf)[1].id;
        let dict = pdf.doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"V").unwrap().as_name().unwrap(), b"Accept");
        assert_eq!(dict.get(b"AS").unwrap().as_name().unwrap(), b"Accept");

        pdf.set_native_field_value("agree", "no").unwrap();
        let dict = pdf.doc.get_dictionary(id).unwrap();
        assert_eq!(dict.get(b"AS").unwrap().as_name().unwrap(), b"Off");
    }

    #[test]
    fn test_unknown_field_is_not_found() {
        let mut pdf = form_pdf();
        assert!(matches!(
            pdf.set_native_field_value("missing", "x"),
            Err(DocumentError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_read_only_field_is_rejected() {
        let mut pdf = form_pdf();
        assert!(matches!(
            pdf.set_native_field_value("locked", "x"),
            Err(DocumentError::FieldNotWritable(_))
        ));
    }

    #[test]
    fn test_da_font_size() {
        assert_eq!(da_font_size("/Helv 9 Tf 0 g"), Some(9.0));
        assert_eq!(da_font_size("0 g"), None);
    }

    #[test]
    fn test_auto_font_size_fits_box() {
        let roomy = Rect::new(0.0, 0.0, 300.0, 20.0);
        assert_eq!(auto_font_size(&roomy, "Ada"), 12.0);

        let narrow = Rect::new(0.0, 0.0, 40.0, 20.0);
        let size = auto_font_size(&narrow, "A much longer answer");
        assert!(size < 12.0);
        assert!(helvetica_text_width("A much longer answer", size) <= 36.0 + 1e-9 || size == 4.0);
    }
}
