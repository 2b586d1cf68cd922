//! PDF fixtures built with lopdf

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

pub struct PageSpec {
    pub rotate: i64,
    /// (text, x, baseline) in PDF user space, Helvetica 12pt.
    pub lines: Vec<(&'static str, f64, f64)>,
    /// Native text fields: (name, [x0, y0, x1, y1] in user space).
    pub fields: Vec<(&'static str, [i64; 4])>,
}

impl PageSpec {
    pub fn new() -> Self {
        Self {
            rotate: 0,
            lines: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn text(mut self, text: &'static str, x: f64, baseline: f64) -> Self {
        self.lines.push((text, x, baseline));
        self
    }

    pub fn field(mut self, name: &'static str, rect: [i64; 4]) -> Self {
        self.fields.push((name, rect));
        self
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = degrees;
        self
    }
}

fn content(lines: &[(&str, f64, f64)]) -> Vec<u8> {
    let mut out = String::new();
    for (text, x, y) in lines {
        out.push_str(&format!("BT /F1 12 Tf {} {} Td ({}) Tj ET\n", x, y, text));
    }
    out.into_bytes()
}

/// US Letter pages with the given text and native fields, serialized.
pub fn build_pdf(pages: Vec<PageSpec>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    let mut all_fields: Vec<Object> = Vec::new();
    for page in pages {
        let page_id: ObjectId = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content(&page.lines)));

        let mut annots: Vec<Object> = Vec::new();
        for (name, [x0, y0, x1, y1]) in &page.fields {
            let id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => Object::string_literal(*name),
                "Rect" => vec![(*x0).into(), (*y0).into(), (*x1).into(), (*y1).into()],
                "P" => page_id,
                "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
            });
            annots.push(id.into());
            all_fields.push(id.into());
        }

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Rotate" => page.rotate,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Annots" => annots,
            }),
        );
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
    if !all_fields.is_empty() {
        catalog.set("AcroForm", dictionary! { "Fields" => all_fields });
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("fixture saves");
    out
}

/// Current `/V` of the field named `name`, if it is a string.
pub fn field_value(pdf: &[u8], name: &str) -> Option<String> {
    let doc = Document::load_mem(pdf).ok()?;
    doc.objects.values().find_map(|obj| {
        let dict = obj.as_dict().ok()?;
        match dict.get(b"T").ok()? {
            Object::String(t, _) if t.as_slice() == name.as_bytes() => match dict.get(b"V").ok()? {
                Object::String(v, _) => Some(String::from_utf8_lossy(v).into_owned()),
                _ => None,
            },
            _ => None,
        }
    })
}

/// How many objects carry `/T` equal to `name`.
pub fn widget_count(pdf: &[u8], name: &str) -> usize {
    let Ok(doc) = Document::load_mem(pdf) else {
        return 0;
    };
    doc.objects
        .values()
        .filter_map(|obj| obj.as_dict().ok())
        .filter(|d| matches!(d.get(b"T"), Ok(Object::String(t, _)) if t.as_slice() == name.as_bytes()))
        .count()
}

/// A small solid-colour PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("png encodes");
    out
}

/// Glyph id used for `c` in [`build_type0_pdf`]: TrueType's standard glyph
/// order, where printable ASCII starts at 3.
pub fn glyph_id(c: char) -> u16 {
    (c as u16).saturating_sub(29)
}

/// One Letter page whose `lines` are shown in a Type0 Identity-H font. The
/// content stream carries glyph ids; only the ToUnicode CMap says which
/// characters they are.
pub fn build_type0_pdf(lines: &[(&str, f64, f64)]) -> Vec<u8> {
    let mut chars: Vec<char> = lines.iter().flat_map(|(t, _, _)| t.chars()).collect();
    chars.sort_unstable();
    chars.dedup();
    let mut cmap = format!(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n{} beginbfchar\n",
        chars.len()
    );
    for c in &chars {
        cmap.push_str(&format!("<{:04X}> <{:04X}>\n", glyph_id(*c), *c as u32));
    }
    cmap.push_str("endbfchar\nendcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");

    let mut content = String::new();
    for (text, x, y) in lines {
        let hex: String = text.chars().map(|c| format!("{:04X}", glyph_id(c))).collect();
        content.push_str(&format!("BT /F1 12 Tf {} {} Td <{}> Tj ET\n", x, y, hex));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "ABCDEF+Arial",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "DW" => 600,
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ABCDEF+Arial",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant.into()],
        "ToUnicode" => to_unicode,
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("fixture saves");
    out
}
