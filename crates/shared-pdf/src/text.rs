//! Positioned text from page content streams
//!
//! A small content-stream interpreter that tracks the graphics and text
//! matrices well enough to give every shown glyph a box in page space. Lines
//! are rebuilt from glyph baselines so that search works across separate
//! show operators on the same visual line.

use crate::encoding::{BaseEncoding, SimpleEncoding, ToUnicode};
use crate::geometry::{Matrix, Point, Rect};
use crate::metrics::standard_width;
use crate::parser::{number, resolve, resolve_dict};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::rc::Rc;

/// Portion of the em box below the baseline.
const DESCENT: f64 = 0.21;
/// Portion of the em box above the baseline.
const ASCENT: f64 = 0.79;
/// Horizontal gap, in em, that reads as a word break.
const WORD_GAP: f64 = 0.15;
const MAX_FORM_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub ch: char,
    pub rect: Rect,
    pub baseline: f64,
    /// Em height in page space.
    pub em: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TextLine {
    chars: Vec<char>,
    /// `None` for spaces synthesized from glyph gaps.
    rects: Vec<Option<Rect>>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }
}

#[derive(Debug, Clone)]
struct FontInfo {
    first_char: i64,
    widths: Vec<f64>,
    default_width: Option<f64>,
    two_byte: bool,
    monospace: bool,
    encoding: SimpleEncoding,
    to_unicode: Option<ToUnicode>,
}

impl FontInfo {
    fn helvetica() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            default_width: None,
            two_byte: false,
            monospace: false,
            encoding: SimpleEncoding::default(),
            to_unicode: None,
        }
    }

    fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_lowercase())
            .unwrap_or_default();
        let two_byte = matches!(
            dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()),
            Some(b"Type0")
        );
        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(doc, o))
            .unwrap_or(0.0) as i64;
        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| arr.iter().map(|w| number(doc, w).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let default_width = if two_byte {
            dict.get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|d| d.get(b"DW").ok())
                .and_then(|o| number(doc, o))
                .or(Some(1000.0))
        } else {
            None
        };
        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .map(|stream| {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                ToUnicode::parse(&data)
            })
            .filter(|cmap| !cmap.is_empty());

        Self {
            first_char,
            widths,
            default_width,
            two_byte,
            monospace: base_font.contains("courier") || base_font.contains("mono"),
            encoding: simple_encoding(doc, dict),
            to_unicode,
        }
    }

    fn width(&self, code: u32, ch: char) -> f64 {
        let idx = code as i64 - self.first_char;
        if idx >= 0 {
            if let Some(&w) = self.widths.get(idx as usize) {
                if w > 0.0 {
                    return w;
                }
            }
        }
        self.default_width
            .unwrap_or_else(|| standard_width(ch, self.monospace))
    }

    /// Character codes in a shown string.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
                    [b] => *b as u32,
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    /// Text for one code. Two-byte codes without a CMap are taken as
    /// Unicode, which holds for Identity-H fonts embedded by most writers.
    fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(code)) {
            return text.to_string();
        }
        if self.two_byte {
            return char::from_u32(code).unwrap_or('\u{FFFD}').to_string();
        }
        match u8::try_from(code) {
            Ok(byte) => self.encoding.decode(byte).to_string(),
            Err(_) => '\u{FFFD}'.to_string(),
        }
    }
}

/// `/Encoding` of a simple font: a base table name, or a dictionary with
/// an optional `/BaseEncoding` and `/Differences`.
fn simple_encoding(doc: &Document, font: &Dictionary) -> SimpleEncoding {
    let Some(encoding) = font.get(b"Encoding").ok().map(|o| resolve(doc, o)) else {
        return SimpleEncoding::default();
    };
    if let Ok(name) = encoding.as_name() {
        return SimpleEncoding::new(BaseEncoding::from_name(name));
    }
    let Ok(dict) = encoding.as_dict() else {
        return SimpleEncoding::default();
    };

    let base = dict
        .get(b"BaseEncoding")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map_or(BaseEncoding::WinAnsi, BaseEncoding::from_name);
    let mut entries: Vec<(u32, &[u8])> = Vec::new();
    if let Some(differences) = dict
        .get(b"Differences")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
    {
        let mut code = 0u32;
        for item in differences {
            match item {
                Object::Name(name) => {
                    entries.push((code, name.as_slice()));
                    code += 1;
                }
                other => {
                    if let Some(n) = number(doc, other) {
                        code = n.max(0.0) as u32;
                    }
                }
            }
        }
    }
    SimpleEncoding::new(base).with_differences(entries)
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font: Rc<FontInfo>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font: Rc::new(FontInfo::helvetica()),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).concat(&self.tlm);
        self.tm = self.tlm;
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    /// Maps PDF user space into page space.
    to_page: Matrix,
    glyphs: Vec<Glyph>,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
        text: &mut TextState,
        depth: usize,
    ) {
        let operations = match Content::decode(content) {
            Ok(c) => c.operations,
            Err(e) => {
                tracing::warn!("Skipping undecodable content stream: {}", e);
                return;
            }
        };

        let mut ctm = ctm;
        let mut stack: Vec<Matrix> = Vec::new();

        for op in &operations {
            let nums: Vec<f64> = op
                .operands
                .iter()
                .filter_map(|o| number(self.doc, o))
                .collect();
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        ctm = saved;
                    }
                }
                "cm" if nums.len() == 6 => {
                    let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    ctm = m.concat(&ctm);
                }
                "BT" => {
                    text.tm = Matrix::IDENTITY;
                    text.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        text.font = self.font(resources, name);
                    }
                    if let Some(&size) = nums.last() {
                        text.size = size;
                    }
                }
                "Tc" if !nums.is_empty() => text.char_spacing = nums[0],
                "Tw" if !nums.is_empty() => text.word_spacing = nums[0],
                "Tz" if !nums.is_empty() => text.h_scale = nums[0] / 100.0,
                "TL" if !nums.is_empty() => text.leading = nums[0],
                "Ts" if !nums.is_empty() => text.rise = nums[0],
                "Td" if nums.len() == 2 => text.next_line(nums[0], nums[1]),
                "TD" if nums.len() == 2 => {
                    text.leading = -nums[1];
                    text.next_line(nums[0], nums[1]);
                }
                "Tm" if nums.len() == 6 => {
                    text.tlm = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                    text.tm = text.tlm;
                }
                "T*" => text.next_line(0.0, -text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(bytes, &ctm, text);
                    }
                }
                "'" => {
                    text.next_line(0.0, -text.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(bytes, &ctm, text);
                    }
                }
                "\"" => {
                    if nums.len() >= 2 {
                        text.word_spacing = nums[0];
                        text.char_spacing = nums[1];
                    }
                    text.next_line(0.0, -text.leading);
                    if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                        self.show(bytes, &ctm, text);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &ctm, text),
                                other => {
                                    if let Some(adj) = number(self.doc, other) {
                                        let tx = -adj / 1000.0 * text.size * text.h_scale;
                                        text.tm = Matrix::translate(tx, 0.0).concat(&text.tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        self.form_xobject(resources, name, ctm, text, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn form_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: Matrix,
        text: &mut TextState,
        depth: usize,
    ) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| resolve(doc, o).as_stream().ok())
        else {
            return;
        };
        let is_form = matches!(
            stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()),
            Some(b"Form")
        );
        if !is_form {
            return;
        }

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .and_then(|arr| {
                let v: Vec<f64> = arr.iter().filter_map(|o| number(doc, o)).collect();
                (v.len() == 6).then(|| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
            })
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .or(resources);
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let mut saved = text.clone();
        self.run(
            &content,
            form_resources,
            form_matrix.concat(&ctm),
            &mut saved,
            depth + 1,
        );
    }

    fn font(&mut self, resources: Option<&Dictionary>, name: &[u8]) -> Rc<FontInfo> {
        let doc = self.doc;
        let Some(entry) = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|fonts| fonts.get(name).ok())
        else {
            return Rc::new(FontInfo::helvetica());
        };

        let id = entry.as_reference().ok();
        if let Some(cached) = id.and_then(|id| self.fonts.get(&id)) {
            return Rc::clone(cached);
        }
        let info = Rc::new(
            resolve_dict(doc, entry)
                .map(|dict| FontInfo::from_dict(doc, dict))
                .unwrap_or_else(FontInfo::helvetica),
        );
        if let Some(id) = id {
            self.fonts.insert(id, Rc::clone(&info));
        }
        info
    }

    fn show(&mut self, bytes: &[u8], ctm: &Matrix, text: &mut TextState) {
        let font = Rc::clone(&text.font);
        for code in font.codes(bytes) {
            let decoded = font.decode(code);
            let first = decoded.chars().next().unwrap_or('\u{FFFD}');
            let w0 = font.width(code, first) / 1000.0;
            let glyph_width = w0 * text.size * text.h_scale;
            let spacing = if code == 32 && !font.two_byte {
                text.char_spacing + text.word_spacing
            } else {
                text.char_spacing
            };
            let advance = (w0 * text.size + spacing) * text.h_scale;

            let full = text.tm.concat(ctm).concat(&self.to_page);
            let baseline = full.apply(Point::new(0.0, text.rise)).y;
            // Ligatures decode to several characters sharing one glyph box.
            let parts = decoded.chars().count().max(1) as f64;
            for (i, ch) in decoded.chars().enumerate() {
                let x0 = glyph_width * i as f64 / parts;
                let em_box = Rect::new(
                    x0,
                    text.rise - DESCENT * text.size,
                    x0 + glyph_width / parts,
                    text.rise + ASCENT * text.size,
                );
                let rect = em_box.transform(&full);
                let em = rect.height();
                if rect.is_finite() && em > 0.0 {
                    self.glyphs.push(Glyph {
                        ch,
                        rect,
                        baseline,
                        em,
                    });
                }
            }

            text.tm = Matrix::translate(advance, 0.0).concat(&text.tm);
        }
    }
}

/// Interpret a page content stream into glyphs in page space.
pub(crate) fn extract_glyphs(
    doc: &Document,
    content: &[u8],
    resources: Option<&Dictionary>,
    to_page: Matrix,
) -> Vec<Glyph> {
    let mut interpreter = Interpreter {
        doc,
        to_page,
        glyphs: Vec::new(),
        fonts: HashMap::new(),
    };
    let mut state = TextState::default();
    interpreter.run(content, resources, Matrix::IDENTITY, &mut state, 0);
    interpreter.glyphs
}

/// Rebuild visual lines from glyphs in content order.
pub(crate) fn group_lines<'g>(glyphs: impl IntoIterator<Item = &'g Glyph>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current = TextLine::default();
    let mut last: Option<&Glyph> = None;

    for glyph in glyphs {
        if let Some(prev) = last {
            let em = prev.em.max(glyph.em).max(1.0);
            let new_line = (glyph.baseline - prev.baseline).abs() > 0.5 * em
                || glyph.rect.x0 < prev.rect.x1 - em;
            if new_line {
                if !current.chars.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            } else {
                let gap = glyph.rect.x0 - prev.rect.x1;
                let prev_space = current.chars.last().is_some_and(|c| *c == ' ');
                if gap > WORD_GAP * em && !prev_space && !glyph.ch.is_whitespace() {
                    current.chars.push(' ');
                    current.rects.push(None);
                }
            }
        }

        if glyph.ch.is_whitespace() {
            let prev_space = current.chars.last().is_some_and(|c| *c == ' ');
            if !prev_space && !current.chars.is_empty() {
                current.chars.push(' ');
                current.rects.push(Some(glyph.rect));
            }
        } else {
            current.chars.push(glyph.ch);
            current.rects.push(Some(glyph.rect));
        }
        last = Some(glyph);
    }
    if !current.chars.is_empty() {
        lines.push(current);
    }
    lines
}

fn fold_char(c: char) -> char {
    if c.is_whitespace() {
        ' '
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

/// Case-insensitive, non-overlapping occurrences of `query` in `lines`.
pub(crate) fn search_lines(lines: &[TextLine], query: &str) -> Vec<Rect> {
    let needle: Vec<char> = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(fold_char)
        .collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for line in lines {
        let hay: Vec<char> = line.chars.iter().map(|c| fold_char(*c)).collect();
        let mut i = 0;
        while i + needle.len() <= hay.len() {
            if hay[i..i + needle.len()] == needle[..] {
                let rect = line.rects[i..i + needle.len()]
                    .iter()
                    .flatten()
                    .copied()
                    .reduce(|a, b| a.union(&b));
                if let Some(rect) = rect {
                    hits.push(rect);
                }
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }
    hits
}
