//! Glyph advance widths for fonts that do not carry a /Widths array
//!
//! Standard-14 fonts are usually referenced without metrics. Helvetica
//! widths stand in for every proportional face; Courier is fixed at 600.

/// Helvetica advance widths for codes 32..=126, in 1/1000 em.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const DEFAULT_WIDTH: f64 = 556.0;
const MONOSPACE_WIDTH: f64 = 600.0;

/// Width of `ch` in 1/1000 em for a standard face.
pub(crate) fn standard_width(ch: char, monospace: bool) -> f64 {
    if monospace {
        return MONOSPACE_WIDTH;
    }
    let code = ch as u32;
    if (32..=126).contains(&code) {
        HELVETICA_ASCII[(code - 32) as usize] as f64
    } else {
        DEFAULT_WIDTH
    }
}

/// Total width of `text` at `font_size` points in Helvetica.
pub fn helvetica_text_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .map(|c| standard_width(c, false))
        .sum::<f64>()
        * font_size
        / 1000.0
}
