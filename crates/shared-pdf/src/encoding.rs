//! Character codes to Unicode
//!
//! Shown strings are decoded through the font's `/ToUnicode` CMap when it
//! has one, otherwise through its simple encoding: a base encoding patched
//! by `/Differences`. WinAnsi is also the encoding used for text we write.

use std::collections::HashMap;

/// WinAnsi codes 0x80..=0x9F, where it departs from Latin-1.
const WIN_ANSI_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

/// MacRoman codes 0x80..=0xFF.
const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', //
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', //
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', //
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', //
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ', //
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '¤', '‹', '›', 'ﬁ', 'ﬂ', //
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', //
    '\u{FFFD}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

/// Glyph names for codes 0x20..=0x7E.
const ASCII_GLYPH_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash", "zero",
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "colon", "semicolon",
    "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J",
    "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft",
    "backslash", "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e",
    "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x",
    "y", "z", "braceleft", "bar", "braceright", "asciitilde",
];

/// Glyph names for Latin-1 codes 0xA0..=0xFF.
const LATIN1_GLYPH_NAMES: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen",
    "registered", "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu",
    "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine", "guillemotright",
    "onequarter", "onehalf", "threequarters", "questiondown", "Agrave", "Aacute", "Acircumflex",
    "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave", "Eacute", "Ecircumflex",
    "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth", "Ntilde", "Ograve",
    "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash", "Ugrave", "Uacute",
    "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls", "agrave", "aacute",
    "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla", "egrave", "eacute",
    "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex", "idieresis", "eth", "ntilde",
    "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide", "oslash", "ugrave",
    "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

const EXTRA_GLYPH_NAMES: [(&str, char); 28] = [
    ("Euro", '€'),
    ("quotesinglbase", '‚'),
    ("florin", 'ƒ'),
    ("quotedblbase", '„'),
    ("ellipsis", '…'),
    ("dagger", '†'),
    ("daggerdbl", '‡'),
    ("circumflex", 'ˆ'),
    ("perthousand", '‰'),
    ("Scaron", 'Š'),
    ("guilsinglleft", '‹'),
    ("OE", 'Œ'),
    ("Zcaron", 'Ž'),
    ("quoteleft", '‘'),
    ("quoteright", '’'),
    ("quotedblleft", '“'),
    ("quotedblright", '”'),
    ("bullet", '•'),
    ("endash", '–'),
    ("emdash", '—'),
    ("tilde", '˜'),
    ("trademark", '™'),
    ("scaron", 'š'),
    ("guilsinglright", '›'),
    ("oe", 'œ'),
    ("zcaron", 'ž'),
    ("Ydieresis", 'Ÿ'),
    ("minus", '−'),
];

/// Base tables a simple font can name in `/Encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseEncoding {
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"MacRomanEncoding" => BaseEncoding::MacRoman,
            _ => BaseEncoding::WinAnsi,
        }
    }

    pub fn decode(self, code: u8) -> char {
        match (self, code) {
            (BaseEncoding::WinAnsi, 0x80..=0x9F) => WIN_ANSI_HIGH[(code - 0x80) as usize],
            (BaseEncoding::MacRoman, 0x80..=0xFF) => MAC_ROMAN_HIGH[(code - 0x80) as usize],
            _ => code as char,
        }
    }
}

/// Single-byte code table of a simple font.
#[derive(Debug, Clone)]
pub(crate) struct SimpleEncoding {
    base: BaseEncoding,
    differences: HashMap<u8, char>,
}

impl Default for SimpleEncoding {
    fn default() -> Self {
        Self::new(BaseEncoding::WinAnsi)
    }
}

impl SimpleEncoding {
    pub fn new(base: BaseEncoding) -> Self {
        Self {
            base,
            differences: HashMap::new(),
        }
    }

    /// Apply a `/Differences` array given as (code, glyph name) pairs.
    /// Names that do not resolve to a character leave the base mapping.
    pub fn with_differences<'a>(mut self, entries: impl IntoIterator<Item = (u32, &'a [u8])>) -> Self {
        for (code, name) in entries {
            let Ok(code) = u8::try_from(code) else { continue };
            match glyph_name_to_char(&String::from_utf8_lossy(name)) {
                Some(ch) => {
                    self.differences.insert(code, ch);
                }
                None => tracing::trace!("Unknown glyph name at code {}", code),
            }
        }
        self
    }

    pub fn decode(&self, code: u8) -> char {
        self.differences
            .get(&code)
            .copied()
            .unwrap_or_else(|| self.base.decode(code))
    }
}

/// The character an Adobe glyph name stands for.
pub(crate) fn glyph_name_to_char(name: &str) -> Option<char> {
    // Suffixes such as ".sc" or "_alt" name variants of the same character.
    let name = name.split(['.', '_']).next().filter(|n| !n.is_empty())?;

    if let Some(i) = ASCII_GLYPH_NAMES.iter().position(|n| *n == name) {
        return char::from_u32(0x20 + i as u32);
    }
    if let Some(i) = LATIN1_GLYPH_NAMES.iter().position(|n| *n == name) {
        return char::from_u32(0xA0 + i as u32);
    }
    if let Some(&(_, ch)) = EXTRA_GLYPH_NAMES.iter().find(|(n, _)| *n == name) {
        return Some(ch);
    }
    match name {
        "fi" => return Some('\u{FB01}'),
        "fl" => return Some('\u{FB02}'),
        "dotlessi" => return Some('ı'),
        _ => {}
    }

    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// WinAnsi byte for `ch`, if the encoding has one.
pub(crate) fn unicode_to_win_ansi(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    WIN_ANSI_HIGH
        .iter()
        .position(|c| *c == ch && ch != '\u{FFFD}')
        .map(|i| 0x80 + i as u8)
}

/// Parsed `/ToUnicode` CMap: character code to text.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToUnicode {
    map: HashMap<u32, String>,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Hex(&'a str),
    ArrayStart,
    ArrayEnd,
    Keyword(&'a str),
}

fn tokenize(data: &str) -> Vec<Token<'_>> {
    let bytes = data.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                let start = i + 1;
                let end = data[start..].find('>').map_or(bytes.len(), |e| start + e);
                tokens.push(Token::Hex(&data[start..end]));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'%' => {
                i = data[i..].find('\n').map_or(bytes.len(), |e| i + e);
            }
            b if b.is_ascii_alphanumeric() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
                tokens.push(Token::Keyword(&data[start..i]));
            }
            _ => i += 1,
        }
    }
    tokens
}

fn hex_code(hex: &str) -> Option<u32> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// Destination strings are UTF-16BE.
fn hex_text(hex: &str) -> Option<String> {
    let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let units: Vec<u16> = digits
        .chunks(4)
        .map(|c| std::str::from_utf8(c).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect::<Option<_>>()?;
    let text: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect();
    (!text.is_empty()).then_some(text)
}

/// `base` with its last UTF-16 unit advanced by `offset`, for bfrange.
fn offset_text(base: &str, offset: u32) -> Option<String> {
    let mut units: Vec<u16> = base.encode_utf16().collect();
    let last = units.last_mut()?;
    *last = u16::try_from(u32::from(*last) + offset).ok()?;
    Some(char::decode_utf16(units).map(|r| r.unwrap_or('\u{FFFD}')).collect())
}

impl ToUnicode {
    /// Read `bfchar` and `bfrange` sections; anything else is ignored.
    pub fn parse(data: &[u8]) -> Self {
        let content = String::from_utf8_lossy(data);
        let tokens = tokenize(&content);
        let mut map = HashMap::new();

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::Keyword("beginbfchar") => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) = (tokens.get(i), tokens.get(i + 1)) {
                        if let (Some(code), Some(text)) = (hex_code(src), hex_text(dst)) {
                            map.insert(code, text);
                        }
                        i += 2;
                    }
                }
                Token::Keyword("beginbfrange") => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1)) {
                        let (Some(lo), Some(hi)) = (hex_code(lo), hex_code(hi)) else {
                            i += 2;
                            continue;
                        };
                        i += 2;
                        match tokens.get(i) {
                            Some(Token::Hex(dst)) => {
                                if let Some(base) = hex_text(dst) {
                                    for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                                        if let Some(text) = offset_text(&base, code - lo) {
                                            map.insert(code, text);
                                        }
                                    }
                                }
                                i += 1;
                            }
                            Some(Token::ArrayStart) => {
                                i += 1;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= hi {
                                        if let Some(text) = hex_text(dst) {
                                            map.insert(code, text);
                                        }
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::ArrayEnd) {
                                    i += 1;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => i += 1,
            }
        }

        tracing::trace!("Parsed ToUnicode CMap with {} entries", map.len());
        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_win_ansi_round_trip() {
        for ch in ['A', 'é', 'ü', '€', '’', 'ÿ'] {
            let code = unicode_to_win_ansi(ch).unwrap();
            assert_eq!(BaseEncoding::WinAnsi.decode(code), ch);
        }
        assert_eq!(unicode_to_win_ansi('\u{0080}'), None);
        assert_eq!(unicode_to_win_ansi('中'), None);
    }

    #[test]
    fn test_mac_roman_high_codes() {
        assert_eq!(BaseEncoding::MacRoman.decode(0x8E), 'é');
        assert_eq!(BaseEncoding::MacRoman.decode(b'A'), 'A');
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_char("A"), Some('A'));
        assert_eq!(glyph_name_to_char("underscore"), Some('_'));
        assert_eq!(glyph_name_to_char("eacute"), Some('é'));
        assert_eq!(glyph_name_to_char("quoteright"), Some('’'));
        assert_eq!(glyph_name_to_char("uni00FC"), Some('ü'));
        assert_eq!(glyph_name_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_name_to_char("a.sc"), Some('a'));
        assert_eq!(glyph_name_to_char("g123"), None);
    }

    #[test]
    fn test_differences_override_base() {
        let enc = SimpleEncoding::default()
            .with_differences([(1, b"N".as_slice()), (2, b"a".as_slice()), (3, b"glyph7".as_slice())]);
        assert_eq!(enc.decode(1), 'N');
        assert_eq!(enc.decode(2), 'a');
        assert_eq!(enc.decode(3), '\u{3}');
        assert_eq!(enc.decode(b'x'), 'x');
    }

    #[test]
    fn test_bfchar_and_bfrange() {
        let cmap = ToUnicode::parse(
            b"/CIDInit /ProcSet findresource begin\n\
              1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
              2 beginbfchar\n<0031> <004E>\n<0005> <00660069>\nendbfchar\n\
              2 beginbfrange\n<0044> <0046> <0061>\n<0050> <0051> [<0065> <D83DDE00>]\nendbfrange\n\
              endcmap",
        );
        assert_eq!(cmap.get(0x31), Some("N"));
        assert_eq!(cmap.get(0x05), Some("fi"));
        assert_eq!(cmap.get(0x44), Some("a"));
        assert_eq!(cmap.get(0x46), Some("c"));
        assert_eq!(cmap.get(0x50), Some("e"));
        assert_eq!(cmap.get(0x51), Some("😀"));
        assert_eq!(cmap.get(0x47), None);
    }

    #[test]
    fn test_garbage_cmap_is_empty() {
        assert!(ToUnicode::parse(b"not a cmap at all").is_empty());
        assert!(ToUnicode::parse(b"beginbfchar <zz> <0041> endbfchar").is_empty());
    }
}
