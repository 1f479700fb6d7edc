//! Single-byte code page encoding for thermal printers
//!
//! Every character set pairs a Unicode→byte table with the ESC/POS code page
//! number (`ESC t n`) the printer needs to render those bytes. Both must be
//! sent together or the output is garbage.
//!
//! Encoding is total: each input character produces exactly one byte.
//! - table hit → mapped byte
//! - printable ASCII (0x20-0x7E) and `\n` → unchanged
//! - `€` missing from the table → `E`
//! - anything else → `?`

mod tables;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Printer character set (encoding table + code page number)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSet {
    /// PC437, plain ASCII default
    #[default]
    Pc437,
    /// PC737 DOS Greek
    Pc737,
    /// ISO 8859-7 Greek
    #[serde(rename = "iso8859_7")]
    Iso8859_7,
    /// Windows-1253 Greek
    Wpc1253,
    /// Greek lookalikes over PC437 glyphs, for printers without a Greek page
    GreekFallback,
    /// PC850 Multilingual
    Pc850,
    /// PC858 Multilingual + Euro
    Pc858,
    /// Windows-1252 Latin-1
    Wpc1252,
    /// PC866 Cyrillic
    Pc866,
    /// Windows-1251 Cyrillic
    Wpc1251,
}

impl CharacterSet {
    pub const ALL: [CharacterSet; 10] = [
        Self::Pc437,
        Self::Pc737,
        Self::Iso8859_7,
        Self::Wpc1253,
        Self::GreekFallback,
        Self::Pc850,
        Self::Pc858,
        Self::Wpc1252,
        Self::Pc866,
        Self::Wpc1251,
    ];

    /// ESC t code page number for this set
    pub fn code_page(&self) -> u8 {
        match self {
            Self::Pc437 => 0,
            Self::Pc850 => 2,
            Self::Pc737 => 14,
            Self::Iso8859_7 => 15,
            Self::Wpc1252 => 16,
            Self::Pc866 => 17,
            Self::Pc858 => 19,
            Self::Wpc1251 => 46,
            Self::Wpc1253 => 47,
            Self::GreekFallback => 0,
        }
    }

    pub fn is_greek(&self) -> bool {
        matches!(
            self,
            Self::Pc737 | Self::Iso8859_7 | Self::Wpc1253 | Self::GreekFallback
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pc437 => "pc437",
            Self::Pc737 => "pc737",
            Self::Iso8859_7 => "iso8859_7",
            Self::Wpc1253 => "wpc1253",
            Self::GreekFallback => "greek_fallback",
            Self::Pc850 => "pc850",
            Self::Pc858 => "pc858",
            Self::Wpc1252 => "wpc1252",
            Self::Pc866 => "pc866",
            Self::Wpc1251 => "wpc1251",
        }
    }

    fn table(&self) -> &'static HashMap<char, u8> {
        // ALL lists every variant, so the lookup always hits
        &TABLES[*self as usize]
    }

    /// Encode one character (never fails)
    pub fn encode_char(&self, c: char) -> u8 {
        if let Some(&b) = self.table().get(&c) {
            return b;
        }
        if c == '\n' || (' '..='~').contains(&c) {
            return c as u8;
        }
        if c == '€' {
            return b'E';
        }
        b'?'
    }

    /// Encode a string, one byte per character
    pub fn encode(&self, s: &str) -> Vec<u8> {
        s.chars().map(|c| self.encode_char(c)).collect()
    }

    /// Append the encoded string to `out`
    pub fn encode_into(&self, s: &str, out: &mut Vec<u8>) {
        out.extend(s.chars().map(|c| self.encode_char(c)));
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharacterSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|cs| cs.name() == normalized)
            .ok_or_else(|| format!("Unknown character set: {}", s))
    }
}

/// Reverse lookup tables indexed by `CharacterSet as usize`
static TABLES: LazyLock<Vec<HashMap<char, u8>>> = LazyLock::new(|| {
    CharacterSet::ALL
        .iter()
        .map(|cs| match cs {
            CharacterSet::Pc437 => from_upper_half(&tables::PC437),
            CharacterSet::Pc737 => from_upper_half(&tables::PC737),
            CharacterSet::Pc850 => from_upper_half(&tables::PC850),
            CharacterSet::Pc858 => {
                let mut map = from_upper_half(&tables::PC850);
                map.remove(&'ı');
                map.insert('€', tables::PC858_EURO);
                map
            }
            CharacterSet::GreekFallback => {
                let mut map = from_upper_half(&tables::PC437);
                map.extend(tables::GREEK_FALLBACK.iter().copied());
                map
            }
            CharacterSet::Iso8859_7 => from_encoding(encoding_rs::ISO_8859_7),
            CharacterSet::Wpc1253 => from_encoding(encoding_rs::WINDOWS_1253),
            CharacterSet::Wpc1252 => from_encoding(encoding_rs::WINDOWS_1252),
            CharacterSet::Pc866 => from_encoding(encoding_rs::IBM866),
            CharacterSet::Wpc1251 => from_encoding(encoding_rs::WINDOWS_1251),
        })
        .collect()
});

fn from_upper_half(glyphs: &[char; 128]) -> HashMap<char, u8> {
    glyphs
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, 0x80 + i as u8))
        .collect()
}

/// Build the upper-half table by decoding each byte with encoding_rs
fn from_encoding(encoding: &'static encoding_rs::Encoding) -> HashMap<char, u8> {
    let mut map = HashMap::with_capacity(128);
    for b in 0x80..=0xFFu8 {
        let byte = [b];
        let Some(decoded) = encoding.decode_without_bom_handling_and_without_replacement(&byte)
        else {
            continue;
        };
        let mut chars = decoded.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            map.entry(c).or_insert(b);
        }
    }
    map
}

/// Whether a character belongs to the Greek or Greek Extended blocks
pub fn is_greek_char(c: char) -> bool {
    matches!(c, '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}')
}

/// Whether the text contains any Greek character
pub fn contains_greek(s: &str) -> bool {
    s.chars().any(is_greek_char)
}

/// Printed column width of a string
///
/// Single-byte code pages print one column per character.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column width
pub fn truncate_width(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to a specific column width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_width(s: &str, width: usize, align_right: bool) -> String {
    let current = text_width(s);
    if current >= width {
        return truncate_width(s, width);
    }
    let spaces = " ".repeat(width - current);
    if align_right {
        format!("{}{}", spaces, s)
    } else {
        format!("{}{}", s, spaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greek_alpha_per_table() {
        assert_eq!(CharacterSet::Wpc1253.encode_char('Α'), 0xC1);
        assert_eq!(CharacterSet::Iso8859_7.encode_char('Α'), 0xC1);
        assert_eq!(CharacterSet::Pc737.encode_char('Α'), 0x80);
        assert_eq!(CharacterSet::GreekFallback.encode_char('Α'), 0x41);
    }

    #[test]
    fn test_fallback_keeps_duplicate_bytes() {
        let cs = CharacterSet::GreekFallback;
        assert_eq!(cs.encode_char('Ξ'), cs.encode_char('Χ'));
        assert_eq!(cs.encode_char('σ'), cs.encode_char('ς'));
        assert_eq!(cs.encode_char('β'), 0xE1);
    }

    #[test]
    fn test_ascii_passthrough() {
        for cs in CharacterSet::ALL {
            assert_eq!(cs.encode("Hello, 42!"), b"Hello, 42!".to_vec());
        }
    }

    #[test]
    fn test_euro_native_or_fallback() {
        assert_eq!(CharacterSet::Pc858.encode_char('€'), 0xD5);
        assert_eq!(CharacterSet::Wpc1252.encode_char('€'), 0x80);
        assert_eq!(CharacterSet::Wpc1253.encode_char('€'), 0x80);
        assert_eq!(CharacterSet::Pc437.encode_char('€'), b'E');
        assert_eq!(CharacterSet::Pc866.encode_char('€'), b'E');
    }

    #[test]
    fn test_unmapped_becomes_question_mark() {
        assert_eq!(CharacterSet::Pc437.encode_char('中'), b'?');
        assert_eq!(CharacterSet::Pc850.encode_char('Ж'), b'?');
        assert_eq!(CharacterSet::Pc437.encode_char('\t'), b'?');
    }

    #[test]
    fn test_encoding_is_total() {
        let sample = "aΩ€中Ж\u{0}\u{1F600}é\n ~";
        for cs in CharacterSet::ALL {
            let out = cs.encode(sample);
            assert_eq!(out.len(), sample.chars().count(), "{}", cs);
        }
    }

    #[test]
    fn test_cyrillic_tables() {
        assert_eq!(CharacterSet::Wpc1251.encode_char('Ж'), 0xC6);
        assert_eq!(CharacterSet::Pc866.encode_char('Ж'), 0x86);
    }

    #[test]
    fn test_latin_tables() {
        assert_eq!(CharacterSet::Pc437.encode_char('é'), 0x82);
        assert_eq!(CharacterSet::Pc850.encode_char('Ø'), 0x9D);
        assert_eq!(CharacterSet::Wpc1252.encode_char('ñ'), 0xF1);
    }

    #[test]
    fn test_code_page_numbers() {
        assert_eq!(CharacterSet::Pc437.code_page(), 0);
        assert_eq!(CharacterSet::Pc737.code_page(), 14);
        assert_eq!(CharacterSet::Pc858.code_page(), 19);
        assert_eq!(CharacterSet::Wpc1253.code_page(), 47);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("WPC1253".parse::<CharacterSet>(), Ok(CharacterSet::Wpc1253));
        assert_eq!(
            "greek-fallback".parse::<CharacterSet>(),
            Ok(CharacterSet::GreekFallback)
        );
        assert!("gbk".parse::<CharacterSet>().is_err());
    }

    #[test]
    fn test_greek_detection() {
        assert!(contains_greek("Σύνολο"));
        assert!(contains_greek("ἀγάπη"));
        assert!(!contains_greek("Total"));
    }

    #[test]
    fn test_pad_width() {
        assert_eq!(pad_width("hi", 5, false), "hi   ");
        assert_eq!(pad_width("hi", 5, true), "   hi");
        assert_eq!(pad_width("hello world", 5, false), "hello");
        assert_eq!(pad_width("Καφές", 6, false), "Καφές ");
    }
}
