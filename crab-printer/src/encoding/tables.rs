//! Upper-half (0x80-0xFF) glyph tables for the DOS code pages
//!
//! Index `i` holds the character printed for byte `0x80 + i`.
//! Windows and ISO pages are not listed here, they come from `encoding_rs`.

/// PC437 (USA, Standard Europe)
pub(crate) const PC437: [char; 128] = [
    // 0x80
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    // 0x90
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    // 0xA0
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    // 0xB0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    // 0xD0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    // 0xE0
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    // 0xF0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{A0}',
];

/// PC737 (Greek)
pub(crate) const PC737: [char; 128] = [
    // 0x80
    'Α', 'Β', 'Γ', 'Δ', 'Ε', 'Ζ', 'Η', 'Θ', 'Ι', 'Κ', 'Λ', 'Μ', 'Ν', 'Ξ', 'Ο', 'Π',
    // 0x90
    'Ρ', 'Σ', 'Τ', 'Υ', 'Φ', 'Χ', 'Ψ', 'Ω', 'α', 'β', 'γ', 'δ', 'ε', 'ζ', 'η', 'θ',
    // 0xA0
    'ι', 'κ', 'λ', 'μ', 'ν', 'ξ', 'ο', 'π', 'ρ', 'σ', 'ς', 'τ', 'υ', 'φ', 'χ', 'ψ',
    // 0xB0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    // 0xD0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    // 0xE0
    'ω', 'ά', 'έ', 'ή', 'ϊ', 'ί', 'ό', 'ύ', 'ϋ', 'ώ', 'Ά', 'Έ', 'Ή', 'Ί', 'Ό', 'Ύ',
    // 0xF0
    'Ώ', '±', '≥', '≤', 'Ϊ', 'Ϋ', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{A0}',
];

/// PC850 (Multilingual Latin-1). PC858 is this table with the Euro at 0xD5.
pub(crate) const PC850: [char; 128] = [
    // 0x80
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    // 0x90
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', 'ø', '£', 'Ø', '×', 'ƒ',
    // 0xA0
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '®', '¬', '½', '¼', '¡', '«', '»',
    // 0xB0
    '░', '▒', '▓', '│', '┤', 'Á', 'Â', 'À', '©', '╣', '║', '╗', '╝', '¢', '¥', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', 'ã', 'Ã', '╚', '╔', '╩', '╦', '╠', '═', '╬', '¤',
    // 0xD0
    'ð', 'Ð', 'Ê', 'Ë', 'È', 'ı', 'Í', 'Î', 'Ï', '┘', '┌', '█', '▄', '¦', 'Ì', '▀',
    // 0xE0
    'Ó', 'ß', 'Ô', 'Ò', 'õ', 'Õ', 'µ', 'þ', 'Þ', 'Ú', 'Û', 'Ù', 'ý', 'Ý', '¯', '´',
    // 0xF0
    '\u{AD}', '±', '‗', '¾', '¶', '§', '÷', '¸', '°', '¨', '·', '¹', '³', '²', '■', '\u{A0}',
];

/// Euro position in PC858
pub(crate) const PC858_EURO: u8 = 0xD5;

/// Greek lookalike table for printers that only ship PC437.
///
/// Reverse-engineered from printed output. Several letters share a byte
/// (Ξ/Χ, Υ/Ψ, Θ/θ, σ/ς...) and lowercase letters without a PC437 glyph fall
/// back to Latin lookalikes. Keep the byte values as they are.
pub(crate) const GREEK_FALLBACK: &[(char, u8)] = &[
    // Capitals
    ('Α', 0x41),
    ('Β', 0x42),
    ('Γ', 0xE2),
    ('Δ', 0x44),
    ('Ε', 0x45),
    ('Ζ', 0x5A),
    ('Η', 0x48),
    ('Θ', 0xE9),
    ('Ι', 0x49),
    ('Κ', 0x4B),
    ('Λ', 0x4C),
    ('Μ', 0x4D),
    ('Ν', 0x4E),
    ('Ξ', 0x58),
    ('Ο', 0x4F),
    ('Π', 0xE3),
    ('Ρ', 0x50),
    ('Σ', 0xE4),
    ('Τ', 0x54),
    ('Υ', 0x59),
    ('Φ', 0xE8),
    ('Χ', 0x58),
    ('Ψ', 0x59),
    ('Ω', 0xEA),
    // Lowercase
    ('α', 0xE0),
    ('β', 0xE1),
    ('γ', 0x79),
    ('δ', 0xEB),
    ('ε', 0xEE),
    ('ζ', 0x7A),
    ('η', 0x6E),
    ('θ', 0xE9),
    ('ι', 0x69),
    ('κ', 0x6B),
    ('λ', 0x6C),
    ('μ', 0xE6),
    ('ν', 0x76),
    ('ξ', 0x78),
    ('ο', 0x6F),
    ('π', 0xE3),
    ('ρ', 0x70),
    ('σ', 0xE5),
    ('ς', 0xE5),
    ('τ', 0xE7),
    ('υ', 0x75),
    ('φ', 0xED),
    ('χ', 0x78),
    ('ψ', 0x79),
    ('ω', 0x77),
    // Tonos / dialytika
    ('Ά', 0x41),
    ('Έ', 0x45),
    ('Ή', 0x48),
    ('Ί', 0x49),
    ('Ό', 0x4F),
    ('Ύ', 0x59),
    ('Ώ', 0xEA),
    ('Ϊ', 0x49),
    ('Ϋ', 0x59),
    ('ά', 0xE0),
    ('έ', 0xEE),
    ('ή', 0x6E),
    ('ί', 0x69),
    ('ό', 0x6F),
    ('ύ', 0x75),
    ('ώ', 0x77),
    ('ϊ', 0x69),
    ('ϋ', 0x75),
    ('ΐ', 0x69),
    ('ΰ', 0x75),
];
