//! Byte-level checks on complete print streams

use crab_printer::{Alignment, CharacterSet, DrawerPin, EscPosBuilder, PaperWidth, TextSize};

fn job(charset: CharacterSet) -> EscPosBuilder {
    let mut b = EscPosBuilder::new(PaperWidth::Mm58);
    b.initialize().character_set(charset);
    b
}

#[test]
fn test_stream_starts_with_initialize_and_ends_with_cut() {
    let mut b = job(CharacterSet::Pc858);
    b.align(Alignment::Center)
        .bold(true)
        .line("Café Ω €")
        .bold(false)
        .two_columns("Espresso", "2.50")
        .open_drawer(DrawerPin::Pin2)
        .cut();
    let bytes = b.build();

    assert_eq!(&bytes[..2], &[0x1B, 0x40]);
    assert_eq!(&bytes[bytes.len() - 4..], &[0x1D, 0x56, 0x42, 0x03]);
    let drawer = [0x1B, 0x70, 0x00, 25, 250];
    assert!(bytes.windows(5).any(|w| w == drawer));
}

#[test]
fn test_every_character_set_encodes_one_byte_per_char() {
    let text = "Σύνολο 12,50€ Итого Total ¥ 中 \u{1F355}";
    for charset in CharacterSet::ALL {
        let mut b = EscPosBuilder::new(PaperWidth::Mm80);
        b.character_set(charset);
        let header = b.len();
        // Keep Greek detection from inserting a code page switch
        let plain: String = text.chars().filter(|c| !crab_printer::encoding::is_greek_char(*c)).collect();
        b.text(&plain);
        assert_eq!(b.len() - header, plain.chars().count(), "{}", charset);
    }
}

#[test]
fn test_greek_alpha_bytes() {
    let mut b = job(CharacterSet::Wpc1253);
    b.text("Α");
    assert_eq!(b.build(), vec![0x1B, 0x40, 0x1B, 0x74, 47, 0xC1]);

    let mut b = job(CharacterSet::GreekFallback);
    b.text("Α");
    assert_eq!(b.build(), vec![0x1B, 0x40, 0x1B, 0x74, 0, 0x41]);
}

#[test]
fn test_greek_under_latin_switches_once() {
    let mut b = EscPosBuilder::new(PaperWidth::Mm80).with_greek_charset(CharacterSet::Iso8859_7);
    b.text("Total ").text("Σύνολο").text(" ok");
    let bytes = b.build();

    let switches = bytes.windows(2).filter(|w| *w == [0x1B, 0x74]).count();
    assert_eq!(switches, 1);
    assert_eq!(b.charset(), CharacterSet::Iso8859_7);
    assert_eq!(&bytes[..6], b"Total ");
    assert_eq!(&bytes[6..9], &[0x1B, 0x74, 15]);
}

#[test]
fn test_size_directive_inside_stream() {
    let mut b = EscPosBuilder::new(PaperWidth::Mm80);
    b.text_size(TextSize::new(10, -3)).text_size(TextSize::new(2, 3));
    assert_eq!(b.build(), vec![0x1D, 0x21, 0x70, 0x1D, 0x21, 0x12]);
}

#[test]
fn test_layout_lines_fit_paper() {
    for paper in [PaperWidth::Mm58, PaperWidth::Mm80, PaperWidth::Mm112] {
        let mut b = EscPosBuilder::new(paper);
        b.three_columns(
            "A very long product name that overflows",
            "x12",
            "1234.56",
        );
        let bytes = b.build();
        let line = &bytes[..bytes.len() - 1];
        assert_eq!(line.len(), paper.columns(), "{}", paper);
        assert_eq!(bytes.last(), Some(&0x0A));
    }
}
