//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data. Every directive
//! appends its exact byte sequence in call order; nothing is reordered or
//! batched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::encoding::{CharacterSet, contains_greek, pad_width, text_width, truncate_width};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Capacity of a version 40 QR symbol
const QR_MAX_DATA: usize = 7089;

/// Paper width; decides the column count for layout helpers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperWidth {
    /// 58mm paper, 32 columns
    #[serde(rename = "58mm")]
    Mm58,
    /// 80mm paper, 48 columns
    #[default]
    #[serde(rename = "80mm")]
    Mm80,
    /// 112mm paper, 64 columns
    #[serde(rename = "112mm")]
    Mm112,
}

impl PaperWidth {
    pub fn columns(&self) -> usize {
        match self {
            Self::Mm58 => 32,
            Self::Mm80 => 48,
            Self::Mm112 => 64,
        }
    }
}

impl fmt::Display for PaperWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mm58 => f.write_str("58mm"),
            Self::Mm80 => f.write_str("80mm"),
            Self::Mm112 => f.write_str("112mm"),
        }
    }
}

impl FromStr for PaperWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("mm") {
            "58" => Ok(Self::Mm58),
            "80" => Ok(Self::Mm80),
            "112" => Ok(Self::Mm112),
            other => Err(format!("Unsupported paper width: {}", other)),
        }
    }
}

/// Text alignment (ESC a n)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Underline mode (ESC - n)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnderlineMode {
    #[default]
    Off = 0,
    Single = 1,
    Double = 2,
}

/// Character magnification; each axis is clamped to 1..=8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSize {
    pub width: i32,
    pub height: i32,
}

impl TextSize {
    pub const NORMAL: TextSize = TextSize {
        width: 1,
        height: 1,
    };

    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// GS ! parameter: `((w-1) << 4) | (h-1)`
    pub fn packed(&self) -> u8 {
        let w = self.width.clamp(1, 8) as u8;
        let h = self.height.clamp(1, 8) as u8;
        ((w - 1) << 4) | (h - 1)
    }
}

impl Default for TextSize {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Cash drawer connector pin (ESC p m)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerPin {
    #[default]
    Pin2 = 0,
    Pin5 = 1,
}

/// Barcode symbology (GS k, format B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeKind {
    Ean13 = 67,
    Code39 = 69,
    Code128 = 73,
}

/// Position of the human-readable interpretation text (GS H n)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HriPosition {
    None = 0,
    Above = 1,
    #[default]
    Below = 2,
    Both = 3,
}

/// ESC/POS command builder
///
/// One builder per print job. Text is encoded with the active
/// [`CharacterSet`]; Greek text switches to the Greek set automatically.
#[derive(Debug, Clone)]
pub struct EscPosBuilder {
    buf: Vec<u8>,
    paper: PaperWidth,
    charset: CharacterSet,
    greek_charset: CharacterSet,
}

impl EscPosBuilder {
    /// Create a new builder for the given paper width
    pub fn new(paper: PaperWidth) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            paper,
            charset: CharacterSet::default(),
            greek_charset: CharacterSet::Pc737,
        }
    }

    /// Greek set used when Greek text is detected under a non-Greek set
    pub fn with_greek_charset(mut self, charset: CharacterSet) -> Self {
        if charset.is_greek() {
            self.greek_charset = charset;
        }
        self
    }

    pub fn paper(&self) -> PaperWidth {
        self.paper
    }

    /// Column count of the configured paper
    pub fn width(&self) -> usize {
        self.paper.columns()
    }

    pub fn charset(&self) -> CharacterSet {
        self.charset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    // === Printer Control ===

    /// Reset printer to default state (ESC @)
    pub fn initialize(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x40]);
        self
    }

    /// Select a character set: sends ESC t and switches the encoder
    pub fn character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.charset = charset;
        if charset.is_greek() {
            self.greek_charset = charset;
        }
        self.code_page(charset.code_page())
    }

    /// Select code page (ESC t n) without touching the encoder
    pub fn code_page(&mut self, page: u8) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x74, page]);
        self
    }

    /// Select international character set (ESC R n)
    pub fn international_charset(&mut self, n: u8) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x52, n]);
        self
    }

    // === Text Output ===

    /// Write text encoded with the active character set
    pub fn text(&mut self, s: &str) -> &mut Self {
        if !self.charset.is_greek() && contains_greek(s) {
            trace!(charset = %self.greek_charset, "greek text detected");
            let greek = self.greek_charset;
            self.character_set(greek);
        }
        self.charset.encode_into(s, &mut self.buf);
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.line_feed()
    }

    /// Print and feed one line (LF)
    pub fn line_feed(&mut self) -> &mut Self {
        self.buf.push(LF);
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    // === Alignment ===

    pub fn align(&mut self, alignment: Alignment) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x61, alignment as u8]);
        self
    }

    pub fn left(&mut self) -> &mut Self {
        self.align(Alignment::Left)
    }

    pub fn center(&mut self) -> &mut Self {
        self.align(Alignment::Center)
    }

    pub fn right(&mut self) -> &mut Self {
        self.align(Alignment::Right)
    }

    // === Text Style ===

    /// Bold on/off (ESC E n)
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x45, on as u8]);
        self
    }

    /// Underline (ESC - n)
    pub fn underline(&mut self, mode: UnderlineMode) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x2D, mode as u8]);
        self
    }

    /// Character size (GS ! n)
    pub fn text_size(&mut self, size: TextSize) -> &mut Self {
        self.buf.extend_from_slice(&[GS, 0x21, size.packed()]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.text_size(TextSize::new(2, 2))
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.text_size(TextSize::new(1, 2))
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.text_size(TextSize::NORMAL)
    }

    // === Separators ===

    /// Print a full-width line of `ch`
    pub fn horizontal_rule(&mut self, ch: char) -> &mut Self {
        let rule: String = std::iter::repeat_n(ch, self.width()).collect();
        self.line(&rule)
    }

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.horizontal_rule('=')
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.horizontal_rule('-')
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Right text wins on overflow: the left side is truncated so that at
    /// least one space separates the columns.
    pub fn two_columns(&mut self, left: &str, right: &str) -> &mut Self {
        let line = two_column_line(left, right, self.width());
        self.line(&line)
    }

    /// Print a description / middle / right row
    ///
    /// The middle and right columns each take a quarter of the width and are
    /// right-aligned; the left column takes the rest.
    pub fn three_columns(&mut self, left: &str, middle: &str, right: &str) -> &mut Self {
        let line = three_column_line(left, middle, right, self.width());
        self.line(&line)
    }

    /// Bold title centered in a rule of '='
    pub fn section_header(&mut self, title: &str) -> &mut Self {
        let line = section_header_line(title, self.width());
        self.bold(true);
        self.line(&line);
        self.bold(false)
    }

    // === Paper Control ===

    /// Feed 3 lines and full cut
    pub fn cut(&mut self) -> &mut Self {
        self.feed_and_cut(3)
    }

    /// Full cut (GS V 0)
    pub fn full_cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[GS, 0x56, 0x00]);
        self
    }

    /// Partial cut, leaves a small connection (GS V 1)
    pub fn partial_cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[GS, 0x56, 0x01]);
        self
    }

    /// Feed n lines then full cut (GS V 66 n)
    ///
    /// Lets the printer manage the cutter-to-head distance, which wastes
    /// less paper than separate feed + cut.
    pub fn feed_and_cut(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[GS, 0x56, 0x42, lines]);
        self
    }

    // === Cash Drawer ===

    /// Pulse the drawer connector (ESC p m t1 t2)
    ///
    /// On/off times are in units of 2 ms.
    pub fn cash_drawer(&mut self, pin: DrawerPin, on_time: u8, off_time: u8) -> &mut Self {
        self.buf
            .extend_from_slice(&[ESC, 0x70, pin as u8, on_time, off_time]);
        self
    }

    /// Open cash drawer with the default 25/250 pulse
    pub fn open_drawer(&mut self, pin: DrawerPin) -> &mut Self {
        self.cash_drawer(pin, 25, 250)
    }

    // === QR Code ===

    /// Print a QR code
    ///
    /// Size: 1-16 (module size in dots). Data beyond the largest QR symbol
    /// (7089 bytes) is cut at a character boundary.
    pub fn qr_code(&mut self, data: &str, size: u8) -> &mut Self {
        let size = size.clamp(1, 16);

        // Function 165: Select model (Model 2)
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);

        // Function 167: Set module size
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

        // Function 169: Set error correction (M)
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31]);

        // Function 180: Store data
        let mut end = data.len().min(QR_MAX_DATA);
        while !data.is_char_boundary(end) {
            end -= 1;
        }
        let data_bytes = &data.as_bytes()[..end];
        let len = data_bytes.len() + 3;
        let p_l = (len & 0xFF) as u8;
        let p_h = ((len >> 8) & 0xFF) as u8;
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
        self.buf.extend_from_slice(data_bytes);

        // Function 181: Print
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

        self
    }

    // === Barcode ===

    /// Print a 1D barcode with HRI text
    ///
    /// Data is restricted to printable ASCII (other characters become '?')
    /// and the payload is capped at 255 bytes.
    pub fn barcode(
        &mut self,
        kind: BarcodeKind,
        data: &str,
        height: u8,
        hri: HriPosition,
    ) -> &mut Self {
        // GS H n - HRI position
        self.buf.extend_from_slice(&[GS, 0x48, hri as u8]);
        // GS h n - height in dots
        self.buf.extend_from_slice(&[GS, 0x68, height.max(1)]);

        let mut payload: Vec<u8> = if kind == BarcodeKind::Code128 {
            // Code set B prefix
            vec![b'{', b'B']
        } else {
            Vec::new()
        };
        payload.extend(
            data.chars()
                .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' }),
        );
        payload.truncate(255);

        // GS k m n d1..dn
        self.buf
            .extend_from_slice(&[GS, 0x6B, kind as u8, payload.len() as u8]);
        self.buf.extend_from_slice(&payload);
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Snapshot of the accumulated bytes
    ///
    /// Does not consume or modify the builder; repeated calls return
    /// identical output.
    pub fn build(&self) -> Vec<u8> {
        self.buf.clone()
    }

    /// Borrow the accumulated bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Reset for reuse; encoder state returns to the default set
    pub fn clear(&mut self) -> &mut Self {
        self.buf.clear();
        self.charset = CharacterSet::default();
        self
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(PaperWidth::default())
    }
}

/// Two columns padded to exactly `width`
pub fn two_column_line(left: &str, right: &str, width: usize) -> String {
    let right = truncate_width(right, width);
    let rw = text_width(&right);
    let left = truncate_width(left, width.saturating_sub(rw + 1));
    let gap = width - text_width(&left) - rw;
    format!("{}{}{}", left, " ".repeat(gap), right)
}

/// Three columns padded to exactly `width`
pub fn three_column_line(left: &str, middle: &str, right: &str, width: usize) -> String {
    let side = width / 4;
    let left_width = width - side * 2;
    let left = pad_width(&truncate_width(left, left_width.saturating_sub(1)), left_width, false);
    let middle = pad_width(&truncate_width(middle, side.saturating_sub(1)), side, true);
    let right = pad_width(&truncate_width(right, side.saturating_sub(1)), side, true);
    format!("{}{}{}", left, middle, right)
}

/// `==== TITLE ====` padded to exactly `width`
pub fn section_header_line(title: &str, width: usize) -> String {
    let title = truncate_width(title.trim(), width.saturating_sub(2));
    let inner = format!(" {} ", title);
    let fill = width.saturating_sub(text_width(&inner));
    let left = fill / 2;
    let right = fill - left;
    format!("{}{}{}", "=".repeat(left), inner, "=".repeat(right))
}
