//! # crab-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Single-byte code pages (Latin, Greek, Cyrillic) with automatic Greek switching
//! - Printer connections over serial, USB, Bluetooth and TCP, with retry and
//!   auto-reconnect
//!
//! Business logic (WHAT to print) lives in `crab-receipt`.
//!
//! ## Example
//!
//! ```ignore
//! use crab_printer::{EscPosBuilder, NetworkChannel, NetworkDescriptor, PaperWidth, Transport, TransportOptions};
//!
//! let mut builder = EscPosBuilder::new(PaperWidth::Mm80);
//! builder.initialize();
//! builder.center().double_size().line("ΚΟΥΖΙΝΑ");
//! builder.reset_size().sep_double().left();
//! builder.line("Table: 12");
//! builder.cut();
//!
//! let channel = NetworkChannel::new(NetworkDescriptor::new("192.168.1.100", 9100)?)?;
//! let transport = Transport::new(channel, TransportOptions::default());
//! transport.connect().await?;
//! transport.send(&builder.build()).await?;
//! ```

pub mod encoding;
mod error;
mod escpos;
pub mod transport;

// Re-exports
pub use encoding::{CharacterSet, contains_greek, pad_width, text_width, truncate_width};
pub use error::{TransportError, TransportErrorKind, TransportResult};
pub use escpos::{
    Alignment, BarcodeKind, DrawerPin, EscPosBuilder, HriPosition, PaperWidth, TextSize,
    UnderlineMode, section_header_line, three_column_line, two_column_line,
};
pub use transport::{
    BluetoothChannel, BluetoothDescriptor, Capability, Channel, ChannelBackends, ChannelLink,
    DynTransport, NetworkChannel, NetworkDescriptor, PrinterTarget, SerialChannel,
    SerialDescriptor, Transport, TransportEvent, TransportOptions, TransportState,
    TransportStatus, UsbChannel, UsbDescriptor,
};
