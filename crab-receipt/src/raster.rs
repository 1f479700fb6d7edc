//! Raster delegation
//!
//! Scripts the printer's code pages cannot show (CJK, Arabic, emoji) are
//! drawn by an external renderer into raster command bytes (`GS v 0`). The
//! composer only merges those bytes into the job stream.

use crab_printer::PaperWidth;

use crate::error::ComposeResult;
use crate::types::ReceiptJob;

/// Printable width in dots at 203 dpi
pub fn paper_dots(paper: PaperWidth) -> u32 {
    match paper {
        PaperWidth::Mm58 => 384,
        PaperWidth::Mm80 => 576,
        PaperWidth::Mm112 => 832,
    }
}

/// External receipt rasterizer
pub trait RasterRenderer: Send + Sync {
    /// Render the receipt body as ready-to-send raster command bytes
    fn render(&self, job: &ReceiptJob, width_dots: u32) -> ComposeResult<Vec<u8>>;
}

impl<F> RasterRenderer for F
where
    F: Fn(&ReceiptJob, u32) -> ComposeResult<Vec<u8>> + Send + Sync,
{
    fn render(&self, job: &ReceiptJob, width_dots: u32) -> ComposeResult<Vec<u8>> {
        self(job, width_dots)
    }
}
