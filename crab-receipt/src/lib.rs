//! # crab-receipt
//!
//! WHAT to print: customer receipts, kitchen tickets and item labels built
//! on top of the `crab-printer` ESC/POS builder.
//!
//! ## Example
//!
//! ```ignore
//! use crab_receipt::{Catalog, ReceiptComposer, ReceiptJob};
//!
//! let job = ReceiptJob::from_json(&payload)?;
//! let catalog = Catalog::builtin(job.config.language);
//! let bytes = ReceiptComposer::new(&job, &catalog).compose()?;
//! transport.send(&bytes).await?;
//! ```

pub mod address;
pub mod currency;
mod error;
pub mod kitchen;
pub mod label;
pub mod localize;
pub mod raster;
pub mod receipt;
pub mod types;

pub use address::DeliveryAddress;
pub use currency::{MoneyFormat, currency_symbol};
pub use error::{ComposeError, ComposeResult};
pub use kitchen::{KitchenOrder, KitchenTicketComposer, PrintItem};
pub use label::{LabelComposer, LabelRecord};
pub use localize::{Catalog, Language, Localizer};
pub use raster::RasterRenderer;
pub use receipt::ReceiptComposer;
pub use types::{
    Adjustment, AdjustmentKind, Customer, ItemOption, LineItem, Order, Payment, ReceiptConfig,
    ReceiptJob, RenderMode, StoreInfo, TemplateVariant, Totals,
};
