//! Item label composer
//!
//! One sticker per unit. A kitchen order with 3 coffees and 2 teas prints
//! five labels indexed `1/5` … `5/5`.

use chrono::{FixedOffset, Offset, Utc};
use crab_printer::{CharacterSet, EscPosBuilder, PaperWidth};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ComposeError, ComposeResult};
use crate::kitchen::{KitchenOrder, PrintItem, format_timestamp};
use crate::localize::Localizer;
use crate::types::MAX_QUANTITY;

/// A single sticker to print
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub order_id: String,
    pub kitchen_order_id: String,
    #[serde(default)]
    pub table_name: Option<String>,
    pub created_at: i64,
    /// Quantity is always 1 and `index` is set
    pub item: PrintItem,
    #[serde(default)]
    pub print_count: u32,
}

impl LabelRecord {
    /// Expand an order into per-unit records
    ///
    /// A whole order yields at most 9999 labels.
    pub fn from_order(order: &KitchenOrder) -> ComposeResult<Vec<LabelRecord>> {
        order.validate()?;
        let total = order
            .items
            .iter()
            .try_fold(0u32, |sum, item| sum.checked_add(item.quantity))
            .filter(|total| *total <= MAX_QUANTITY)
            .ok_or_else(|| {
                ComposeError::InvalidJob(format!(
                    "order {} needs more than {} labels",
                    order.id, MAX_QUANTITY
                ))
            })?;
        let mut position = 0;
        let mut records = Vec::with_capacity(total as usize);
        for item in &order.items {
            for _ in 0..item.quantity {
                position += 1;
                let mut unit = item.clone();
                unit.quantity = 1;
                unit.index = Some(format!("{}/{}", position, total));
                records.push(LabelRecord {
                    order_id: order.order_id.clone(),
                    kitchen_order_id: order.id.clone(),
                    table_name: order.table_name.clone(),
                    created_at: order.created_at,
                    item: unit,
                    print_count: order.print_count,
                });
            }
        }
        Ok(records)
    }
}

/// Label composer
pub struct LabelComposer<'a> {
    paper: PaperWidth,
    charset: CharacterSet,
    offset: FixedOffset,
    localizer: &'a dyn Localizer,
}

impl<'a> LabelComposer<'a> {
    pub fn new(paper: PaperWidth, localizer: &'a dyn Localizer) -> Self {
        Self {
            paper,
            charset: CharacterSet::Pc858,
            offset: Utc.fix(),
            localizer,
        }
    }

    pub fn with_charset(mut self, charset: CharacterSet) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn compose(&self, record: &LabelRecord) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.paper);
        if self.charset.is_greek() {
            b = b.with_greek_charset(self.charset);
        }
        b.initialize().character_set(self.charset);

        let item = &record.item;
        let table = record
            .table_name
            .clone()
            .unwrap_or_else(|| self.localizer.t("kitchen.takeaway", &[]));
        let index = item.index.as_deref().unwrap_or("");
        b.left().bold(true).two_columns(&table, index).bold(false);

        let name = match item.spec_name.as_deref().filter(|s| !s.is_empty()) {
            Some(spec) => format!("{} ({})", item.product_name, spec),
            None => item.product_name.clone(),
        };
        b.double_height().line(&name).reset_size();

        if !item.options.is_empty() {
            b.line(&item.options.join(", "));
        }
        if let Some(note) = item.note.as_deref().filter(|n| !n.is_empty()) {
            b.bold(true).line(&format!("* {}", note)).bold(false);
        }

        b.right()
            .line(&format_timestamp(record.created_at, self.offset, self.localizer))
            .left();
        b.cut();

        debug!(order_id = %record.order_id, index, "Label composed");
        b.build()
    }

    /// One byte stream per unit in the order
    pub fn compose_order(&self, order: &KitchenOrder) -> ComposeResult<Vec<Vec<u8>>> {
        Ok(LabelRecord::from_order(order)?
            .iter()
            .map(|record| self.compose(record))
            .collect())
    }
}
