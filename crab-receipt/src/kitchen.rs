//! Kitchen ticket composer
//!
//! Renders a kitchen order into ESC/POS bytes. Items are grouped by
//! category and sorted by external id inside each group.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{FixedOffset, Offset, Utc};
use crab_printer::{CharacterSet, EscPosBuilder, PaperWidth};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ComposeError, ComposeResult};
use crate::localize::Localizer;
use crate::types::MAX_QUANTITY;

/// Item as the kitchen and label printers see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintItem {
    pub category_id: String,
    pub category_name: String,
    /// Product number on the menu
    #[serde(default)]
    pub external_id: Option<i64>,
    /// Short name used in the kitchen
    pub kitchen_name: String,
    pub product_name: String,
    #[serde(default)]
    pub spec_name: Option<String>,
    pub quantity: u32,
    /// Label position, e.g. `2/5`
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// One round of items sent to the kitchen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenOrder {
    pub id: String,
    pub order_id: String,
    #[serde(default)]
    pub table_name: Option<String>,
    /// Unix millis
    pub created_at: i64,
    pub items: Vec<PrintItem>,
    /// Times this ticket was printed before
    #[serde(default)]
    pub print_count: u32,
}

impl KitchenOrder {
    /// Every item quantity must lie within `1..=9999`
    pub fn validate(&self) -> ComposeResult<()> {
        for item in &self.items {
            if item.quantity == 0 || item.quantity > MAX_QUANTITY {
                return Err(ComposeError::InvalidJob(format!(
                    "quantity of '{}' must be within 1..={}, got {}",
                    item.product_name, MAX_QUANTITY, item.quantity
                )));
            }
        }
        Ok(())
    }
}

/// Kitchen ticket composer
pub struct KitchenTicketComposer<'a> {
    paper: PaperWidth,
    charset: CharacterSet,
    offset: FixedOffset,
    localizer: &'a dyn Localizer,
}

impl<'a> KitchenTicketComposer<'a> {
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

    /// Offset used to print timestamps
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Render a kitchen order to ESC/POS bytes
    pub fn compose(&self, order: &KitchenOrder) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.paper);
        if self.charset.is_greek() {
            b = b.with_greek_charset(self.charset);
        }
        b.initialize().character_set(self.charset);

        self.render_header(&mut b, order);
        for (category_name, items) in group_by_category(&order.items) {
            self.render_category(&mut b, &category_name, &items);
        }
        self.render_footer(&mut b, order);

        debug!(order_id = %order.order_id, bytes = b.len(), "Kitchen ticket composed");
        b.build()
    }

    fn render_header(&self, b: &mut EscPosBuilder, order: &KitchenOrder) {
        b.center().double_size().bold(true);
        let table = order
            .table_name
            .clone()
            .unwrap_or_else(|| self.localizer.t("kitchen.takeaway", &[]));
        b.line(&table);
        b.bold(false).reset_size();

        b.line(&self.format_timestamp(order.created_at));
        b.left().sep_double();
    }

    fn render_category(&self, b: &mut EscPosBuilder, category_name: &str, items: &[&PrintItem]) {
        b.bold(true).line(&format!("[{}]", category_name)).bold(false);
        for item in items {
            render_item(b, item);
        }
        b.sep_single();
    }

    fn render_footer(&self, b: &mut EscPosBuilder, order: &KitchenOrder) {
        if order.print_count > 0 {
            let count = order.print_count.to_string();
            b.line_feed().center().bold(true);
            b.line(&self.localizer.t("kitchen.reprint", &[("count", count.as_str())]));
            b.bold(false).left();
        }
        b.cut();
    }

    /// `MM-DD HH:MM:SS` in the configured offset
    pub(crate) fn format_timestamp(&self, millis: i64) -> String {
        format_timestamp(millis, self.offset, self.localizer)
    }
}

pub(crate) fn format_timestamp(millis: i64, offset: FixedOffset, localizer: &dyn Localizer) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.with_timezone(&offset).format("%m-%d %H:%M:%S").to_string(),
        None => localizer.t("kitchen.unknown_time", &[]),
    }
}

/// Item line: `#001 Name (spec) x2 [2/5]`, then options and note
fn render_item(b: &mut EscPosBuilder, item: &PrintItem) {
    let mut line = match item.external_id {
        Some(id) => format!("#{:03} ", id),
        None => "     ".to_string(),
    };
    line.push_str(&item.kitchen_name);
    if let Some(spec) = item.spec_name.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!(" ({})", spec));
    }
    if item.quantity > 1 {
        line.push_str(&format!(" x{}", item.quantity));
    }
    if let Some(index) = &item.index {
        line.push_str(&format!(" [{}]", index));
    }

    b.double_height().line(&line).reset_size();

    for option in &item.options {
        b.line(&format!("     - {}", option));
    }
    if let Some(note) = item.note.as_deref().filter(|n| !n.is_empty()) {
        b.bold(true).line(&format!("     * {}", note)).bold(false);
    }
}

/// Group by category id; inside a group, external id ascending with
/// unnumbered items last
pub fn group_by_category(items: &[PrintItem]) -> Vec<(String, Vec<&PrintItem>)> {
    let mut groups: BTreeMap<&str, Vec<&PrintItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.category_id.as_str()).or_default().push(item);
    }

    groups
        .into_values()
        .map(|mut items| {
            items.sort_by(|a, b| match (a.external_id, b.external_id) {
                (Some(a_id), Some(b_id)) => a_id.cmp(&b_id),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
            let category_name = items
                .first()
                .map(|i| i.category_name.clone())
                .unwrap_or_default();
            (category_name, items)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::localize::{Catalog, Language};

    pub(crate) fn item(category: &str, external_id: Option<i64>, name: &str, quantity: u32) -> PrintItem {
        PrintItem {
            category_id: category.to_string(),
            category_name: format!("Cat {}", category),
            external_id,
            kitchen_name: name.to_string(),
            product_name: name.to_string(),
            spec_name: None,
            quantity,
            index: None,
            options: Vec::new(),
            note: None,
        }
    }

    pub(crate) fn order() -> KitchenOrder {
        let mut first = item("1", Some(3), "Moussaka", 2);
        first.spec_name = Some("Large".into());
        first.options = vec!["No onion".into()];
        first.note = Some("Allergy: nuts".into());
        KitchenOrder {
            id: "evt-1".into(),
            order_id: "order-1".into(),
            table_name: Some("T12".into()),
            created_at: 1705912335000, // 2024-01-22 08:32:15 UTC
            items: vec![
                first,
                item("2", Some(15), "Salad", 1),
                item("1", None, "Bread", 1),
                item("1", Some(1), "Soup", 1),
            ],
            print_count: 0,
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_validate_quantities() {
        assert!(order().validate().is_ok());
        let mut bad = order();
        bad.items[1].quantity = MAX_QUANTITY + 1;
        assert!(matches!(bad.validate(), Err(ComposeError::InvalidJob(_))));
    }

    #[test]
    fn test_group_by_category() {
        let order = order();
        let grouped = group_by_category(&order.items);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "Cat 1");
        let names: Vec<&str> = grouped[0].1.iter().map(|i| i.kitchen_name.as_str()).collect();
        assert_eq!(names, vec!["Soup", "Moussaka", "Bread"]);
        assert_eq!(grouped[1].1.len(), 1);
    }

    #[test]
    fn test_render_kitchen_ticket() {
        let catalog = Catalog::builtin(Language::En);
        let composer = KitchenTicketComposer::new(PaperWidth::Mm80, &catalog);
        let data = composer.compose(&order());

        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert!(contains(&data, b"T12"));
        assert!(contains(&data, b"01-22 08:32:15"));
        assert!(contains(&data, b"[Cat 1]"));
        assert!(contains(&data, b"#003 Moussaka (Large) x2"));
        assert!(contains(&data, b"     - No onion"));
        assert!(contains(&data, b"     * Allergy: nuts"));
        assert!(!contains(&data, b"REPRINT"));
        assert_eq!(&data[data.len() - 4..], &[0x1D, 0x56, 0x42, 0x03]);
    }

    #[test]
    fn test_reprint_marker_and_takeaway() {
        let catalog = Catalog::builtin(Language::En);
        let composer = KitchenTicketComposer::new(PaperWidth::Mm58, &catalog)
            .with_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        let mut order = order();
        order.print_count = 2;
        order.table_name = None;
        let data = composer.compose(&order);
        assert!(contains(&data, b"*** REPRINT #2 ***"));
        assert!(contains(&data, b"TAKEAWAY"));
        assert!(contains(&data, b"01-22 10:32:15"));
    }

    #[test]
    fn test_greek_ticket_switches_code_page() {
        let catalog = Catalog::builtin(Language::El);
        let composer = KitchenTicketComposer::new(PaperWidth::Mm80, &catalog);
        let mut order = order();
        order.table_name = None;
        let data = composer.compose(&order);
        // Starts in PC858, switches once to PC737 for ΠΑΚΕΤΟ
        assert!(contains(&data, &[0x1B, 0x74, 19]));
        assert!(contains(&data, &[0x1B, 0x74, 14]));
    }
}
