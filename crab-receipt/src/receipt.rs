//! Customer receipt composer
//!
//! Turns a [`ReceiptJob`] into one ESC/POS byte stream: header, items,
//! adjustments, totals, payments, tax breakdown, footer, then drawer kick
//! and cut. Raster mode hands the body to a [`RasterRenderer`] and falls
//! back to text when it fails.

use crab_printer::{DrawerPin, EscPosBuilder, two_column_line};
use tracing::{debug, instrument, warn};

use crate::address::DeliveryAddress;
use crate::currency::MoneyFormat;
use crate::error::{ComposeError, ComposeResult};
use crate::localize::Localizer;
use crate::raster::{RasterRenderer, paper_dots};
use crate::types::{LineItem, ReceiptJob, RenderMode, TemplateVariant, Totals};

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Receipt composer, one per job
pub struct ReceiptComposer<'a> {
    job: &'a ReceiptJob,
    localizer: &'a dyn Localizer,
    raster: Option<&'a dyn RasterRenderer>,
    money: MoneyFormat,
}

impl<'a> ReceiptComposer<'a> {
    pub fn new(job: &'a ReceiptJob, localizer: &'a dyn Localizer) -> Self {
        Self {
            job,
            localizer,
            raster: None,
            money: MoneyFormat::new(&job.config.currency, job.config.language),
        }
    }

    pub fn with_raster(mut self, renderer: &'a dyn RasterRenderer) -> Self {
        self.raster = Some(renderer);
        self
    }

    /// Compose the job into printer bytes
    #[instrument(skip(self), fields(order = %self.job.order.number, mode = ?self.job.config.render_mode))]
    pub fn compose(&self) -> ComposeResult<Vec<u8>> {
        self.job.order.validate()?;
        let config = &self.job.config;

        let mut b = EscPosBuilder::new(config.paper);
        if config.charset.is_greek() {
            b = b.with_greek_charset(config.charset);
        }
        b.initialize();

        match config.render_mode {
            RenderMode::Text => self.compose_text(&mut b),
            RenderMode::Raster => match self.rasterize() {
                Ok(bytes) => {
                    b.raw(&bytes);
                }
                Err(e) => {
                    warn!(error = %e, "Raster rendering failed, falling back to text");
                    self.compose_text(&mut b);
                }
            },
        }

        if config.open_drawer {
            b.open_drawer(DrawerPin::Pin2);
        }
        b.cut();

        debug!(bytes = b.len(), "Receipt composed");
        Ok(b.build())
    }

    fn rasterize(&self) -> ComposeResult<Vec<u8>> {
        let renderer = self
            .raster
            .ok_or_else(|| ComposeError::Raster("no raster renderer configured".into()))?;
        let bytes = renderer.render(self.job, paper_dots(self.job.config.paper))?;
        if bytes.is_empty() {
            return Err(ComposeError::Raster("renderer returned no data".into()));
        }
        Ok(bytes)
    }

    fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.localizer.t(key, params)
    }

    fn compose_text(&self, b: &mut EscPosBuilder) {
        b.character_set(self.job.config.charset);
        let totals = self.job.order.totals();
        match self.job.config.template {
            TemplateVariant::Standard => self.standard(b, &totals),
            TemplateVariant::Compact => self.compact(b, &totals),
        }
    }

    // === Standard ===

    fn standard(&self, b: &mut EscPosBuilder, totals: &Totals) {
        self.render_marker(b);
        self.render_store(b);
        self.render_header(b);
        self.render_customer(b);
        self.render_items(b);
        self.render_adjustments(b, totals);
        self.render_total(b, totals);
        self.render_payments(b, totals);
        self.render_taxes(b, totals);
        self.render_footer(b);
    }

    fn render_marker(&self, b: &mut EscPosBuilder) {
        let order = &self.job.order;
        let key = if order.void_reason.is_some() {
            "receipt.void"
        } else if order.pre_payment {
            "receipt.pre_payment"
        } else if order.reprint {
            "receipt.reprint"
        } else {
            return;
        };
        b.center().double_size().bold(true);
        b.line(&self.t(key, &[]));
        b.bold(false).reset_size().line_feed();
    }

    fn render_store(&self, b: &mut EscPosBuilder) {
        let store = &self.job.config.store;
        b.center();
        if !store.name.is_empty() {
            b.double_size().line(&store.name).reset_size();
        }
        if let Some(address) = &store.address {
            b.line(address);
        }
        if let Some(tax_id) = &store.tax_id {
            b.line(&self.t("receipt.tax_id", &[("tax_id", tax_id.as_str())]));
        }
        if let Some(phone) = &store.phone {
            b.line(&self.t("receipt.phone", &[("phone", phone.as_str())]));
        }
        for extra in [&store.email, &store.website].into_iter().flatten() {
            b.line(extra);
        }
        b.line_feed();
    }

    fn render_header(&self, b: &mut EscPosBuilder) {
        let order = &self.job.order;
        b.left().bold(true);
        b.line(&self.t("receipt.title", &[]));
        b.bold(false);

        let created = order.created_at.format(DATE_FORMAT).to_string();
        b.two_columns(
            &self.t("receipt.order", &[("number", order.number.as_str())]),
            &created,
        );

        let order_type = self.t(&format!("order_type.{}", order.order_type), &[]);
        let table = order
            .table
            .as_deref()
            .map(|table| self.t("receipt.table", &[("table", table)]))
            .unwrap_or_default();
        b.two_columns(&order_type, &table);

        if let Some(guests) = order.guests {
            b.line(&self.t("receipt.guests", &[("count", guests.to_string().as_str())]));
        }
        if let Some(reason) = &order.void_reason {
            b.bold(true);
            b.line(&self.t("receipt.void_reason", &[("reason", reason.as_str())]));
            b.bold(false);
        }
    }

    fn render_customer(&self, b: &mut EscPosBuilder) {
        let order = &self.job.order;
        let is_delivery = order.order_type == "delivery";
        let customer = order.customer.as_ref();
        if customer.is_none() && !is_delivery {
            return;
        }

        if is_delivery {
            b.section_header(&self.t("receipt.delivery", &[]));
        } else {
            b.sep_single();
        }
        if let Some(customer) = customer {
            if let Some(name) = &customer.name {
                b.line(&self.t("receipt.customer", &[("name", name.as_str())]));
            }
            if let Some(phone) = &customer.phone {
                b.line(&self.t("receipt.phone", &[("phone", phone.as_str())]));
            }
            if let Some(raw) = &customer.address {
                let address = DeliveryAddress::parse(raw);
                for line in address.lines(self.localizer) {
                    b.line(&line);
                }
            }
        }
    }

    fn render_items(&self, b: &mut EscPosBuilder) {
        b.sep_double();
        b.three_columns(
            &self.t("receipt.item", &[]),
            &self.t("receipt.qty", &[]),
            &self.t("receipt.amount", &[]),
        );
        b.sep_single();

        for item in &self.job.order.items {
            b.three_columns(
                &item.name,
                &item.quantity.to_string(),
                &self.money.format(item.total()),
            );
            for detail in self.item_details(item) {
                b.line(&detail);
            }
            if let Some(note) = item.note.as_deref().filter(|n| !n.is_empty()) {
                b.bold(true).line(&format!("   * {}", note)).bold(false);
            }
        }
        b.sep_double();
    }

    /// Spec name, grouped options and discount sub-lines
    fn item_details(&self, item: &LineItem) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(spec) = item.spec_name.as_deref().filter(|s| !s.is_empty()) {
            lines.push(format!("   > {}", spec));
        }

        // Options sharing a group print on one line
        let mut groups: Vec<(Option<&str>, Vec<&str>, rust_decimal::Decimal)> = Vec::new();
        for option in &item.options {
            let group = option.group.as_deref();
            match groups.iter_mut().find(|g| g.0 == group) {
                Some(g) => {
                    g.1.push(option.name.as_str());
                    g.2 += option.price;
                }
                None => groups.push((group, vec![option.name.as_str()], option.price)),
            }
        }
        for (group, names, price) in groups {
            let names = names.join(", ");
            let label = match group {
                Some(group) => format!("{}: {}", group, names),
                None => names,
            };
            if price.is_zero() {
                lines.push(format!("   > {}", label));
            } else {
                lines.push(format!("   > {} ({})", label, self.money.signed(price)));
            }
        }

        if let Some(percent) = item.discount_percent.filter(|p| !p.is_zero()) {
            lines.push(format!(
                "   > {} -{}% ({})",
                self.t("receipt.discount", &[]),
                percent.normalize(),
                self.money.format(item.gross_unit_price()),
            ));
        }
        lines
    }

    fn render_adjustments(&self, b: &mut EscPosBuilder, totals: &Totals) {
        let order = &self.job.order;
        if order.discount.is_none() && order.surcharge.is_none() {
            return;
        }
        b.two_columns(&self.t("receipt.subtotal", &[]), &self.money.format(totals.subtotal));
        if let Some(discount) = &order.discount {
            let name = discount
                .name
                .clone()
                .unwrap_or_else(|| self.t("receipt.discount", &[]));
            b.two_columns(&name, &self.money.signed(-totals.discount));
        }
        if let Some(surcharge) = &order.surcharge {
            let name = surcharge
                .name
                .clone()
                .unwrap_or_else(|| self.t("receipt.surcharge", &[]));
            b.two_columns(&name, &self.money.signed(totals.surcharge));
        }
        b.sep_single();
    }

    fn render_total(&self, b: &mut EscPosBuilder, totals: &Totals) {
        // Double width halves the column count
        let line = two_column_line(
            &self.t("receipt.total", &[]),
            &self.money.format(totals.total),
            b.width() / 2,
        );
        b.left().double_size().bold(true);
        b.line(&line);
        b.bold(false).reset_size();
    }

    fn render_payments(&self, b: &mut EscPosBuilder, totals: &Totals) {
        let payments = &self.job.order.payments;
        for payment in payments {
            let method = self.t(&format!("payment_method.{}", payment.method), &[]);
            b.two_columns(
                &self.t("receipt.paid", &[("method", method.as_str())]),
                &self.money.format(payment.amount),
            );
        }
        if !payments.is_empty() && !totals.change.is_zero() {
            b.two_columns(&self.t("receipt.change", &[]), &self.money.format(totals.change));
        }
    }

    fn render_taxes(&self, b: &mut EscPosBuilder, totals: &Totals) {
        if totals.taxes.is_empty() {
            return;
        }
        b.line_feed();
        b.three_columns(
            &self.t("receipt.tax", &[]),
            &self.t("receipt.tax_base", &[]),
            &self.t("receipt.tax_amount", &[]),
        );
        for tax in &totals.taxes {
            b.three_columns(
                &format!("{}%", tax.rate.normalize()),
                &self.money.format(tax.base),
                &self.money.format(tax.tax),
            );
        }
        if totals.savings > rust_decimal::Decimal::ZERO {
            b.line(&format!(
                "{}: -{}",
                self.t("receipt.discount", &[]),
                self.money.format(totals.savings)
            ));
        }
    }

    fn render_footer(&self, b: &mut EscPosBuilder) {
        let order = &self.job.order;
        if let Some(notes) = order.notes.as_deref().filter(|n| !n.is_empty()) {
            b.line_feed().left();
            b.line(&self.t("receipt.notes", &[("notes", notes)]));
        }

        b.line_feed().center();
        if !self.job.order.items.iter().all(|i| i.tax_rate.is_none()) {
            b.line(&self.t("receipt.tax_included", &[]));
        }
        b.bold(true).line(&self.t("receipt.thanks", &[])).bold(false);
        if let Some(footer) = &self.job.config.store.footer {
            b.line(footer);
        }
        if let Some(qr) = order.qr_data.as_deref().filter(|q| !q.is_empty()) {
            b.line_feed().qr_code(qr, 6).line_feed();
        }
        b.left();
    }

    // === Compact ===

    fn compact(&self, b: &mut EscPosBuilder, totals: &Totals) {
        let order = &self.job.order;
        let store = &self.job.config.store;

        self.render_marker(b);
        b.center();
        if !store.name.is_empty() {
            b.bold(true).line(&store.name).bold(false);
        }

        b.left();
        b.two_columns(
            &self.t("receipt.order", &[("number", order.number.as_str())]),
            &order.created_at.format(DATE_FORMAT).to_string(),
        );
        let mut kind = self.t(&format!("order_type.{}", order.order_type), &[]);
        if let Some(table) = &order.table {
            kind = format!("{} / {}", kind, self.t("receipt.table", &[("table", table.as_str())]));
        }
        b.line(&kind);
        b.sep_single();

        for item in &order.items {
            b.two_columns(
                &format!("{}x {}", item.quantity, item.name),
                &self.money.format(item.total()),
            );
            if !item.options.is_empty() {
                let names: Vec<&str> = item.options.iter().map(|o| o.name.as_str()).collect();
                b.line(&format!("   {}", names.join(", ")));
            }
        }
        b.sep_single();

        b.bold(true);
        b.two_columns(&self.t("receipt.total", &[]), &self.money.format(totals.total));
        b.bold(false);
        self.render_payments(b, totals);

        b.line_feed().center();
        b.line(&self.t("receipt.thanks", &[]));
        b.left();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localize::{Catalog, Language};
    use crate::types::{Order, ReceiptConfig};
    use chrono::DateTime;
    use crab_printer::CharacterSet;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn job(config: ReceiptConfig) -> ReceiptJob {
        ReceiptJob::new(
            Order {
                number: "1042".into(),
                created_at: DateTime::parse_from_rfc3339("2024-05-01T13:45:00+02:00").unwrap(),
                order_type: "dine_in".into(),
                table: Some("7".into()),
                guests: None,
                customer: None,
                items: vec![LineItem::new("Espresso", 2, dec("1.50")).with_tax_rate(dec("10"))],
                discount: None,
                surcharge: None,
                payments: Vec::new(),
                notes: None,
                reprint: false,
                pre_payment: false,
                void_reason: None,
                qr_data: None,
            },
            config,
        )
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_text_receipt_frame() {
        let job = job(ReceiptConfig::default().with_open_drawer(true));
        let catalog = Catalog::builtin(Language::En);
        let bytes = ReceiptComposer::new(&job, &catalog).compose().unwrap();

        assert_eq!(&bytes[..2], &[0x1B, 0x40]);
        assert_eq!(&bytes[2..5], &[0x1B, 0x74, CharacterSet::Pc858.code_page()]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0x1D, 0x56, 0x42, 0x03]);
        let drawer = [0x1B, 0x70, 0x00, 25, 250];
        assert!(contains(&bytes[bytes.len() - 9..], &drawer));
        assert!(contains(&bytes, b"Espresso"));
        assert!(contains(&bytes, b"3.00 "));
    }

    #[test]
    fn test_invalid_job_is_rejected() {
        let mut job = job(ReceiptConfig::default());
        job.order.items.clear();
        let catalog = Catalog::new();
        let err = ReceiptComposer::new(&job, &catalog).compose().unwrap_err();
        assert!(matches!(err, ComposeError::InvalidJob(_)));
    }

    #[test]
    fn test_raster_bytes_are_merged() {
        let job = job(ReceiptConfig::default().with_render_mode(RenderMode::Raster));
        let catalog = Catalog::new();
        let renderer = |_: &ReceiptJob, dots: u32| -> ComposeResult<Vec<u8>> {
            assert_eq!(dots, 576);
            Ok(vec![0x1D, 0x76, 0x30, 0x00])
        };
        let bytes = ReceiptComposer::new(&job, &catalog)
            .with_raster(&renderer)
            .compose()
            .unwrap();
        assert_eq!(
            bytes,
            vec![0x1B, 0x40, 0x1D, 0x76, 0x30, 0x00, 0x1D, 0x56, 0x42, 0x03]
        );
    }

    #[test]
    fn test_raster_failure_falls_back_to_text() {
        let job = job(ReceiptConfig::default().with_render_mode(RenderMode::Raster));
        let catalog = Catalog::builtin(Language::En);
        let failing = |_: &ReceiptJob, _: u32| -> ComposeResult<Vec<u8>> {
            Err(ComposeError::Raster("font missing".into()))
        };
        let bytes = ReceiptComposer::new(&job, &catalog)
            .with_raster(&failing)
            .compose()
            .unwrap();
        assert!(contains(&bytes, b"Espresso"));

        // No renderer at all behaves the same
        let bytes = ReceiptComposer::new(&job, &catalog).compose().unwrap();
        assert!(contains(&bytes, b"Espresso"));
    }

    #[test]
    fn test_unknown_labels_are_humanized() {
        let mut job = job(ReceiptConfig::default());
        job.order.order_type = "drive_through".into();
        let identity = |key: &str, _: &[(&str, &str)]| key.to_string();
        let bytes = ReceiptComposer::new(&job, &identity).compose().unwrap();
        assert!(contains(&bytes, b"Drive through"));
        assert!(!contains(&bytes, b"order_type"));
    }

    #[test]
    fn test_compact_is_shorter() {
        let catalog = Catalog::builtin(Language::En);
        let standard = job(ReceiptConfig::default());
        let compact = job(ReceiptConfig::default().with_template(TemplateVariant::Compact));
        let a = ReceiptComposer::new(&standard, &catalog).compose().unwrap();
        let b = ReceiptComposer::new(&compact, &catalog).compose().unwrap();
        assert!(b.len() < a.len());
        assert!(contains(&b, b"2x Espresso"));
    }
}
