//! Receipt job data
//!
//! Jobs arrive as JSON from the POS front end. Amounts are `Decimal` and
//! every derived figure is rounded half away from zero to cents.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use crab_printer::{CharacterSet, PaperWidth};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, ComposeResult};
use crate::localize::Language;

/// Maximum allowed quantity per line
pub(crate) const MAX_QUANTITY: u32 = 9999;

/// Maximum allowed unit price
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

const DECIMAL_PLACES: u32 = 2;

/// Round to cents, half away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Receipt layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariant {
    /// Store block, column header, option lines, tax breakdown
    #[default]
    Standard,
    /// Store name, one line per item, totals only
    Compact,
}

/// Text composition or delegation to a raster renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Text,
    Raster,
}

/// Store identity printed in the header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreInfo {
    pub name: String,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// Extra closing line below the thanks banner
    pub footer: Option<String>,
}

/// How a receipt prints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    pub store: StoreInfo,
    pub paper: PaperWidth,
    /// ISO 4217 code
    pub currency: String,
    pub language: Language,
    pub template: TemplateVariant,
    pub charset: CharacterSet,
    pub render_mode: RenderMode,
    /// Pulse the cash drawer before the cut
    pub open_drawer: bool,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            store: StoreInfo::default(),
            paper: PaperWidth::Mm80,
            currency: "EUR".to_string(),
            language: Language::En,
            template: TemplateVariant::Standard,
            charset: CharacterSet::Pc858,
            render_mode: RenderMode::Text,
            open_drawer: false,
        }
    }
}

impl ReceiptConfig {
    pub fn with_store(mut self, store: StoreInfo) -> Self {
        self.store = store;
        self
    }

    pub fn with_paper(mut self, paper: PaperWidth) -> Self {
        self.paper = paper;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_template(mut self, template: TemplateVariant) -> Self {
        self.template = template;
        self
    }

    pub fn with_charset(mut self, charset: CharacterSet) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    pub fn with_open_drawer(mut self, open_drawer: bool) -> Self {
        self.open_drawer = open_drawer;
        self
    }
}

/// Selected option on a line (`Size: Large +0.50`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOption {
    /// Attribute the option belongs to, e.g. `Size`
    #[serde(default)]
    pub group: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
}

/// One ordered product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub spec_name: Option<String>,
    #[serde(default)]
    pub options: Vec<ItemOption>,
    #[serde(default)]
    pub note: Option<String>,
    /// Percent, e.g. `10` for 10%
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    /// Manual line discount in percent
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            spec_name: None,
            options: Vec::new(),
            note: None,
            tax_rate: None,
            discount_percent: None,
        }
    }

    pub fn with_option(mut self, option: ItemOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn with_discount_percent(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    /// Unit price including option modifiers, before discount
    pub fn gross_unit_price(&self) -> Decimal {
        self.unit_price + self.options.iter().map(|o| o.price).sum::<Decimal>()
    }

    /// Unit price after the line discount
    pub fn net_unit_price(&self) -> Decimal {
        match self.discount_percent {
            Some(p) if p > Decimal::ZERO => {
                round_money(self.gross_unit_price() * (Decimal::ONE_HUNDRED - p) / Decimal::ONE_HUNDRED)
            }
            _ => self.gross_unit_price(),
        }
    }

    pub fn total(&self) -> Decimal {
        round_money(self.net_unit_price() * Decimal::from(self.quantity))
    }

    fn validate(&self) -> ComposeResult<()> {
        if self.quantity == 0 || self.quantity > MAX_QUANTITY {
            return Err(ComposeError::InvalidJob(format!(
                "quantity of '{}' must be within 1..={}, got {}",
                self.name, MAX_QUANTITY, self.quantity
            )));
        }
        if self.unit_price.is_sign_negative() || self.unit_price > MAX_PRICE {
            return Err(ComposeError::InvalidJob(format!(
                "unit price of '{}' out of range: {}",
                self.name, self.unit_price
            )));
        }
        if let Some(p) = self.discount_percent {
            require_percent(p, "discount_percent")?;
        }
        if let Some(rate) = self.tax_rate {
            require_percent(rate, "tax_rate")?;
        }
        Ok(())
    }
}

/// Whole-order discount or surcharge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: AdjustmentKind,
    pub value: Decimal,
}

impl Adjustment {
    /// Absolute amount against `base`
    pub fn amount(&self, base: Decimal) -> Decimal {
        match self.kind {
            AdjustmentKind::Percentage => round_money(base * self.value / Decimal::ONE_HUNDRED),
            AdjustmentKind::Fixed => round_money(self.value),
        }
    }

    fn validate(&self, field: &str) -> ComposeResult<()> {
        match self.kind {
            AdjustmentKind::Percentage => require_percent(self.value, field),
            AdjustmentKind::Fixed if self.value.is_sign_negative() => Err(ComposeError::InvalidJob(
                format!("{} must be non-negative, got {}", field, self.value),
            )),
            AdjustmentKind::Fixed => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Localization key suffix, e.g. `cash`, `card`
    pub method: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Free-text delivery address
    pub address: Option<String>,
}

/// Order to print
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub number: String,
    pub created_at: DateTime<FixedOffset>,
    /// Localization key suffix, e.g. `dine_in`, `takeaway`, `delivery`
    #[serde(default = "default_order_type")]
    pub order_type: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub guests: Option<u32>,
    #[serde(default)]
    pub customer: Option<Customer>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: Option<Adjustment>,
    #[serde(default)]
    pub surcharge: Option<Adjustment>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reprint: bool,
    /// Bill printed before payment
    #[serde(default)]
    pub pre_payment: bool,
    #[serde(default)]
    pub void_reason: Option<String>,
    /// Printed as a QR code at the bottom (invoice lookup URL)
    #[serde(default)]
    pub qr_data: Option<String>,
}

fn default_order_type() -> String {
    "dine_in".to_string()
}

/// Tax group after apportioning order-level adjustments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxLine {
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
}

/// Derived order figures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub surcharge: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub change: Decimal,
    /// Savings from line discounts and the order discount
    pub savings: Decimal,
    pub taxes: Vec<TaxLine>,
}

impl Order {
    pub fn validate(&self) -> ComposeResult<()> {
        if self.number.trim().is_empty() {
            return Err(ComposeError::InvalidJob("order number is empty".into()));
        }
        if self.items.is_empty() {
            return Err(ComposeError::InvalidJob(format!(
                "order {} has no items",
                self.number
            )));
        }
        for item in &self.items {
            item.validate()?;
        }
        if let Some(discount) = &self.discount {
            discount.validate("discount")?;
        }
        if let Some(surcharge) = &self.surcharge {
            surcharge.validate("surcharge")?;
        }
        if let Some(p) = self.payments.iter().find(|p| p.amount.is_sign_negative()) {
            return Err(ComposeError::InvalidJob(format!(
                "payment amount must be non-negative, got {}",
                p.amount
            )));
        }
        Ok(())
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn totals(&self) -> Totals {
        let subtotal: Decimal = self.items.iter().map(LineItem::total).sum();
        let discount = self
            .discount
            .as_ref()
            .map_or(Decimal::ZERO, |d| d.amount(subtotal).min(subtotal));
        let surcharge = self
            .surcharge
            .as_ref()
            .map_or(Decimal::ZERO, |s| s.amount(subtotal));
        let total = (subtotal - discount + surcharge).max(Decimal::ZERO);
        let paid: Decimal = self.payments.iter().map(|p| p.amount).sum();
        let change = (paid - total).max(Decimal::ZERO);

        let line_savings: Decimal = self
            .items
            .iter()
            .map(|i| (i.gross_unit_price() - i.net_unit_price()) * Decimal::from(i.quantity))
            .sum();

        Totals {
            subtotal,
            discount,
            surcharge,
            total,
            paid,
            change,
            savings: round_money(line_savings + discount),
            taxes: self.tax_breakdown(subtotal, total),
        }
    }

    /// Prices include tax; order-level adjustments are spread across rates
    /// in proportion so that base + tax adds up to the total
    fn tax_breakdown(&self, subtotal: Decimal, total: Decimal) -> Vec<TaxLine> {
        let ratio = if subtotal.is_zero() {
            Decimal::ONE
        } else {
            total / subtotal
        };

        let mut groups: BTreeMap<Decimal, Decimal> = BTreeMap::new();
        for item in &self.items {
            if let Some(rate) = item.tax_rate {
                *groups.entry(rate.normalize()).or_default() += item.total() * ratio;
            }
        }

        groups
            .into_iter()
            .map(|(rate, gross)| {
                let base = round_money(gross / (Decimal::ONE + rate / Decimal::ONE_HUNDRED));
                TaxLine {
                    rate,
                    base,
                    tax: round_money(gross) - base,
                }
            })
            .collect()
    }
}

fn require_percent(value: Decimal, field: &str) -> ComposeResult<()> {
    if value.is_sign_negative() || value > Decimal::ONE_HUNDRED {
        return Err(ComposeError::InvalidJob(format!(
            "{} must be within 0..=100, got {}",
            field, value
        )));
    }
    Ok(())
}

/// A print job: what to print and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptJob {
    pub order: Order,
    #[serde(default)]
    pub config: ReceiptConfig,
}

impl ReceiptJob {
    pub fn new(order: Order, config: ReceiptConfig) -> Self {
        Self { order, config }
    }

    pub fn from_json(json: &str) -> ComposeResult<Self> {
        serde_json::from_str(json).map_err(|e| ComposeError::InvalidJob(e.to_string()))
    }
}
