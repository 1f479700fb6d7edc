//! Currency symbols and amount formatting

use rust_decimal::prelude::*;

use crate::localize::Language;

/// ISO 4217 code → printed symbol
///
/// Unknown codes print as the code itself.
pub fn currency_symbol(code: &str) -> &str {
    match code.trim().to_ascii_uppercase().as_str() {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "JPY" => "¥",
        "CNY" => "¥",
        "CHF" => "CHF",
        "RUB" => "₽",
        "TRY" => "₺",
        "PLN" => "zł",
        "SEK" => "kr",
        "NOK" => "kr",
        "DKK" => "kr",
        "CZK" => "Kč",
        "BGN" => "лв",
        "RON" => "lei",
        "HUF" => "Ft",
        "INR" => "₹",
        "KRW" => "₩",
        _ => code.trim(),
    }
}

/// How amounts print on a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyFormat {
    symbol: String,
    prefix: bool,
    decimals: u32,
    decimal_comma: bool,
}

impl MoneyFormat {
    pub fn new(code: &str, language: Language) -> Self {
        let upper = code.trim().to_ascii_uppercase();
        Self {
            symbol: currency_symbol(code).to_string(),
            prefix: matches!(upper.as_str(), "USD" | "GBP" | "JPY" | "CNY" | "INR" | "KRW"),
            decimals: if matches!(upper.as_str(), "JPY" | "KRW") { 0 } else { 2 },
            decimal_comma: language.decimal_comma(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Round half away from zero to the currency's minor unit
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Number only: `12,50`
    pub fn number(&self, amount: Decimal) -> String {
        let text = format!("{:.*}", self.decimals as usize, self.round(amount));
        if self.decimal_comma {
            text.replace('.', ",")
        } else {
            text
        }
    }

    /// Number with symbol: `12,50 €`, `$12.50`, `-$3.00`
    pub fn format(&self, amount: Decimal) -> String {
        let number = self.number(amount.abs());
        let sign = if self.round(amount).is_sign_negative() && !self.round(amount).is_zero() {
            "-"
        } else {
            ""
        };
        if self.prefix {
            format!("{}{}{}", sign, self.symbol, number)
        } else {
            format!("{}{} {}", sign, number, self.symbol)
        }
    }

    /// Explicit sign for adjustments: `+1,00 €`, `-2,50 €`
    pub fn signed(&self, amount: Decimal) -> String {
        let rounded = self.round(amount);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            self.format(amount)
        } else {
            format!("+{}", self.format(amount))
        }
    }
}
