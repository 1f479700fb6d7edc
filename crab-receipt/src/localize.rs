//! Label translation
//!
//! Composers never hard-code printed words. Every label goes through
//! [`Localizer::t`], which falls back to a humanized form of the key when
//! the localizer has nothing better (`order_type.dine_in` → `Dine in`).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Receipt language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    El,
    Es,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::El => "el",
            Self::Es => "es",
        }
    }

    /// Whether amounts use a decimal comma (`12,50`)
    pub fn decimal_comma(&self) -> bool {
        !matches!(self, Self::En)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "el" | "gr" => Ok(Self::El),
            "es" => Ok(Self::Es),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

/// Translation hook
///
/// `translate` may return the key unchanged (or an empty string) when it has
/// no entry; callers should go through [`Localizer::t`].
pub trait Localizer: Send + Sync {
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> String;

    /// Translate `key`, falling back to a humanized default
    fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        let text = self.translate(key, params);
        if text.is_empty() || text == key {
            humanize(key)
        } else {
            text
        }
    }
}

impl<F> Localizer for F
where
    F: Fn(&str, &[(&str, &str)]) -> String + Send + Sync,
{
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> String {
        self(key, params)
    }
}

/// `payment_method.credit_card` → `Credit card`
pub fn humanize(key: &str) -> String {
    let last = key.rsplit('.').next().unwrap_or(key);
    let words = last.replace(['_', '-'], " ");
    let words = words.trim();
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace `{name}` placeholders
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// In-memory key → template catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object of `key: template`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Labels shipped with the composers
    pub fn builtin(language: Language) -> Self {
        let table: &[(&str, &str)] = match language {
            Language::En => EN,
            Language::El => EL,
            Language::Es => ES,
        };
        Self {
            entries: table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(key, template);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }

    /// Layer `other` on top; its entries win
    pub fn merge(mut self, other: Catalog) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Localizer for Catalog {
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> String {
        match self.entries.get(key) {
            Some(template) => interpolate(template, params),
            None => key.to_string(),
        }
    }
}

const EN: &[(&str, &str)] = &[
    ("receipt.title", "SIMPLIFIED INVOICE"),
    ("receipt.reprint", "*** REPRINT ***"),
    ("receipt.void", "*** VOID ***"),
    ("receipt.void_reason", "Void: {reason}"),
    ("receipt.pre_payment", "*** BILL ***"),
    ("receipt.order", "Order: {number}"),
    ("receipt.table", "Table: {table}"),
    ("receipt.guests", "Guests: {count}"),
    ("receipt.tax_id", "Tax ID: {tax_id}"),
    ("receipt.phone", "Tel: {phone}"),
    ("receipt.customer", "Customer: {name}"),
    ("receipt.qty", "QTY"),
    ("receipt.item", "ITEM"),
    ("receipt.amount", "AMOUNT"),
    ("receipt.subtotal", "SUBTOTAL"),
    ("receipt.discount", "Discount"),
    ("receipt.surcharge", "Surcharge"),
    ("receipt.total", "TOTAL"),
    ("receipt.tax", "TAX"),
    ("receipt.tax_base", "BASE"),
    ("receipt.tax_amount", "AMOUNT"),
    ("receipt.tax_included", "TAX INCLUDED"),
    ("receipt.paid", "Paid ({method})"),
    ("receipt.change", "Change"),
    ("receipt.notes", "Notes: {notes}"),
    ("receipt.delivery", "DELIVERY"),
    ("receipt.thanks", "*** THANK YOU FOR YOUR VISIT ***"),
    ("order_type.dine_in", "Dine in"),
    ("order_type.takeaway", "Takeaway"),
    ("order_type.delivery", "Delivery"),
    ("payment_method.cash", "Cash"),
    ("payment_method.card", "Card"),
    ("address.street", "Street"),
    ("address.postal_code", "Postal code"),
    ("address.city", "City"),
    ("address.floor", "Floor"),
    ("address.doorbell", "Doorbell"),
    ("address.notes", "Notes"),
    ("kitchen.takeaway", "TAKEAWAY"),
    ("kitchen.reprint", "*** REPRINT #{count} ***"),
    ("kitchen.unknown_time", "time unknown"),
];

const EL: &[(&str, &str)] = &[
    ("receipt.title", "ΑΠΟΔΕΙΞΗ ΛΙΑΝΙΚΗΣ"),
    ("receipt.reprint", "*** ΑΝΑΤΥΠΩΣΗ ***"),
    ("receipt.void", "*** ΑΚΥΡΩΣΗ ***"),
    ("receipt.void_reason", "Ακύρωση: {reason}"),
    ("receipt.pre_payment", "*** ΛΟΓΑΡΙΑΣΜΟΣ ***"),
    ("receipt.order", "Παραγγελία: {number}"),
    ("receipt.table", "Τραπέζι: {table}"),
    ("receipt.guests", "Άτομα: {count}"),
    ("receipt.tax_id", "ΑΦΜ: {tax_id}"),
    ("receipt.phone", "Τηλ: {phone}"),
    ("receipt.customer", "Πελάτης: {name}"),
    ("receipt.qty", "ΠΟΣ"),
    ("receipt.item", "ΕΙΔΟΣ"),
    ("receipt.amount", "ΠΟΣΟ"),
    ("receipt.subtotal", "ΥΠΟΣΥΝΟΛΟ"),
    ("receipt.discount", "Έκπτωση"),
    ("receipt.surcharge", "Επιβάρυνση"),
    ("receipt.total", "ΣΥΝΟΛΟ"),
    ("receipt.tax", "ΦΠΑ"),
    ("receipt.tax_base", "ΚΑΘΑΡΗ"),
    ("receipt.tax_amount", "ΦΠΑ"),
    ("receipt.tax_included", "ΣΥΜΠΕΡΙΛΑΜΒΑΝΕΤΑΙ ΦΠΑ"),
    ("receipt.paid", "Πληρωμή ({method})"),
    ("receipt.change", "Ρέστα"),
    ("receipt.notes", "Σημειώσεις: {notes}"),
    ("receipt.delivery", "ΔΙΑΝΟΜΗ"),
    ("receipt.thanks", "*** ΕΥΧΑΡΙΣΤΟΥΜΕ ***"),
    ("order_type.dine_in", "Στο κατάστημα"),
    ("order_type.takeaway", "Πακέτο"),
    ("order_type.delivery", "Διανομή"),
    ("payment_method.cash", "Μετρητά"),
    ("payment_method.card", "Κάρτα"),
    ("address.street", "Οδός"),
    ("address.postal_code", "Τ.Κ."),
    ("address.city", "Πόλη"),
    ("address.floor", "Όροφος"),
    ("address.doorbell", "Κουδούνι"),
    ("address.notes", "Σημειώσεις"),
    ("kitchen.takeaway", "ΠΑΚΕΤΟ"),
    ("kitchen.reprint", "*** ΑΝΑΤΥΠΩΣΗ #{count} ***"),
    ("kitchen.unknown_time", "άγνωστη ώρα"),
];

const ES: &[(&str, &str)] = &[
    ("receipt.title", "FACTURA SIMPLIFICADA"),
    ("receipt.reprint", "*** REIMPRESION ***"),
    ("receipt.void", "*** ANULADO ***"),
    ("receipt.void_reason", "Anulado: {reason}"),
    ("receipt.pre_payment", "*** CUENTA ***"),
    ("receipt.order", "Num: {number}"),
    ("receipt.table", "Mesa: {table}"),
    ("receipt.guests", "Pers: {count}"),
    ("receipt.tax_id", "CIF: {tax_id}"),
    ("receipt.phone", "Tel: {phone}"),
    ("receipt.customer", "Cliente: {name}"),
    ("receipt.qty", "UDS"),
    ("receipt.item", "DESCRIPCION"),
    ("receipt.amount", "IMPORTE"),
    ("receipt.subtotal", "SUBTOTAL"),
    ("receipt.discount", "Descuento"),
    ("receipt.surcharge", "Recargo"),
    ("receipt.total", "TOTAL"),
    ("receipt.tax", "IVA"),
    ("receipt.tax_base", "BASE IMP"),
    ("receipt.tax_amount", "CUOTA"),
    ("receipt.tax_included", "IVA INCLUIDO"),
    ("receipt.paid", "Pagado ({method})"),
    ("receipt.change", "Cambio"),
    ("receipt.notes", "Notas: {notes}"),
    ("receipt.delivery", "A DOMICILIO"),
    ("receipt.thanks", "*** GRACIAS POR SU VISITA ***"),
    ("order_type.dine_in", "En local"),
    ("order_type.takeaway", "Para llevar"),
    ("order_type.delivery", "A domicilio"),
    ("payment_method.cash", "Efectivo"),
    ("payment_method.card", "Tarjeta"),
    ("address.street", "Calle"),
    ("address.postal_code", "CP"),
    ("address.city", "Ciudad"),
    ("address.floor", "Piso"),
    ("address.doorbell", "Timbre"),
    ("address.notes", "Notas"),
    ("kitchen.takeaway", "PARA LLEVAR"),
    ("kitchen.reprint", "*** REIMPRESION #{count} ***"),
    ("kitchen.unknown_time", "hora desconocida"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("order_type.dine_in"), "Dine in");
        assert_eq!(humanize("payment_method.credit-card"), "Credit card");
        assert_eq!(humanize("cash"), "Cash");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_t_falls_back_when_key_returned() {
        let catalog = Catalog::new().with("payment_method.cash", "Efectivo");
        assert_eq!(catalog.t("payment_method.cash", &[]), "Efectivo");
        assert_eq!(catalog.t("payment_method.bizum_pay", &[]), "Bizum pay");
    }

    #[test]
    fn test_closure_localizer() {
        let empty = |_: &str, _: &[(&str, &str)]| String::new();
        assert_eq!(empty.t("order_type.takeaway", &[]), "Takeaway");

        let upper = |key: &str, _: &[(&str, &str)]| key.to_uppercase();
        assert_eq!(upper.t("order_type.takeaway", &[]), "ORDER_TYPE.TAKEAWAY");
    }

    #[test]
    fn test_interpolation() {
        let catalog = Catalog::builtin(Language::En);
        assert_eq!(
            catalog.t("kitchen.reprint", &[("count", "2")]),
            "*** REPRINT #2 ***"
        );
        assert_eq!(catalog.t("receipt.table", &[("table", "12")]), "Table: 12");
    }

    #[test]
    fn test_builtin_catalogs_share_keys() {
        let en = Catalog::builtin(Language::En);
        for language in [Language::El, Language::Es] {
            let other = Catalog::builtin(language);
            assert_eq!(other.len(), en.len(), "{}", language);
            for key in en.entries.keys() {
                assert!(other.entries.contains_key(key), "{} missing {}", language, key);
            }
        }
    }

    #[test]
    fn test_catalog_from_json_merges() {
        let overrides = Catalog::from_json(r#"{"receipt.total": "TOTAAL"}"#).unwrap();
        let catalog = Catalog::builtin(Language::En).merge(overrides);
        assert_eq!(catalog.t("receipt.total", &[]), "TOTAAL");
        assert_eq!(catalog.t("receipt.subtotal", &[]), "SUBTOTAL");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("EL".parse::<Language>().unwrap(), Language::El);
        assert!("fr".parse::<Language>().is_err());
        assert!(Language::Es.decimal_comma());
        assert!(!Language::En.decimal_comma());
    }
}
