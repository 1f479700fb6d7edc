//! Delivery address decomposition
//!
//! Addresses arrive as free text typed by staff or by a delivery platform.
//! Segments separated by `,` `;` `|` or newlines are matched against
//! labels in English, Greek and Spanish (`Floor: 3`, `Όροφος: 3`,
//! `Piso: 3`). Unlabeled segments become the street when no street label
//! is present, except right after notes, which often contain commas.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::localize::Localizer;

/// Field a labeled segment fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Street,
    PostalCode,
    City,
    Floor,
    Doorbell,
    Notes,
}

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;|\n]").expect("valid regex"));

static LABELS: LazyLock<Vec<(Field, Regex)>> = LazyLock::new(|| {
    let label = |alternatives: &str| {
        Regex::new(&format!(r"(?i)^\s*(?:{})\s*[:：]\s*(.*?)\s*$", alternatives))
            .expect("valid regex")
    };
    vec![
        (
            Field::Street,
            label(r"street|address|addr\.?|οδός|οδος|διεύθυνση|διευθυνση|calle|dirección|direccion"),
        ),
        (
            Field::PostalCode,
            label(
                r"postal\s*code|post\s*code|postcode|zip(?:\s*code)?|[τt]\.?\s*[κk]\.?|ταχ\.?\s*κώδικας|ταχυδρομικός\s+κώδικας|c\.?\s*p\.?|código\s+postal|codigo\s+postal",
            ),
        ),
        (
            Field::City,
            label(r"city|town|πόλη|πολη|περιοχή|περιοχη|ciudad|localidad|población|poblacion"),
        ),
        (
            Field::Floor,
            label(r"floor|level|όροφος|οροφος|piso|planta"),
        ),
        (
            Field::Doorbell,
            label(r"doorbell|bell|buzzer|κουδούνι|κουδουνι|timbre|portero"),
        ),
        (
            Field::Notes,
            label(r"notes?|comments?|instructions|σημειώσεις|σημειωσεις|σχόλια|σχολια|notas?|observaciones"),
        ),
    ]
});

/// Decomposed delivery address
///
/// `raw` always holds the original text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub raw: String,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub floor: Option<String>,
    pub doorbell: Option<String>,
    pub notes: Option<String>,
}

impl DeliveryAddress {
    /// Best-effort parse; never fails
    pub fn parse(raw: &str) -> Self {
        let mut address = Self {
            raw: raw.trim().to_string(),
            ..Self::default()
        };

        let mut leading = Vec::new();
        let mut labeled_seen = false;
        for segment in SEPARATORS.split(raw) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match match_label(segment) {
                Some((field, value)) => {
                    labeled_seen = true;
                    if !value.is_empty() {
                        address.fill(field, value);
                    }
                }
                // Continuation of notes typed with commas
                None => match address.notes.as_mut() {
                    Some(notes) => {
                        notes.push_str(", ");
                        notes.push_str(segment);
                    }
                    None => leading.push(segment),
                },
            }
        }

        if labeled_seen && address.street.is_none() && !leading.is_empty() {
            address.street = Some(leading.join(", "));
        }
        if !address.is_structured() {
            address.street = None;
        }
        address
    }

    fn fill(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::Street => &mut self.street,
            Field::PostalCode => &mut self.postal_code,
            Field::City => &mut self.city,
            Field::Floor => &mut self.floor,
            Field::Doorbell => &mut self.doorbell,
            Field::Notes => &mut self.notes,
        };
        match slot {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => *slot = Some(value.to_string()),
        }
    }

    /// Whether any labeled sub-field was recognized
    pub fn is_structured(&self) -> bool {
        self.postal_code.is_some()
            || self.city.is_some()
            || self.floor.is_some()
            || self.doorbell.is_some()
            || self.notes.is_some()
            || (self.street.is_some() && self.street.as_deref() != Some(self.raw.as_str()))
    }

    /// Printable lines: `Label: value` per field, or the raw text
    pub fn lines(&self, localizer: &dyn Localizer) -> Vec<String> {
        if !self.is_structured() {
            return if self.raw.is_empty() {
                Vec::new()
            } else {
                vec![self.raw.clone()]
            };
        }

        let mut lines = Vec::new();
        if let Some(street) = &self.street {
            lines.push(street.clone());
        }
        let locality = match (&self.postal_code, &self.city) {
            (Some(pc), Some(city)) => Some(format!("{} {}", pc, city)),
            (Some(pc), None) => Some(format!("{}: {}", localizer.t("address.postal_code", &[]), pc)),
            (None, Some(city)) => Some(city.clone()),
            (None, None) => None,
        };
        lines.extend(locality);
        for (key, value) in [
            ("address.floor", &self.floor),
            ("address.doorbell", &self.doorbell),
            ("address.notes", &self.notes),
        ] {
            if let Some(value) = value {
                lines.push(format!("{}: {}", localizer.t(key, &[]), value));
            }
        }
        lines
    }
}

fn match_label(segment: &str) -> Option<(Field, &str)> {
    LABELS.iter().find_map(|(field, re)| {
        re.captures(segment)
            .and_then(|caps| caps.get(1))
            .map(|value| (*field, value.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localize::{Catalog, Language};

    #[test]
    fn test_english_labels() {
        let a = DeliveryAddress::parse(
            "Street: 12 High St, Postal code: SW1A 1AA, City: London, Floor: 2, Doorbell: Smith, Notes: leave at door",
        );
        assert_eq!(a.street.as_deref(), Some("12 High St"));
        assert_eq!(a.postal_code.as_deref(), Some("SW1A 1AA"));
        assert_eq!(a.city.as_deref(), Some("London"));
        assert_eq!(a.floor.as_deref(), Some("2"));
        assert_eq!(a.doorbell.as_deref(), Some("Smith"));
        assert_eq!(a.notes.as_deref(), Some("leave at door"));
        assert!(a.is_structured());
    }

    #[test]
    fn test_greek_labels() {
        let a = DeliveryAddress::parse("Ερμού 25\nΤ.Κ.: 10563\nΠόλη: Αθήνα\nΌροφος: 3\nΚουδούνι: Παπαδόπουλος");
        assert_eq!(a.street.as_deref(), Some("Ερμού 25"));
        assert_eq!(a.postal_code.as_deref(), Some("10563"));
        assert_eq!(a.city.as_deref(), Some("Αθήνα"));
        assert_eq!(a.floor.as_deref(), Some("3"));
        assert_eq!(a.doorbell.as_deref(), Some("Παπαδόπουλος"));
    }

    #[test]
    fn test_spanish_labels() {
        let a = DeliveryAddress::parse("Calle: Gran Vía 1; CP: 28013; Ciudad: Madrid; Piso: 4B; Timbre: 4B; Notas: sin cebolla");
        assert_eq!(a.street.as_deref(), Some("Gran Vía 1"));
        assert_eq!(a.postal_code.as_deref(), Some("28013"));
        assert_eq!(a.city.as_deref(), Some("Madrid"));
        assert_eq!(a.floor.as_deref(), Some("4B"));
        assert_eq!(a.doorbell.as_deref(), Some("4B"));
        assert_eq!(a.notes.as_deref(), Some("sin cebolla"));
    }

    #[test]
    fn test_unlabeled_text_stays_raw() {
        let a = DeliveryAddress::parse("Calle Mayor 5, 3º izquierda, Madrid");
        assert!(!a.is_structured());
        assert_eq!(a.street, None);
        assert_eq!(a.raw, "Calle Mayor 5, 3º izquierda, Madrid");

        let catalog = Catalog::builtin(Language::Es);
        assert_eq!(a.lines(&catalog), vec!["Calle Mayor 5, 3º izquierda, Madrid".to_string()]);
    }

    #[test]
    fn test_notes_keep_trailing_commas() {
        let a = DeliveryAddress::parse("Main St 4, Floor: 1, Notes: ring twice, then call");
        assert_eq!(a.street.as_deref(), Some("Main St 4"));
        assert_eq!(a.notes.as_deref(), Some("ring twice, then call"));
    }

    #[test]
    fn test_lines() {
        let catalog = Catalog::builtin(Language::En);
        let a = DeliveryAddress::parse("Main St 4, Zip: 10001, City: New York, Floor: 7");
        assert_eq!(
            a.lines(&catalog),
            vec![
                "Main St 4".to_string(),
                "10001 New York".to_string(),
                "Floor: 7".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty() {
        let a = DeliveryAddress::parse("   ");
        assert!(!a.is_structured());
        assert!(a.lines(&Catalog::new()).is_empty());
    }
}
