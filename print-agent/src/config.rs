use std::path::PathBuf;

use anyhow::{Context, anyhow};
use crab_printer::{CharacterSet, PaperWidth, PrinterTarget, TransportOptions};
use crab_receipt::Language;

/// Agent configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PRINTER_TARGET | (required) | JSON printer target, e.g. `{"kind":"network","host":"192.168.1.50"}` |
/// | PAPER_WIDTH | 80mm | 58mm, 80mm or 112mm |
/// | CHARACTER_SET | pc858 | Printer code page |
/// | CURRENCY | EUR | ISO 4217 code |
/// | LANGUAGE | en | en, el or es |
/// | PRINT_JOB | (none) | Path to a receipt job JSON; a test receipt is printed when unset |
/// | LOG_LEVEL | info | tracing level |
/// | LOG_DIR | (none) | Directory for daily rolling log files |
///
/// Transport tuning comes from `PRINTER_*` variables, see
/// [`TransportOptions::from_env`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub target: PrinterTarget,
    pub paper: PaperWidth,
    pub charset: CharacterSet,
    pub currency: String,
    pub language: Language,
    pub job_file: Option<PathBuf>,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub transport: TransportOptions,
}

impl AgentConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.transport = TransportOptions::from_env();
        Ok(config)
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let target_json = var("PRINTER_TARGET").context("PRINTER_TARGET is not set")?;
        let target = PrinterTarget::from_json(&target_json).context("PRINTER_TARGET is invalid")?;

        let paper = match var("PAPER_WIDTH") {
            Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
            None => PaperWidth::Mm80,
        };
        let charset = match var("CHARACTER_SET") {
            Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
            None => CharacterSet::Pc858,
        };
        let language = match var("LANGUAGE") {
            Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
            None => Language::En,
        };

        Ok(Self {
            target,
            paper,
            charset,
            currency: var("CURRENCY").unwrap_or_else(|| "EUR".into()),
            language,
            job_file: var("PRINT_JOB").map(PathBuf::from),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: var("LOG_DIR"),
            transport: TransportOptions::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[(
            "PRINTER_TARGET",
            r#"{"kind":"network","host":"192.168.1.50"}"#,
        )]))
        .unwrap();
        assert_eq!(config.target.kind(), "network");
        assert_eq!(config.paper, PaperWidth::Mm80);
        assert_eq!(config.charset, CharacterSet::Pc858);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.language, Language::En);
        assert_eq!(config.log_level, "info");
        assert!(config.job_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("PRINTER_TARGET", r#"{"kind":"serial","port_name":"COM3"}"#),
            ("PAPER_WIDTH", "58mm"),
            ("CHARACTER_SET", "wpc1253"),
            ("LANGUAGE", "el"),
            ("CURRENCY", "USD"),
            ("LOG_DIR", "/var/log/print-agent"),
        ]))
        .unwrap();
        assert_eq!(config.target.kind(), "serial");
        assert_eq!(config.paper, PaperWidth::Mm58);
        assert_eq!(config.charset, CharacterSet::Wpc1253);
        assert_eq!(config.language, Language::El);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/print-agent"));
    }

    #[test]
    fn test_missing_or_invalid_target() {
        assert!(AgentConfig::from_lookup(lookup(&[])).is_err());
        assert!(
            AgentConfig::from_lookup(lookup(&[(
                "PRINTER_TARGET",
                r#"{"kind":"serial","port_name":"COM1 & del"}"#
            )]))
            .is_err()
        );
        assert!(
            AgentConfig::from_lookup(lookup(&[
                ("PRINTER_TARGET", r#"{"kind":"network","host":"10.0.0.2"}"#),
                ("PAPER_WIDTH", "99mm"),
            ]))
            .is_err()
        );
    }
}
