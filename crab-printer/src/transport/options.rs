//! Transport retry / reconnect options

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for the auto-reconnect backoff
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Connection lifecycle options
///
/// Immutable once handed to a transport.
///
/// # Environment variables
///
/// | Variable | Default |
/// |----------|---------|
/// | PRINTER_CONNECT_TIMEOUT_MS | 5000 |
/// | PRINTER_MAX_RETRIES | 3 |
/// | PRINTER_RETRY_BASE_DELAY_MS | 1000 |
/// | PRINTER_AUTO_RECONNECT | true |
/// | PRINTER_RECONNECT_TIMEOUT_MS | 30000 |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Per-attempt connect timeout
    pub connection_timeout_ms: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay_ms: u64,
    /// Reconnect automatically after the channel drops
    pub auto_reconnect: bool,
    /// Give up reconnecting this long after the drop
    pub reconnect_timeout_ms: u64,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 5000,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            auto_reconnect: true,
            reconnect_timeout_ms: 30_000,
        }
    }
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection_timeout_ms: env_parse("PRINTER_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connection_timeout_ms),
            max_retries: env_parse("PRINTER_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_base_delay_ms: env_parse("PRINTER_RETRY_BASE_DELAY_MS")
                .unwrap_or(defaults.retry_base_delay_ms),
            auto_reconnect: env_parse("PRINTER_AUTO_RECONNECT")
                .unwrap_or(defaults.auto_reconnect),
            reconnect_timeout_ms: env_parse("PRINTER_RECONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.reconnect_timeout_ms),
        }
    }

    pub fn with_connection_timeout_ms(mut self, ms: u64) -> Self {
        self.connection_timeout_ms = ms;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = ms;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_timeout_ms(mut self, ms: u64) -> Self {
        self.reconnect_timeout_ms = ms;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }

    /// Delay before retry `k` of an explicit connect (k >= 1):
    /// `base × 2^(k-1)`
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << exp))
    }

    /// Delay before reconnect attempt `n` (n >= 0), capped at
    /// [`MAX_RECONNECT_DELAY`]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(31);
        let ms = self.retry_base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms).min(MAX_RECONNECT_DELAY)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TransportOptions::default();
        assert_eq!(opts.max_retries, 3);
        assert!(opts.auto_reconnect);
        assert_eq!(opts.connection_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let opts = TransportOptions::new()
            .with_max_retries(2)
            .with_retry_base_delay_ms(100)
            .with_auto_reconnect(false);
        assert_eq!(opts.max_retries, 2);
        assert_eq!(opts.retry_base_delay_ms, 100);
        assert!(!opts.auto_reconnect);
    }

    #[test]
    fn test_retry_delay_doubles() {
        let opts = TransportOptions::new().with_retry_base_delay_ms(100);
        assert_eq!(opts.retry_delay(1), Duration::from_millis(100));
        assert_eq!(opts.retry_delay(2), Duration::from_millis(200));
        assert_eq!(opts.retry_delay(3), Duration::from_millis(400));
        assert_eq!(opts.retry_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        let opts = TransportOptions::new().with_retry_base_delay_ms(1000);
        assert_eq!(opts.reconnect_delay(0), Duration::from_millis(1000));
        assert_eq!(opts.reconnect_delay(2), Duration::from_millis(4000));
        assert_eq!(opts.reconnect_delay(3), MAX_RECONNECT_DELAY);
        assert_eq!(opts.reconnect_delay(40), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_deserialize_partial() {
        let opts: TransportOptions =
            serde_json::from_str(r#"{"max_retries": 5, "auto_reconnect": false}"#).unwrap();
        assert_eq!(opts.max_retries, 5);
        assert!(!opts.auto_reconnect);
        assert_eq!(opts.retry_base_delay_ms, 1000);
    }
}
