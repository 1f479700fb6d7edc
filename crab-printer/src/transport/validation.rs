//! Allow-list validation for device descriptors
//!
//! Every value that ends up in a device path or an external command line
//! passes through here first. Anything not explicitly allowed is rejected
//! with a non-recoverable `ValidationError`.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TransportError, TransportResult};

static SERIAL_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^COM[0-9]{1,3}$").expect("valid regex"));

static BT_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9A-F]{2}:){5}[0-9A-F]{2}$").expect("valid regex")
});

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("valid regex")
});

/// Baud rates accepted for serial printers
pub const SERIAL_BAUD_RATES: [u32; 9] = [
    1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200,
];

/// Validate a Windows-style serial port name (`COM1`..`COM999`)
pub fn validate_serial_port(name: &str) -> TransportResult<()> {
    if SERIAL_PORT.is_match(name) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Invalid serial port name: {:?}",
            name
        )))
    }
}

/// Port number of a validated serial port name
pub fn serial_port_number(name: &str) -> TransportResult<u16> {
    validate_serial_port(name)?;
    name[3..]
        .parse()
        .map_err(|_| TransportError::validation(format!("Invalid serial port name: {:?}", name)))
}

pub fn validate_baud_rate(baud: u32) -> TransportResult<()> {
    if SERIAL_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Unsupported baud rate: {}",
            baud
        )))
    }
}

pub fn validate_data_bits(bits: u8) -> TransportResult<()> {
    match bits {
        7 | 8 => Ok(()),
        _ => Err(TransportError::validation(format!(
            "Unsupported data bits: {}",
            bits
        ))),
    }
}

pub fn validate_stop_bits(bits: u8) -> TransportResult<()> {
    match bits {
        1 | 2 => Ok(()),
        _ => Err(TransportError::validation(format!(
            "Unsupported stop bits: {}",
            bits
        ))),
    }
}

/// Validate a Bluetooth MAC address (`AA:BB:CC:DD:EE:FF`)
pub fn validate_bt_address(address: &str) -> TransportResult<()> {
    if BT_ADDRESS.is_match(address) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Invalid Bluetooth address: {:?}",
            address
        )))
    }
}

/// RFCOMM channels run 1..=30
pub fn validate_rfcomm_channel(channel: u8) -> TransportResult<()> {
    if (1..=30).contains(&channel) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Invalid RFCOMM channel: {}",
            channel
        )))
    }
}

/// Validate a network printer host (IP literal or DNS name)
pub fn validate_host(host: &str) -> TransportResult<()> {
    if host.parse::<IpAddr>().is_ok() || (host.len() <= 253 && HOSTNAME.is_match(host)) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Invalid printer host: {:?}",
            host
        )))
    }
}

pub fn validate_port(port: u16) -> TransportResult<()> {
    if port == 0 {
        return Err(TransportError::validation("Port must be non-zero"));
    }
    Ok(())
}

/// Validate a USB OUT endpoint address (direction bit clear, number 1..=15)
pub fn validate_out_endpoint(endpoint: u8) -> TransportResult<()> {
    if endpoint & 0x80 == 0 && (1..=15).contains(&endpoint) {
        Ok(())
    } else {
        Err(TransportError::validation(format!(
            "Invalid USB OUT endpoint: 0x{:02X}",
            endpoint
        )))
    }
}

/// Validate a spooler printer name
///
/// Names reach the spooler as a single argument, but control characters and
/// a leading dash are still refused so they cannot be read as options.
pub fn validate_system_name(name: &str) -> TransportResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.len() > 256
        || trimmed.starts_with('-')
        || trimmed.chars().any(|c| c.is_control())
    {
        return Err(TransportError::validation(format!(
            "Invalid system printer name: {:?}",
            name
        )));
    }
    Ok(())
}
