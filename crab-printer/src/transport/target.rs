use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::bluetooth::{BluetoothBackend, BluetoothChannel, BluetoothDescriptor, RfcommDeviceBackend};
use super::capability::Capability;
use super::machine::Transport;
use super::network::{NetworkChannel, NetworkDescriptor};
use super::options::TransportOptions;
use super::serial::{SerialChannel, SerialDescriptor};
use super::usb::{UsbBackend, UsbChannel, UsbDescriptor};
use super::{Channel, DynTransport};
use crate::error::{TransportError, TransportResult};

/// Where a printer is attached
///
/// ```json
/// {"kind": "network", "host": "192.168.1.50", "port": 9100}
/// {"kind": "serial", "port_name": "COM3", "baud_rate": 19200}
/// {"kind": "usb", "vendor_id": 1208, "product_id": 514, "system_name": "TM-T20"}
/// {"kind": "bluetooth", "address": "00:11:62:AA:BB:CC", "channel": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrinterTarget {
    Serial(SerialDescriptor),
    Usb(UsbDescriptor),
    Bluetooth(BluetoothDescriptor),
    Network(NetworkDescriptor),
}

/// Optional platform backends handed to channels that need them
#[derive(Debug, Clone)]
pub struct ChannelBackends {
    pub usb: Capability<dyn UsbBackend>,
    pub bluetooth: Capability<dyn BluetoothBackend>,
}

impl Default for ChannelBackends {
    fn default() -> Self {
        Self {
            usb: Capability::missing("no USB backend configured"),
            bluetooth: Capability::missing("no Bluetooth backend configured"),
        }
    }
}

impl ChannelBackends {
    /// Backends this host provides out of the box
    pub fn platform() -> Self {
        let mut backends = Self::default();
        if cfg!(target_os = "linux") {
            let rfcomm: Arc<dyn BluetoothBackend> = Arc::new(RfcommDeviceBackend::new());
            backends.bluetooth = Capability::available(rfcomm);
        }
        backends
    }

    pub fn with_usb(mut self, usb: Capability<dyn UsbBackend>) -> Self {
        self.usb = usb;
        self
    }

    pub fn with_bluetooth(mut self, bluetooth: Capability<dyn BluetoothBackend>) -> Self {
        self.bluetooth = bluetooth;
        self
    }
}

impl PrinterTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serial(_) => "serial",
            Self::Usb(_) => "usb",
            Self::Bluetooth(_) => "bluetooth",
            Self::Network(_) => "network",
        }
    }

    /// Parse and validate a JSON target
    pub fn from_json(json: &str) -> TransportResult<Self> {
        let target: Self = serde_json::from_str(json).map_err(|e| {
            TransportError::validation(format!("Invalid printer target: {}", e))
        })?;
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> TransportResult<()> {
        match self {
            Self::Serial(d) => d.validate(),
            Self::Usb(d) => d.validate(),
            Self::Bluetooth(d) => d.validate(),
            Self::Network(d) => d.validate(),
        }
    }

    /// Build the matching channel
    pub fn into_channel(self, backends: &ChannelBackends) -> TransportResult<Box<dyn Channel>> {
        let channel: Box<dyn Channel> = match self {
            Self::Serial(d) => Box::new(SerialChannel::new(d)?),
            Self::Usb(d) => Box::new(UsbChannel::new(d, backends.usb.clone())?),
            Self::Bluetooth(d) => Box::new(BluetoothChannel::new(d, backends.bluetooth.clone())?),
            Self::Network(d) => Box::new(NetworkChannel::new(d)?),
        };
        Ok(channel)
    }

    /// Build a transport over the matching channel
    pub fn into_transport(
        self,
        backends: &ChannelBackends,
        options: TransportOptions,
    ) -> TransportResult<DynTransport> {
        Ok(Transport::new(self.into_channel(backends)?, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use crate::transport::TransportState;

    #[test]
    fn test_parse_targets() {
        let target: PrinterTarget =
            serde_json::from_str(r#"{"kind":"network","host":"192.168.1.50"}"#).unwrap();
        assert_eq!(target.kind(), "network");
        assert!(target.validate().is_ok());

        let target: PrinterTarget =
            serde_json::from_str(r#"{"kind":"serial","port_name":"COM3","baud_rate":19200}"#)
                .unwrap();
        match target {
            PrinterTarget::Serial(d) => assert_eq!(d.baud_rate, 19200),
            other => panic!("unexpected target {:?}", other),
        }

        let target: PrinterTarget = serde_json::from_str(
            r#"{"kind":"usb","vendor_id":1208,"product_id":514,"system_name":"TM-T20"}"#,
        )
        .unwrap();
        assert_eq!(target.kind(), "usb");
    }

    #[test]
    fn test_from_json_validates() {
        assert!(PrinterTarget::from_json(r#"{"kind":"bluetooth","address":"00:11:62:AA:BB:CC"}"#).is_ok());
        let err = PrinterTarget::from_json(r#"{"kind":"bluetooth","address":"nope"}"#).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
        assert!(PrinterTarget::from_json(r#"{"kind":"fax"}"#).is_err());
    }

    #[test]
    fn test_invalid_target_rejected_before_io() {
        let target: PrinterTarget =
            serde_json::from_str(r#"{"kind":"serial","port_name":"COM1|calc"}"#).unwrap();
        let err = target
            .into_transport(&ChannelBackends::default(), TransportOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_dyn_transport_label() {
        let target = PrinterTarget::Network(NetworkDescriptor::new("10.0.0.9", 9100).unwrap());
        let transport = target
            .into_transport(&ChannelBackends::default(), TransportOptions::default())
            .unwrap();
        assert_eq!(transport.label(), "tcp://10.0.0.9:9100");
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn test_dyn_transport_reports_unplug() {
        let target = PrinterTarget::from_json(
            r#"{"kind":"usb","vendor_id":1208,"product_id":514,"system_name":"TM-T20"}"#,
        )
        .unwrap();
        let transport = target
            .into_transport(&ChannelBackends::default(), TransportOptions::default())
            .unwrap();
        // No USB backend: the spooler route opens without touching the device
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        transport.device_disconnected().await;
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(transport.status().reconnect_remaining.is_none());
    }
}
