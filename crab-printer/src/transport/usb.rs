//! USB printers
//!
//! Direct access goes through a [`UsbBackend`] (libusb, WebUSB bridge, ...).
//! When no backend is available but the printer is installed in the OS
//! under a name, jobs go through the host spooler instead.
//!
//! Unplug events are reported with [`Transport::device_disconnected`].
//!
//! [`Transport::device_disconnected`]: super::Transport::device_disconnected

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::capability::Capability;
use super::spooler::{Spooler, SystemSpooler};
use super::validation::{validate_out_endpoint, validate_system_name};
use super::{Channel, ChannelLink};
use crate::error::{TransportError, TransportResult};

/// USB printer device class
pub const PRINTER_CLASS: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub transfer: TransferKind,
}

impl EndpointInfo {
    pub fn bulk(address: u8) -> Self {
        Self {
            address,
            transfer: TransferKind::Bulk,
        }
    }

    pub fn is_out(&self) -> bool {
        self.address & 0x80 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// An opened USB device
#[async_trait]
pub trait UsbDevice: Send {
    fn interfaces(&self) -> Vec<InterfaceInfo>;

    async fn claim(&mut self, interface: u8) -> TransportResult<()>;

    /// Bulk transfer; returns the number of bytes accepted
    async fn bulk_out(&mut self, endpoint: u8, data: &[u8]) -> TransportResult<usize>;

    async fn release(&mut self) -> TransportResult<()>;
}

/// Platform USB access
#[async_trait]
pub trait UsbBackend: Send + Sync {
    async fn open(&self, descriptor: &UsbDescriptor) -> TransportResult<Box<dyn UsbDevice>>;
}

/// USB printer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Name of the printer in the OS spooler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,
    /// Interface override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<u8>,
    /// OUT endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<u8>,
}

impl UsbDescriptor {
    pub fn new(vendor_id: u16, product_id: u16) -> TransportResult<Self> {
        let descriptor = Self {
            vendor_id,
            product_id,
            system_name: None,
            device_path: None,
            interface: None,
            endpoint: None,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn with_system_name(mut self, name: impl Into<String>) -> Self {
        self.system_name = Some(name.into());
        self
    }

    pub fn with_device_path(mut self, path: impl Into<String>) -> Self {
        self.device_path = Some(path.into());
        self
    }

    pub fn with_interface(mut self, interface: u8) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn with_endpoint(mut self, endpoint: u8) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn validate(&self) -> TransportResult<()> {
        if self.vendor_id == 0 || self.product_id == 0 {
            return Err(TransportError::validation(format!(
                "Invalid USB id {:04x}:{:04x}",
                self.vendor_id, self.product_id
            )));
        }
        if let Some(endpoint) = self.endpoint {
            validate_out_endpoint(endpoint)?;
        }
        if let Some(name) = &self.system_name {
            validate_system_name(name)?;
        }
        if let Some(path) = &self.device_path
            && (path.is_empty() || path.chars().any(|c| c.is_control()))
        {
            return Err(TransportError::validation(format!(
                "Invalid USB device path: {:?}",
                path
            )));
        }
        Ok(())
    }
}

/// Pick the interface and OUT endpoint to print on
///
/// An explicit endpoint wins. Otherwise the first bulk OUT endpoint,
/// looking at printer-class interfaces before the rest.
pub fn select_out_endpoint(
    interfaces: &[InterfaceInfo],
    interface: Option<u8>,
    endpoint: Option<u8>,
) -> TransportResult<(u8, u8)> {
    let candidates: Vec<&InterfaceInfo> = interfaces
        .iter()
        .filter(|i| interface.is_none_or(|n| i.number == n))
        .collect();

    if candidates.is_empty() {
        return Err(TransportError::validation(format!(
            "USB interface {:?} not found",
            interface
        )));
    }

    if let Some(address) = endpoint {
        validate_out_endpoint(address)?;
        return candidates
            .iter()
            .find(|i| i.endpoints.iter().any(|e| e.address == address))
            .map(|owner| (owner.number, address))
            .ok_or_else(|| {
                TransportError::validation(format!(
                    "USB endpoint 0x{:02X} not found on interface {:?}",
                    address, interface
                ))
            });
    }

    let bulk_out = |i: &&InterfaceInfo| {
        i.endpoints
            .iter()
            .find(|e| e.transfer == TransferKind::Bulk && e.is_out())
            .map(|e| (i.number, e.address))
    };

    candidates
        .iter()
        .filter(|i| i.class == PRINTER_CLASS)
        .find_map(bulk_out)
        .or_else(|| candidates.iter().find_map(bulk_out))
        .ok_or_else(|| TransportError::validation("USB device has no bulk OUT endpoint"))
}

enum Route {
    Direct {
        device: Box<dyn UsbDevice>,
        endpoint: u8,
    },
    Spooler {
        name: String,
    },
}

/// USB channel with spooler fallback
pub struct UsbChannel {
    descriptor: UsbDescriptor,
    backend: Capability<dyn UsbBackend>,
    spooler: Arc<dyn Spooler>,
    route: Option<Route>,
}

impl UsbChannel {
    pub fn new(
        descriptor: UsbDescriptor,
        backend: Capability<dyn UsbBackend>,
    ) -> TransportResult<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            backend,
            spooler: Arc::new(SystemSpooler),
            route: None,
        })
    }

    pub fn with_spooler(mut self, spooler: Arc<dyn Spooler>) -> Self {
        self.spooler = spooler;
        self
    }

    pub fn descriptor(&self) -> &UsbDescriptor {
        &self.descriptor
    }

    /// Whether jobs currently go through the OS spooler
    pub fn is_spooled(&self) -> bool {
        matches!(self.route, Some(Route::Spooler { .. }))
    }

    async fn release(&mut self) {
        if let Some(Route::Direct { mut device, .. }) = self.route.take()
            && let Err(e) = device.release().await
        {
            debug!(error = %e, "USB release failed");
        }
    }
}

impl fmt::Debug for UsbChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbChannel")
            .field("descriptor", &self.descriptor)
            .field("backend", &self.backend)
            .field("spooled", &self.is_spooled())
            .finish()
    }
}

#[async_trait]
impl Channel for UsbChannel {
    fn describe(&self) -> String {
        match &self.descriptor.system_name {
            Some(name) => format!(
                "usb://{:04x}:{:04x} ({})",
                self.descriptor.vendor_id, self.descriptor.product_id, name
            ),
            None => format!(
                "usb://{:04x}:{:04x}",
                self.descriptor.vendor_id, self.descriptor.product_id
            ),
        }
    }

    #[instrument(skip(self, _link), fields(vid = self.descriptor.vendor_id, pid = self.descriptor.product_id))]
    async fn open(&mut self, _link: ChannelLink) -> TransportResult<()> {
        self.release().await;

        let backend = match &self.backend {
            Capability::Available(backend) => Arc::clone(backend),
            Capability::Missing { reason } => {
                return match &self.descriptor.system_name {
                    Some(name) => {
                        debug!(printer = %name, "No USB backend, using system spooler");
                        self.route = Some(Route::Spooler { name: name.clone() });
                        Ok(())
                    }
                    None => Err(TransportError::capability_missing(format!(
                        "USB backend unavailable: {}",
                        reason
                    ))),
                };
            }
        };

        let mut device = backend.open(&self.descriptor).await?;
        let (interface, endpoint) = select_out_endpoint(
            &device.interfaces(),
            self.descriptor.interface,
            self.descriptor.endpoint,
        )?;
        device.claim(interface).await?;
        info!(interface, endpoint = %format!("0x{:02X}", endpoint), "USB device claimed");
        self.route = Some(Route::Direct { device, endpoint });
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.release().await;
        self.route = None;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        match self.route.as_mut() {
            Some(Route::Direct { device, endpoint }) => {
                let mut offset = 0;
                while offset < data.len() {
                    let written = device.bulk_out(*endpoint, &data[offset..]).await?;
                    if written == 0 {
                        return Err(TransportError::send_failure(
                            "USB endpoint accepted no data",
                        ));
                    }
                    offset += written;
                }
                Ok(())
            }
            Some(Route::Spooler { name }) => self.spooler.print_raw(name, data).await,
            None => Err(TransportError::not_connected("USB device not open")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use crate::transport::{TransportEvent, TransportOptions, TransportState, UsbTransport};
    use std::time::Duration;

    fn iface(number: u8, class: u8, endpoints: Vec<EndpointInfo>) -> InterfaceInfo {
        InterfaceInfo {
            number,
            class,
            endpoints,
        }
    }

    #[test]
    fn test_prefers_printer_class_bulk_out() {
        let interfaces = vec![
            iface(0, 3, vec![EndpointInfo::bulk(0x02)]),
            iface(1, PRINTER_CLASS, vec![EndpointInfo::bulk(0x81), EndpointInfo::bulk(0x03)]),
        ];
        assert_eq!(select_out_endpoint(&interfaces, None, None).unwrap(), (1, 0x03));
    }

    #[test]
    fn test_falls_back_to_any_bulk_out() {
        let interfaces = vec![
            iface(0, 0xFF, vec![EndpointInfo { address: 0x01, transfer: TransferKind::Interrupt }]),
            iface(2, 0xFF, vec![EndpointInfo::bulk(0x82), EndpointInfo::bulk(0x04)]),
        ];
        assert_eq!(select_out_endpoint(&interfaces, None, None).unwrap(), (2, 0x04));
    }

    #[test]
    fn test_explicit_overrides() {
        let interfaces = vec![
            iface(0, PRINTER_CLASS, vec![EndpointInfo::bulk(0x01)]),
            iface(1, 0xFF, vec![EndpointInfo::bulk(0x05)]),
        ];
        assert_eq!(select_out_endpoint(&interfaces, None, Some(0x05)).unwrap(), (1, 0x05));
        assert_eq!(select_out_endpoint(&interfaces, Some(1), None).unwrap(), (1, 0x05));
        assert!(select_out_endpoint(&interfaces, Some(9), None).is_err());
        assert!(select_out_endpoint(&interfaces, None, Some(0x85)).is_err());
    }

    #[test]
    fn test_unknown_endpoint_override_is_rejected() {
        let interfaces = vec![
            iface(0, PRINTER_CLASS, vec![EndpointInfo::bulk(0x01)]),
            iface(1, 0xFF, vec![EndpointInfo::bulk(0x05)]),
        ];
        let err = select_out_endpoint(&interfaces, None, Some(0x07)).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
        // Owned by interface 1, not by the requested interface 0
        let err = select_out_endpoint(&interfaces, Some(0), Some(0x05)).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
    }

    #[test]
    fn test_no_out_endpoint() {
        let interfaces = vec![iface(0, PRINTER_CLASS, vec![EndpointInfo::bulk(0x81)])];
        let err = select_out_endpoint(&interfaces, None, None).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ValidationError);
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(UsbDescriptor::new(0, 0x0202).is_err());
        let d = UsbDescriptor::new(0x04b8, 0x0202).unwrap().with_endpoint(0x81);
        assert!(d.validate().is_err());
        let d = UsbDescriptor::new(0x04b8, 0x0202).unwrap().with_system_name("--x");
        assert!(d.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_backend_without_name_fails_fast() {
        let mut channel = UsbChannel::new(
            UsbDescriptor::new(0x04b8, 0x0202).unwrap(),
            Capability::missing("libusb not installed"),
        )
        .unwrap();
        let err = channel.open(ChannelLink::detached()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::CapabilityMissing);
        assert!(!err.recoverable);
    }

    #[derive(Default)]
    struct DeviceLog {
        opens: usize,
        claimed: Vec<u8>,
        transfers: Vec<(u8, Vec<u8>)>,
        released: usize,
    }

    /// Accepts at most `chunk` bytes per transfer; 0 accepts nothing
    struct MockDevice {
        log: Arc<parking_lot::Mutex<DeviceLog>>,
        chunk: usize,
    }

    #[async_trait]
    impl UsbDevice for MockDevice {
        fn interfaces(&self) -> Vec<InterfaceInfo> {
            vec![
                iface(0, 3, vec![EndpointInfo::bulk(0x02)]),
                iface(1, PRINTER_CLASS, vec![EndpointInfo::bulk(0x81), EndpointInfo::bulk(0x01)]),
            ]
        }

        async fn claim(&mut self, interface: u8) -> TransportResult<()> {
            self.log.lock().claimed.push(interface);
            Ok(())
        }

        async fn bulk_out(&mut self, endpoint: u8, data: &[u8]) -> TransportResult<usize> {
            let n = data.len().min(self.chunk);
            self.log.lock().transfers.push((endpoint, data[..n].to_vec()));
            Ok(n)
        }

        async fn release(&mut self) -> TransportResult<()> {
            self.log.lock().released += 1;
            Ok(())
        }
    }

    struct MockBackend {
        log: Arc<parking_lot::Mutex<DeviceLog>>,
        chunk: usize,
    }

    #[async_trait]
    impl UsbBackend for MockBackend {
        async fn open(&self, _descriptor: &UsbDescriptor) -> TransportResult<Box<dyn UsbDevice>> {
            self.log.lock().opens += 1;
            Ok(Box::new(MockDevice {
                log: Arc::clone(&self.log),
                chunk: self.chunk,
            }))
        }
    }

    fn mock_backend(chunk: usize) -> (Capability<dyn UsbBackend>, Arc<parking_lot::Mutex<DeviceLog>>) {
        let log = Arc::new(parking_lot::Mutex::new(DeviceLog::default()));
        let backend: Arc<dyn UsbBackend> = Arc::new(MockBackend {
            log: Arc::clone(&log),
            chunk,
        });
        (Capability::available(backend), log)
    }

    #[derive(Default)]
    struct RecordingSpooler {
        jobs: parking_lot::Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl Spooler for RecordingSpooler {
        async fn print_raw(&self, printer: &str, data: &[u8]) -> TransportResult<()> {
            self.jobs.lock().push((printer.to_string(), data.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_backend_routes_through_spooler() {
        let spooler = Arc::new(RecordingSpooler::default());
        let mut channel = UsbChannel::new(
            UsbDescriptor::new(0x04b8, 0x0202).unwrap().with_system_name("TM-T20"),
            Capability::missing("libusb not installed"),
        )
        .unwrap()
        .with_spooler(spooler.clone());

        let err = channel.write(b"early").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::NotConnected);

        channel.open(ChannelLink::detached()).await.unwrap();
        assert!(channel.is_spooled());
        channel.write(&[0x1B, 0x40, b'A']).await.unwrap();

        assert_eq!(
            spooler.jobs.lock().clone(),
            vec![("TM-T20".to_string(), vec![0x1B, 0x40, b'A'])]
        );

        channel.close().await.unwrap();
        assert!(!channel.is_spooled());
        assert!(channel.write(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_direct_route_claims_and_writes_in_pieces() {
        let (backend, log) = mock_backend(3);
        let spooler = Arc::new(RecordingSpooler::default());
        let mut channel = UsbChannel::new(
            UsbDescriptor::new(0x04b8, 0x0202).unwrap().with_system_name("TM-T20"),
            backend,
        )
        .unwrap()
        .with_spooler(spooler.clone());

        channel.open(ChannelLink::detached()).await.unwrap();
        assert!(!channel.is_spooled());
        channel.write(b"ABCDEFGH").await.unwrap();

        {
            let log = log.lock();
            assert_eq!(log.claimed, vec![1]);
            let pieces: Vec<&[u8]> = log.transfers.iter().map(|(_, d)| d.as_slice()).collect();
            assert_eq!(pieces, vec![&b"ABC"[..], &b"DEF"[..], &b"GH"[..]]);
            assert!(log.transfers.iter().all(|(ep, _)| *ep == 0x01));
        }
        assert!(spooler.jobs.lock().is_empty());

        channel.close().await.unwrap();
        assert_eq!(log.lock().released, 1);
    }

    #[tokio::test]
    async fn test_endpoint_accepting_nothing_is_a_send_failure() {
        let (backend, _log) = mock_backend(0);
        let mut channel = UsbChannel::new(UsbDescriptor::new(0x04b8, 0x0202).unwrap(), backend).unwrap();
        channel.open(ChannelLink::detached()).await.unwrap();

        let err = channel.write(b"receipt").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::SendFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplug_settles_disconnected_without_reconnect() {
        let (backend, log) = mock_backend(64);
        let channel = UsbChannel::new(UsbDescriptor::new(0x04b8, 0x0202).unwrap(), backend).unwrap();
        let transport = UsbTransport::new(
            channel,
            TransportOptions::new()
                .with_auto_reconnect(true)
                .with_retry_base_delay_ms(100),
        );
        transport.connect().await.unwrap();
        let mut events = transport.subscribe();

        transport.device_disconnected().await;
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert_eq!(log.lock().released, 1);

        let mut saw_error = false;
        let mut saw_disconnected = false;
        while let Ok(event) = events.try_recv() {
            match event {
                TransportEvent::Error(err) => {
                    assert_eq!(err.kind, TransportErrorKind::ConnectionLost);
                    saw_error = true;
                }
                TransportEvent::Disconnected => saw_disconnected = true,
                TransportEvent::StateChanged { to, .. } => {
                    assert_ne!(to, TransportState::Reconnecting)
                }
                _ => {}
            }
        }
        assert!(saw_error && saw_disconnected);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert_eq!(log.lock().opens, 1);

        // Back once the device is plugged in again
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(log.lock().opens, 2);
    }
}
