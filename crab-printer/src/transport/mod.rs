//! Printer connections
//!
//! [`Transport`] owns the connection lifecycle (connect with retries,
//! auto-reconnect with a deadline, state events). A [`Channel`] only knows how
//! to open, close and write one kind of physical link:
//!
//! | Channel | Link |
//! |---------|------|
//! | [`SerialChannel`] | COM port configured through `mode` / `stty` |
//! | [`UsbChannel`] | USB bulk OUT endpoint, or the host spooler |
//! | [`BluetoothChannel`] | RFCOMM serial port profile |
//! | [`NetworkChannel`] | Raw TCP (port 9100) |

mod bluetooth;
mod capability;
mod machine;
mod network;
mod options;
mod serial;
mod spooler;
mod state;
mod target;
mod usb;
pub mod validation;

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::{TransportError, TransportResult};

pub use bluetooth::{
    BluetoothBackend, BluetoothChannel, BluetoothDescriptor, BluetoothStream, RfcommDeviceBackend,
};
pub use capability::Capability;
pub use machine::Transport;
pub use network::{DEFAULT_PORT, NetworkChannel, NetworkDescriptor};
pub use options::{MAX_RECONNECT_DELAY, TransportOptions};
pub use serial::{
    CommandRunner, CommandSpec, HostPlatform, Parity, SerialChannel, SerialDescriptor, SystemRunner,
    configure_command, write_command,
};
pub use spooler::{Spooler, SystemSpooler};
pub use state::{TransportEvent, TransportState, TransportStatus};
pub use target::{ChannelBackends, PrinterTarget};
pub use usb::{
    EndpointInfo, InterfaceInfo, PRINTER_CLASS, TransferKind, UsbBackend, UsbChannel,
    UsbDescriptor, UsbDevice, select_out_endpoint,
};

/// Transport over any channel, chosen at runtime
pub type DynTransport = Transport<Box<dyn Channel>>;
pub type SerialTransport = Transport<SerialChannel>;
pub type UsbTransport = Transport<UsbChannel>;
pub type BluetoothTransport = Transport<BluetoothChannel>;
pub type NetworkTransport = Transport<NetworkChannel>;

/// One kind of physical printer link
///
/// Implementations hold the open resource and nothing else; retries,
/// timeouts and state live in [`Transport`].
///
/// `close` must be safe to call when nothing is open, and `open` must
/// release anything left over from a previous connection.
#[async_trait]
pub trait Channel: Send + 'static {
    /// Short label for logs, e.g. `tcp://192.168.1.50:9100`
    fn describe(&self) -> String;

    /// Open the link. Incoming data and asynchronous close are reported
    /// through `link`.
    async fn open(&mut self, link: ChannelLink) -> TransportResult<()>;

    async fn close(&mut self) -> TransportResult<()>;

    async fn write(&mut self, data: &[u8]) -> TransportResult<()>;
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Box<C> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn open(&mut self, link: ChannelLink) -> TransportResult<()> {
        (**self).open(link).await
    }

    async fn close(&mut self) -> TransportResult<()> {
        (**self).close().await
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        (**self).write(data).await
    }
}

pub(crate) trait LinkHandler: Send + Sync {
    fn on_data(&self, generation: u64, data: Vec<u8>);
    fn on_closed(self: Arc<Self>, generation: u64, reason: Option<TransportError>);
}

struct Detached;

impl LinkHandler for Detached {
    fn on_data(&self, _generation: u64, _data: Vec<u8>) {}
    fn on_closed(self: Arc<Self>, _generation: u64, _reason: Option<TransportError>) {}
}

/// Back-channel from an open channel to its transport
///
/// Each successful `open` gets a fresh link. Reports from a link that belongs
/// to an earlier connection are ignored, so a reader task that outlives its
/// socket cannot tear down the next one.
#[derive(Clone)]
pub struct ChannelLink {
    handler: Weak<dyn LinkHandler>,
    generation: u64,
}

impl ChannelLink {
    pub(crate) fn new(handler: Weak<dyn LinkHandler>, generation: u64) -> Self {
        Self {
            handler,
            generation,
        }
    }

    /// A link connected to nothing (for driving channels directly)
    pub fn detached() -> Self {
        let handler: Weak<dyn LinkHandler> = Weak::<Detached>::new();
        Self::new(handler, 0)
    }

    /// Forward bytes received from the printer
    pub fn data(&self, bytes: Vec<u8>) {
        if let Some(handler) = self.handler.upgrade() {
            handler.on_data(self.generation, bytes);
        }
    }

    /// Report that the link dropped on its own
    pub fn closed(&self, reason: Option<TransportError>) {
        if let Some(handler) = self.handler.upgrade() {
            handler.on_closed(self.generation, reason);
        }
    }
}

impl std::fmt::Debug for ChannelLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLink")
            .field("generation", &self.generation)
            .field("attached", &(self.handler.strong_count() > 0))
            .finish()
    }
}
