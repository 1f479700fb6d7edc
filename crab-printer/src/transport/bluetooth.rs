//! Bluetooth SPP printers
//!
//! The platform side (pairing, RFCOMM socket) lives behind
//! [`BluetoothBackend`]. On Linux, [`RfcommDeviceBackend`] talks to the
//! device node bound to the printer with `rfcomm bind <n> <address> <channel>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::capability::Capability;
use super::serial::{CommandRunner, CommandSpec, SystemRunner};
use super::validation::{validate_bt_address, validate_rfcomm_channel};
use super::{Channel, ChannelLink};
use crate::error::{TransportError, TransportResult};

/// Writes larger than this are split so the SPP buffer keeps up
const CHUNK_SIZE: usize = 4096;
const CHUNK_DELAY: Duration = Duration::from_millis(2);

fn default_channel() -> u8 {
    1
}

/// Bluetooth printer address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDescriptor {
    /// MAC address, `AA:BB:CC:DD:EE:FF`
    pub address: String,
    /// RFCOMM channel (1-30)
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl BluetoothDescriptor {
    pub fn new(address: impl Into<String>, channel: u8) -> TransportResult<Self> {
        let descriptor = Self {
            address: address.into(),
            channel,
            device_name: None,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn validate(&self) -> TransportResult<()> {
        validate_bt_address(&self.address)?;
        validate_rfcomm_channel(self.channel)
    }
}

/// Connected SPP link, as read and write halves
///
/// `reader` is optional: write-only links never report incoming data and
/// only notice a drop when a write fails.
pub struct BluetoothStream {
    pub reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl fmt::Debug for BluetoothStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothStream")
            .field("readable", &self.reader.is_some())
            .finish()
    }
}

/// Platform Bluetooth access
#[async_trait]
pub trait BluetoothBackend: Send + Sync {
    async fn connect(&self, descriptor: &BluetoothDescriptor) -> TransportResult<BluetoothStream>;
}

/// Linux `/dev/rfcommN` backend
///
/// Looks up the device bound to the descriptor's address and channel in
/// `/proc/net/rfcomm`, opens it write-only and switches it to raw mode with
/// `stty`. A blocking TTY read cannot be cancelled, so this backend does not
/// read.
pub struct RfcommDeviceBackend {
    table: PathBuf,
    dev_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Default for RfcommDeviceBackend {
    fn default() -> Self {
        Self {
            table: PathBuf::from("/proc/net/rfcomm"),
            dev_dir: PathBuf::from("/dev"),
            runner: Arc::new(SystemRunner),
        }
    }
}

impl RfcommDeviceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding table to read instead of `/proc/net/rfcomm`
    pub fn with_table(mut self, table: impl Into<PathBuf>) -> Self {
        self.table = table.into();
        self
    }

    /// Directory holding the `rfcommN` nodes
    pub fn with_dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dir.into();
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Device node bound to `descriptor`, if any
    pub async fn resolve(&self, descriptor: &BluetoothDescriptor) -> TransportResult<Option<PathBuf>> {
        let table = tokio::fs::read_to_string(&self.table).await.map_err(|e| {
            TransportError::io(&format!("read {}", self.table.display()), e)
        })?;
        Ok(find_bound_device(&table, &descriptor.address, descriptor.channel)
            .map(|name| self.dev_dir.join(name)))
    }
}

impl fmt::Debug for RfcommDeviceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfcommDeviceBackend")
            .field("table", &self.table)
            .field("dev_dir", &self.dev_dir)
            .finish()
    }
}

/// Find `rfcommN` in a binding table
///
/// Lines look like `rfcomm0: 00:11:62:AA:BB:CC channel 1 clean`. The address
/// compares case-insensitively; a listed channel must match.
pub fn find_bound_device(table: &str, address: &str, channel: u8) -> Option<String> {
    table.lines().find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        let name = name.trim();
        if !name.starts_with("rfcomm") {
            return None;
        }
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(address)) {
            return None;
        }
        let listed = tokens
            .windows(2)
            .find(|w| w[0] == "channel")
            .and_then(|w| w[1].parse::<u8>().ok());
        match listed {
            Some(listed) if listed != channel => None,
            _ => Some(name.to_string()),
        }
    })
}

#[async_trait]
impl BluetoothBackend for RfcommDeviceBackend {
    async fn connect(&self, descriptor: &BluetoothDescriptor) -> TransportResult<BluetoothStream> {
        let Some(device) = self.resolve(descriptor).await? else {
            return Err(TransportError::connection_lost(format!(
                "{} channel {} is not bound (run `rfcomm bind <n> {} {}`)",
                descriptor.address, descriptor.channel, descriptor.address, descriptor.channel
            )));
        };
        let path = device.display().to_string();
        if !exists(&device).await {
            return Err(TransportError::connection_lost(format!(
                "{} is bound to {} but the device node is missing",
                descriptor.address, path
            )));
        }
        debug!(device = %path, "RFCOMM device resolved");

        let raw = CommandSpec::new("stty", ["-F", path.as_str(), "raw", "-echo"]);
        self.runner.run(&raw).await?;

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&device)
            .await
            .map_err(|e| TransportError::io(&format!("open {}", path), e))?;

        Ok(BluetoothStream {
            reader: None,
            writer: Box::new(file),
        })
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Bluetooth channel
pub struct BluetoothChannel {
    descriptor: BluetoothDescriptor,
    backend: Capability<dyn BluetoothBackend>,
    writer: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    reader: Option<JoinHandle<()>>,
}

impl BluetoothChannel {
    pub fn new(
        descriptor: BluetoothDescriptor,
        backend: Capability<dyn BluetoothBackend>,
    ) -> TransportResult<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            backend,
            writer: None,
            reader: None,
        })
    }

    pub fn descriptor(&self) -> &BluetoothDescriptor {
        &self.descriptor
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
    }
}

impl fmt::Debug for BluetoothChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothChannel")
            .field("descriptor", &self.descriptor)
            .field("backend", &self.backend)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

#[async_trait]
impl Channel for BluetoothChannel {
    fn describe(&self) -> String {
        format!("bt://{}/{}", self.descriptor.address, self.descriptor.channel)
    }

    #[instrument(skip(self, link), fields(address = %self.descriptor.address, channel = self.descriptor.channel))]
    async fn open(&mut self, link: ChannelLink) -> TransportResult<()> {
        self.release();

        let backend = match &self.backend {
            Capability::Available(backend) => Arc::clone(backend),
            Capability::Missing { reason } => {
                return Err(TransportError::capability_missing(format!(
                    "Bluetooth backend unavailable: {}",
                    reason
                )));
            }
        };

        let stream = backend.connect(&self.descriptor).await?;
        if let Some(mut reader) = stream.reader {
            self.reader = Some(tokio::spawn(async move {
                let mut buf = [0u8; 256];
                loop {
                    match reader.read(&mut buf).await {
                        Ok(0) => {
                            link.closed(None);
                            break;
                        }
                        Ok(n) => link.data(buf[..n].to_vec()),
                        Err(e) => {
                            link.closed(Some(TransportError::io("bluetooth read", e)));
                            break;
                        }
                    }
                }
            }));
        }
        self.writer = Some(stream.writer);

        info!("Bluetooth link open");
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writer.shutdown().await
        {
            debug!(error = %e, "Bluetooth shutdown failed");
        }
        self.release();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::not_connected("Bluetooth link not open"))?;

        let mut chunks = data.chunks(CHUNK_SIZE).peekable();
        while let Some(chunk) = chunks.next() {
            writer.write_all(chunk).await.map_err(|e| {
                TransportError::send_failure(format!("bluetooth write failed: {}", e)).with_cause(e)
            })?;
            if chunks.peek().is_some() {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
        }
        writer.flush().await.map_err(|e| {
            TransportError::send_failure(format!("bluetooth flush failed: {}", e)).with_cause(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[test]
    fn test_descriptor_validation() {
        assert!(BluetoothDescriptor::new("00:11:62:AA:BB:CC", 1).is_ok());
        assert!(BluetoothDescriptor::new("00:11:62:AA:BB:CC", 0).is_err());
        assert!(BluetoothDescriptor::new("printer", 1).is_err());

        let d: BluetoothDescriptor =
            serde_json::from_str(r#"{"address":"00:11:62:aa:bb:cc"}"#).unwrap();
        assert_eq!(d.channel, 1);
        assert!(d.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_backend_is_not_recoverable() {
        let mut channel = BluetoothChannel::new(
            BluetoothDescriptor::new("00:11:62:AA:BB:CC", 1).unwrap(),
            Capability::missing("no bluez"),
        )
        .unwrap();
        let err = channel.open(ChannelLink::detached()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::CapabilityMissing);
        assert!(!err.recoverable);
    }

    #[derive(Default)]
    struct RecordingRunner {
        commands: parking_lot::Mutex<Vec<CommandSpec>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &CommandSpec) -> TransportResult<()> {
            self.commands.lock().push(command.clone());
            Ok(())
        }
    }

    const TABLE: &str = "\
rfcomm0: 00:11:62:11:22:33 channel 1 clean
rfcomm1: 00:11:62:AA:BB:CC channel 2 connected
rfcomm2: 00:11:62:aa:bb:cc channel 1 clean
";

    #[test]
    fn test_find_bound_device() {
        assert_eq!(
            find_bound_device(TABLE, "00:11:62:AA:BB:CC", 1).as_deref(),
            Some("rfcomm2")
        );
        assert_eq!(
            find_bound_device(TABLE, "00:11:62:aa:bb:cc", 2).as_deref(),
            Some("rfcomm1")
        );
        assert_eq!(find_bound_device(TABLE, "00:11:62:AA:BB:CC", 3), None);
        assert_eq!(find_bound_device(TABLE, "00:11:62:DD:EE:FF", 1), None);
        assert_eq!(find_bound_device("", "00:11:62:11:22:33", 1), None);
    }

    fn backend_in(dir: &tempfile::TempDir, runner: Arc<RecordingRunner>) -> RfcommDeviceBackend {
        let table = dir.path().join("rfcomm");
        std::fs::write(&table, TABLE).unwrap();
        RfcommDeviceBackend::new()
            .with_table(table)
            .with_dev_dir(dir.path())
            .with_runner(runner)
    }

    #[tokio::test]
    async fn test_connects_to_device_bound_to_address() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rfcomm2"), b"").unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let backend = backend_in(&dir, runner.clone());

        let descriptor = BluetoothDescriptor::new("00:11:62:AA:BB:CC", 1).unwrap();
        let mut stream = backend.connect(&descriptor).await.unwrap();
        stream.writer.write_all(&[0x1B, 0x40]).await.unwrap();
        stream.writer.flush().await.unwrap();

        let device = dir.path().join("rfcomm2");
        assert_eq!(std::fs::read(&device).unwrap(), vec![0x1B, 0x40]);
        let commands = runner.commands.lock().clone();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "stty");
        assert_eq!(commands[0].args[1], device.display().to_string());
    }

    #[tokio::test]
    async fn test_unbound_address_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rfcomm0"), b"").unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let backend = backend_in(&dir, runner.clone());

        // rfcomm0 exists but belongs to another printer
        let descriptor = BluetoothDescriptor::new("00:11:62:DD:EE:FF", 1).unwrap();
        let err = backend.connect(&descriptor).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ConnectionLost);
        assert!(err.recoverable);
        assert!(runner.commands.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_rfcomm_device() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir, Arc::new(RecordingRunner::default()));
        let descriptor = BluetoothDescriptor::new("00:11:62:AA:BB:CC", 1).unwrap();
        let err = backend.connect(&descriptor).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::ConnectionLost);
        assert!(err.recoverable);
    }

    #[tokio::test]
    async fn test_unreadable_table_is_recoverable() {
        let backend = RfcommDeviceBackend::new().with_table("/nonexistent/rfcomm");
        let descriptor = BluetoothDescriptor::new("00:11:62:AA:BB:CC", 1).unwrap();
        let err = backend.connect(&descriptor).await.unwrap_err();
        assert!(err.recoverable);
    }
}
