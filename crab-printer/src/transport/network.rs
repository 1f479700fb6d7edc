//! Network printers (raw TCP, port 9100)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::validation::{validate_host, validate_port};
use super::{Channel, ChannelLink};
use crate::error::{TransportError, TransportResult};

/// Raw printing port supported by most thermal printers
pub const DEFAULT_PORT: u16 = 9100;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Network printer address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl NetworkDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> TransportResult<Self> {
        let descriptor = Self {
            host: host.into(),
            port,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse `host[:port]`, defaulting to port 9100
    pub fn from_addr(addr: &str) -> TransportResult<Self> {
        if addr.parse::<std::net::SocketAddr>().is_ok() || addr.matches(':').count() == 1 {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| TransportError::validation(format!("Invalid address: {}", addr)))?;
            let port = port
                .parse()
                .map_err(|_| TransportError::validation(format!("Invalid address: {}", addr)))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            return Self::new(host, port);
        }
        Self::new(addr, DEFAULT_PORT)
    }

    pub fn validate(&self) -> TransportResult<()> {
        validate_host(&self.host)?;
        validate_port(self.port)
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// TCP channel
///
/// A reader task drains whatever the printer sends back (status bytes) and
/// reports peer close to the transport.
#[derive(Debug)]
pub struct NetworkChannel {
    descriptor: NetworkDescriptor,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl NetworkChannel {
    pub fn new(descriptor: NetworkDescriptor) -> TransportResult<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            writer: None,
            reader: None,
        })
    }

    pub fn descriptor(&self) -> &NetworkDescriptor {
        &self.descriptor
    }

    /// Quick reachability probe without touching the channel state
    #[instrument(skip(self), fields(addr = %self.descriptor.authority()))]
    pub async fn probe(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect(self.descriptor.authority())).await {
            Ok(Ok(_)) => {
                debug!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
    }
}

#[async_trait]
impl Channel for NetworkChannel {
    fn describe(&self) -> String {
        format!("tcp://{}", self.descriptor.authority())
    }

    #[instrument(skip(self, link), fields(addr = %self.descriptor.authority()))]
    async fn open(&mut self, link: ChannelLink) -> TransportResult<()> {
        self.release();

        let stream = TcpStream::connect(self.descriptor.authority())
            .await
            .map_err(|e| TransportError::io(&format!("connect {}", self.descriptor.authority()), e))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }

        let (mut read_half, write_half) = stream.into_split();
        self.reader = Some(tokio::spawn(async move {
            let mut buf = [0u8; 256];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        link.closed(None);
                        break;
                    }
                    Ok(n) => link.data(buf[..n].to_vec()),
                    Err(e) => {
                        link.closed(Some(TransportError::io("read", e)));
                        break;
                    }
                }
            }
        }));
        self.writer = Some(write_half);

        info!("TCP connection established");
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writer.shutdown().await
        {
            debug!(error = %e, "TCP shutdown failed");
        }
        self.release();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> TransportResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::not_connected("TCP stream not open"))?;
        writer
            .write_all(data)
            .await
            .map_err(|e| TransportError::send_failure(format!("write failed: {}", e)).with_cause(e))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::send_failure(format!("flush failed: {}", e)).with_cause(e))?;
        Ok(())
    }
}
