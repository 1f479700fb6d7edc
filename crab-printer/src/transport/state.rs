use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Connection state of a transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Not connected, no attempt running
    #[default]
    Disconnected,
    /// Explicit connect in progress
    Connecting,
    /// Channel open and writable
    Connected,
    /// Auto-reconnect loop running after a drop
    Reconnecting,
    /// Gave up; needs an explicit `connect()`
    Error,
}

impl TransportState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Point-in-time view of a transport, for owners that poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStatus {
    pub state: TransportState,
    /// Failed attempts in the current connect sequence
    pub retries: u32,
    /// How long the current connection has been up
    pub connected_for: Option<Duration>,
    /// Time left before auto-reconnect gives up
    pub reconnect_remaining: Option<Duration>,
}

/// Notifications published by a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    StateChanged {
        from: TransportState,
        to: TransportState,
    },
    Connected,
    Disconnected,
    Error(TransportError),
    /// Bytes received from the printer (status replies etc.)
    Data(Vec<u8>),
}
