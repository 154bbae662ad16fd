// Transport Traits and Core Types
// Channel identity, channel state, the writer seam and transport errors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// CHANNEL KIND
// ============================================================================

/// One of the two delivery paths to the companion device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Tcp,
    Serial,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Tcp, ChannelKind::Serial];
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Serial => write!(f, "serial"),
        }
    }
}

// ============================================================================
// CHANNEL STATE
// ============================================================================

/// Runtime state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl ChannelState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &ChannelState) -> bool {
        match (self, target) {
            (Self::Disconnected, Self::Connecting) => true,
            (Self::Disconnected, Self::Connected) => true, // Accepted peer
            (Self::Connecting, Self::Connected) => true,
            (Self::Connecting, Self::Disconnected) => true, // Open failed
            (Self::Connected, Self::Disconnected) => true,
            (Self::Connected, Self::Connected) => true, // Peer replaced
            _ => false,
        }
    }

    /// Check if records may be written
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

// ============================================================================
// CHANNEL WRITER
// ============================================================================

/// Write side of an open channel
///
/// Owned exclusively by the channel slot; other components only ever reach
/// it through the slot's write path.
#[async_trait]
pub trait ChannelWriter: Send {
    /// Write one complete wire line
    async fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError>;

    /// Release the underlying handle
    async fn close(&mut self) {}
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur on a delivery channel
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Bind failed on {address}: {reason}")]
    BindFailed { address: String, reason: String },

    #[error("Accept failed: {0}")]
    AcceptFailed(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Open failed: {0}")]
    OpenFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Transport already running")]
    AlreadyRunning,

    #[error("Transport shut down")]
    ShutDown,

    #[error("IO error: {0}")]
    IoError(String),
}

impl TransportError {
    /// A write on an open channel failed and the channel must be torn down
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailed(_) | Self::WriteTimeout | Self::IoError(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

// ============================================================================
// TRANSPORT STATISTICS
// ============================================================================

/// Delivery counters across both channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Records accepted by at least one channel
    pub records_sent: u64,
    /// Records no channel accepted
    pub records_undelivered: u64,
    /// Connections established on the TCP channel
    pub tcp_connections: u64,
    /// Connections established on the serial channel
    pub serial_connections: u64,
    /// Failed writes on the TCP channel
    pub tcp_write_failures: u64,
    /// Failed writes on the serial channel
    pub serial_write_failures: u64,
    /// Total bytes written across channels
    pub bytes_sent: u64,
}
