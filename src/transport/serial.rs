// Serial Channel
// USB-serial gadget link, reopened whenever the device comes back

use crate::status::DeviceStatus;
use crate::transport::{ChannelKind, ChannelWriter, TransportError, TransportState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// SERIAL CHANNEL CONFIG
// ============================================================================

/// Configuration for the serial channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialChannelConfig {
    /// Run the serial supervisor at all
    pub enabled: bool,
    /// Device node of the serial link
    pub device_path: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound for one record write
    pub write_timeout_ms: u64,
    /// Poll interval while the device node is missing
    pub absent_poll_ms: u64,
    /// Delay after a failed open
    pub retry_ms: u64,
    /// Poll interval while connected
    pub idle_poll_ms: u64,
}

impl Default for SerialChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_path: "/dev/ttyGS0".to_string(),
            baud_rate: 115_200,
            write_timeout_ms: 250,
            absent_poll_ms: 1000,
            retry_ms: 2000,
            idle_poll_ms: 1000,
        }
    }
}

impl SerialChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_device_path(mut self, path: &str) -> Self {
        self.device_path = path.to_string();
        self
    }

    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    pub fn with_write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Set all three supervisor intervals at once
    pub fn with_poll_intervals_ms(mut self, absent: u64, retry: u64, idle: u64) -> Self {
        self.absent_poll_ms = absent;
        self.retry_ms = retry;
        self.idle_poll_ms = idle;
        self
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn absent_poll(&self) -> Duration {
        Duration::from_millis(self.absent_poll_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

// ============================================================================
// SERIAL OPENER
// ============================================================================

/// Access to serial devices
///
/// `open` is blocking and is always run on the blocking pool.
pub trait SerialOpener: Send + Sync {
    /// Whether the device node currently exists
    fn device_present(&self, path: &str) -> bool;

    /// Open the device and return its writer
    fn open(&self, config: &SerialChannelConfig) -> Result<Box<dyn ChannelWriter>, TransportError>;
}

/// Opener backed by real serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialOpener;

impl SerialOpener for SystemSerialOpener {
    fn device_present(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn open(&self, config: &SerialChannelConfig) -> Result<Box<dyn ChannelWriter>, TransportError> {
        let port = serialport::new(&config.device_path, config.baud_rate)
            .timeout(config.write_timeout())
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| {
                TransportError::OpenFailed(format!("{}: {}", config.device_path, e))
            })?;
        Ok(Box::new(SerialWriter {
            port: Arc::new(Mutex::new(port)),
        }))
    }
}

/// Writer over an open serial port
struct SerialWriter {
    port: Arc<Mutex<Box<dyn serialport::SerialPort>>>,
}

#[async_trait]
impl ChannelWriter for SerialWriter {
    async fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        let port = self.port.clone();
        let line = line.to_vec();
        // No flush: tcdrain has no deadline. write_all is bounded by the
        // port timeout, so the port is released before the next reopen.
        tokio::task::spawn_blocking(move || {
            let mut port = port.lock().unwrap_or_else(|e| e.into_inner());
            port.write_all(&line)
        })
        .await
        .map_err(|e| TransportError::WriteFailed(e.to_string()))?
        .map_err(TransportError::from)
    }
}

// ============================================================================
// SERIAL SUPERVISOR
// ============================================================================

/// Maintain loop for the serial channel
pub(crate) struct SerialChannel {
    state: Arc<TransportState>,
    config: SerialChannelConfig,
    opener: Arc<dyn SerialOpener>,
    cancel: CancellationToken,
}

impl SerialChannel {
    pub(crate) fn new(
        state: Arc<TransportState>,
        config: SerialChannelConfig,
        opener: Arc<dyn SerialOpener>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            config,
            opener,
            cancel,
        }
    }

    pub(crate) async fn run(self) {
        info!(device = %self.config.device_path, baud = self.config.baud_rate, "serial supervisor started");
        loop {
            let wait = self.maintain().await;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!("serial supervisor stopping");
    }

    /// One supervision step; returns how long to wait before the next
    async fn maintain(&self) -> Duration {
        let slot = self.state.slot(ChannelKind::Serial);
        let path = &self.config.device_path;

        if !self.opener.device_present(path) {
            let missing = TransportError::DeviceUnavailable(path.clone());
            if slot.disconnect(&missing.to_string()).await {
                warn!(device = %path, "serial device disappeared");
            }
            debug!(device = %path, "serial device not present");
            return self.config.absent_poll();
        }

        if slot.is_open() {
            return self.config.idle_poll();
        }

        slot.begin_connecting().await;
        let opener = self.opener.clone();
        let config = self.config.clone();
        let opened = tokio::task::spawn_blocking(move || opener.open(&config))
            .await
            .unwrap_or_else(|e| Err(TransportError::OpenFailed(e.to_string())));

        match opened {
            Ok(writer) => {
                slot.install(writer, path).await;
                info!(device = %path, "serial channel connected");
                self.state.status().request(DeviceStatus::Paired);
                self.config.idle_poll()
            }
            Err(e) => {
                slot.disconnect(&e.to_string()).await;
                warn!(device = %path, error = %e, "serial open failed");
                self.state.status().request(DeviceStatus::ReadyToConnect);
                self.config.retry()
            }
        }
    }
}
