// Connection Supervisor
// Owns both delivery channels and keeps each one open whenever possible

use crate::status::DeviceStatus;
use crate::transport::serial::SerialChannel;
use crate::transport::tcp::{bind_listener, TcpChannel};
use crate::transport::{
    ChannelKind, SerialChannelConfig, SerialOpener, SystemSerialOpener, TcpChannelConfig,
    TransportError, TransportState,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Supervises the TCP listener and the serial link
///
/// Each channel runs on its own task; failures become channel state
/// transitions and status requests, never errors returned to callers.
pub struct ConnectionSupervisor {
    state: Arc<TransportState>,
    tcp_config: TcpChannelConfig,
    serial_config: SerialChannelConfig,
    opener: Arc<dyn SerialOpener>,
    tcp_local_addr: Arc<Mutex<Option<SocketAddr>>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl ConnectionSupervisor {
    pub fn new(
        state: Arc<TransportState>,
        tcp_config: TcpChannelConfig,
        serial_config: SerialChannelConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            tcp_config,
            serial_config,
            opener: Arc::new(SystemSerialOpener),
            tcp_local_addr: Arc::new(Mutex::new(None)),
            tracker: TaskTracker::new(),
            cancel,
            started: AtomicBool::new(false),
        }
    }

    /// Replace the serial device access (used by tests and alternative links)
    pub fn with_serial_opener(mut self, opener: Arc<dyn SerialOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn state(&self) -> &Arc<TransportState> {
        &self.state
    }

    /// Start listening and spawn the channel loops.
    ///
    /// The first TCP bind happens before this returns so the listening
    /// address is known; a failed bind is reported as `Error` and retried in
    /// the background.
    pub async fn start(&self) -> Result<(), TransportError> {
        if self.tracker.is_closed() {
            return Err(TransportError::ShutDown);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyRunning);
        }

        self.state.status().request(DeviceStatus::ReadyToConnect);

        if self.tcp_config.enabled {
            let listener = match bind_listener(&self.tcp_config).await {
                Ok(listener) => Some(listener),
                Err(e) => {
                    error!(error = %e, "TCP bind failed, will retry");
                    self.state.status().request(DeviceStatus::Error);
                    None
                }
            };
            let channel = TcpChannel::new(
                self.state.clone(),
                self.tcp_config.clone(),
                self.tcp_local_addr.clone(),
                self.tracker.clone(),
                self.cancel.child_token(),
            );
            if let Some(listener) = &listener {
                if let Ok(addr) = listener.local_addr() {
                    *self.tcp_local_addr.lock().unwrap_or_else(|e| e.into_inner()) = Some(addr);
                }
            }
            self.tracker.spawn(channel.run(listener));
        } else {
            info!("TCP channel disabled");
        }

        if self.serial_config.enabled {
            let channel = SerialChannel::new(
                self.state.clone(),
                self.serial_config.clone(),
                self.opener.clone(),
                self.cancel.child_token(),
            );
            self.tracker.spawn(channel.run());
        } else {
            info!("serial channel disabled");
        }

        Ok(())
    }

    /// Whether `channel` is currently connected
    pub fn is_open(&self, channel: ChannelKind) -> bool {
        self.state.slot(channel).is_open()
    }

    /// Write one line to `channel`; false (and the channel torn down) on any failure
    pub async fn write_to(&self, channel: ChannelKind, bytes: &[u8]) -> bool {
        self.state.slot(channel).write(bytes).await.is_ok()
    }

    /// Address the TCP listener is bound to, once bound
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        *self.tcp_local_addr.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop all loops, waiting at most `timeout`, then close both channels
    /// and force the status off
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(timeout_ms = timeout.as_millis() as u64, "channel tasks did not stop in time");
        }

        for kind in ChannelKind::ALL {
            self.state.slot(kind).disconnect("shutdown").await;
        }
        self.state.status().force_off();
        info!("connection supervisor stopped");
    }
}
