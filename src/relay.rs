// Relay Runtime
// Wires status, transport, storage, capture and feeds into one running relay

use crate::capture::{
    run_ble_feed, BleScanner, CaptureError, CommandRunner, FeedKind, LineFeed, MonitorProvisioner,
};
use crate::config::{ConfigError, RelayConfig};
use crate::pipeline::RecordPipeline;
use crate::privilege::PrivilegeError;
use crate::record::Record;
use crate::status::{
    DeviceStatus, IndicatorRenderer, StatusIndicator, StatusSnapshot, TracingIndicator,
};
use crate::storage::{SessionLog, StorageError};
use crate::transport::{
    ActivityMonitor, ConnectionSupervisor, SerialOpener, TransportError, TransportSender,
    TransportState, TransportStats,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Records buffered between the feeds and the pipeline
const RECORD_QUEUE_DEPTH: usize = 256;

/// Errors that stop the relay from starting
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Privilege error: {0}")]
    Privilege(#[from] PrivilegeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
}

// ============================================================================
// RELAY
// ============================================================================

/// Builder for a running relay
pub struct Relay {
    config: RelayConfig,
    serial_opener: Option<Arc<dyn SerialOpener>>,
    command_runner: Option<Arc<dyn CommandRunner>>,
    indicator: Option<Box<dyn StatusIndicator>>,
    ble_scanner: Option<Box<dyn BleScanner>>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            serial_opener: None,
            command_runner: None,
            indicator: None,
            ble_scanner: None,
        }
    }

    pub fn with_serial_opener(mut self, opener: Arc<dyn SerialOpener>) -> Self {
        self.serial_opener = Some(opener);
        self
    }

    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.command_runner = Some(runner);
        self
    }

    pub fn with_indicator(mut self, indicator: Box<dyn StatusIndicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn with_ble_scanner(mut self, scanner: Box<dyn BleScanner>) -> Self {
        self.ble_scanner = Some(scanner);
        self
    }

    /// Start every component with the default adapters
    pub async fn start(config: RelayConfig) -> Result<RelayHandle, RelayError> {
        Self::new(config).run().await
    }

    /// Start every component.
    ///
    /// Capture provisioning and storage failures are reported and the relay
    /// keeps going; only configuration and transport startup errors are
    /// returned.
    pub async fn run(self) -> Result<RelayHandle, RelayError> {
        let config = self.config;
        config.validate()?;

        let state = Arc::new(TransportState::new(
            config.tcp.write_timeout(),
            config.serial.write_timeout(),
        ));
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let indicator = self
            .indicator
            .unwrap_or_else(|| Box::new(TracingIndicator::new()));
        let renderer = IndicatorRenderer::new(indicator, config.indicator.blink_interval());
        tracker.spawn(renderer.run(state.status().subscribe(), cancel.child_token()));

        if config.capture.provision {
            state.status().request(DeviceStatus::SettingUpCapture);
            let mut provisioner = MonitorProvisioner::new(config.capture.clone());
            if let Some(runner) = self.command_runner {
                provisioner = provisioner.with_runner(runner);
            }
            if let Err(e) = provisioner.provision().await {
                error!(error = %e, "capture setup failed");
                state.status().request(DeviceStatus::Error);
            }
        }

        let mut supervisor = ConnectionSupervisor::new(
            state.clone(),
            config.tcp.clone(),
            config.serial.clone(),
            cancel.child_token(),
        );
        if let Some(opener) = self.serial_opener {
            supervisor = supervisor.with_serial_opener(opener);
        }
        let supervisor = Arc::new(supervisor);
        if let Err(e) = supervisor.start().await {
            cancel.cancel();
            tracker.close();
            tracker.wait().await;
            return Err(e.into());
        }

        let sender = Arc::new(TransportSender::new(supervisor.clone()));

        let log = if config.storage.enabled {
            match SessionLog::create(&config.storage.directory) {
                Ok(log) => Some(log),
                Err(e) => {
                    error!(error = %e, "session log unavailable, continuing without CSV");
                    None
                }
            }
        } else {
            None
        };
        let log_path = log.as_ref().map(|log| log.path().to_path_buf());

        let (sink, records) = mpsc::channel(RECORD_QUEUE_DEPTH);
        tracker.spawn(RecordPipeline::new(log, sender.clone()).run(records));

        let monitor = ActivityMonitor::new(state.clone(), config.activity.clone());
        tracker.spawn(monitor.run(cancel.child_token()));

        if config.capture.feed == FeedKind::Stdin {
            let feed = LineFeed::new(
                BufReader::new(tokio::io::stdin()),
                config.capture.signal_policy.clone(),
            );
            tracker.spawn(feed.run(sink.clone(), cancel.child_token()));
        }

        if let Some(scanner) = self.ble_scanner {
            tracker.spawn(run_ble_feed(
                scanner,
                config.capture.ble_scan_window(),
                config.capture.ble_retry(),
                sink.clone(),
                cancel.child_token(),
            ));
        }

        info!(
            tcp = ?supervisor.tcp_local_addr(),
            serial = config.serial.enabled,
            csv = ?log_path,
            "relay started"
        );

        Ok(RelayHandle {
            config,
            state,
            supervisor,
            sender,
            sink: Some(sink),
            log_path,
            tracker,
            cancel,
        })
    }
}

// ============================================================================
// RELAY HANDLE
// ============================================================================

/// Control surface of a running relay
pub struct RelayHandle {
    config: RelayConfig,
    state: Arc<TransportState>,
    supervisor: Arc<ConnectionSupervisor>,
    sender: Arc<TransportSender>,
    sink: Option<mpsc::Sender<Record>>,
    log_path: Option<PathBuf>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl RelayHandle {
    pub fn state(&self) -> &Arc<TransportState> {
        &self.state
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state.status().current()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.state.status().subscribe()
    }

    /// Queue for injecting records alongside the built-in feeds
    pub fn record_sink(&self) -> Option<mpsc::Sender<Record>> {
        self.sink.clone()
    }

    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.supervisor.tcp_local_addr()
    }

    pub fn session_log_path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    pub fn stats(&self) -> TransportStats {
        self.sender.stats()
    }

    /// Stop feeds and background loops, drain queued records, close both
    /// channels and switch the indicator off. Bounded by the configured
    /// shutdown timeout per phase.
    pub async fn shutdown(mut self) {
        let timeout = self.config.shutdown_timeout();
        info!("relay shutting down");

        self.cancel.cancel();
        self.sink.take();
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(timeout_ms = timeout.as_millis() as u64, "relay tasks did not stop in time");
        }

        self.supervisor.shutdown(timeout).await;
        info!(stats = ?self.sender.stats(), "relay stopped");
    }
}
