// TCP Channel
// Listener that keeps at most one companion peer connected

use crate::status::DeviceStatus;
use crate::transport::{ChannelKind, ChannelWriter, TransportError, TransportState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

// ============================================================================
// TCP CHANNEL CONFIG
// ============================================================================

/// Configuration for the TCP channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpChannelConfig {
    /// Run the listener at all
    pub enabled: bool,
    /// Address to bind to
    pub bind_address: String,
    /// Port to bind to (0 for random)
    pub bind_port: u16,
    /// Enable SO_REUSEADDR
    pub reuse_address: bool,
    /// Enable TCP_NODELAY on accepted peers
    pub nodelay: bool,
    /// Listen backlog
    pub backlog: u32,
    /// Upper bound for one record write
    pub write_timeout_ms: u64,
    /// Delay between bind attempts after a failure
    pub bind_retry_ms: u64,
}

impl Default for TcpChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            bind_port: 5000,
            reuse_address: true,
            nodelay: true,
            backlog: 1,
            write_timeout_ms: 250,
            bind_retry_ms: 2000,
        }
    }
}

impl TcpChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = addr.to_string();
        self
    }

    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    pub fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn with_write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    pub fn with_bind_retry_ms(mut self, ms: u64) -> Self {
        self.bind_retry_ms = ms;
        self
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn bind_retry(&self) -> Duration {
        Duration::from_millis(self.bind_retry_ms)
    }

    /// Address string the listener binds to
    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

// ============================================================================
// TCP WRITER
// ============================================================================

/// Write half of the connected peer
struct TcpWriter {
    writer: OwnedWriteHalf,
    peer_cancel: CancellationToken,
}

#[async_trait]
impl ChannelWriter for TcpWriter {
    async fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        self.writer
            .write_all(line)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn close(&mut self) {
        // Stops the liveness reader, which drops the read half
        self.peer_cancel.cancel();
        let _ = self.writer.shutdown().await;
    }
}

// ============================================================================
// LISTENER
// ============================================================================

/// Bind the listening socket described by `config`
pub async fn bind_listener(config: &TcpChannelConfig) -> Result<TcpListener, TransportError> {
    let target = config.bind_target();
    let bind_failed = |reason: String| TransportError::BindFailed {
        address: target.clone(),
        reason,
    };

    let addr: SocketAddr = target
        .parse()
        .map_err(|e: std::net::AddrParseError| bind_failed(e.to_string()))?;

    let created = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    };
    let socket = created.map_err(|e| bind_failed(e.to_string()))?;

    socket
        .set_reuseaddr(config.reuse_address)
        .map_err(|e| bind_failed(e.to_string()))?;
    socket.bind(addr).map_err(|e| bind_failed(e.to_string()))?;
    socket
        .listen(config.backlog.max(1))
        .map_err(|e| bind_failed(e.to_string()))
}

/// Accept loop for the TCP channel
pub(crate) struct TcpChannel {
    state: Arc<TransportState>,
    config: TcpChannelConfig,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl TcpChannel {
    pub(crate) fn new(
        state: Arc<TransportState>,
        config: TcpChannelConfig,
        local_addr: Arc<Mutex<Option<SocketAddr>>>,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            config,
            local_addr,
            tracker,
            cancel,
        }
    }

    /// Serve until cancelled; a failed bind is reported and retried
    pub(crate) async fn run(self, listener: Option<TcpListener>) {
        let listener = match listener {
            Some(l) => l,
            None => match self.bind_with_retry().await {
                Some(l) => l,
                None => return,
            },
        };

        if let Ok(addr) = listener.local_addr() {
            *self.local_addr.lock().unwrap_or_else(|e| e.into_inner()) = Some(addr);
            info!(%addr, "TCP channel listening");
        }

        self.accept_loop(listener).await;
    }

    async fn bind_with_retry(&self) -> Option<TcpListener> {
        loop {
            match bind_listener(&self.config).await {
                Ok(listener) => return Some(listener),
                Err(e) => {
                    error!(error = %e, "TCP listener unavailable");
                    self.state.status().request(DeviceStatus::Error);
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.config.bind_retry()) => {}
            }
        }
    }

    async fn accept_loop(&self, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("TCP accept loop stopping");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.attach(stream, peer).await,
                    Err(e) => {
                        warn!(error = %TransportError::AcceptFailed(e.to_string()), "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }
    }

    async fn attach(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(self.config.nodelay) {
            debug!(%peer, error = %e, "could not set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let peer_cancel = self.cancel.child_token();
        let slot = self.state.slot(ChannelKind::Tcp);
        let generation = slot
            .install(
                Box::new(TcpWriter {
                    writer,
                    peer_cancel: peer_cancel.clone(),
                }),
                &peer.to_string(),
            )
            .await;

        info!(%peer, "TCP peer connected");
        self.state.status().request(DeviceStatus::Paired);

        let state = self.state.clone();
        self.tracker
            .spawn(watch_peer(state, reader, generation, peer, peer_cancel));
    }
}

/// Inbound bytes only serve as a liveness signal and are discarded
async fn watch_peer(
    state: Arc<TransportState>,
    mut reader: OwnedReadHalf,
    generation: u64,
    peer: SocketAddr,
    cancel: CancellationToken,
) {
    let mut buf = [0u8; 1024];
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break "peer closed connection".to_string(),
                Ok(n) => debug!(%peer, bytes = n, "discarding inbound bytes"),
                Err(e) => break e.to_string(),
            },
        }
    };
    state
        .slot(ChannelKind::Tcp)
        .disconnect_generation(generation, &reason)
        .await;
}
