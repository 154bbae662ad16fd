// Channel Slot
// Guarded state + write handle pair for one delivery channel

use crate::transport::{ChannelKind, ChannelState, ChannelWriter, TransportError};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct SlotInner {
    writer: Option<Box<dyn ChannelWriter>>,
    peer: Option<String>,
    generation: u64,
}

/// State and handle of one channel
///
/// The handle is present exactly while the state is `Connected`; both are
/// changed together under the slot lock. The state is mirrored in an atomic
/// so `is_open` never waits on an in-flight write.
pub struct ChannelSlot {
    kind: ChannelKind,
    state: AtomicU8,
    inner: Mutex<SlotInner>,
    write_timeout: Duration,
    connections: AtomicU64,
    write_failures: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ChannelSlot {
    pub fn new(kind: ChannelKind, write_timeout: Duration) -> Self {
        Self {
            kind,
            state: AtomicU8::new(ChannelState::Disconnected.to_u8()),
            inner: Mutex::new(SlotInner {
                writer: None,
                peer: None,
                generation: 0,
            }),
            write_timeout,
            connections: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Mark an open attempt in progress (only from `Disconnected`)
    pub async fn begin_connecting(&self) -> bool {
        let _inner = self.inner.lock().await;
        if self.state() != ChannelState::Disconnected {
            return false;
        }
        self.set_state(ChannelState::Connecting);
        true
    }

    /// Install a freshly opened handle, closing any previous one first.
    /// Returns the generation identifying this connection.
    pub async fn install(&self, writer: Box<dyn ChannelWriter>, peer: &str) -> u64 {
        let mut inner = self.inner.lock().await;
        if let Some(mut previous) = inner.writer.take() {
            info!(
                channel = %self.kind,
                previous = inner.peer.as_deref().unwrap_or("?"),
                peer,
                "replacing connected peer"
            );
            previous.close().await;
        }
        inner.generation += 1;
        inner.writer = Some(writer);
        inner.peer = Some(peer.to_string());
        self.set_state(ChannelState::Connected);
        self.connections.fetch_add(1, Ordering::Relaxed);
        inner.generation
    }

    /// Drop the handle and mark the channel disconnected.
    /// Returns true if a handle was open.
    pub async fn disconnect(&self, reason: &str) -> bool {
        let mut inner = self.inner.lock().await;
        self.teardown(&mut inner, reason).await
    }

    /// Disconnect only if `generation` is still the live connection
    pub async fn disconnect_generation(&self, generation: u64, reason: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(channel = %self.kind, generation, "stale disconnect ignored");
            return false;
        }
        self.teardown(&mut inner, reason).await
    }

    /// Write one line with the slot's timeout; any failure tears the channel down
    pub async fn write(&self, line: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        let writer = inner.writer.as_mut().ok_or(TransportError::NotConnected)?;

        let result = match tokio::time::timeout(self.write_timeout, writer.write_line(line)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout),
        };

        match result {
            Ok(()) => {
                self.bytes_sent.fetch_add(line.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(e) if e.is_write_failure() => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %self.kind, error = %e, "write failed");
                self.teardown(&mut inner, &e.to_string()).await;
                Err(e)
            }
            Err(e) => {
                debug!(channel = %self.kind, error = %e, "write rejected");
                Err(e)
            }
        }
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    async fn teardown(&self, inner: &mut SlotInner, reason: &str) -> bool {
        let was_open = match inner.writer.take() {
            Some(mut writer) => {
                writer.close().await;
                true
            }
            None => false,
        };
        if was_open {
            info!(
                channel = %self.kind,
                peer = inner.peer.as_deref().unwrap_or("?"),
                reason,
                "channel disconnected"
            );
        }
        inner.peer = None;
        self.set_state(ChannelState::Disconnected);
        was_open
    }

    /// Callers hold the slot lock. Repeating a settled state is a no-op.
    fn set_state(&self, next: ChannelState) {
        let current = self.state();
        if current == next && next != ChannelState::Connected {
            return;
        }
        if !current.can_transition_to(&next) {
            warn!(channel = %self.kind, from = %current, to = %next, "illegal channel transition");
            return;
        }
        self.state.store(next.to_u8(), Ordering::Release);
    }
}
