// Transport State
// The single owned object holding channel slots, device status and last-send time

use crate::status::StatusHandle;
use crate::transport::{ChannelKind, ChannelSlot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// LAST SEND CLOCK
// ============================================================================

/// Monotonic time of the most recent successful delivery
///
/// Stored as milliseconds past a fixed epoch in one atomic, so concurrent
/// readers never observe a torn value and the stamp never moves backwards.
pub struct LastSendClock {
    epoch: Instant,
    // 0 = nothing sent yet, otherwise elapsed-ms + 1
    stamp: AtomicU64,
}

impl LastSendClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            stamp: AtomicU64::new(0),
        }
    }

    /// Record a successful delivery now
    pub fn mark(&self) {
        let stamp = self.epoch.elapsed().as_millis() as u64 + 1;
        self.stamp.fetch_max(stamp, Ordering::AcqRel);
    }

    /// Instant of the last delivery, if any
    pub fn last(&self) -> Option<Instant> {
        match self.stamp.load(Ordering::Acquire) {
            0 => None,
            stamp => Some(self.epoch + Duration::from_millis(stamp - 1)),
        }
    }

    /// Time since the last delivery, if any
    pub fn elapsed(&self) -> Option<Duration> {
        self.last().map(|at| at.elapsed())
    }
}

impl Default for LastSendClock {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TRANSPORT STATE
// ============================================================================

/// Shared state of the transport subsystem
pub struct TransportState {
    status: StatusHandle,
    tcp: ChannelSlot,
    serial: ChannelSlot,
    last_send: LastSendClock,
}

impl TransportState {
    pub fn new(tcp_write_timeout: Duration, serial_write_timeout: Duration) -> Self {
        Self {
            status: StatusHandle::new(),
            tcp: ChannelSlot::new(ChannelKind::Tcp, tcp_write_timeout),
            serial: ChannelSlot::new(ChannelKind::Serial, serial_write_timeout),
            last_send: LastSendClock::new(),
        }
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    pub fn slot(&self, kind: ChannelKind) -> &ChannelSlot {
        match kind {
            ChannelKind::Tcp => &self.tcp,
            ChannelKind::Serial => &self.serial,
        }
    }

    pub fn last_send(&self) -> &LastSendClock {
        &self.last_send
    }

    /// True if any channel is currently connected
    pub fn any_open(&self) -> bool {
        self.tcp.is_open() || self.serial.is_open()
    }
}
