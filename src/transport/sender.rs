// Transport Sender
// Fans each record out to every open channel

use crate::record::{Record, WireCodec};
use crate::status::DeviceStatus;
use crate::transport::{ChannelKind, ConnectionSupervisor, TransportStats};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Delivers records over whichever channels are open
///
/// Only channels already marked open are attempted, so a producer never waits
/// on reconnection; each attempt is bounded by its channel's write timeout.
pub struct TransportSender {
    supervisor: Arc<ConnectionSupervisor>,
    records_sent: AtomicU64,
    records_undelivered: AtomicU64,
}

impl TransportSender {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        Self {
            supervisor,
            records_sent: AtomicU64::new(0),
            records_undelivered: AtomicU64::new(0),
        }
    }

    /// Send one record; true iff at least one channel accepted it
    pub async fn send(&self, record: &Record) -> bool {
        let line = WireCodec::encode_bytes(record);
        let delivered = self.send_line(&line).await;
        trace!(mac = record.mac(), source = %record.source(), delivered, "record relayed");
        delivered
    }

    /// Send an already encoded wire line
    pub async fn send_line(&self, line: &[u8]) -> bool {
        // Both channels are attempted independently; one failing never
        // prevents the other from being tried.
        let (tcp, serial) = tokio::join!(
            self.attempt(ChannelKind::Tcp, line),
            self.attempt(ChannelKind::Serial, line),
        );

        if tcp || serial {
            let state = self.supervisor.state();
            state.last_send().mark();
            state.status().request(DeviceStatus::SendingRecords);
            self.records_sent.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.records_undelivered.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    async fn attempt(&self, channel: ChannelKind, line: &[u8]) -> bool {
        if !self.supervisor.is_open(channel) {
            return false;
        }
        self.supervisor.write_to(channel, line).await
    }

    /// Delivery counters, including per-channel connection and failure counts
    pub fn stats(&self) -> TransportStats {
        let state = self.supervisor.state();
        let tcp = state.slot(ChannelKind::Tcp);
        let serial = state.slot(ChannelKind::Serial);
        TransportStats {
            records_sent: self.records_sent.load(Ordering::Relaxed),
            records_undelivered: self.records_undelivered.load(Ordering::Relaxed),
            tcp_connections: tcp.connections(),
            serial_connections: serial.connections(),
            tcp_write_failures: tcp.write_failures(),
            serial_write_failures: serial.write_failures(),
            bytes_sent: tcp.bytes_sent() + serial.bytes_sent(),
        }
    }
}
