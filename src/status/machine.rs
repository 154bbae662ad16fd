// Status State Machine
// Maps requested statuses to the effective device status under latch rules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

// ============================================================================
// DEVICE STATUS
// ============================================================================

/// Externally observable device status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Off,
    SettingUpCapture,
    ReadyToConnect,
    Paired,
    SendingRecords,
    Error,
    IdleAfterSending,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::Off
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::SettingUpCapture => "setting-up-capture",
            Self::ReadyToConnect => "ready-to-connect",
            Self::Paired => "paired",
            Self::SendingRecords => "sending-records",
            Self::Error => "error",
            Self::IdleAfterSending => "idle-after-sending",
        };
        write!(f, "{}", name)
    }
}

/// Status plus both latches, as consumed by the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub status: DeviceStatus,
    pub error_latched: bool,
    pub idle_latched: bool,
}

// ============================================================================
// STATUS MACHINE
// ============================================================================

/// Pure latch/transition table
///
/// The error latch can only be cleared by a successful send or replaced by a
/// new error. The error and idle latches are never set together.
#[derive(Debug, Clone, Default)]
pub struct StatusMachine {
    status: DeviceStatus,
    error_latched: bool,
    idle_latched: bool,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a requested status and return the effective one
    pub fn request(&mut self, candidate: DeviceStatus) -> DeviceStatus {
        match candidate {
            DeviceStatus::Error => {
                self.error_latched = true;
                self.idle_latched = false;
                self.status = DeviceStatus::Error;
            }
            _ if self.error_latched && candidate != DeviceStatus::SendingRecords => {
                // Latched: status stays Error
            }
            DeviceStatus::SendingRecords => {
                self.error_latched = false;
                self.idle_latched = false;
                self.status = DeviceStatus::SendingRecords;
            }
            DeviceStatus::IdleAfterSending => {
                self.idle_latched = true;
                self.status = DeviceStatus::IdleAfterSending;
            }
            other => {
                self.status = other;
            }
        }
        self.status
    }

    /// Current status and latches
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            error_latched: self.error_latched,
            idle_latched: self.idle_latched,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Set a status and clear both latches, bypassing the table
    pub fn reset(&mut self, status: DeviceStatus) {
        self.status = status;
        self.error_latched = false;
        self.idle_latched = false;
    }
}

// ============================================================================
// STATUS HANDLE
// ============================================================================

/// Shared, serialized access to the status machine
///
/// Every transition runs inside one critical section, and the resulting
/// snapshot is published to subscribers before the lock is released, so
/// observers see transitions in the same total order.
pub struct StatusHandle {
    machine: Mutex<StatusMachine>,
    publisher: watch::Sender<StatusSnapshot>,
}

impl StatusHandle {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(StatusSnapshot::default());
        Self {
            machine: Mutex::new(StatusMachine::new()),
            publisher,
        }
    }

    /// Request a status transition; returns the effective status
    pub fn request(&self, candidate: DeviceStatus) -> DeviceStatus {
        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        let before = machine.status();
        let effective = machine.request(candidate);

        if effective != candidate {
            trace!(requested = %candidate, effective = %effective, "status request latched");
        } else if effective != before {
            debug!(from = %before, to = %effective, "status transition");
        }

        self.publish(machine.snapshot());
        effective
    }

    /// Force the indicator to `Off` and clear latches (shutdown only)
    pub fn force_off(&self) {
        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        machine.reset(DeviceStatus::Off);
        debug!("status forced off");
        self.publish(machine.snapshot());
    }

    /// Current status and latches
    pub fn current(&self) -> StatusSnapshot {
        self.machine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    pub fn status(&self) -> DeviceStatus {
        self.current().status
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.publisher.subscribe()
    }

    fn publish(&self, snapshot: StatusSnapshot) {
        self.publisher.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}
