// Capture module - RECORD SOURCES
// Monitor interface provisioning and the feeds that turn sightings into records

mod ble;
mod feed;
mod provision;

pub use ble::{run_ble_feed, BleScanner};
pub use feed::{FeedLine, LineFeed};
pub use provision::{parse_wiphy, CommandRunner, MonitorProvisioner, SystemCommandRunner};

use crate::record::SignalPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while setting up or reading a capture source
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Monitor interface {0} did not come up")]
    InterfaceMissing(String),

    #[error("Malformed feed line: {0}")]
    MalformedLine(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),
}

/// Where observation lines come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Lines piped into the relay's standard input
    Stdin,
    /// No line feed; records only come from attached scanners
    None,
}

impl Default for FeedKind {
    fn default() -> Self {
        Self::Stdin
    }
}

/// Configuration for capture provisioning and feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Physical wireless interface the monitor interface is created from
    pub wireless_interface: String,
    /// Monitor interface name
    pub monitor_interface: String,
    /// Create the monitor interface at startup
    pub provision: bool,
    /// Wait after each provisioning step
    pub settle_ms: u64,
    /// Root of the network class directory in sysfs
    pub sysfs_net_root: String,
    pub signal_policy: SignalPolicy,
    /// Length of one BLE scan window
    pub ble_scan_window_ms: u64,
    /// Pause after a failed BLE scan
    pub ble_retry_ms: u64,
    pub feed: FeedKind,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            wireless_interface: "wlan0".to_string(),
            monitor_interface: "mon0".to_string(),
            provision: true,
            settle_ms: 1000,
            sysfs_net_root: "/sys/class/net".to_string(),
            signal_policy: SignalPolicy::default(),
            ble_scan_window_ms: 4000,
            ble_retry_ms: 2000,
            feed: FeedKind::Stdin,
        }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interfaces(mut self, wireless: &str, monitor: &str) -> Self {
        self.wireless_interface = wireless.to_string();
        self.monitor_interface = monitor.to_string();
        self
    }

    pub fn with_provision(mut self, provision: bool) -> Self {
        self.provision = provision;
        self
    }

    pub fn with_settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    pub fn with_sysfs_net_root(mut self, root: &str) -> Self {
        self.sysfs_net_root = root.to_string();
        self
    }

    pub fn with_signal_policy(mut self, policy: SignalPolicy) -> Self {
        self.signal_policy = policy;
        self
    }

    pub fn with_feed(mut self, feed: FeedKind) -> Self {
        self.feed = feed;
        self
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn ble_scan_window(&self) -> Duration {
        Duration::from_millis(self.ble_scan_window_ms)
    }

    pub fn ble_retry(&self) -> Duration {
        Duration::from_millis(self.ble_retry_ms)
    }
}
