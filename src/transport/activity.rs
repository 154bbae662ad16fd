// Activity Monitor
// Flags the device idle when a companion is connected but nothing is flowing

use crate::status::DeviceStatus;
use crate::transport::TransportState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for the activity monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Poll interval
    pub tick_ms: u64,
    /// Time without a delivery before the device counts as idle
    pub idle_threshold_ms: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            idle_threshold_ms: 3000,
        }
    }
}

impl ActivityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = ms;
        self
    }

    pub fn with_idle_threshold_ms(mut self, ms: u64) -> Self {
        self.idle_threshold_ms = ms;
        self
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}

/// Background idle detector
///
/// The only component that ever requests `IdleAfterSending`.
pub struct ActivityMonitor {
    state: Arc<TransportState>,
    config: ActivityConfig,
}

impl ActivityMonitor {
    pub fn new(state: Arc<TransportState>, config: ActivityConfig) -> Self {
        Self { state, config }
    }

    /// One poll; returns true if idle was requested
    pub fn tick(&self) -> bool {
        if !self.state.any_open() {
            return false;
        }
        match self.state.last_send().elapsed() {
            Some(since) if since > self.config.idle_threshold() => {
                self.state.status().request(DeviceStatus::IdleAfterSending);
                true
            }
            _ => false,
        }
    }

    /// Poll until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
        debug!("activity monitor stopped");
    }
}
