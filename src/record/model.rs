// Record Model
// Immutable sightings handed from the feeds to the CSV log and the transport

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// Radio that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordSource {
    WiFi,
    Ble,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WiFi => write!(f, "wifi"),
            Self::Ble => write!(f, "ble"),
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// A single sighting of a wireless device
///
/// Records are created once by a feed and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    source: RecordSource,
    mac: String,
    rssi: i32,
    snr: Option<i32>,
    timestamp: String,
}

impl Record {
    /// Create a WiFi probe-request record
    pub fn wifi(mac: &str, rssi: i32, snr: i32, timestamp: &str) -> Self {
        Self {
            source: RecordSource::WiFi,
            mac: mac.to_string(),
            rssi,
            snr: Some(snr),
            timestamp: timestamp.to_string(),
        }
    }

    /// Create a BLE advertisement record (BLE scans carry no noise floor)
    pub fn ble(mac: &str, rssi: i32, timestamp: &str) -> Self {
        Self {
            source: RecordSource::Ble,
            mac: mac.to_string(),
            rssi,
            snr: None,
            timestamp: timestamp.to_string(),
        }
    }

    pub fn source(&self) -> RecordSource {
        self.source
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn rssi(&self) -> i32 {
        self.rssi
    }

    pub fn snr(&self) -> Option<i32> {
        self.snr
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn is_ble(&self) -> bool {
        self.source == RecordSource::Ble
    }
}

// ============================================================================
// SIGNAL POLICY
// ============================================================================

/// How raw radio readings become RSSI/SNR values
///
/// Some drivers strip the antenna signal or noise fields, and some report a
/// non-negative signal when the field is missing. Those readings are replaced
/// by the configured sentinels instead of being forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalPolicy {
    /// Signal used when the frame carries none
    pub default_signal_dbm: i32,
    /// Noise floor used when the frame carries none
    pub default_noise_dbm: i32,
    /// Replacement for readings at or above `invalid_at_or_above_dbm`
    pub invalid_sentinel_dbm: i32,
    /// Readings at or above this value are treated as invalid
    pub invalid_at_or_above_dbm: i32,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            default_signal_dbm: -100,
            default_noise_dbm: -95,
            invalid_sentinel_dbm: -100,
            invalid_at_or_above_dbm: 0,
        }
    }
}

impl SignalPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_noise(mut self, dbm: i32) -> Self {
        self.default_noise_dbm = dbm;
        self
    }

    pub fn with_invalid_sentinel(mut self, dbm: i32) -> Self {
        self.invalid_sentinel_dbm = dbm;
        self
    }

    /// Resolve optional readings into `(rssi, snr)`
    pub fn resolve(&self, signal_dbm: Option<i32>, noise_dbm: Option<i32>) -> (i32, i32) {
        let mut rssi = signal_dbm.unwrap_or(self.default_signal_dbm);
        if rssi >= self.invalid_at_or_above_dbm {
            rssi = self.invalid_sentinel_dbm;
        }
        let noise = noise_dbm.unwrap_or(self.default_noise_dbm);
        (rssi, rssi.saturating_sub(noise))
    }
}

// ============================================================================
// FEED INPUTS
// ============================================================================

/// Fields extracted from one captured probe-request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameObservation {
    pub mac: String,
    pub signal_dbm: Option<i32>,
    pub noise_dbm: Option<i32>,
}

impl FrameObservation {
    pub fn new(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            signal_dbm: None,
            noise_dbm: None,
        }
    }

    pub fn with_signal(mut self, dbm: i32) -> Self {
        self.signal_dbm = Some(dbm);
        self
    }

    pub fn with_noise(mut self, dbm: i32) -> Self {
        self.noise_dbm = Some(dbm);
        self
    }

    /// Apply the signal policy and stamp the observation
    pub fn into_record(self, policy: &SignalPolicy, timestamp: &str) -> Record {
        let (rssi, snr) = policy.resolve(self.signal_dbm, self.noise_dbm);
        Record::wifi(&self.mac, rssi, snr, timestamp)
    }
}

/// One device reported by a BLE scan window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleSighting {
    pub mac: String,
    pub rssi: i32,
}

impl BleSighting {
    pub fn new(mac: &str, rssi: i32) -> Self {
        Self {
            mac: mac.to_string(),
            rssi,
        }
    }

    pub fn into_record(self, timestamp: &str) -> Record {
        Record::ble(&self.mac, self.rssi, timestamp)
    }
}
