// Relay Configuration
// Defaults, optional TOML file, then command line and environment overrides

use crate::capture::{CaptureConfig, FeedKind};
use crate::storage::StorageConfig;
use crate::transport::{ActivityConfig, SerialChannelConfig, TcpChannelConfig};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Invalid TOML: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

// ============================================================================
// INDICATOR CONFIG
// ============================================================================

/// Configuration for the status indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Half-period of blinking patterns
    pub blink_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { blink_ms: 500 }
    }
}

impl IndicatorConfig {
    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_ms)
    }
}

// ============================================================================
// RELAY CONFIG
// ============================================================================

/// Complete relay configuration, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub tcp: TcpChannelConfig,
    pub serial: SerialChannelConfig,
    pub activity: ActivityConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub indicator: IndicatorConfig,
    /// Upper bound for stopping background tasks
    pub shutdown_timeout_ms: u64,
    /// Refuse to start without root privileges
    pub require_root: bool,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tcp: TcpChannelConfig::default(),
            serial: SerialChannelConfig::default(),
            activity: ActivityConfig::default(),
            capture: CaptureConfig::default(),
            storage: StorageConfig::default(),
            indicator: IndicatorConfig::default(),
            shutdown_timeout_ms: 2000,
            require_root: true,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_tcp(mut self, tcp: TcpChannelConfig) -> Self {
        self.tcp = tcp;
        self
    }

    pub fn with_serial(mut self, serial: SerialChannelConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_activity(mut self, activity: ActivityConfig) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    pub fn with_require_root(mut self, require: bool) -> Self {
        self.require_root = require;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::InvalidValue(msg.to_string()));

        if self.tcp.enabled && self.tcp.bind_address.trim().is_empty() {
            return invalid("tcp.bind_address must not be empty");
        }
        if self.tcp.write_timeout_ms == 0 || self.serial.write_timeout_ms == 0 {
            return invalid("write timeouts must be positive");
        }
        if self.serial.enabled && self.serial.device_path.trim().is_empty() {
            return invalid("serial.device_path must not be empty");
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be positive");
        }
        if self.activity.tick_ms == 0 {
            return invalid("activity.tick_ms must be positive");
        }
        if self.indicator.blink_ms == 0 {
            return invalid("indicator.blink_ms must be positive");
        }
        if self.capture.monitor_interface.is_empty() || self.capture.wireless_interface.is_empty() {
            return invalid("capture interface names must not be empty");
        }
        if self.capture.monitor_interface == self.capture.wireless_interface {
            return invalid("capture.monitor_interface must differ from wireless_interface");
        }
        Ok(())
    }
}

// ============================================================================
// COMMAND LINE
// ============================================================================

/// Relay probe-request and BLE sightings to a companion device
#[derive(Parser, Debug, Default)]
#[command(name = "relay", version, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TCP port the companion connects to
    #[arg(long, env = "TCP_PORT")]
    pub tcp_port: Option<u16>,

    /// Enable the serial link
    #[arg(long, env = "ENABLE_USB_SERIAL", value_parser = clap::builder::BoolishValueParser::new())]
    pub enable_serial: Option<bool>,

    /// Serial device node
    #[arg(long, env = "USB_SERIAL_DEV")]
    pub serial_device: Option<String>,

    /// Serial baud rate
    #[arg(long, env = "USB_SERIAL_BAUD")]
    pub serial_baud: Option<u32>,

    /// Wireless interface the monitor interface is created from
    #[arg(long, env = "WIFI_INTERFACE_NAME")]
    pub wifi_interface: Option<String>,

    /// Monitor interface name
    #[arg(long, env = "MONITOR_INTERFACE_NAME")]
    pub monitor_interface: Option<String>,

    /// Directory for session CSV files
    #[arg(long)]
    pub csv_dir: Option<PathBuf>,

    /// Skip monitor interface provisioning
    #[arg(long)]
    pub no_provision: bool,

    /// Do not read sightings from stdin
    #[arg(long)]
    pub no_stdin_feed: bool,

    /// Allow running without root privileges
    #[arg(long)]
    pub allow_unprivileged: bool,

    /// Log filter, e.g. `info` or `proberelay=debug`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags and environment
    pub fn resolve(&self) -> Result<RelayConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => RelayConfig::from_file(path)?,
            None => RelayConfig::default(),
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    /// Overlay every option that was given
    pub fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(port) = self.tcp_port {
            config.tcp.bind_port = port;
        }
        if let Some(enabled) = self.enable_serial {
            config.serial.enabled = enabled;
        }
        if let Some(device) = &self.serial_device {
            config.serial.device_path = device.clone();
        }
        if let Some(baud) = self.serial_baud {
            config.serial.baud_rate = baud;
        }
        if let Some(wifi) = &self.wifi_interface {
            config.capture.wireless_interface = wifi.clone();
        }
        if let Some(monitor) = &self.monitor_interface {
            config.capture.monitor_interface = monitor.clone();
        }
        if let Some(dir) = &self.csv_dir {
            config.storage.directory = dir.clone();
        }
        if self.no_provision {
            config.capture.provision = false;
        }
        if self.no_stdin_feed {
            config.capture.feed = FeedKind::None;
        }
        if self.allow_unprivileged {
            config.require_root = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}
