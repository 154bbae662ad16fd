// Configuration Tests
// TOML files and command line resolution

use clap::Parser;
use proberelay::capture::FeedKind;
use proberelay::{Cli, ConfigError, RelayConfig};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
require_root = false
log_level = "debug"

[tcp]
bind_port = 5050

[serial]
device_path = "/dev/ttyACM1"
baud_rate = 57600

[capture]
monitor_interface = "mon9"
feed = "none"

[capture.signal_policy]
invalid_sentinel_dbm = -99
"#
    )
    .unwrap();

    let config = RelayConfig::from_file(file.path()).unwrap();

    assert_eq!(config.tcp.bind_port, 5050);
    assert_eq!(config.serial.device_path, "/dev/ttyACM1");
    assert_eq!(config.serial.baud_rate, 57600);
    assert_eq!(config.capture.monitor_interface, "mon9");
    assert_eq!(config.capture.wireless_interface, "wlan0");
    assert_eq!(config.capture.feed, FeedKind::None);
    assert_eq!(config.capture.signal_policy.invalid_sentinel_dbm, -99);
    assert_eq!(config.capture.signal_policy.default_noise_dbm, -95);
    assert_eq!(config.log_level, "debug");
    assert!(!config.require_root);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = RelayConfig::from_file("/nonexistent/relay.toml");
    assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
}

#[test]
fn test_cli_flags_override_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[tcp]\nbind_port = 5050\n[serial]\nbaud_rate = 9600").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cli = Cli::try_parse_from([
        "relay",
        "--config",
        &path,
        "--tcp-port",
        "6060",
        "--enable-serial",
        "false",
        "--monitor-interface",
        "mon5",
        "--no-provision",
    ])
    .unwrap();
    let config = cli.resolve().unwrap();

    assert_eq!(config.tcp.bind_port, 6060);
    assert_eq!(config.serial.baud_rate, 9600);
    assert!(!config.serial.enabled);
    assert_eq!(config.capture.monitor_interface, "mon5");
    assert!(!config.capture.provision);
}

#[test]
fn test_resolve_rejects_invalid_values() {
    let cli = Cli::try_parse_from(["relay", "--serial-baud", "0"]).unwrap();
    assert!(matches!(cli.resolve(), Err(ConfigError::InvalidValue(_))));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = RelayConfig::default();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(RelayConfig::from_toml_str(&text).unwrap(), config);
}
