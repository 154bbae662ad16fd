// Relay Tests
// Full startup, provisioning outcomes, record injection and shutdown

use crate::common::{fast_serial, loopback_tcp, wait_until, MemorySerial};
use async_trait::async_trait;
use proberelay::capture::{CaptureConfig, CaptureError, CommandRunner, FeedKind};
use proberelay::record::Record;
use proberelay::status::{DeviceStatus, IndicatorFrame, StatusIndicator};
use proberelay::storage::StorageConfig;
use proberelay::transport::ChannelKind;
use proberelay::{Relay, RelayConfig};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

struct FailingRunner;

#[async_trait]
impl CommandRunner for FailingRunner {
    async fn run(&self, program: &str, _args: &[&str]) -> Result<String, CaptureError> {
        Err(CaptureError::CommandFailed {
            command: program.to_string(),
            reason: "no such device".to_string(),
        })
    }
}

struct RecordingIndicator {
    frames: Arc<Mutex<Vec<IndicatorFrame>>>,
}

impl StatusIndicator for RecordingIndicator {
    fn show(&mut self, frame: IndicatorFrame) {
        self.frames.lock().unwrap().push(frame);
    }
}

fn test_config(temp_dir: &TempDir, capture: CaptureConfig) -> RelayConfig {
    RelayConfig::new()
        .with_tcp(loopback_tcp())
        .with_serial(fast_serial())
        .with_capture(capture.with_feed(FeedKind::None).with_settle_ms(0))
        .with_storage(StorageConfig::new().with_directory(temp_dir.path().join("macs_csv")))
        .with_require_root(false)
        .with_shutdown_timeout_ms(1000)
}

#[tokio::test]
async fn test_capture_setup_failure_is_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let capture = CaptureConfig::new()
        .with_provision(true)
        .with_sysfs_net_root(temp_dir.path().to_str().unwrap());

    let handle = Relay::new(test_config(&temp_dir, capture))
        .with_command_runner(Arc::new(FailingRunner))
        .with_serial_opener(MemorySerial::new(false))
        .run()
        .await
        .unwrap();

    let snapshot = handle.status();
    assert_eq!(snapshot.status, DeviceStatus::Error);
    assert!(snapshot.error_latched);

    // Transport still comes up and a delivery clears the error
    let client = TcpStream::connect(handle.tcp_local_addr().unwrap()).await.unwrap();
    assert!(wait_until(|| handle.state().slot(ChannelKind::Tcp).is_open()).await);
    assert_eq!(handle.status().status, DeviceStatus::Error);

    let sink = handle.record_sink().unwrap();
    sink.send(Record::wifi("aa:bb:cc:dd:ee:ff", -40, 10, "t")).await.unwrap();
    drop(sink);

    let mut lines = BufReader::new(client).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    assert_eq!(line, "aa:bb:cc:dd:ee:ff,-40,10,t#");
    assert!(wait_until(|| handle.status().status == DeviceStatus::SendingRecords).await);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_existing_monitor_skips_provisioning() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir(temp_dir.path().join("mon0")).unwrap();
    let capture = CaptureConfig::new()
        .with_provision(true)
        .with_sysfs_net_root(temp_dir.path().to_str().unwrap());

    let handle = Relay::new(test_config(&temp_dir, capture))
        .with_command_runner(Arc::new(FailingRunner))
        .with_serial_opener(MemorySerial::new(false))
        .run()
        .await
        .unwrap();

    assert_eq!(handle.status().status, DeviceStatus::ReadyToConnect);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_records_logged_and_shutdown_turns_off() {
    let temp_dir = TempDir::new().unwrap();
    let frames = Arc::new(Mutex::new(Vec::new()));
    let serial = MemorySerial::new(true);

    let handle = Relay::new(test_config(&temp_dir, CaptureConfig::new().with_provision(false)))
        .with_serial_opener(serial.clone())
        .with_indicator(Box::new(RecordingIndicator {
            frames: frames.clone(),
        }))
        .run()
        .await
        .unwrap();

    assert!(wait_until(|| handle.state().slot(ChannelKind::Serial).is_open()).await);

    let sink = handle.record_sink().unwrap();
    sink.send(Record::wifi("aa:aa:aa:aa:aa:aa", -55, 7, "t")).await.unwrap();
    sink.send(Record::ble("bb:bb:bb:bb:bb:bb", -80, "t")).await.unwrap();
    drop(sink);

    assert!(wait_until(|| serial.lines().len() == 2).await);
    let csv = handle.session_log_path().unwrap().clone();

    let state = handle.state().clone();
    handle.shutdown().await;

    let content = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(
        content,
        "mac,rssi,snr,timestamp\naa:aa:aa:aa:aa:aa,-55,7,t\nBLE-bb:bb:bb:bb:bb:bb,-80,,t\n"
    );
    assert_eq!(state.status().status(), DeviceStatus::Off);
    assert!(!state.slot(ChannelKind::Serial).is_open());
    assert!(frames.lock().unwrap().last().unwrap().is_off());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, CaptureConfig::new().with_interfaces("wlan0", "wlan0"));

    assert!(Relay::start(config).await.is_err());
}
