// Transport Sender Tests
// Fan-out delivery, status side effects and wire format on both channels

use crate::common::{fast_serial, loopback_tcp, supervisor, wait_until, MemorySerial};
use proberelay::record::Record;
use proberelay::status::DeviceStatus;
use proberelay::transport::{ChannelKind, ChannelState, TransportSender};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_send_without_open_channel_fails() {
    let serial = MemorySerial::new(false);
    let sup = supervisor(loopback_tcp(), fast_serial(), serial);
    sup.start().await.unwrap();
    let sender = TransportSender::new(sup.clone());

    let delivered = sender
        .send(&Record::wifi("aa:bb:cc:dd:ee:ff", -40, 10, "2025-09-15 16:35:10"))
        .await;

    assert!(!delivered);
    assert!(sup.state().last_send().last().is_none());
    assert_eq!(sup.state().status().status(), DeviceStatus::ReadyToConnect);
    assert_eq!(sender.stats().records_undelivered, 1);
    sup.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_serial_lines_are_verbatim() {
    let serial = MemorySerial::new(true);
    let sup = supervisor(loopback_tcp().with_enabled(false), fast_serial(), serial.clone());
    sup.start().await.unwrap();
    assert!(wait_until(|| sup.is_open(ChannelKind::Serial)).await);
    let sender = TransportSender::new(sup.clone());

    assert!(
        sender
            .send(&Record::wifi("aa:bb:cc:dd:ee:ff", -40, 10, "2025-09-15 16:35:10"))
            .await
    );
    assert!(
        sender
            .send(&Record::wifi("aa:bb:cc:dd:ee:ff", -70, -5, "2025-09-15 16:35:11"))
            .await
    );
    assert!(
        sender
            .send(&Record::ble("11:22:33:44:55:66", -81, "2025-09-15 16:35:12"))
            .await
    );

    assert_eq!(
        serial.lines(),
        vec![
            "aa:bb:cc:dd:ee:ff,-40,10,2025-09-15 16:35:10#\n".to_string(),
            "aa:bb:cc:dd:ee:ff,-70,-5,2025-09-15 16:35:11#\n".to_string(),
            "BLE:11:22:33:44:55:66,-81,2025-09-15 16:35:12#\n".to_string(),
        ]
    );
    assert_eq!(sup.state().status().status(), DeviceStatus::SendingRecords);
    assert!(sup.state().last_send().last().is_some());
    sup.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_failing_channel_does_not_block_other() {
    let serial = MemorySerial::new(true);
    serial.set_fail_writes(true);
    let sup = supervisor(loopback_tcp(), fast_serial(), serial.clone());
    sup.start().await.unwrap();

    let client = TcpStream::connect(sup.tcp_local_addr().unwrap()).await.unwrap();
    assert!(wait_until(|| sup.is_open(ChannelKind::Tcp) && sup.is_open(ChannelKind::Serial)).await);
    let sender = TransportSender::new(sup.clone());

    assert!(sender.send(&Record::wifi("aa", -50, 5, "t")).await);

    assert!(!sup.is_open(ChannelKind::Serial));
    assert!(sup.is_open(ChannelKind::Tcp));

    let mut lines = BufReader::new(client).lines();
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(line, "aa,-50,5,t#");

    let stats = sender.stats();
    assert_eq!(stats.records_sent, 1);
    assert_eq!(stats.serial_write_failures, 1);
    assert_eq!(stats.tcp_write_failures, 0);
    sup.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_send_clears_error_latch() {
    let serial = MemorySerial::new(true);
    let sup = supervisor(loopback_tcp().with_enabled(false), fast_serial(), serial);
    sup.start().await.unwrap();
    assert!(wait_until(|| sup.is_open(ChannelKind::Serial)).await);

    sup.state().status().request(DeviceStatus::Error);
    sup.state().status().request(DeviceStatus::Paired);
    assert_eq!(sup.state().status().status(), DeviceStatus::Error);

    let sender = TransportSender::new(sup.clone());
    assert!(sender.send(&Record::ble("11:22", -60, "t")).await);

    let snapshot = sup.state().status().current();
    assert_eq!(snapshot.status, DeviceStatus::SendingRecords);
    assert!(!snapshot.error_latched);
    sup.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_stalled_tcp_peer_bounds_every_send() {
    let serial = MemorySerial::new(false);
    let tcp = loopback_tcp();
    let write_timeout = Duration::from_millis(tcp.write_timeout_ms);
    let sup = supervisor(tcp, fast_serial().with_enabled(false), serial);
    sup.start().await.unwrap();

    // Connected but never reads, so the socket buffers eventually fill.
    let client = TcpStream::connect(sup.tcp_local_addr().unwrap()).await.unwrap();
    assert!(wait_until(|| sup.is_open(ChannelKind::Tcp)).await);
    let sender = TransportSender::new(sup.clone());

    let record = Record::wifi(&"a".repeat(60_000), -40, 10, "2025-09-15 16:35:10");
    let mut stalled = false;
    for _ in 0..400 {
        let started = Instant::now();
        let delivered = sender.send(&record).await;
        let elapsed = started.elapsed();
        assert!(
            elapsed < write_timeout * 5,
            "send took {:?} with a {:?} write timeout",
            elapsed,
            write_timeout
        );
        if !delivered {
            stalled = true;
            break;
        }
    }

    assert!(stalled);
    assert_eq!(sup.state().slot(ChannelKind::Tcp).state(), ChannelState::Disconnected);
    assert_eq!(sender.stats().tcp_write_failures, 1);
    assert!(sender.stats().records_sent > 0);

    drop(client);
    sup.shutdown(Duration::from_secs(1)).await;
}
