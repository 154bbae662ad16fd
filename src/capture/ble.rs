// BLE Feed
// Periodic scan windows turned into BLE records

use crate::capture::CaptureError;
use crate::record::{wall_timestamp, BleSighting, Record};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A source of BLE advertisements.
///
/// The `relay` binary wires no production scanner. BLE sightings reach it as
/// `ble <mac> <rssi>` lines on the stdin feed, handled by `LineFeed`. An
/// embedding program attaches a scanner with `Relay::with_ble_scanner`, which
/// runs it through [`run_ble_feed`].
#[async_trait]
pub trait BleScanner: Send {
    /// Scan for `window` and report every device seen
    async fn scan(&mut self, window: Duration) -> Result<Vec<BleSighting>, CaptureError>;
}

/// Scan back to back, forwarding each sighting as a record.
///
/// A failed scan waits `retry` before the next attempt. Returns the number of
/// records forwarded.
pub async fn run_ble_feed(
    mut scanner: Box<dyn BleScanner>,
    window: Duration,
    retry: Duration,
    sink: mpsc::Sender<Record>,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0u64;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = scanner.scan(window) => result,
        };

        match result {
            Ok(sightings) => {
                debug!(devices = sightings.len(), "BLE scan window complete");
                let timestamp = wall_timestamp();
                for sighting in sightings {
                    if sink.send(sighting.into_record(&timestamp)).await.is_err() {
                        return forwarded;
                    }
                    forwarded += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, retry_ms = retry.as_millis() as u64, "BLE scan failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(retry) => {}
                }
            }
        }
    }

    forwarded
}
