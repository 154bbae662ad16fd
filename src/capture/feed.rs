// Line Feed
// Reads sightings written one per line by an external sniffer
//
//   wifi <mac> <signal|-> <noise|->
//   ble <mac> <rssi>
//
// Blank lines and lines starting with '#' are ignored.

use crate::capture::CaptureError;
use crate::record::{wall_timestamp, BleSighting, FrameObservation, Record, SignalPolicy};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One parsed feed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLine {
    WiFi(FrameObservation),
    Ble(BleSighting),
}

impl FeedLine {
    /// Parse a line; `Ok(None)` for blank and comment lines
    pub fn parse(line: &str) -> Result<Option<Self>, CaptureError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let malformed = || CaptureError::MalformedLine(line.to_string());
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.as_slice() {
            ["wifi", mac, signal, noise] => {
                let mut observation = FrameObservation::new(mac);
                if let Some(dbm) = parse_optional_dbm(signal).map_err(|_| malformed())? {
                    observation = observation.with_signal(dbm);
                }
                if let Some(dbm) = parse_optional_dbm(noise).map_err(|_| malformed())? {
                    observation = observation.with_noise(dbm);
                }
                Ok(Some(Self::WiFi(observation)))
            }
            ["ble", mac, rssi] => {
                let rssi = rssi.parse::<i32>().map_err(|_| malformed())?;
                Ok(Some(Self::Ble(BleSighting::new(mac, rssi))))
            }
            _ => Err(malformed()),
        }
    }

    pub fn into_record(self, policy: &SignalPolicy, timestamp: &str) -> Record {
        match self {
            Self::WiFi(observation) => observation.into_record(policy, timestamp),
            Self::Ble(sighting) => sighting.into_record(timestamp),
        }
    }
}

fn parse_optional_dbm(field: &str) -> Result<Option<i32>, std::num::ParseIntError> {
    if field == "-" {
        return Ok(None);
    }
    field.parse::<i32>().map(Some)
}

/// Turns lines from an async reader into stamped records
pub struct LineFeed<R> {
    reader: R,
    policy: SignalPolicy,
}

impl<R: AsyncBufRead + Unpin> LineFeed<R> {
    pub fn new(reader: R, policy: SignalPolicy) -> Self {
        Self { reader, policy }
    }

    /// Forward records until EOF, cancellation or the sink closing.
    ///
    /// Returns the number of records forwarded.
    pub async fn run(self, sink: mpsc::Sender<Record>, cancel: CancellationToken) -> u64 {
        let mut lines = self.reader.lines();
        let mut forwarded = 0u64;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!(forwarded, "line feed reached end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "line feed read failed");
                    break;
                }
            };

            match FeedLine::parse(&line) {
                Ok(Some(parsed)) => {
                    let record = parsed.into_record(&self.policy, &wall_timestamp());
                    if sink.send(record).await.is_err() {
                        debug!("record sink closed");
                        break;
                    }
                    forwarded += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "skipping feed line"),
            }
        }

        forwarded
    }
}
