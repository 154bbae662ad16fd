// Wire Codec
// ASCII line format understood by the companion app

use crate::record::{Record, RecordSource};

/// Marker closing every record, placed before the newline
pub const RECORD_TERMINATOR: char = '#';

/// Prefix identifying BLE lines on the wire
const BLE_PREFIX: &str = "BLE:";

/// Codec for the newline-delimited companion protocol
///
/// WiFi: `<mac>,<rssi>,<snr>,<timestamp>#\n`
/// BLE:  `BLE:<mac>,<rssi>,<timestamp>#\n`
///
/// Fields are joined with commas and never escaped.
pub struct WireCodec;

impl WireCodec {
    /// Encode a record to its wire line, terminator and newline included
    pub fn encode(record: &Record) -> String {
        match record.source() {
            RecordSource::WiFi => {
                let snr = record.snr().map(|s| s.to_string()).unwrap_or_default();
                format!(
                    "{},{},{},{}{}\n",
                    record.mac(),
                    record.rssi(),
                    snr,
                    record.timestamp(),
                    RECORD_TERMINATOR
                )
            }
            RecordSource::Ble => format!(
                "{}{},{},{}{}\n",
                BLE_PREFIX,
                record.mac(),
                record.rssi(),
                record.timestamp(),
                RECORD_TERMINATOR
            ),
        }
    }

    /// Encode straight to bytes for a channel write
    pub fn encode_bytes(record: &Record) -> Vec<u8> {
        Self::encode(record).into_bytes()
    }
}
