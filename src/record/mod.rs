// Record module - WHAT GETS RELAYED
// Sightings produced by the capture feeds, signal policy and the wire encoding

mod codec;
mod model;
mod timestamp;

pub use codec::{WireCodec, RECORD_TERMINATOR};
pub use model::{BleSighting, FrameObservation, Record, RecordSource, SignalPolicy};
pub use timestamp::{session_stamp, wall_timestamp, SESSION_STAMP_FORMAT, TIMESTAMP_FORMAT};
