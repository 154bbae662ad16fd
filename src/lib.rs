// proberelay
// Relays Wi-Fi probe-request and BLE sightings from a field device to a
// companion over TCP and USB serial, logging every sighting to CSV and
// showing device state on a status indicator.

pub mod capture;
pub mod config;
pub mod pipeline;
pub mod privilege;
pub mod record;
pub mod relay;
pub mod status;
pub mod storage;
pub mod transport;

pub use config::{Cli, ConfigError, RelayConfig};
pub use pipeline::RecordPipeline;
pub use record::Record;
pub use relay::{Relay, RelayError, RelayHandle};
pub use status::DeviceStatus;
