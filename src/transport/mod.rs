// Transport module - THE WIRE
// Supervised TCP and serial delivery channels, fan-out sender and idle detection

mod activity;
mod channel;
mod sender;
mod serial;
mod state;
mod supervisor;
mod tcp;
mod traits;

pub use traits::{
    // Channel identity and state
    ChannelKind, ChannelState,
    // Writer seam
    ChannelWriter,
    // Errors and statistics
    TransportError, TransportStats,
};

pub use activity::{ActivityConfig, ActivityMonitor};
pub use channel::ChannelSlot;
pub use sender::TransportSender;
pub use serial::{SerialChannelConfig, SerialOpener, SystemSerialOpener};
pub use state::{LastSendClock, TransportState};
pub use supervisor::ConnectionSupervisor;
pub use tcp::{bind_listener, TcpChannelConfig};
