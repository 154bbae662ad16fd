// Status module - WHAT THE DEVICE SHOWS
// Latched device status and the indicator that renders it

mod indicator;
mod machine;

pub use indicator::{
    IndicatorFrame, IndicatorPattern, IndicatorRenderer, LedColor, StatusIndicator,
    TracingIndicator,
};
pub use machine::{DeviceStatus, StatusHandle, StatusMachine, StatusSnapshot};
