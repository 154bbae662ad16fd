// Status Indicator
// Turns device status into LED frames; the LED hardware itself sits behind a trait

use crate::status::{DeviceStatus, StatusSnapshot};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ============================================================================
// FRAMES AND PATTERNS
// ============================================================================

/// One of the three indicator LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
}

/// Which LEDs are lit at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorFrame {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl IndicatorFrame {
    pub const OFF: Self = Self {
        red: false,
        green: false,
        blue: false,
    };

    pub fn only(color: LedColor) -> Self {
        let mut frame = Self::OFF;
        match color {
            LedColor::Red => frame.red = true,
            LedColor::Green => frame.green = true,
            LedColor::Blue => frame.blue = true,
        }
        frame
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

/// Rendering of a status over time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPattern {
    Solid(IndicatorFrame),
    Blink(IndicatorFrame),
}

impl IndicatorPattern {
    /// Rendering table for every device status
    pub fn for_status(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Off => Self::Solid(IndicatorFrame::OFF),
            DeviceStatus::SettingUpCapture => Self::Blink(IndicatorFrame::only(LedColor::Blue)),
            DeviceStatus::ReadyToConnect => Self::Solid(IndicatorFrame::only(LedColor::Blue)),
            DeviceStatus::Paired => Self::Blink(IndicatorFrame::only(LedColor::Green)),
            DeviceStatus::SendingRecords => Self::Solid(IndicatorFrame::only(LedColor::Green)),
            DeviceStatus::Error => Self::Solid(IndicatorFrame::only(LedColor::Red)),
            // Yellow
            DeviceStatus::IdleAfterSending => Self::Solid(IndicatorFrame {
                red: true,
                green: true,
                blue: false,
            }),
        }
    }

    /// Frame to show during the lit (`true`) or dark (`false`) blink phase
    pub fn frame(&self, lit_phase: bool) -> IndicatorFrame {
        match self {
            Self::Solid(frame) => *frame,
            Self::Blink(frame) if lit_phase => *frame,
            Self::Blink(_) => IndicatorFrame::OFF,
        }
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self, Self::Blink(_))
    }
}

// ============================================================================
// INDICATOR SINK
// ============================================================================

/// Output device for indicator frames (GPIO, NeoPixel, log, ...)
pub trait StatusIndicator: Send {
    /// Drive the LEDs to exactly this frame
    fn show(&mut self, frame: IndicatorFrame);
}

/// Indicator that only logs frame changes
#[derive(Debug, Default)]
pub struct TracingIndicator {
    last: Option<IndicatorFrame>,
}

impl TracingIndicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusIndicator for TracingIndicator {
    fn show(&mut self, frame: IndicatorFrame) {
        if self.last != Some(frame) {
            debug!(red = frame.red, green = frame.green, blue = frame.blue, "indicator");
            self.last = Some(frame);
        }
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// Poll interval for solid patterns
const SOLID_REFRESH: Duration = Duration::from_millis(100);

/// Background renderer following the published status
pub struct IndicatorRenderer {
    indicator: Box<dyn StatusIndicator>,
    blink_interval: Duration,
}

impl IndicatorRenderer {
    pub fn new(indicator: Box<dyn StatusIndicator>, blink_interval: Duration) -> Self {
        Self {
            indicator,
            blink_interval,
        }
    }

    /// Render until cancelled, then switch every LED off
    pub async fn run(
        mut self,
        mut status: watch::Receiver<StatusSnapshot>,
        cancel: CancellationToken,
    ) {
        let mut lit_phase = true;
        loop {
            let pattern = IndicatorPattern::for_status(status.borrow_and_update().status);
            self.indicator.show(pattern.frame(lit_phase));

            let wait = if pattern.is_blinking() {
                self.blink_interval
            } else {
                SOLID_REFRESH
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    lit_phase = true;
                }
                _ = tokio::time::sleep(wait) => {
                    lit_phase = !lit_phase;
                }
            }
        }
        self.indicator.show(IndicatorFrame::OFF);
    }
}
