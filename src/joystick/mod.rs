mod device;
mod events;
mod parser;
mod pin_map;
mod report;
mod side;
mod state;
mod turntable;

use std::time::Instant;

/// Timestamp used for turntable timing.
pub type Timestamp = Instant;

pub use device::{DeviceBridge, DeviceError, DeviceSettings, JoystickDevice, MAX_REPORT_LEN};
pub use events::{Direction, JoystickEvents, NullEvents, TracingEvents};
pub use parser::{JoystickParser, ParseOutcome};
pub use pin_map::{ButtonId, PinId, PinMap, BUTTON_COUNT, MAX_PIN};
pub use report::{ReportDiff, ReportError, ReportLayout, ReportSnapshot};
pub use side::{Side, SideRule};
pub use state::AggregateState;
pub use turntable::{TurntableTracker, DEFAULT_TURNTABLE_TIMEOUT};
