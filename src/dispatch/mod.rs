//! Scheduled dispatch: windows, the time source, and the run loop.
//!
//! Sub-modules:
//! - `schedule`: `Window` and `TimeOfDay` with target-instant resolution.
//! - `clock`: Injectable time source so waits are testable.
//! - `engine`: The dispatch run loop itself.

pub mod clock;
pub mod engine;
pub mod schedule;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DispatchEngine, DispatchEvent, DispatchReport, PacingConfig};
pub use schedule::{TimeOfDay, Window};
