//! The control loop: safety monitoring plus the unit that drives the
//! state machine, the scheduler and the hardware through the night.

mod safety;
mod unit;


pub use safety::{SafetyMonitor, SafetyVerdict, WeatherReading};
pub use unit::{ControlUnit, UnitStatus};
