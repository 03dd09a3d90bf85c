//! Simulated robot hardware.
//!
//! Every device shares one [`SimClock`]; nothing moves unless a controller sleeps or
//! issues a blocking command, so maneuvers replay identically in tests.

pub mod actuator;
pub mod clock;
pub mod rig;
pub mod sensor;

pub use actuator::{LoggedCommand, SimActuator};
pub use clock::SimClock;
pub use rig::SimRig;
pub use sensor::{SimSensor, Track};
