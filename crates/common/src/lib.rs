use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod proportional;

pub use config::{load_profile, HeightTierTable, RunProfile, Thresholds};
pub use diagnostics::ManeuverDiagnostics;
pub use error::{ConfigError, PortError};
pub use metrics::{LoopSample, TelemetryRecorder};
pub use ports::{ActuatorPort, Clock, SensorPort, SystemClock};
pub use proportional::{ProportionalController, WheelSpeeds};

/// Lowest value a reflectance sensor may report (black).
pub const REFLECTANCE_MIN: f64 = 0.0;
/// Highest value a reflectance sensor may report (white).
pub const REFLECTANCE_MAX: f64 = 100.0;

/// Chassis side. Used to name wheels and their paired sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Whether a bounded actuator command returns immediately or after completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wait {
    Block,
    NoWait,
}

/// A single instruction for one rotary actuator.
///
/// Speeds are degrees per second, sign encodes direction. `target_delta` is measured
/// from the actuator's angle counter at the moment the command is issued. Issuing a
/// command replaces whatever the actuator was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorCommand {
    RunContinuous {
        speed: i32,
    },
    RunToAngle {
        speed: i32,
        target_delta: i32,
        wait: Wait,
    },
    RunForDuration {
        speed: i32,
        duration: Duration,
        wait: Wait,
    },
    Hold,
}

impl ActuatorCommand {
    /// True for commands that finish on their own (angle or time bound).
    pub fn is_bounded(&self) -> bool {
        matches!(
            self,
            ActuatorCommand::RunToAngle { .. } | ActuatorCommand::RunForDuration { .. }
        )
    }
}

/// A normalized reflectance reading in `[0, 100]`. Lower is darker.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SensorSample(f64);

impl SensorSample {
    /// Wrap a raw reading, rejecting anything outside the normalized range.
    pub fn new(value: f64) -> Result<Self, PortError> {
        if value.is_finite() && (REFLECTANCE_MIN..=REFLECTANCE_MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PortError::OutOfRange { value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// True when the surface under the sensor counts as the dark line.
    pub fn is_dark(self, thresholds: &Thresholds) -> bool {
        self.0 < thresholds.line
    }
}
