//! Hardware capability traits.
//!
//! The motion core only ever talks to hardware through these traits, so the same
//! maneuvers run against real motors or against the simulated rig.

use std::thread;
use std::time::{Duration, Instant};

use crate::{ActuatorCommand, PortError, Wait};

/// One rotary actuator (wheel, lift or claw motor).
///
/// Angles are degrees relative to the last [`reset_angle`](Self::reset_angle).
pub trait ActuatorPort {
    /// Run at `speed` until told otherwise.
    fn run(&mut self, speed: i32) -> Result<(), PortError>;

    /// Rotate by `angle_delta` from the current counter. Returns the counter value
    /// observed when the call returns.
    fn run_to_angle(&mut self, speed: i32, angle_delta: i32, wait: Wait)
        -> Result<i32, PortError>;

    fn run_for_duration(
        &mut self,
        speed: i32,
        duration: Duration,
        wait: Wait,
    ) -> Result<(), PortError>;

    /// Stop and actively hold position.
    fn hold(&mut self) -> Result<(), PortError>;

    fn angle(&mut self) -> Result<i32, PortError>;

    fn reset_angle(&mut self, origin: i32) -> Result<(), PortError>;

    /// False while a bounded command (angle or time) is still in progress.
    fn is_done(&mut self) -> Result<bool, PortError>;

    /// Dispatch a command value to the matching method.
    fn apply(&mut self, command: ActuatorCommand) -> Result<(), PortError> {
        match command {
            ActuatorCommand::RunContinuous { speed } => self.run(speed),
            ActuatorCommand::RunToAngle {
                speed,
                target_delta,
                wait,
            } => self.run_to_angle(speed, target_delta, wait).map(|_| ()),
            ActuatorCommand::RunForDuration {
                speed,
                duration,
                wait,
            } => self.run_for_duration(speed, duration, wait),
            ActuatorCommand::Hold => self.hold(),
        }
    }
}

/// One downward-facing reflectance sensor.
pub trait SensorPort {
    /// Normalized brightness in `[0, 100]`, read synchronously.
    fn reflectance(&mut self) -> Result<f64, PortError>;
}

/// Time source for every feedback loop.
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Give up at least `duration` before the next poll.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            std::hint::spin_loop();
        } else {
            thread::sleep(duration);
        }
    }
}
