//! Proportional line following.
//!
//! One loop body serves both modes; only the exit predicate differs:
//! a distance measured on the reference wheel, or a second sensor reaching a
//! perpendicular line.

use common::config::millis;
use common::{
    ActuatorPort, Clock, LoopSample, ProportionalController, RunProfile, SensorPort, Side,
    TelemetryRecorder, Thresholds,
};
use tracing::{info, warn};

use crate::drive::DifferentialDrive;
use crate::poll::{LoopLimits, LoopReport, LoopState, PollLoop};
use crate::sensors::SensorPair;
use crate::{MotionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowExit {
    /// Stop once the reference wheel has turned this many degrees (either direction).
    Distance(i32),
    /// Stop once this sensor reads the dark line.
    Crossing(Side),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowSettings {
    pub sensor: Side,
    pub gain: f64,
    pub base_speed: i32,
    pub thresholds: Thresholds,
    pub limits: LoopLimits,
}

impl FollowSettings {
    pub fn from_profile(profile: &RunProfile) -> Self {
        Self {
            sensor: profile.line_follow.primary_sensor,
            gain: profile.line_follow.gain,
            base_speed: profile.line_follow.base_speed,
            thresholds: profile.thresholds,
            limits: LoopLimits::new(
                millis(profile.line_follow.timeout_ms),
                profile.timing.poll_interval(),
            ),
        }
    }
}

pub struct LineFollower<'a, A, S, C> {
    drive: &'a mut DifferentialDrive<A, C>,
    sensors: &'a mut SensorPair<S>,
    settings: FollowSettings,
    telemetry: Option<&'a TelemetryRecorder>,
}

impl<'a, A, S, C> LineFollower<'a, A, S, C>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock + Clone,
{
    pub fn new(
        drive: &'a mut DifferentialDrive<A, C>,
        sensors: &'a mut SensorPair<S>,
        settings: FollowSettings,
    ) -> Self {
        Self {
            drive,
            sensors,
            settings,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Option<&'a TelemetryRecorder>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn follow_for(&mut self, degrees: i32) -> Result<LoopReport> {
        self.follow(FollowExit::Distance(degrees))
    }

    pub fn follow_until_crossing(&mut self, stop_sensor: Side) -> Result<LoopReport> {
        self.follow(FollowExit::Crossing(stop_sensor))
    }

    pub fn follow(&mut self, exit: FollowExit) -> Result<LoopReport> {
        if exit == FollowExit::Crossing(self.settings.sensor) {
            return Err(MotionError::invalid(
                "stop sensor",
                self.settings.sensor.index() as i32,
                "must differ from the sensor being followed",
            ));
        }

        let reference = self.drive.reference();
        if let FollowExit::Distance(_) = exit {
            self.drive.reset_angle(reference)?;
        }

        let controller =
            ProportionalController::new(self.settings.gain, self.settings.thresholds.setpoint);
        let clock = self.drive.clock().clone();
        let mut poll = PollLoop::start(&clock, self.settings.limits);

        info!(?exit, sensor = ?self.settings.sensor, gain = self.settings.gain, "line follow started");
        if let Err(err) = self.steer(exit, &controller, &mut poll) {
            self.drive.brake();
            return Err(err);
        }
        self.drive.hold()?;

        let report = poll.report();
        if report.timed_out() {
            warn!(?exit, iterations = report.exit_iteration, "line follow timed out");
        } else {
            info!(?exit, iterations = report.exit_iteration, "line follow finished");
        }
        Ok(report)
    }

    fn steer(
        &mut self,
        exit: FollowExit,
        controller: &ProportionalController,
        poll: &mut PollLoop<'_, C>,
    ) -> Result<()> {
        let base = f64::from(self.settings.base_speed);
        let followed = self.settings.sensor;
        let reference = self.drive.reference();
        loop {
            let reached = self.exit_reached(exit)?;
            if poll.check(reached) != LoopState::Running {
                return Ok(());
            }

            let sample = self.sensors.read(followed)?;
            let (left, right) = controller.wheel_speeds(base, sample.value()).rounded();
            self.drive.run_both(left, right)?;

            if let Some(telemetry) = self.telemetry {
                let mut readings = [None, None];
                readings[followed.index()] = Some(sample.value());
                telemetry.record(LoopSample {
                    maneuver: "line_follow",
                    iteration: poll.iteration(),
                    elapsed_ms: poll.elapsed().as_secs_f64() * 1000.0,
                    left_reading: readings[0],
                    right_reading: readings[1],
                    left_speed: Some(left),
                    right_speed: Some(right),
                    angle: Some(self.drive.state().angle(reference)),
                });
            }
            poll.pace();
        }
    }

    fn exit_reached(&mut self, exit: FollowExit) -> Result<bool> {
        match exit {
            FollowExit::Distance(target) => {
                let angle = self.drive.angle(self.drive.reference())?;
                Ok(angle.unsigned_abs() >= target.unsigned_abs())
            }
            FollowExit::Crossing(side) => {
                Ok(self.sensors.read(side)?.is_dark(&self.settings.thresholds))
            }
        }
    }
}
