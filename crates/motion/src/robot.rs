//! Owner of every device for one run.
//!
//! Each maneuver borrows the devices it needs for its duration only, so two controllers
//! can never drive the same actuator at the same time. A hardware fault aborts the
//! maneuver, is counted in the diagnostics, and brakes the wheels and the lift on a
//! best-effort basis.

use std::time::Duration;

use common::{
    ActuatorPort, Clock, ManeuverDiagnostics, RunProfile, SensorPort, Side, TelemetryRecorder,
};
use tracing::{error, warn};

use crate::alignment::{AlignReport, AlignSettings, Aligner};
use crate::drive::{DifferentialDrive, DriveSettings};
use crate::line_follow::{FollowSettings, LineFollower};
use crate::pick_place::{PickAndPlace, PlacementParams, PlacementReport, TowerReport};
use crate::poll::LoopReport;
use crate::sensors::SensorPair;
use crate::{MotionError, Result};

/// Devices handed to [`Robot::new`].
pub struct RobotParts<A, S> {
    pub left_wheel: A,
    pub right_wheel: A,
    pub lift: A,
    pub claw: A,
    pub left_sensor: S,
    pub right_sensor: S,
}

/// Per-call overrides for a line-follow maneuver. Unset fields use the run profile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FollowOptions {
    pub sensor: Option<Side>,
    pub gain: Option<f64>,
    pub base_speed: Option<i32>,
}

/// Maneuver results that can end in a timeout.
trait Outcome {
    fn timed_out(&self) -> bool;
}

impl Outcome for LoopReport {
    fn timed_out(&self) -> bool {
        LoopReport::timed_out(self)
    }
}

impl Outcome for AlignReport {
    fn timed_out(&self) -> bool {
        self.outcome.timed_out()
    }
}

impl Outcome for PlacementReport {
    fn timed_out(&self) -> bool {
        PlacementReport::timed_out(self)
    }
}

impl Outcome for TowerReport {
    fn timed_out(&self) -> bool {
        self.placements.iter().any(PlacementReport::timed_out)
    }
}

impl Outcome for () {
    fn timed_out(&self) -> bool {
        false
    }
}

pub struct Robot<A, S, C> {
    drive: DifferentialDrive<A, C>,
    lift: A,
    claw: A,
    sensors: SensorPair<S>,
    profile: RunProfile,
    telemetry: Option<TelemetryRecorder>,
    diagnostics: ManeuverDiagnostics,
}

impl<A, S, C> Robot<A, S, C>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock + Clone,
{
    /// Validate the profile and take ownership of the devices. The lift's current
    /// position becomes the ground tier.
    pub fn new(parts: RobotParts<A, S>, clock: C, profile: RunProfile) -> Result<Self> {
        profile.validate()?;
        let RobotParts {
            left_wheel,
            right_wheel,
            mut lift,
            claw,
            left_sensor,
            right_sensor,
        } = parts;
        lift.reset_angle(0)?;

        let telemetry = profile.telemetry.enabled.then(TelemetryRecorder::new);
        Ok(Self {
            drive: DifferentialDrive::new(
                left_wheel,
                right_wheel,
                clock,
                DriveSettings::from_profile(&profile),
            ),
            lift,
            claw,
            sensors: SensorPair::new(left_sensor, right_sensor),
            profile,
            telemetry,
            diagnostics: ManeuverDiagnostics::default(),
        })
    }

    pub fn profile(&self) -> &RunProfile {
        &self.profile
    }

    pub fn diagnostics(&self) -> &ManeuverDiagnostics {
        &self.diagnostics
    }

    pub fn telemetry(&self) -> Option<&TelemetryRecorder> {
        self.telemetry.as_ref()
    }

    pub fn drive(&mut self) -> &mut DifferentialDrive<A, C> {
        &mut self.drive
    }

    pub fn clock(&self) -> &C {
        self.drive.clock()
    }

    /// Straight move at the profile's drive speed; negative degrees back up.
    pub fn move_straight(&mut self, degrees: i32) -> Result<LoopReport> {
        let speed = self.profile.drive.speed;
        self.guard("move straight", |r| r.drive.run_angle(speed, degrees))
    }

    pub fn move_for(&mut self, speed: i32, duration: Duration) -> Result<LoopReport> {
        self.guard("move for", |r| r.drive.run_time(speed, duration))
    }

    /// Rotate one wheel only, pivoting the chassis around the other.
    pub fn pivot(&mut self, side: Side, speed: i32, degrees: i32) -> Result<LoopReport> {
        self.guard("pivot", |r| r.drive.run_wheel_angle(side, speed, degrees))
    }

    pub fn turn(&mut self, degrees: i32) -> Result<LoopReport> {
        let speed = self.profile.drive.turn_speed;
        self.guard("turn", |r| r.drive.turn_in_place(speed, degrees))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.guard("stop", |r| r.drive.hold())
    }

    pub fn follow_line_for(&mut self, degrees: i32, options: FollowOptions) -> Result<LoopReport> {
        let settings = self.follow_settings(options);
        self.guard("line follow", |r| {
            LineFollower::new(&mut r.drive, &mut r.sensors, settings)
                .with_telemetry(r.telemetry.as_ref())
                .follow_for(degrees)
        })
    }

    pub fn follow_line_until_crossing(
        &mut self,
        stop_sensor: Side,
        options: FollowOptions,
    ) -> Result<LoopReport> {
        let settings = self.follow_settings(options);
        self.guard("line follow", |r| {
            LineFollower::new(&mut r.drive, &mut r.sensors, settings)
                .with_telemetry(r.telemetry.as_ref())
                .follow_until_crossing(stop_sensor)
        })
    }

    pub fn align(&mut self) -> Result<AlignReport> {
        let settings = AlignSettings::from_profile(&self.profile);
        self.guard("align", |r| {
            Aligner::new(&mut r.drive, &mut r.sensors, settings)
                .with_telemetry(r.telemetry.as_ref())
                .align()
        })
    }

    pub fn open_claw(&mut self) -> Result<()> {
        self.guard("open claw", |r| r.pick_and_place().open_claw())
    }

    pub fn close_claw(&mut self) -> Result<()> {
        self.guard("close claw", |r| r.pick_and_place().close_claw())
    }

    pub fn place(&mut self, params: PlacementParams) -> Result<PlacementReport> {
        self.guard("place", |r| r.pick_and_place().place(params))
    }

    pub fn build_tower(&mut self) -> Result<TowerReport> {
        self.guard("build tower", |r| r.pick_and_place().build_tower())
    }

    fn pick_and_place(&mut self) -> PickAndPlace<'_, A, C> {
        PickAndPlace::new(&mut self.drive, &mut self.lift, &mut self.claw, &self.profile)
    }

    fn follow_settings(&self, options: FollowOptions) -> FollowSettings {
        let mut settings = FollowSettings::from_profile(&self.profile);
        if let Some(sensor) = options.sensor {
            settings.sensor = sensor;
        }
        if let Some(gain) = options.gain {
            settings.gain = gain;
        }
        if let Some(speed) = options.base_speed {
            settings.base_speed = speed;
        }
        settings
    }

    fn guard<T: Outcome>(
        &mut self,
        maneuver: &'static str,
        run: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let result = run(self);
        match &result {
            Ok(outcome) if outcome.timed_out() => self.diagnostics.record_timeout(),
            Ok(_) => {}
            Err(err @ MotionError::Port(_)) => {
                self.diagnostics.record_fault();
                error!(maneuver, %err, "hardware fault, maneuver aborted");
                self.drive.brake();
                if let Err(brake) = self.lift.hold() {
                    warn!(maneuver, %brake, "could not hold lift after fault");
                }
            }
            Err(err) => warn!(maneuver, %err, "maneuver rejected"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ActuatorCommand;
    use sim::{SimActuator, SimClock, SimRig, SimSensor};

    fn robot(rig: &SimRig, profile: RunProfile) -> Robot<SimActuator, SimSensor, SimClock> {
        Robot::new(
            RobotParts {
                left_wheel: rig.left_wheel.clone(),
                right_wheel: rig.right_wheel.clone(),
                lift: rig.lift.clone(),
                claw: rig.claw.clone(),
                left_sensor: rig.left_sensor.clone(),
                right_sensor: rig.right_sensor.clone(),
            },
            rig.clock.clone(),
            profile,
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_profile() {
        let rig = SimRig::new();
        let mut profile = RunProfile::default();
        profile.alignment.speed = 0;
        let result = Robot::new(
            RobotParts {
                left_wheel: rig.left_wheel.clone(),
                right_wheel: rig.right_wheel.clone(),
                lift: rig.lift.clone(),
                claw: rig.claw.clone(),
                left_sensor: rig.left_sensor.clone(),
                right_sensor: rig.right_sensor.clone(),
            },
            rig.clock.clone(),
            profile,
        );
        assert!(matches!(result, Err(MotionError::Config(_))));
    }

    #[test]
    fn fault_is_counted_and_wheels_braked() {
        let rig = SimRig::new();
        let mut robot = robot(&rig, RunProfile::default());
        rig.left_sensor.fail_after(3);

        let err = robot
            .follow_line_for(500, FollowOptions::default())
            .unwrap_err();
        assert!(err.is_hardware_fault());
        assert_eq!(robot.diagnostics().faults(), 1);
        assert_eq!(rig.left_wheel.last_command(), Some(ActuatorCommand::Hold));
        assert_eq!(rig.right_wheel.last_command(), Some(ActuatorCommand::Hold));
    }

    #[test]
    fn lift_fault_during_placement_parks_everything() {
        let rig = SimRig::new();
        let mut robot = robot(&rig, RunProfile::default());
        // the jog never reads the lift, so the fourth read lands mid-raise
        rig.lift.fail_encoder_after(3);

        let err = robot
            .place(PlacementParams::new(3, 0, 0))
            .unwrap_err();
        assert!(err.is_hardware_fault());
        assert_eq!(robot.diagnostics().faults(), 1);
        assert_eq!(rig.lift.last_command(), Some(ActuatorCommand::Hold));
        assert!(rig.lift.is_holding());
        assert!(rig.left_wheel.is_holding());
        assert!(rig.right_wheel.is_holding());

        let parked = rig.lift.raw_angle();
        rig.clock.advance(Duration::from_secs(2));
        assert_eq!(rig.lift.raw_angle(), parked);
    }

    #[test]
    fn timeouts_are_counted() {
        let rig = SimRig::new();
        let mut profile = RunProfile::default();
        profile.alignment.timeout_ms = Some(30);
        let mut robot = robot(&rig, profile);

        let report = robot.align().unwrap();
        assert!(report.outcome.timed_out());
        assert_eq!(robot.diagnostics().timeouts(), 1);
    }

    #[test]
    fn follow_options_override_profile() {
        let rig = SimRig::new().with_sensors(
            SimSensor::step("l", 2, 70.0, 5.0),
            SimSensor::constant("r", 40.0),
        );
        let mut robot = robot(&rig, RunProfile::default());
        robot
            .follow_line_until_crossing(
                Side::Left,
                FollowOptions {
                    sensor: Some(Side::Right),
                    gain: Some(1.0),
                    base_speed: Some(100),
                },
            )
            .unwrap();
        assert_eq!(
            rig.left_wheel.commands()[0],
            ActuatorCommand::RunContinuous { speed: 90 }
        );
    }

    #[test]
    fn telemetry_enabled_by_profile() {
        let rig = SimRig::new().with_sensors(
            SimSensor::step("l", 4, 60.0, 4.0),
            SimSensor::step("r", 2, 60.0, 4.0),
        );
        let mut profile = RunProfile::default();
        profile.telemetry.enabled = true;
        let mut robot = robot(&rig, profile);
        robot.align().unwrap();
        assert_eq!(robot.telemetry().unwrap().samples_for("align").len(), 5);
    }

    #[test]
    fn lift_origin_is_reset_on_construction() {
        let rig = SimRig::new();
        let mut lift = rig.lift.clone();
        lift.run_to_angle(400, 80, common::Wait::Block).unwrap();
        let _robot = robot(&rig, RunProfile::default());
        assert_eq!(lift.angle().unwrap(), 0);
    }
}
