//! Paired wheel primitives.
//!
//! The two wheels are not commanded symmetrically. In a straight move the *reference*
//! wheel runs continuously with its direction taken from the sign of the distance, while
//! the *paired* wheel carries the signed angle target and decides when the move ends.
//! Callers depend on this asymmetry.
//!
//! Both wheel commands of a pair are always dispatched non-blocking before any wait
//! starts, so neither wheel can begin a blocking move while the other is still idle.

use std::time::Duration;

use common::config::millis;
use common::{ActuatorCommand, ActuatorPort, Clock, RunProfile, Side, Wait};
use tracing::{debug, warn};

use crate::poll::{wait_until, LoopLimits, LoopReport};
use crate::{MotionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSettings {
    pub reference: Side,
    pub limits: LoopLimits,
}

impl DriveSettings {
    pub fn from_profile(profile: &RunProfile) -> Self {
        Self {
            reference: profile.drive.reference_wheel,
            limits: LoopLimits::new(
                millis(profile.drive.wait_timeout_ms),
                profile.timing.poll_interval(),
            ),
        }
    }
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            reference: Side::Left,
            limits: LoopLimits::unbounded(),
        }
    }
}

/// Last command and last observed angle of each wheel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveState {
    last: [Option<ActuatorCommand>; 2],
    angles: [i32; 2],
}

impl DriveState {
    pub fn last_command(&self, side: Side) -> Option<ActuatorCommand> {
        self.last[side.index()]
    }

    /// Angle since reset, as of the last read.
    pub fn angle(&self, side: Side) -> i32 {
        self.angles[side.index()]
    }
}

pub struct DifferentialDrive<A, C> {
    left: A,
    right: A,
    clock: C,
    settings: DriveSettings,
    state: DriveState,
}

fn wheel<'w, A>(left: &'w mut A, right: &'w mut A, side: Side) -> &'w mut A {
    match side {
        Side::Left => left,
        Side::Right => right,
    }
}

impl<A: ActuatorPort, C: Clock> DifferentialDrive<A, C> {
    pub fn new(left: A, right: A, clock: C, settings: DriveSettings) -> Self {
        Self {
            left,
            right,
            clock,
            settings,
            state: DriveState::default(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn settings(&self) -> &DriveSettings {
        &self.settings
    }

    pub fn state(&self) -> &DriveState {
        &self.state
    }

    pub fn reference(&self) -> Side {
        self.settings.reference
    }

    fn issue(&mut self, side: Side, command: ActuatorCommand) -> Result<()> {
        wheel(&mut self.left, &mut self.right, side).apply(command)?;
        self.state.last[side.index()] = Some(command);
        Ok(())
    }

    /// Send one command to each wheel before either is observed.
    fn dispatch_pair(&mut self, left: ActuatorCommand, right: ActuatorCommand) -> Result<()> {
        debug_assert!(
            [left, right].iter().all(|c| !matches!(
                c,
                ActuatorCommand::RunToAngle { wait: Wait::Block, .. }
                    | ActuatorCommand::RunForDuration { wait: Wait::Block, .. }
            )),
            "paired commands must not block"
        );
        self.issue(Side::Left, left)?;
        self.issue(Side::Right, right)
    }

    fn dispatch_reference_pair(
        &mut self,
        reference: ActuatorCommand,
        paired: ActuatorCommand,
    ) -> Result<()> {
        match self.settings.reference {
            Side::Left => self.dispatch_pair(reference, paired),
            Side::Right => self.dispatch_pair(paired, reference),
        }
    }

    /// Drive straight by `degrees` of the paired wheel, then hold both wheels.
    pub fn run_angle(&mut self, speed: i32, degrees: i32) -> Result<LoopReport> {
        self.run_angle_no_wait(speed, degrees)?;
        let paired = self.settings.reference.other();
        let report = self.wait_for(&[paired])?;
        self.hold()?;
        Ok(report)
    }

    /// Start a straight move and return immediately. Follow up with [`wait`](Self::wait)
    /// or another command before relying on the wheel angles.
    pub fn run_angle_no_wait(&mut self, speed: i32, degrees: i32) -> Result<()> {
        let magnitude = speed.saturating_abs();
        let direction = if degrees < 0 { -1 } else { 1 };
        debug!(speed = magnitude, degrees, "run angle");
        self.dispatch_reference_pair(
            ActuatorCommand::RunContinuous {
                speed: magnitude * direction,
            },
            ActuatorCommand::RunToAngle {
                speed: magnitude,
                target_delta: degrees,
                wait: Wait::NoWait,
            },
        )
    }

    /// Run for a wall-clock duration: paired wheel timed, reference wheel continuous.
    pub fn run_time(&mut self, speed: i32, duration: Duration) -> Result<LoopReport> {
        debug!(speed, duration_ms = duration.as_millis() as u64, "run time");
        self.dispatch_reference_pair(
            ActuatorCommand::RunContinuous { speed },
            ActuatorCommand::RunForDuration {
                speed,
                duration,
                wait: Wait::NoWait,
            },
        )?;
        let paired = self.settings.reference.other();
        let report = self.wait_for(&[paired])?;
        self.hold()?;
        Ok(report)
    }

    /// Rotate a single wheel by `degrees` while the other stays where it is.
    pub fn run_wheel_angle(&mut self, side: Side, speed: i32, degrees: i32) -> Result<LoopReport> {
        self.issue(
            side,
            ActuatorCommand::RunToAngle {
                speed: speed.saturating_abs(),
                target_delta: degrees,
                wait: Wait::NoWait,
            },
        )?;
        let report = self.wait_for(&[side])?;
        self.hold_wheel(side)?;
        Ok(report)
    }

    /// Spin on the spot: left wheel by `degrees`, right wheel by `-degrees`.
    pub fn turn_in_place(&mut self, speed: i32, degrees: i32) -> Result<LoopReport> {
        let magnitude = speed.saturating_abs();
        debug!(speed = magnitude, degrees, "turn in place");
        self.dispatch_pair(
            ActuatorCommand::RunToAngle {
                speed: magnitude,
                target_delta: degrees,
                wait: Wait::NoWait,
            },
            ActuatorCommand::RunToAngle {
                speed: magnitude,
                target_delta: -degrees,
                wait: Wait::NoWait,
            },
        )?;
        let report = self.wait_for(&[Side::Left, Side::Right])?;
        self.hold()?;
        Ok(report)
    }

    /// Continuous run with independent speeds (used by the feedback loops).
    pub fn run_both(&mut self, left_speed: i32, right_speed: i32) -> Result<()> {
        self.dispatch_pair(
            ActuatorCommand::RunContinuous { speed: left_speed },
            ActuatorCommand::RunContinuous { speed: right_speed },
        )
    }

    /// Wait for any outstanding bounded wheel command, then hold both wheels.
    pub fn wait(&mut self) -> Result<LoopReport> {
        let report = self.wait_for(&[Side::Left, Side::Right])?;
        self.hold()?;
        Ok(report)
    }

    pub fn hold(&mut self) -> Result<()> {
        self.dispatch_pair(ActuatorCommand::Hold, ActuatorCommand::Hold)
    }

    pub fn hold_wheel(&mut self, side: Side) -> Result<()> {
        self.issue(side, ActuatorCommand::Hold)
    }

    /// Best-effort hold after a failed maneuver. Never returns an error of its own.
    pub fn brake(&mut self) {
        for side in [Side::Left, Side::Right] {
            if let Err(err) = self.hold_wheel(side) {
                warn!(?side, %err, "could not brake wheel after fault");
            }
        }
    }

    pub fn angle(&mut self, side: Side) -> Result<i32> {
        let angle = wheel(&mut self.left, &mut self.right, side).angle()?;
        self.state.angles[side.index()] = angle;
        Ok(angle)
    }

    pub fn reset_angle(&mut self, side: Side) -> Result<()> {
        wheel(&mut self.left, &mut self.right, side).reset_angle(0)?;
        self.state.angles[side.index()] = 0;
        Ok(())
    }

    pub fn reset_angles(&mut self) -> Result<()> {
        self.reset_angle(Side::Left)?;
        self.reset_angle(Side::Right)
    }

    fn wait_for(&mut self, sides: &[Side]) -> Result<LoopReport> {
        let Self {
            left,
            right,
            clock,
            settings,
            ..
        } = self;
        let report = wait_until(&*clock, settings.limits, || {
            let mut done = true;
            for side in sides {
                done &= wheel(left, right, *side).is_done()?;
            }
            Ok::<_, MotionError>(done)
        })?;
        if report.timed_out() {
            warn!(
                ?sides,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "wheels did not finish their bounded move in time"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim::{SimActuator, SimClock, SimRig};

    fn drive(rig: &SimRig) -> DifferentialDrive<SimActuator, SimClock> {
        DifferentialDrive::new(
            rig.left_wheel.clone(),
            rig.right_wheel.clone(),
            rig.clock.clone(),
            DriveSettings::default(),
        )
    }

    #[test]
    fn run_angle_keeps_wheel_asymmetry() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_angle(200, -30).unwrap();

        let left = rig.left_wheel.commands();
        let right = rig.right_wheel.commands();
        assert_eq!(left[0], ActuatorCommand::RunContinuous { speed: -200 });
        assert_eq!(
            right[0],
            ActuatorCommand::RunToAngle {
                speed: 200,
                target_delta: -30,
                wait: Wait::NoWait
            }
        );
        assert_eq!(left.last(), Some(&ActuatorCommand::Hold));
        assert_eq!(right.last(), Some(&ActuatorCommand::Hold));
        assert_eq!(drive.angle(Side::Right).unwrap(), -30);
    }

    #[test]
    fn pair_is_dispatched_before_waiting() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_angle(100, 50).unwrap();

        let left = rig.left_wheel.log();
        let right = rig.right_wheel.log();
        // both first commands land at the same simulated instant
        assert_eq!(left[0].at, right[0].at);
        assert!(left[1].at > left[0].at);
    }

    #[test]
    fn run_angle_reports_reached_target() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        let report = drive.run_angle(200, 100).unwrap();
        assert!(report.converged());
        assert_eq!(drive.angle(Side::Right).unwrap(), 100);
        assert!(rig.left_wheel.is_holding());
    }

    #[test]
    fn reference_wheel_can_be_swapped() {
        let rig = SimRig::new();
        let mut drive = DifferentialDrive::new(
            rig.left_wheel.clone(),
            rig.right_wheel.clone(),
            rig.clock.clone(),
            DriveSettings {
                reference: Side::Right,
                ..DriveSettings::default()
            },
        );
        drive.run_angle(150, 45).unwrap();
        assert_eq!(
            rig.right_wheel.commands()[0],
            ActuatorCommand::RunContinuous { speed: 150 }
        );
        assert_eq!(drive.angle(Side::Left).unwrap(), 45);
    }

    #[test]
    fn run_time_holds_after_duration() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        let report = drive.run_time(100, Duration::from_millis(300)).unwrap();
        assert!(report.converged());
        assert_eq!(drive.angle(Side::Right).unwrap(), 30);
        assert!(rig.right_wheel.is_holding());
        assert!(rig.left_wheel.is_holding());
    }

    #[test]
    fn turn_in_place_counter_rotates() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.turn_in_place(150, 90).unwrap();
        assert_eq!(drive.angle(Side::Left).unwrap(), 90);
        assert_eq!(drive.angle(Side::Right).unwrap(), -90);
    }

    #[test]
    fn single_wheel_pivot_leaves_other_wheel() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_wheel_angle(Side::Right, 500, 360).unwrap();
        assert_eq!(drive.angle(Side::Right).unwrap(), 360);
        assert_eq!(drive.angle(Side::Left).unwrap(), 0);
        assert!(rig.left_wheel.commands().is_empty());
    }

    #[test]
    fn stalled_wheel_times_out_when_bounded() {
        let rig = SimRig::new();
        rig.right_wheel.set_stalled(true);
        let mut drive = DifferentialDrive::new(
            rig.left_wheel.clone(),
            rig.right_wheel.clone(),
            rig.clock.clone(),
            DriveSettings {
                limits: LoopLimits::unbounded().with_timeout(Duration::from_millis(200)),
                ..DriveSettings::default()
            },
        );
        let report = drive.run_angle(100, 90).unwrap();
        assert!(report.timed_out());
        assert!(rig.left_wheel.is_holding());
    }

    #[test]
    fn no_wait_returns_before_the_move_ends() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_angle_no_wait(200, 90).unwrap();

        assert_eq!(rig.clock.now(), Duration::ZERO);
        assert!(!rig.right_wheel.clone().is_done().unwrap());
        assert!(!rig.left_wheel.is_holding());

        let report = drive.wait().unwrap();
        assert!(report.converged());
        assert!(rig.clock.now() >= Duration::from_millis(450));
        assert_eq!(drive.angle(Side::Right).unwrap(), 90);
        assert!(rig.left_wheel.is_holding());
        assert!(rig.right_wheel.is_holding());
    }

    #[test]
    fn brake_reaches_the_healthy_wheel() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_both(100, 100).unwrap();
        rig.left_wheel.fail_after(0);

        drive.brake();
        assert!(rig.right_wheel.is_holding());
        assert!(!rig.left_wheel.is_holding());
    }

    #[test]
    fn state_tracks_last_command_and_reset() {
        let rig = SimRig::new();
        let mut drive = drive(&rig);
        drive.run_both(80, 120).unwrap();
        assert_eq!(
            drive.state().last_command(Side::Right),
            Some(ActuatorCommand::RunContinuous { speed: 120 })
        );
        rig.clock.advance(Duration::from_millis(500));
        assert_eq!(drive.angle(Side::Left).unwrap(), 40);
        assert_eq!(drive.state().angle(Side::Left), 40);
        drive.reset_angles().unwrap();
        assert_eq!(drive.angle(Side::Left).unwrap(), 0);
    }
}
