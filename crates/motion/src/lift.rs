//! Lift and claw moves.
//!
//! There is exactly one way to move the lift to a height: run it towards the target and
//! poll its angle counter, bounded by the configured timeout. A timeout of `None` keeps
//! polling until the target is reached.

use std::time::Duration;

use common::config::millis;
use common::{ActuatorPort, Clock, RunProfile, Wait};
use tracing::{debug, warn};

use crate::poll::{LoopLimits, LoopReport, LoopState, PollLoop};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiftSettings {
    pub speed: i32,
    pub limits: LoopLimits,
    pub settle_speed: i32,
    pub settle: Duration,
}

impl LiftSettings {
    pub fn from_profile(profile: &RunProfile) -> Self {
        Self {
            speed: profile.lift.speed,
            limits: LoopLimits::new(
                millis(profile.lift.raise_timeout_ms),
                profile.timing.poll_interval(),
            ),
            settle_speed: profile.lift.settle_speed,
            settle: Duration::from_millis(profile.lift.settle_ms),
        }
    }
}

/// Move the lift to the absolute angle `target` and hold it there.
///
/// If the lift fails partway, it is held before the error is returned.
pub fn move_lift_to<A, C>(
    lift: &mut A,
    clock: &C,
    target: i32,
    settings: &LiftSettings,
) -> Result<LoopReport>
where
    A: ActuatorPort,
    C: Clock,
{
    let start = lift.angle()?;
    let direction = (target - start).signum();
    debug!(start, target, "lift move");

    let mut poll = PollLoop::start(clock, settings.limits);
    if let Err(err) = drive_lift(lift, &mut poll, target, direction, settings.speed) {
        if let Err(brake) = lift.hold() {
            warn!(target, %brake, "could not hold lift after fault");
        }
        return Err(err);
    }
    lift.hold()?;

    let report = poll.report();
    if report.timed_out() {
        warn!(
            target,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "lift did not reach its target before the timeout"
        );
    }
    Ok(report)
}

fn drive_lift<A, C>(
    lift: &mut A,
    poll: &mut PollLoop<'_, C>,
    target: i32,
    direction: i32,
    speed: i32,
) -> Result<()>
where
    A: ActuatorPort,
    C: Clock,
{
    let mut running = false;
    loop {
        let angle = lift.angle()?;
        let reached = (target - angle) * direction <= 0;
        if poll.check(reached) != LoopState::Running {
            return Ok(());
        }
        if !running {
            lift.run(speed.saturating_abs() * direction)?;
            running = true;
        }
        poll.pace();
    }
}

/// Short fixed-time lift pulse that lets a released object settle.
pub fn settle_lift<A: ActuatorPort>(lift: &mut A, settings: &LiftSettings) -> Result<()> {
    lift.run_for_duration(settings.settle_speed, settings.settle, Wait::Block)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClawSettings {
    pub speed: i32,
    pub duration: Duration,
}

impl ClawSettings {
    pub fn from_profile(profile: &RunProfile) -> Self {
        Self {
            speed: profile.claw.speed,
            duration: Duration::from_millis(profile.claw.duration_ms),
        }
    }
}

pub fn open_claw<A: ActuatorPort>(claw: &mut A, settings: &ClawSettings) -> Result<()> {
    claw.run_for_duration(settings.speed.saturating_abs(), settings.duration, Wait::Block)?;
    Ok(())
}

pub fn close_claw<A: ActuatorPort>(claw: &mut A, settings: &ClawSettings) -> Result<()> {
    claw.run_for_duration(-settings.speed.saturating_abs(), settings.duration, Wait::Block)?;
    Ok(())
}
