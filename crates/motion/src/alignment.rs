//! Square the chassis against a line.
//!
//! Both wheels drive at the same speed; each wheel is held as soon as the sensor on its
//! side sees the line. The wheels usually stop on different iterations, which is what
//! rotates the chassis square to an angled line.

use common::config::millis;
use common::{
    ActuatorPort, Clock, LoopSample, RunProfile, SensorPort, Side, TelemetryRecorder, Thresholds,
};
use tracing::{debug, info, warn};

use crate::drive::DifferentialDrive;
use crate::poll::{LoopLimits, LoopReport, LoopState, PollLoop};
use crate::sensors::SensorPair;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignSettings {
    pub speed: i32,
    pub thresholds: Thresholds,
    pub limits: LoopLimits,
}

impl AlignSettings {
    pub fn from_profile(profile: &RunProfile) -> Self {
        Self {
            speed: profile.alignment.speed,
            thresholds: profile.thresholds,
            limits: LoopLimits::new(
                millis(profile.alignment.timeout_ms),
                profile.timing.poll_interval(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignReport {
    /// Iteration in which each wheel was held, `None` if it never reached the line.
    pub left_stopped_at: Option<u64>,
    pub right_stopped_at: Option<u64>,
    pub outcome: LoopReport,
}

impl AlignReport {
    pub fn stopped_at(&self, side: Side) -> Option<u64> {
        match side {
            Side::Left => self.left_stopped_at,
            Side::Right => self.right_stopped_at,
        }
    }
}

pub struct Aligner<'a, A, S, C> {
    drive: &'a mut DifferentialDrive<A, C>,
    sensors: &'a mut SensorPair<S>,
    settings: AlignSettings,
    telemetry: Option<&'a TelemetryRecorder>,
}

impl<'a, A, S, C> Aligner<'a, A, S, C>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock + Clone,
{
    pub fn new(
        drive: &'a mut DifferentialDrive<A, C>,
        sensors: &'a mut SensorPair<S>,
        settings: AlignSettings,
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

    pub fn align(&mut self) -> Result<AlignReport> {
        let speed = self.settings.speed;
        let clock = self.drive.clock().clone();
        info!(speed, "alignment started");

        self.drive.run_both(speed, speed)?;
        let mut poll = PollLoop::start(&clock, self.settings.limits);
        let mut stopped_at: [Option<u64>; 2] = [None, None];
        if let Err(err) = self.seek(&mut poll, &mut stopped_at) {
            self.drive.brake();
            return Err(err);
        }

        let outcome = poll.report();
        if outcome.timed_out() {
            self.drive.hold()?;
            warn!(
                left = ?stopped_at[0],
                right = ?stopped_at[1],
                "alignment timed out before both sensors found the line"
            );
        } else {
            info!(left = ?stopped_at[0], right = ?stopped_at[1], "alignment finished");
        }

        Ok(AlignReport {
            left_stopped_at: stopped_at[0],
            right_stopped_at: stopped_at[1],
            outcome,
        })
    }

    /// Poll until both wheels are held or the loop gives up.
    fn seek(
        &mut self,
        poll: &mut PollLoop<'_, C>,
        stopped_at: &mut [Option<u64>; 2],
    ) -> Result<()> {
        let speed = self.settings.speed;
        loop {
            let mut readings = [None, None];
            for side in [Side::Left, Side::Right] {
                if stopped_at[side.index()].is_some() {
                    continue;
                }
                let sample = self.sensors.read(side)?;
                readings[side.index()] = Some(sample.value());
                if sample.is_dark(&self.settings.thresholds) {
                    self.drive.hold_wheel(side)?;
                    stopped_at[side.index()] = Some(poll.iteration());
                    debug!(?side, iteration = poll.iteration(), "wheel reached the line");
                }
            }

            if let Some(telemetry) = self.telemetry {
                telemetry.record(LoopSample {
                    maneuver: "align",
                    iteration: poll.iteration(),
                    elapsed_ms: poll.elapsed().as_secs_f64() * 1000.0,
                    left_reading: readings[0],
                    right_reading: readings[1],
                    left_speed: Some(if stopped_at[0].is_some() { 0 } else { speed }),
                    right_speed: Some(if stopped_at[1].is_some() { 0 } else { speed }),
                    angle: None,
                });
            }

            let both = stopped_at.iter().all(Option::is_some);
            if poll.check(both) != LoopState::Running {
                return Ok(());
            }
            poll.pace();
        }
    }
}
