//! Deposit an object at a stack tier, and build a four-tier tower.
//!
//! Each placement runs the same script: settle the object with a short jog, raise the
//! lift to the tier height, back over the stack, apply the heading correction, release,
//! then retreat and lower. The retreat differs per tier in ways that are not a single
//! formula, so it is kept as three explicit cases.

use common::config::TOWER_TIERS;
use common::{ActuatorPort, Clock, HeightTierTable, RunProfile};
use tracing::info;

use crate::drive::DifferentialDrive;
use crate::lift::{
    close_claw, move_lift_to, open_claw, settle_lift, ClawSettings, LiftSettings,
};
use crate::poll::LoopReport;
use crate::{MotionError, Result};

/// Arguments for one placement. Built per call, consumed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementParams {
    pub tier: usize,
    /// Wheel degrees to back up over the stack after lifting. Never negative.
    pub approach_offset: i32,
    /// In-place turn applied before release; sign picks the direction.
    pub correction_angle: i32,
}

impl PlacementParams {
    pub fn new(tier: usize, approach_offset: i32, correction_angle: i32) -> Self {
        Self {
            tier,
            approach_offset,
            correction_angle,
        }
    }
}

/// Jog length that settles the object in the claw: shrinks as the offset grows and
/// clamps at zero.
pub fn jog_distance(jog: i32, approach_offset: i32) -> i32 {
    jog.saturating_sub(approach_offset).max(0)
}

/// The three retreat-and-lower variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    /// Ground tier: retreat by an offset-dependent distance, lower, short final retreat.
    Ground,
    /// Intermediate tiers: retreat partway, lower, retreat the remainder.
    Middle,
    /// Highest tier: retreat a fixed distance, then lower fully.
    Top,
}

impl Retreat {
    pub fn for_tier(tier: usize, top: usize) -> Self {
        if tier == 0 {
            Retreat::Ground
        } else if tier >= top {
            Retreat::Top
        } else {
            Retreat::Middle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementReport {
    pub params: PlacementParams,
    pub jog: i32,
    /// Present only for tiers above the ground.
    pub raise: Option<LoopReport>,
    pub retreat: Retreat,
    /// Total wheel degrees backed away after release.
    pub retreated: i32,
    pub lower: LoopReport,
}

impl PlacementReport {
    pub fn timed_out(&self) -> bool {
        self.lower.timed_out() || self.raise.is_some_and(|r| r.timed_out())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TowerReport {
    pub placements: Vec<PlacementReport>,
    pub claw_closes: usize,
}

pub struct PickAndPlace<'a, A, C> {
    drive: &'a mut DifferentialDrive<A, C>,
    lift: &'a mut A,
    claw: &'a mut A,
    profile: &'a RunProfile,
    lift_settings: LiftSettings,
    claw_settings: ClawSettings,
}

impl<'a, A, C> PickAndPlace<'a, A, C>
where
    A: ActuatorPort,
    C: Clock + Clone,
{
    pub fn new(
        drive: &'a mut DifferentialDrive<A, C>,
        lift: &'a mut A,
        claw: &'a mut A,
        profile: &'a RunProfile,
    ) -> Self {
        Self {
            drive,
            lift,
            claw,
            profile,
            lift_settings: LiftSettings::from_profile(profile),
            claw_settings: ClawSettings::from_profile(profile),
        }
    }

    fn tiers(&self) -> &HeightTierTable {
        &self.profile.lift.tiers
    }

    pub fn place(&mut self, params: PlacementParams) -> Result<PlacementReport> {
        let tiers = self.tiers();
        let Some(height) = tiers.get(params.tier) else {
            return Err(MotionError::InvalidTier {
                tier: params.tier,
                len: tiers.len(),
            });
        };
        let top = tiers.top();
        if params.approach_offset < 0 {
            return Err(MotionError::invalid(
                "approach offset",
                params.approach_offset,
                "must not be negative",
            ));
        }

        let placement = self.profile.placement;
        let drive_speed = self.profile.drive.speed;
        info!(
            tier = params.tier,
            offset = params.approach_offset,
            correction = params.correction_angle,
            "placement started"
        );

        let jog = jog_distance(placement.jog_distance, params.approach_offset);
        if jog > 0 {
            self.drive.run_angle(placement.jog_speed, jog)?;
            self.drive.run_angle(placement.jog_speed, -jog)?;
        }

        let raise = if params.tier > 0 {
            Some(self.move_lift(height)?)
        } else {
            None
        };

        if params.approach_offset > 0 {
            self.drive.run_angle(drive_speed, -params.approach_offset)?;
        }

        if params.correction_angle != 0 {
            self.drive
                .turn_in_place(self.profile.drive.turn_speed, params.correction_angle)?;
        }

        open_claw(&mut *self.claw, &self.claw_settings)?;
        settle_lift(&mut *self.lift, &self.lift_settings)?;

        let retreat = Retreat::for_tier(params.tier, top);
        let (retreated, lower) = match retreat {
            Retreat::Top => {
                let back = self.back_off(placement.top_retreat)?;
                (back, self.move_lift(0)?)
            }
            Retreat::Middle => {
                let first = self.back_off(placement.mid_retreat_first)?;
                let lower = self.move_lift(0)?;
                let rest = self.back_off(placement.mid_retreat_rest)?;
                (first + rest, lower)
            }
            Retreat::Ground => {
                let first =
                    self.back_off(jog_distance(placement.ground_retreat, params.approach_offset))?;
                let lower = self.move_lift(0)?;
                let last = self.back_off(placement.ground_final_retreat)?;
                (first + last, lower)
            }
        };

        info!(tier = params.tier, ?retreat, retreated, "placement finished");
        Ok(PlacementReport {
            params,
            jog,
            raise,
            retreat,
            retreated,
            lower,
        })
    }

    /// Place one object on each tier from the ground up, closing the claw on the next
    /// object between placements. Success of each placement is not verified.
    pub fn build_tower(&mut self) -> Result<TowerReport> {
        let tower = self.profile.tower;
        let mut placements = Vec::with_capacity(TOWER_TIERS);
        let mut claw_closes = 0;

        for tier in 0..TOWER_TIERS {
            if tier > 0 {
                self.close_claw()?;
                claw_closes += 1;
            }
            let params =
                PlacementParams::new(tier, tower.offsets[tier], tower.corrections[tier]);
            placements.push(self.place(params)?);
        }

        Ok(TowerReport {
            placements,
            claw_closes,
        })
    }

    pub fn open_claw(&mut self) -> Result<()> {
        open_claw(&mut *self.claw, &self.claw_settings)
    }

    pub fn close_claw(&mut self) -> Result<()> {
        close_claw(&mut *self.claw, &self.claw_settings)
    }

    fn move_lift(&mut self, target: i32) -> Result<LoopReport> {
        let clock = self.drive.clock().clone();
        move_lift_to(&mut *self.lift, &clock, target, &self.lift_settings)
    }

    fn back_off(&mut self, distance: i32) -> Result<i32> {
        if distance > 0 {
            self.drive.run_angle(self.profile.drive.speed, -distance)?;
        }
        Ok(distance.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveSettings;
    use common::{ActuatorCommand, Wait};
    use sim::{SimActuator, SimClock, SimRig};
    use std::time::Duration;

    struct Bench {
        rig: SimRig,
        drive: DifferentialDrive<SimActuator, SimClock>,
        lift: SimActuator,
        claw: SimActuator,
        profile: RunProfile,
    }

    fn bench() -> Bench {
        let rig = SimRig::new();
        Bench {
            drive: DifferentialDrive::new(
                rig.left_wheel.clone(),
                rig.right_wheel.clone(),
                rig.clock.clone(),
                DriveSettings::default(),
            ),
            lift: rig.lift.clone(),
            claw: rig.claw.clone(),
            profile: RunProfile::default(),
            rig,
        }
    }

    impl Bench {
        fn sequencer(&mut self) -> PickAndPlace<'_, SimActuator, SimClock> {
            PickAndPlace::new(&mut self.drive, &mut self.lift, &mut self.claw, &self.profile)
        }
    }

    fn is_close(command: &ActuatorCommand) -> bool {
        matches!(command, ActuatorCommand::RunForDuration { speed, .. } if *speed < 0)
    }

    #[test]
    fn jog_clamps_at_zero() {
        for offset in [0, 10, 59, 60, 61, 345] {
            assert_eq!(jog_distance(60, offset), (60 - offset).max(0));
        }
        assert_eq!(jog_distance(60, 60), 0);
        assert_eq!(jog_distance(60, 500), 0);
    }

    #[test]
    fn retreat_cases_by_tier() {
        assert_eq!(Retreat::for_tier(0, 3), Retreat::Ground);
        assert_eq!(Retreat::for_tier(1, 3), Retreat::Middle);
        assert_eq!(Retreat::for_tier(2, 3), Retreat::Middle);
        assert_eq!(Retreat::for_tier(3, 3), Retreat::Top);
    }

    #[test]
    fn ground_tier_never_raises() {
        let mut b = bench();
        let report = b.sequencer().place(PlacementParams::new(0, 0, 0)).unwrap();
        assert!(report.raise.is_none());
        assert_eq!(report.jog, 60);
        assert_eq!(report.retreat, Retreat::Ground);
        assert_eq!(report.retreated, 180 + 40);
        assert!(report.lower.converged());

        // forward then back, both finished before the lift is touched
        let right = b.rig.right_wheel.log();
        let left = b.rig.left_wheel.commands();
        assert_eq!(
            right[0].command,
            ActuatorCommand::RunToAngle {
                speed: 150,
                target_delta: 60,
                wait: Wait::NoWait
            }
        );
        assert_eq!(
            right[2].command,
            ActuatorCommand::RunToAngle {
                speed: 150,
                target_delta: -60,
                wait: Wait::NoWait
            }
        );
        assert_eq!(left[0], ActuatorCommand::RunContinuous { speed: 150 });
        assert_eq!(left[2], ActuatorCommand::RunContinuous { speed: -150 });
        assert_eq!(right[3].command, ActuatorCommand::Hold);

        let lift = b.rig.lift.log();
        assert!(lift[0].at >= right[3].at);
        assert_eq!(
            lift[0].command,
            ActuatorCommand::RunForDuration {
                speed: -200,
                duration: Duration::from_millis(200),
                wait: Wait::Block
            }
        );
    }

    #[test]
    fn raised_tier_reaches_table_height() {
        let mut b = bench();
        let report = b.sequencer().place(PlacementParams::new(2, 255, 0)).unwrap();
        let raise = report.raise.unwrap();
        assert!(raise.converged());
        assert_eq!(report.jog, 0);
        assert_eq!(report.retreated, 90 + 110);
        assert_eq!(b.lift.angle().unwrap(), 0);
    }

    #[test]
    fn large_offset_skips_jog() {
        let mut b = bench();
        b.sequencer().place(PlacementParams::new(1, 170, 0)).unwrap();
        // first wheel command is the backward approach, not a forward jog
        assert_eq!(
            b.rig.right_wheel.commands()[0],
            ActuatorCommand::RunToAngle {
                speed: 200,
                target_delta: -170,
                wait: Wait::NoWait
            }
        );
    }

    #[test]
    fn correction_turns_before_release() {
        let mut b = bench();
        b.sequencer().place(PlacementParams::new(3, 345, -15)).unwrap();
        let left = b.rig.left_wheel.log();
        let turn = left
            .iter()
            .find(|l| {
                matches!(
                    l.command,
                    ActuatorCommand::RunToAngle {
                        target_delta: -15,
                        ..
                    }
                )
            })
            .unwrap();
        let open = b.rig.claw.log()[0];
        assert!(turn.at < open.at);
    }

    #[test]
    fn invalid_tier_fails_fast() {
        let mut b = bench();
        let err = b.sequencer().place(PlacementParams::new(4, 0, 0)).unwrap_err();
        assert!(matches!(err, MotionError::InvalidTier { tier: 4, len: 4 }));
        assert!(b.rig.left_wheel.commands().is_empty());
    }

    #[test]
    fn negative_offset_fails_fast() {
        let mut b = bench();
        let err = b.sequencer().place(PlacementParams::new(1, -5, 0)).unwrap_err();
        assert!(matches!(err, MotionError::InvalidParameter { .. }));
        assert!(b.rig.lift.commands().is_empty());
        assert!(b.rig.left_wheel.commands().is_empty());
        assert!(b.rig.right_wheel.commands().is_empty());
    }

    #[test]
    fn tower_raises_three_times_and_closes_between() {
        let mut b = bench();
        let tower = b.sequencer().build_tower().unwrap();

        assert_eq!(tower.placements.len(), 4);
        let raises: Vec<bool> = tower.placements.iter().map(|p| p.raise.is_some()).collect();
        assert_eq!(raises, vec![false, true, true, true]);
        assert_eq!(tower.claw_closes, 3);

        let claw = b.rig.claw.commands();
        assert_eq!(claw.iter().filter(|c| is_close(c)).count(), 3);
        // open, close, open, close, open, close, open
        for pair in claw.windows(2) {
            assert_ne!(is_close(&pair[0]), is_close(&pair[1]));
        }
        assert!(!is_close(&claw[0]));
    }

    #[test]
    fn stalled_lift_does_not_hang_the_tower() {
        let mut b = bench();
        b.rig.lift.set_stalled(true);
        let tower = b.sequencer().build_tower().unwrap();
        assert!(tower.placements[1].raise.unwrap().timed_out());
        assert!(tower.placements[1].timed_out());
        assert!(tower.placements[0].raise.is_none());
        assert!(b.rig.clock.now() >= Duration::from_secs(12));
    }
}
