//! Ordered maneuver scripts for one run.

use common::{ActuatorPort, Clock, SensorPort, Side};
use motion::{AlignReport, FollowOptions, LoopReport, Robot, TowerReport};
use sim::SimRig;
use tracing::info;

/// Per-run numbers for the competition script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetitionScript {
    pub back_off: i32,
    pub pivot_speed: i32,
    pub pivot: i32,
    pub approach: i32,
    pub segment: i32,
}

impl Default for CompetitionScript {
    fn default() -> Self {
        Self {
            back_off: 30,
            pivot_speed: 500,
            pivot: 360,
            approach: 1100,
            segment: 200,
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub crossing: LoopReport,
    pub alignment: AlignReport,
    pub segment: LoopReport,
    pub tower: TowerReport,
}

/// Take the blocks, drive to the stacking area and build the tower.
pub fn competition<A, S, C>(
    robot: &mut Robot<A, S, C>,
    script: &CompetitionScript,
) -> motion::Result<RunSummary>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock + Clone,
{
    info!(profile = %robot.profile().name, "competition run started");

    robot.move_straight(-script.back_off)?;
    robot.pivot(Side::Right, script.pivot_speed, script.pivot)?;
    robot.move_straight(script.approach)?;
    robot.close_claw()?;

    let crossing = robot.follow_line_until_crossing(Side::Right, FollowOptions::default())?;
    let alignment = robot.align()?;
    let segment = robot.follow_line_for(script.segment, FollowOptions::default())?;
    let tower = robot.build_tower()?;

    info!("competition run finished");
    Ok(RunSummary {
        crossing,
        alignment,
        segment,
        tower,
    })
}

/// Build the tower from where the robot stands, holding the first object already.
pub fn tower_only<A, S, C>(robot: &mut Robot<A, S, C>) -> motion::Result<TowerReport>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock + Clone,
{
    robot.close_claw()?;
    robot.build_tower()
}

/// Simulated field for the competition script: a crossing line under the right sensor
/// after the approach, and a wider line under the left sensor just beyond it.
pub fn demo_rig() -> SimRig {
    SimRig::new().with_course(vec![(1380.0, 1450.0)], vec![(1700.0, 1720.0)])
}
