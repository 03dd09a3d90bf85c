use std::time::Duration;

use common::{ActuatorCommand, ActuatorPort, Clock, RunProfile, Side};
use motion::{FollowOptions, MotionError, PlacementParams, Retreat, Robot, RobotParts};
use sim::{SimActuator, SimClock, SimRig, SimSensor};

type SimRobot = Robot<SimActuator, SimSensor, SimClock>;

fn build(rig: &SimRig, profile: RunProfile) -> SimRobot {
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

fn bounded_profile() -> RunProfile {
    RunProfile::from_toml(
        r#"
        name = "test"

        [line_follow]
        timeout_ms = 20000

        [alignment]
        timeout_ms = 5000

        [telemetry]
        enabled = true
        "#,
    )
    .unwrap()
}

#[test]
fn follows_course_until_right_sensor_crosses() {
    let rig = SimRig::new().with_course(vec![], vec![(300.0, 320.0)]);
    let mut robot = build(&rig, bounded_profile());

    let report = robot
        .follow_line_until_crossing(Side::Right, FollowOptions::default())
        .unwrap();

    assert!(report.converged());
    let travelled = rig.right_wheel.odometer();
    assert!((300.0..=320.0).contains(&travelled), "stopped at {travelled}");
    assert!(rig.left_wheel.is_holding());
    assert!(rig.right_wheel.is_holding());
}

#[test]
fn bounded_segment_ends_on_reference_wheel() {
    let rig = SimRig::new().with_course(vec![], vec![]);
    let mut robot = build(&rig, bounded_profile());

    robot.follow_line_for(250, FollowOptions::default()).unwrap();
    assert_eq!(rig.left_wheel.clone().angle().unwrap(), 250);

    let samples = robot.telemetry().unwrap().samples_for("line_follow");
    assert!(!samples.is_empty());
    assert!(samples.iter().all(|s| s.left_reading.is_some()));
}

#[test]
fn aligns_against_an_angled_line() {
    let rig = SimRig::new().with_course(vec![(100.0, 400.0)], vec![(140.0, 400.0)]);
    let mut robot = build(&rig, bounded_profile());

    let report = robot.align().unwrap();
    assert!(report.outcome.converged());
    let left = report.left_stopped_at.unwrap();
    let right = report.right_stopped_at.unwrap();
    assert!(left < right);
    assert_eq!(report.outcome.exit_iteration, right);

    // each wheel parked just inside its line
    assert!((100.0..=101.0).contains(&rig.left_wheel.odometer()));
    assert!((140.0..=141.0).contains(&rig.right_wheel.odometer()));
}

#[test]
fn sensor_fault_mid_follow_brakes_and_reports() {
    let rig = SimRig::new();
    let mut robot = build(&rig, bounded_profile());
    rig.right_sensor.fail_after(10);

    let err = robot
        .follow_line_until_crossing(Side::Right, FollowOptions::default())
        .unwrap_err();
    assert!(matches!(err, MotionError::Port(_)));
    assert_eq!(robot.diagnostics().faults(), 1);
    assert_eq!(rig.left_wheel.last_command(), Some(ActuatorCommand::Hold));
}

#[test]
fn tower_from_the_ground_up() {
    let rig = SimRig::new();
    let mut robot = build(&rig, RunProfile::default());

    let tower = robot.build_tower().unwrap();

    let retreats: Vec<Retreat> = tower.placements.iter().map(|p| p.retreat).collect();
    assert_eq!(
        retreats,
        vec![Retreat::Ground, Retreat::Middle, Retreat::Middle, Retreat::Top]
    );
    assert_eq!(tower.claw_closes, 3);
    assert_eq!(robot.diagnostics().timeouts(), 0);
    assert_eq!(rig.lift.clone().angle().unwrap(), 0);

    // one upward run per tier above the ground
    let raises = rig
        .lift
        .commands()
        .iter()
        .filter(|c| matches!(c, ActuatorCommand::RunContinuous { speed } if *speed > 0))
        .count();
    assert_eq!(raises, 3);
}

#[test]
fn stalled_lift_is_bounded_by_raise_timeout() {
    let rig = SimRig::new();
    let mut robot = build(&rig, RunProfile::default());
    rig.lift.set_stalled(true);

    let start = rig.clock.now();
    let report = robot.place(PlacementParams::new(3, 345, 0)).unwrap();
    assert!(report.raise.unwrap().timed_out());
    assert!(rig.clock.now() - start >= Duration::from_millis(4000));
    assert_eq!(robot.diagnostics().timeouts(), 1);
}

#[test]
fn unknown_tier_is_rejected_before_moving() {
    let rig = SimRig::new();
    let mut robot = build(&rig, RunProfile::default());

    let err = robot.place(PlacementParams::new(9, 0, 0)).unwrap_err();
    assert!(matches!(err, MotionError::InvalidTier { tier: 9, .. }));
    assert!(rig.left_wheel.commands().is_empty());
    assert_eq!(robot.diagnostics().faults(), 0);
}

#[test]
fn reset_angle_reads_back_zero() {
    let rig = SimRig::new();
    let mut robot = build(&rig, RunProfile::default());
    robot.move_straight(400).unwrap();

    let drive = robot.drive();
    assert_ne!(drive.angle(Side::Right).unwrap(), 0);
    drive.reset_angle(Side::Right).unwrap();
    assert_eq!(drive.angle(Side::Right).unwrap(), 0);
}

#[test]
fn pivot_moves_one_wheel_only() {
    let rig = SimRig::new();
    let mut robot = build(&rig, RunProfile::default());

    robot.pivot(Side::Right, 500, 360).unwrap();
    assert_eq!(rig.right_wheel.clone().angle().unwrap(), 360);
    assert!(rig.left_wheel.commands().is_empty());
}
