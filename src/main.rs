mod choreography;
mod menu;

use std::env;
use std::error::Error;

use common::{load_profile, Clock, RunProfile};
use motion::{Robot, RobotParts};
use sim::{SimActuator, SimClock, SimRig, SimSensor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use choreography::CompetitionScript;

const DEFAULT_PROFILE: &str = "configs/profile_default.toml";

type SimRobot = Robot<SimActuator, SimSensor, SimClock>;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let profile_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let profile = load_profile(&profile_path)?;
    info!(path = %profile_path, name = %profile.name, "run profile loaded");

    println!("===========================================");
    println!("Welcome to the Line Tower Robot");
    println!("===========================================");

    loop {
        menu::show_menu(&profile.name);

        match menu::get_user_choice()? {
            Some(1) => run_competition(&profile)?,
            Some(2) => run_tower_only(&profile)?,
            Some(3) => show_profile(&profile)?,
            Some(4) => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please select 1-4."),
        }
    }
    Ok(())
}

fn assemble(rig: &SimRig, profile: &RunProfile) -> motion::Result<SimRobot> {
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
        profile.clone(),
    )
}

fn run_competition(profile: &RunProfile) -> Result<(), Box<dyn Error>> {
    println!("\n=== Competition Run ===");
    menu::wait_for_confirm("competition run")?;

    let rig = choreography::demo_rig();
    let mut robot = assemble(&rig, profile)?;
    match choreography::competition(&mut robot, &CompetitionScript::default()) {
        Ok(summary) => {
            println!("Crossing found after {} iterations", summary.crossing.exit_iteration);
            println!(
                "Aligned: left stopped at {:?}, right at {:?}",
                summary.alignment.left_stopped_at, summary.alignment.right_stopped_at
            );
            println!("Tower: {} placements", summary.tower.placements.len());
        }
        Err(err) => {
            error!(%err, "competition run aborted");
            println!("Run aborted: {err}");
        }
    }
    finish(&rig, &robot, profile)
}

fn run_tower_only(profile: &RunProfile) -> Result<(), Box<dyn Error>> {
    println!("\n=== Tower Only ===");
    menu::wait_for_confirm("tower")?;

    let rig = SimRig::new();
    let mut robot = assemble(&rig, profile)?;
    match choreography::tower_only(&mut robot) {
        Ok(tower) => {
            for placement in &tower.placements {
                println!(
                    "- tier {}: jog {}, retreat {:?} ({} deg){}",
                    placement.params.tier,
                    placement.jog,
                    placement.retreat,
                    placement.retreated,
                    if placement.timed_out() { ", timed out" } else { "" }
                );
            }
        }
        Err(err) => {
            error!(%err, "tower aborted");
            println!("Tower aborted: {err}");
        }
    }
    finish(&rig, &robot, profile)
}

fn finish(rig: &SimRig, robot: &SimRobot, profile: &RunProfile) -> Result<(), Box<dyn Error>> {
    let diagnostics = robot.diagnostics();
    println!("\n=== Run Diagnostics ===");
    println!("Simulated time: {:.2}s", rig.clock.now().as_secs_f64());
    println!("Timeouts: {}", diagnostics.timeouts());
    println!("Hardware faults: {}", diagnostics.faults());

    if let (Some(telemetry), Some(path)) = (robot.telemetry(), &profile.telemetry.csv_path) {
        let rows = telemetry.save_to_csv(path)?;
        println!("Telemetry: {rows} samples written to {path}");
    }

    menu::wait_for_enter()?;
    Ok(())
}

fn show_profile(profile: &RunProfile) -> Result<(), Box<dyn Error>> {
    println!("\n=== Run Profile ===");
    println!("{}", toml::to_string_pretty(profile)?);
    menu::wait_for_enter()?;
    Ok(())
}
