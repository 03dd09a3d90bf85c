use std::env;
use std::error::Error;
use std::time::{Duration, Instant};

use common::{load_profile, RunProfile, TelemetryRecorder};
use criterion::{black_box, Criterion};
use motion::{
    AlignReport, AlignSettings, Aligner, DifferentialDrive, DriveSettings, FollowSettings,
    LineFollower, LoopReport, SensorPair,
};
use sim::{SimActuator, SimClock, SimRig, SimSensor};
use tracing::info;
use tracing_subscriber::EnvFilter;

type SimDrive = DifferentialDrive<SimActuator, SimClock>;

fn parts(rig: &SimRig, profile: &RunProfile) -> (SimDrive, SensorPair<SimSensor>) {
    (
        DifferentialDrive::new(
            rig.left_wheel.clone(),
            rig.right_wheel.clone(),
            rig.clock.clone(),
            DriveSettings::from_profile(profile),
        ),
        SensorPair::new(rig.left_sensor.clone(), rig.right_sensor.clone()),
    )
}

/// One bounded follow over a rippled gray track.
fn follow_once(
    profile: &RunProfile,
    degrees: i32,
    telemetry: Option<&TelemetryRecorder>,
) -> motion::Result<LoopReport> {
    let rig = SimRig::new().with_course(vec![], vec![]);
    let (mut drive, mut sensors) = parts(&rig, profile);
    LineFollower::new(&mut drive, &mut sensors, FollowSettings::from_profile(profile))
        .with_telemetry(telemetry)
        .follow_for(degrees)
}

/// One alignment against a line crossed at an angle.
fn align_once(
    profile: &RunProfile,
    skew: f64,
    telemetry: Option<&TelemetryRecorder>,
) -> motion::Result<AlignReport> {
    let rig = SimRig::new().with_course(vec![(50.0, 400.0)], vec![(50.0 + skew, 400.0)]);
    let (mut drive, mut sensors) = parts(&rig, profile);
    Aligner::new(&mut drive, &mut sensors, AlignSettings::from_profile(profile))
        .with_telemetry(telemetry)
        .align()
}

fn analyze(
    name: &str,
    report: &LoopReport,
    wall: Duration,
    telemetry: &TelemetryRecorder,
    maneuver: &str,
) {
    let iterations = report.exit_iteration.max(1);
    let per_iteration_us = wall.as_secs_f64() * 1e6 / iterations as f64;

    println!("\n=== {} Loop Analysis ===", name);
    println!("Outcome: {:?}", report.state);
    println!("Iterations: {}", report.exit_iteration);
    println!("Simulated time: {:.1} ms", report.elapsed.as_secs_f64() * 1000.0);
    println!("Wall time: {:.2} ms", wall.as_secs_f64() * 1000.0);
    println!(
        "Loop cost: {:.3} us/iteration ({:.0} Hz achievable)",
        per_iteration_us,
        1e6 / per_iteration_us
    );

    let samples = telemetry.samples_for(maneuver);
    let readings: Vec<f64> = samples
        .iter()
        .flat_map(|s| [s.left_reading, s.right_reading])
        .flatten()
        .collect();
    if !readings.is_empty() {
        let avg = readings.iter().sum::<f64>() / readings.len() as f64;
        let min = readings.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = readings.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        println!("Reflectance: avg={:.2}, min={:.2}, max={:.2}", avg, min, max);
    }

    let spread: Vec<i32> = samples
        .iter()
        .filter_map(|s| Some(s.right_speed? - s.left_speed?))
        .collect();
    if let Some(max_spread) = spread.iter().map(|d| d.abs()).max() {
        println!("Max wheel speed spread: {} deg/s", max_spread);
    }
}

fn benchmark_follow(c: &mut Criterion, profile: &RunProfile) {
    c.bench_function("line_follow_720deg", |b| {
        b.iter(|| black_box(follow_once(black_box(profile), 720, None)));
    });
}

fn benchmark_align(c: &mut Criterion, profile: &RunProfile) {
    c.bench_function("align_skewed_line", |b| {
        b.iter(|| black_box(align_once(black_box(profile), 25.0, None)));
    });
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: benchmark_runner <profile_file> [follow|align|both] [--criterion]");
        eprintln!("Example: benchmark_runner configs/profile_default.toml both");
        eprintln!("Example: benchmark_runner configs/profile_default.toml follow --criterion");
        std::process::exit(1);
    }

    let profile_path = &args[1];
    let mode = args.get(2).map(|s| s.as_str()).unwrap_or("both");
    let use_criterion = args.iter().any(|a| a == "--criterion");

    let mut profile = load_profile(profile_path)?;
    // pacing would measure the sleep, not the loop body
    profile.timing.poll_interval_ms = 0;
    let reference = profile.drive.reference_wheel;

    println!("========================================");
    println!("Feedback Loop Benchmark");
    println!("========================================");
    println!("Profile: {} ({})", profile.name, profile_path);
    println!(
        "Gain: {}, base speed: {} deg/s",
        profile.line_follow.gain, profile.line_follow.base_speed
    );
    println!("Reference wheel: {:?}", reference);
    println!("Mode: {}", mode);
    if use_criterion {
        println!("Using Criterion for statistical analysis");
    }
    println!("========================================\n");

    if use_criterion {
        let mut criterion = Criterion::default()
            .sample_size(20)
            .measurement_time(Duration::from_secs(10));

        if mode == "follow" || mode == "both" {
            println!("Running LINE FOLLOW statistical benchmarks...");
            benchmark_follow(&mut criterion, &profile);
        }
        if mode == "align" || mode == "both" {
            println!("\nRunning ALIGNMENT statistical benchmarks...");
            benchmark_align(&mut criterion, &profile);
        }

        println!("\n========================================");
        println!("Criterion statistical analysis complete!");
        println!("Check the target/criterion directory for detailed HTML reports.");
        println!("========================================");
        return Ok(());
    }

    if mode == "follow" || mode == "both" {
        println!("Running LINE FOLLOW loop...");
        let telemetry = TelemetryRecorder::new();
        let start = Instant::now();
        let report = follow_once(&profile, 720, Some(&telemetry))?;
        let wall = start.elapsed();
        info!(iterations = report.exit_iteration, "line follow benchmark done");

        analyze("LINE FOLLOW", &report, wall, &telemetry, "line_follow");
        let rows = telemetry.save_to_csv("line_follow_samples.csv")?;
        println!("{} samples saved to line_follow_samples.csv", rows);
    }

    if mode == "align" || mode == "both" {
        println!("\nRunning ALIGNMENT loop...");
        let telemetry = TelemetryRecorder::new();
        let start = Instant::now();
        let report = align_once(&profile, 25.0, Some(&telemetry))?;
        let wall = start.elapsed();
        info!(iterations = report.outcome.exit_iteration, "alignment benchmark done");

        analyze("ALIGNMENT", &report.outcome, wall, &telemetry, "align");
        println!(
            "Wheels held at iterations: left={:?}, right={:?}",
            report.left_stopped_at, report.right_stopped_at
        );
        let rows = telemetry.save_to_csv("align_samples.csv")?;
        println!("{} samples saved to align_samples.csv", rows);
    }

    println!("\n========================================");
    println!("Benchmark complete!");
    println!("========================================");
    Ok(())
}
