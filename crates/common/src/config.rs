use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{ConfigError, Side, REFLECTANCE_MAX, REFLECTANCE_MIN};

/// Number of stack levels `build_tower` walks through (ground plus three lifted tiers).
pub const TOWER_TIERS: usize = 4;

/// Every tunable constant for one competition run.
///
/// Profiles are TOML files; any missing section falls back to its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProfile {
    pub name: String,
    pub thresholds: Thresholds,
    pub drive: DriveConfig,
    pub line_follow: LineFollowConfig,
    pub alignment: AlignmentConfig,
    pub lift: LiftConfig,
    pub claw: ClawConfig,
    pub placement: PlacementConfig,
    pub tower: TowerConfig,
    pub timing: TimingConfig,
    pub telemetry: TelemetryConfig,
}

pub fn load_profile(path: impl AsRef<Path>) -> Result<RunProfile, ConfigError> {
    RunProfile::from_file(path)
}

impl RunProfile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let profile: RunProfile = toml::from_str(contents)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        let gain = self.line_follow.gain;
        if !gain.is_finite() || gain < 0.0 {
            return Err(ConfigError::invalid(
                "line_follow.gain",
                format!("{gain} must be finite and non-negative"),
            ));
        }

        for (field, speed) in [
            ("drive.speed", self.drive.speed),
            ("drive.turn_speed", self.drive.turn_speed),
            ("line_follow.base_speed", self.line_follow.base_speed),
            ("alignment.speed", self.alignment.speed),
            ("lift.speed", self.lift.speed),
            ("claw.speed", self.claw.speed),
            ("placement.jog_speed", self.placement.jog_speed),
        ] {
            if speed == 0 {
                return Err(ConfigError::invalid(field, "speed must be non-zero"));
            }
        }

        if self.lift.tiers.len() != TOWER_TIERS {
            return Err(ConfigError::invalid(
                "lift.tiers",
                format!(
                    "expected {TOWER_TIERS} tiers, got {}",
                    self.lift.tiers.len()
                ),
            ));
        }

        for (field, distance) in [
            ("placement.jog_distance", self.placement.jog_distance),
            ("placement.top_retreat", self.placement.top_retreat),
            ("placement.mid_retreat_first", self.placement.mid_retreat_first),
            ("placement.mid_retreat_rest", self.placement.mid_retreat_rest),
            ("placement.ground_retreat", self.placement.ground_retreat),
            (
                "placement.ground_final_retreat",
                self.placement.ground_final_retreat,
            ),
        ] {
            if distance < 0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("distance {distance} must not be negative"),
                ));
            }
        }

        if let Some(offset) = self.tower.offsets.iter().find(|o| **o < 0) {
            return Err(ConfigError::invalid(
                "tower.offsets",
                format!("offset {offset} must not be negative"),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Readings strictly below this are "on the dark line".
    pub line: f64,
    /// Mid-gray target the line follower steers towards.
    pub setpoint: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            line: 20.0,
            setpoint: 50.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = REFLECTANCE_MIN..=REFLECTANCE_MAX;
        if !range.contains(&self.line) {
            return Err(ConfigError::invalid(
                "thresholds.line",
                format!("{} outside [0, 100]", self.line),
            ));
        }
        if !range.contains(&self.setpoint) {
            return Err(ConfigError::invalid(
                "thresholds.setpoint",
                format!("{} outside [0, 100]", self.setpoint),
            ));
        }
        if self.setpoint <= self.line {
            return Err(ConfigError::invalid(
                "thresholds.setpoint",
                format!(
                    "{} must be above the line threshold {}",
                    self.setpoint, self.line
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub speed: i32,
    pub turn_speed: i32,
    /// Wheel that runs continuously in paired moves and whose counter measures distance.
    pub reference_wheel: Side,
    /// Upper bound on waiting for a bounded wheel command. `None` waits forever.
    pub wait_timeout_ms: Option<u64>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            speed: 200,
            turn_speed: 150,
            reference_wheel: Side::Left,
            wait_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LineFollowConfig {
    pub gain: f64,
    pub base_speed: i32,
    pub primary_sensor: Side,
    pub timeout_ms: Option<u64>,
}

impl Default for LineFollowConfig {
    fn default() -> Self {
        Self {
            gain: 2.0,
            base_speed: 150,
            primary_sensor: Side::Left,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub speed: i32,
    pub timeout_ms: Option<u64>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            speed: 100,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftConfig {
    pub tiers: HeightTierTable,
    pub speed: i32,
    /// Wall-clock bound on any lift move. `None` polls until the target is reached.
    pub raise_timeout_ms: Option<u64>,
    pub settle_speed: i32,
    pub settle_ms: u64,
}

impl Default for LiftConfig {
    fn default() -> Self {
        Self {
            tiers: HeightTierTable::default(),
            speed: 400,
            raise_timeout_ms: Some(4000),
            settle_speed: -200,
            settle_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClawConfig {
    /// Opening speed; closing runs at the negated value.
    pub speed: i32,
    pub duration_ms: u64,
}

impl Default for ClawConfig {
    fn default() -> Self {
        Self {
            speed: 1000,
            duration_ms: 500,
        }
    }
}

/// Distances (wheel degrees) used by the pick-and-place script.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub jog_distance: i32,
    pub jog_speed: i32,
    pub top_retreat: i32,
    pub mid_retreat_first: i32,
    pub mid_retreat_rest: i32,
    pub ground_retreat: i32,
    pub ground_final_retreat: i32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            jog_distance: 60,
            jog_speed: 150,
            top_retreat: 200,
            mid_retreat_first: 90,
            mid_retreat_rest: 110,
            ground_retreat: 180,
            ground_final_retreat: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    pub offsets: [i32; TOWER_TIERS],
    pub corrections: [i32; TOWER_TIERS],
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            offsets: [0, 170, 255, 345],
            corrections: [0; TOWER_TIERS],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum pause between polls of any feedback loop. Zero polls as fast as the
    /// hardware allows.
    pub poll_interval_ms: u64,
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub csv_path: Option<String>,
}

pub fn millis(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_millis)
}

/// Absolute lift angles per stack tier. Index 0 is the ground and never moves the lift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct HeightTierTable(Vec<i32>);

impl HeightTierTable {
    pub fn new(angles: Vec<i32>) -> Result<Self, ConfigError> {
        match angles.first() {
            None => return Err(ConfigError::invalid("lift.tiers", "table is empty")),
            Some(&ground) if ground != 0 => {
                return Err(ConfigError::invalid(
                    "lift.tiers",
                    format!("ground tier must be 0, got {ground}"),
                ))
            }
            Some(_) => {}
        }
        if let Some(pair) = angles.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ConfigError::invalid(
                "lift.tiers",
                format!("tiers must strictly increase ({} then {})", pair[0], pair[1]),
            ));
        }
        Ok(Self(angles))
    }

    pub fn get(&self, tier: usize) -> Option<i32> {
        self.0.get(tier).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the highest tier.
    pub fn top(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl Default for HeightTierTable {
    fn default() -> Self {
        Self(vec![0, 120, 240, 360])
    }
}

impl TryFrom<Vec<i32>> for HeightTierTable {
    type Error = ConfigError;

    fn try_from(angles: Vec<i32>) -> Result<Self, Self::Error> {
        Self::new(angles)
    }
}

impl From<HeightTierTable> for Vec<i32> {
    fn from(table: HeightTierTable) -> Self {
        table.0
    }
}
