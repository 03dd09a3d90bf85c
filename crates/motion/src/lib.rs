//! Motion control for a differential-drive robot with a lift and a claw.
//!
//! All maneuvers are written against the port traits in `common`, so they run the same on
//! the physical robot and on the simulated rig. Every blocking loop shares one polling
//! skeleton ([`poll::PollLoop`]) with an optional timeout.

pub mod alignment;
pub mod drive;
pub mod error;
pub mod lift;
pub mod line_follow;
pub mod pick_place;
pub mod poll;
pub mod robot;
pub mod sensors;

pub use alignment::{AlignReport, AlignSettings, Aligner};
pub use drive::{DifferentialDrive, DriveSettings, DriveState};
pub use error::{MotionError, Result};
pub use lift::{ClawSettings, LiftSettings};
pub use line_follow::{FollowExit, FollowSettings, LineFollower};
pub use pick_place::{PickAndPlace, PlacementParams, PlacementReport, Retreat, TowerReport};
pub use poll::{LoopLimits, LoopReport, LoopState, PollLoop};
pub use robot::{FollowOptions, Robot, RobotParts};
pub use sensors::SensorPair;
