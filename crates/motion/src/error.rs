//! Error type for every maneuver.

use common::{ConfigError, PortError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MotionError>;

#[derive(Debug, Error)]
pub enum MotionError {
    /// An actuator or sensor failed; the maneuver was aborted.
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("tier {tier} outside a height table of {len} tiers")]
    InvalidTier { tier: usize, len: usize },

    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: i64,
        reason: &'static str,
    },

    #[error("invalid run profile: {0}")]
    Config(#[from] ConfigError),
}

impl MotionError {
    pub fn invalid(name: &'static str, value: impl Into<i64>, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
            reason,
        }
    }

    pub fn is_hardware_fault(&self) -> bool {
        matches!(self, MotionError::Port(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tier_message() {
        let err = MotionError::InvalidTier { tier: 7, len: 4 };
        assert_eq!(format!("{err}"), "tier 7 outside a height table of 4 tiers");
        assert!(!err.is_hardware_fault());
    }

    #[test]
    fn port_errors_are_transparent() {
        let err: MotionError = PortError::stalled("lift").into();
        assert!(err.is_hardware_fault());
        assert!(format!("{err}").contains("lift"));
    }
}
