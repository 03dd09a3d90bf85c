//! Error types shared by every crate in the workspace.

use thiserror::Error;

/// Failures reported at the hardware capability boundary.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device reported a fault or stopped answering.
    #[error("hardware fault on {port}: {reason}")]
    Fault { port: String, reason: String },

    /// A blocking bounded command can never finish (the actuator does not move).
    #[error("actuator {port} stalled before reaching its target")]
    Stalled { port: String },

    /// A sensor produced a value outside the normalized reflectance range.
    #[error("reflectance {value} outside [0, 100]")]
    OutOfRange { value: f64 },
}

impl PortError {
    pub fn fault(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fault {
            port: port.into(),
            reason: reason.into(),
        }
    }

    pub fn stalled(port: impl Into<String>) -> Self {
        Self::Stalled { port: port.into() }
    }
}

/// Failures while loading or validating a run profile.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
