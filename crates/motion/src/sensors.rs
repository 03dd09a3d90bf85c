use common::{SensorPort, SensorSample, Side};

use crate::Result;

/// The two downward-facing reflectance sensors, one per chassis side.
pub struct SensorPair<S> {
    left: S,
    right: S,
}

impl<S: SensorPort> SensorPair<S> {
    pub fn new(left: S, right: S) -> Self {
        Self { left, right }
    }

    /// Read one sensor. Values outside the normalized range are reported as faults.
    pub fn read(&mut self, side: Side) -> Result<SensorSample> {
        let port = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        let raw = port.reflectance()?;
        Ok(SensorSample::new(raw)?)
    }
}
