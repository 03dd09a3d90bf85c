/// Proportional steering law used by the line follower.
///
/// No integral or derivative term: the output depends only on the current reading.
#[derive(Debug, Clone, Copy)]
pub struct ProportionalController {
    gain: f64,
    setpoint: f64,
}

/// Speeds for the two wheels produced by one controller step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    /// `right - left`; positive turns towards the left.
    pub fn differential(&self) -> f64 {
        self.right - self.left
    }

    /// Integer speeds as actuators accept them.
    pub fn rounded(&self) -> (i32, i32) {
        (self.left.round() as i32, self.right.round() as i32)
    }
}

impl ProportionalController {
    pub fn new(gain: f64, setpoint: f64) -> Self {
        Self { gain, setpoint }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn correction(&self, measurement: f64) -> f64 {
        (self.setpoint - measurement) * self.gain
    }

    pub fn wheel_speeds(&self, base_speed: f64, measurement: f64) -> WheelSpeeds {
        let correction = self.correction(measurement);
        WheelSpeeds {
            left: base_speed - correction,
            right: base_speed + correction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_error_drives_straight() {
        let p = ProportionalController::new(2.0, 50.0);
        let speeds = p.wheel_speeds(150.0, 50.0);
        assert_relative_eq!(speeds.left, 150.0);
        assert_relative_eq!(speeds.right, 150.0);
        assert_eq!(speeds.rounded(), (150, 150));
    }

    #[test]
    fn differential_scales_with_gain() {
        let reading = 38.0;
        let base = ProportionalController::new(2.0, 50.0).wheel_speeds(150.0, reading);
        let doubled = ProportionalController::new(4.0, 50.0).wheel_speeds(150.0, reading);
        assert_relative_eq!(doubled.differential(), 2.0 * base.differential());
        assert_relative_eq!(base.differential(), 48.0);
    }

    #[test]
    fn darker_reading_steers_right_wheel_faster() {
        let p = ProportionalController::new(2.0, 50.0);
        let speeds = p.wheel_speeds(100.0, 30.0);
        assert_relative_eq!(speeds.left, 60.0);
        assert_relative_eq!(speeds.right, 140.0);
    }

    #[test]
    fn correction_is_linear_in_error() {
        let p = ProportionalController::new(1.5, 50.0);
        assert_relative_eq!(p.correction(40.0) * 2.0, p.correction(30.0));
        assert_relative_eq!(p.correction(60.0), -15.0);
    }
}
