use crate::{SimActuator, SimClock, SimSensor, Track};

/// Reflectance of the mid-gray mat the simulated sensors see by default.
pub const MAT_GRAY: f64 = 50.0;

/// Every simulated device of one robot, as cheap shared handles.
///
/// Clone the rig (or individual fields) to keep inspection handles while a robot owns
/// the devices.
#[derive(Clone)]
pub struct SimRig {
    pub clock: SimClock,
    pub left_wheel: SimActuator,
    pub right_wheel: SimActuator,
    pub lift: SimActuator,
    pub claw: SimActuator,
    pub left_sensor: SimSensor,
    pub right_sensor: SimSensor,
}

impl SimRig {
    pub fn new() -> Self {
        Self::with_clock(SimClock::new())
    }

    pub fn with_clock(clock: SimClock) -> Self {
        Self {
            left_wheel: SimActuator::new("left wheel", clock.clone()),
            right_wheel: SimActuator::new("right wheel", clock.clone()),
            lift: SimActuator::new("lift", clock.clone()),
            claw: SimActuator::new("claw", clock.clone()),
            left_sensor: SimSensor::constant("left sensor", MAT_GRAY),
            right_sensor: SimSensor::constant("right sensor", MAT_GRAY),
            clock,
        }
    }

    pub fn with_sensors(mut self, left: SimSensor, right: SimSensor) -> Self {
        self.left_sensor = left;
        self.right_sensor = right;
        self
    }

    /// Lay dark lines under each sensor, keyed to the travel of the wheel on that side.
    pub fn with_course(self, left_dark: Vec<(f64, f64)>, right_dark: Vec<(f64, f64)>) -> Self {
        let left = SimSensor::track("left sensor", self.left_wheel.clone(), Track::new(left_dark));
        let right = SimSensor::track(
            "right sensor",
            self.right_wheel.clone(),
            Track::new(right_dark),
        );
        self.with_sensors(left, right)
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ActuatorPort, Clock, SensorPort};
    use std::time::Duration;

    #[test]
    fn devices_share_the_rig_clock() {
        let rig = SimRig::new();
        let mut wheel = rig.left_wheel.clone();
        wheel.run(90).unwrap();
        rig.clock.sleep(Duration::from_secs(2));
        assert_eq!(rig.left_wheel.clone().angle().unwrap(), 180);
    }

    #[test]
    fn course_darkens_under_matching_side() {
        let rig = SimRig::new().with_course(vec![], vec![(0.0, 10.0)]);
        let mut left = rig.left_sensor.clone();
        let mut right = rig.right_sensor.clone();
        assert!(left.reflectance().unwrap() > 40.0);
        assert!(right.reflectance().unwrap() < 10.0);
    }
}
