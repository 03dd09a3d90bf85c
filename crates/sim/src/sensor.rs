use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::{Clock, PortError, SensorPort};
use tracing::debug;

use crate::{SimActuator, SimClock};

/// Reflectance along a wheel's travel: dark inside `dark` spans, a gently rippling
/// gray everywhere else.
#[derive(Debug, Clone)]
pub struct Track {
    pub floor: f64,
    pub line: f64,
    pub ripple: f64,
    /// `(start, end)` odometer spans in wheel degrees.
    pub dark: Vec<(f64, f64)>,
}

impl Track {
    pub fn new(dark: Vec<(f64, f64)>) -> Self {
        Self {
            floor: 50.0,
            line: 8.0,
            ripple: 4.0,
            dark,
        }
    }

    pub fn reflectance_at(&self, position: f64) -> f64 {
        if self
            .dark
            .iter()
            .any(|(start, end)| (*start..=*end).contains(&position))
        {
            self.line
        } else {
            (self.floor + self.ripple * (position / 15.0).sin()).clamp(0.0, 100.0)
        }
    }
}

enum Source {
    Constant(f64),
    /// One value per read; the last value repeats.
    Sequence(Vec<f64>),
    /// `before` for reads `0..at`, `after` from read `at` on.
    Step { at: u64, before: f64, after: f64 },
    Track { wheel: SimActuator, track: Track },
    Timed {
        clock: SimClock,
        profile: Box<dyn Fn(Duration) -> f64>,
    },
}

struct SensorState {
    name: String,
    source: Source,
    reads: u64,
    fail_after: Option<u64>,
}

/// Scripted reflectance sensor. Clones share the same script and read counter.
#[derive(Clone)]
pub struct SimSensor {
    state: Rc<RefCell<SensorState>>,
}

impl SimSensor {
    fn with_source(name: impl Into<String>, source: Source) -> Self {
        Self {
            state: Rc::new(RefCell::new(SensorState {
                name: name.into(),
                source,
                reads: 0,
                fail_after: None,
            })),
        }
    }

    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self::with_source(name, Source::Constant(value))
    }

    pub fn sequence(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::with_source(name, Source::Sequence(values))
    }

    pub fn step(name: impl Into<String>, at: u64, before: f64, after: f64) -> Self {
        Self::with_source(name, Source::Step { at, before, after })
    }

    /// Reading follows the odometer of `wheel` over `track`.
    pub fn track(name: impl Into<String>, wheel: SimActuator, track: Track) -> Self {
        Self::with_source(name, Source::Track { wheel, track })
    }

    pub fn timed(
        name: impl Into<String>,
        clock: SimClock,
        profile: impl Fn(Duration) -> f64 + 'static,
    ) -> Self {
        Self::with_source(
            name,
            Source::Timed {
                clock,
                profile: Box::new(profile),
            },
        )
    }

    /// Serve `reads` more readings, then fail.
    pub fn fail_after(&self, reads: u64) {
        let mut state = self.state.borrow_mut();
        state.fail_after = Some(state.reads + reads);
        debug!(sensor = %state.name, reads, "fault scheduled");
    }

    pub fn reads(&self) -> u64 {
        self.state.borrow().reads
    }
}

impl SensorPort for SimSensor {
    fn reflectance(&mut self) -> Result<f64, PortError> {
        let mut state = self.state.borrow_mut();
        let index = state.reads;
        if let Some(limit) = state.fail_after {
            if index >= limit {
                return Err(PortError::fault(state.name.clone(), "no response"));
            }
        }
        state.reads += 1;

        let value = match &state.source {
            Source::Constant(value) => *value,
            Source::Sequence(values) => {
                let i = (index as usize).min(values.len().saturating_sub(1));
                values.get(i).copied().unwrap_or(0.0)
            }
            Source::Step { at, before, after } => {
                if index < *at {
                    *before
                } else {
                    *after
                }
            }
            Source::Track { wheel, track } => track.reflectance_at(wheel.odometer()),
            Source::Timed { clock, profile } => profile(clock.now()),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ActuatorPort;

    #[test]
    fn step_switches_at_read_index() {
        let mut s = SimSensor::step("left", 2, 60.0, 5.0);
        let reads: Vec<f64> = (0..4).map(|_| s.reflectance().unwrap()).collect();
        assert_eq!(reads, vec![60.0, 60.0, 5.0, 5.0]);
        assert_eq!(s.reads(), 4);
    }

    #[test]
    fn sequence_repeats_last_value() {
        let mut s = SimSensor::sequence("left", vec![40.0, 45.0]);
        s.reflectance().unwrap();
        s.reflectance().unwrap();
        assert_eq!(s.reflectance().unwrap(), 45.0);
    }

    #[test]
    fn track_follows_wheel_travel() {
        let clock = SimClock::new();
        let mut wheel = SimActuator::new("left", clock.clone());
        let mut s = SimSensor::track("left", wheel.clone(), Track::new(vec![(90.0, 120.0)]));

        assert!(s.reflectance().unwrap() > 40.0);
        wheel.run(100).unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(s.reflectance().unwrap(), 8.0);
    }

    #[test]
    fn timed_profile_uses_clock() {
        let clock = SimClock::new();
        let mut s = SimSensor::timed("right", clock.clone(), |t| {
            if t >= Duration::from_millis(10) {
                3.0
            } else {
                70.0
            }
        });
        assert_eq!(s.reflectance().unwrap(), 70.0);
        clock.advance(Duration::from_millis(10));
        assert_eq!(s.reflectance().unwrap(), 3.0);
    }

    #[test]
    fn fault_after_reads() {
        let mut s = SimSensor::constant("left", 50.0);
        s.fail_after(1);
        assert!(s.reflectance().is_ok());
        assert!(s.reflectance().is_err());
    }
}
