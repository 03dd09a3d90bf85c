use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use common::Clock;

/// Simulated time, shared by every simulated device created from it.
///
/// Time only moves when something sleeps or a blocking command runs, so feedback loops
/// become deterministic. Every sleep advances at least `min_step`, which stands in for the
/// minimum sampling interval of real hardware.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
    min_step: Duration,
}

impl SimClock {
    pub fn new() -> Self {
        Self::with_min_step(Duration::from_millis(1))
    }

    pub fn with_min_step(min_step: Duration) -> Self {
        Self {
            now: Rc::new(Cell::new(Duration::ZERO)),
            min_step,
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn min_step(&self) -> Duration {
        self.min_step
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.max(self.min_step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_advances_at_least_min_step() {
        let clock = SimClock::with_min_step(Duration::from_millis(2));
        clock.sleep(Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_millis(2));
        clock.sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(7));
    }

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();
        other.advance(Duration::from_millis(30));
        assert_eq!(clock.now(), Duration::from_millis(30));
    }
}
