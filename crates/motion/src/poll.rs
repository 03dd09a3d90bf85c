//! Explicit state machine shared by every feedback loop.
//!
//! A loop body reads hardware, then asks [`PollLoop::check`] whether its exit condition
//! holds. The poll loop answers `Converged`, `TimedOut` or `Running` using the injected
//! [`Clock`], and [`PollLoop::pace`] enforces the optional minimum interval between polls.
//! With no timeout the loop runs until its exit condition holds, exactly like an untimed
//! busy-poll, so "no timeout" is just a limit of `None` rather than a separate code path.

use std::time::Duration;

use common::Clock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Converged,
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopLimits {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl LoopLimits {
    pub fn new(timeout: Option<Duration>, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How a finished loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub state: LoopState,
    /// Index of the iteration in which the loop stopped.
    pub exit_iteration: u64,
    pub elapsed: Duration,
}

impl LoopReport {
    pub fn converged(&self) -> bool {
        self.state == LoopState::Converged
    }

    pub fn timed_out(&self) -> bool {
        self.state == LoopState::TimedOut
    }
}

pub struct PollLoop<'c, C: Clock> {
    clock: &'c C,
    limits: LoopLimits,
    started: Duration,
    iteration: u64,
    state: LoopState,
}

impl<'c, C: Clock> PollLoop<'c, C> {
    pub fn start(clock: &'c C, limits: LoopLimits) -> Self {
        Self {
            clock,
            limits,
            started: clock.now(),
            iteration: 0,
            state: LoopState::Running,
        }
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// Decide the state for the current iteration. Convergence wins over a timeout
    /// observed in the same iteration.
    pub fn check(&mut self, converged: bool) -> LoopState {
        if self.state != LoopState::Running {
            return self.state;
        }
        self.state = if converged {
            LoopState::Converged
        } else if self.limits.timeout.is_some_and(|t| self.elapsed() >= t) {
            LoopState::TimedOut
        } else {
            LoopState::Running
        };
        if self.state != LoopState::Running {
            debug!(
                iteration = self.iteration,
                state = ?self.state,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "poll loop finished"
            );
        }
        self.state
    }

    /// Close the current iteration.
    pub fn pace(&mut self) {
        self.clock.sleep(self.limits.poll_interval);
        self.iteration += 1;
    }

    pub fn report(&self) -> LoopReport {
        LoopReport {
            state: self.state,
            exit_iteration: self.iteration,
            elapsed: self.elapsed(),
        }
    }
}

/// Poll `done` until it reports true or the limits run out.
pub fn wait_until<C, E>(
    clock: &C,
    limits: LoopLimits,
    mut done: impl FnMut() -> Result<bool, E>,
) -> Result<LoopReport, E>
where
    C: Clock,
{
    let mut poll = PollLoop::start(clock, limits);
    loop {
        let finished = done()?;
        if poll.check(finished) != LoopState::Running {
            return Ok(poll.report());
        }
        poll.pace();
    }
}
