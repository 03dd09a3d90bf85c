use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::{ActuatorCommand, ActuatorPort, Clock, PortError, Wait};
use tracing::debug;

use crate::SimClock;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Idle,
    Holding,
    Continuous { speed: f64 },
    ToTarget { speed: f64, target: f64 },
    Timed { speed: f64, until: Duration },
}

/// A command as it reached the simulated motor, stamped with simulated time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedCommand {
    pub at: Duration,
    pub command: ActuatorCommand,
}

#[derive(Debug)]
struct MotorState {
    name: String,
    angle: f64,
    odometer: f64,
    motion: Motion,
    last_update: Duration,
    stalled: bool,
    fail_after: Option<usize>,
    calls: usize,
    encoder_fail_after: Option<usize>,
    encoder_reads: usize,
    log: Vec<LoggedCommand>,
}

impl MotorState {
    /// Integrate motion from the last update up to `now`.
    fn sync(&mut self, now: Duration) {
        let previous = self.last_update;
        self.last_update = now;
        let dt = now.saturating_sub(previous).as_secs_f64();

        match self.motion {
            Motion::Idle | Motion::Holding => {}
            Motion::Continuous { speed } => {
                if !self.stalled {
                    self.advance(speed * dt);
                }
            }
            Motion::ToTarget { speed, target } => {
                if self.stalled {
                    return;
                }
                let remaining = target - self.angle;
                let step = speed.abs() * dt;
                if step >= remaining.abs() {
                    self.advance(remaining);
                    self.motion = Motion::Holding;
                } else {
                    self.advance(step * remaining.signum());
                }
            }
            Motion::Timed { speed, until } => {
                if !self.stalled {
                    let active = now.min(until).saturating_sub(previous).as_secs_f64();
                    self.advance(speed * active);
                }
                if now >= until {
                    self.motion = Motion::Holding;
                }
            }
        }
    }

    fn advance(&mut self, delta: f64) {
        self.angle += delta;
        self.odometer += delta;
    }

    fn check_fault(&mut self) -> Result<(), PortError> {
        self.calls += 1;
        match self.fail_after {
            Some(limit) if self.calls > limit => {
                Err(PortError::fault(self.name.clone(), "device stopped responding"))
            }
            _ => Ok(()),
        }
    }

    fn check_encoder(&mut self) -> Result<(), PortError> {
        self.encoder_reads += 1;
        match self.encoder_fail_after {
            Some(limit) if self.encoder_reads > limit => {
                Err(PortError::fault(self.name.clone(), "encoder stopped counting"))
            }
            _ => Ok(()),
        }
    }
}

/// Simulated rotary actuator with lazy kinematics.
///
/// Position is integrated from the commanded speed whenever the motor is touched, using
/// the shared [`SimClock`]. Clones are handles to the same motor, so a test can keep one
/// while the robot owns another.
#[derive(Debug, Clone)]
pub struct SimActuator {
    clock: SimClock,
    state: Rc<RefCell<MotorState>>,
}

impl SimActuator {
    pub fn new(name: impl Into<String>, clock: SimClock) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            state: Rc::new(RefCell::new(MotorState {
                name: name.into(),
                angle: 0.0,
                odometer: 0.0,
                motion: Motion::Idle,
                last_update,
                stalled: false,
                fail_after: None,
                calls: 0,
                encoder_fail_after: None,
                encoder_reads: 0,
                log: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// A stalled motor accepts commands but never moves.
    pub fn set_stalled(&self, stalled: bool) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.sync(now);
        state.stalled = stalled;
        debug!(motor = %state.name, stalled, "stall injected");
    }

    /// Answer the first `calls` port calls, then report a hardware fault on every call.
    pub fn fail_after(&self, calls: usize) {
        let mut state = self.state.borrow_mut();
        state.fail_after = Some(state.calls + calls);
        debug!(motor = %state.name, calls, "fault scheduled");
    }

    /// Answer the next `reads` angle reads, then fail every read. Commands keep working.
    pub fn fail_encoder_after(&self, reads: usize) {
        let mut state = self.state.borrow_mut();
        state.encoder_fail_after = Some(state.encoder_reads + reads);
        debug!(motor = %state.name, reads, "encoder fault scheduled");
    }

    /// Exact angle since the last reset, without rounding.
    pub fn raw_angle(&self) -> f64 {
        let mut state = self.state.borrow_mut();
        state.sync(self.clock.now());
        state.angle
    }

    /// Total signed travel since creation. Unaffected by resets.
    pub fn odometer(&self) -> f64 {
        let mut state = self.state.borrow_mut();
        state.sync(self.clock.now());
        state.odometer
    }

    pub fn is_holding(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.sync(self.clock.now());
        state.motion == Motion::Holding
    }

    pub fn log(&self) -> Vec<LoggedCommand> {
        self.state.borrow().log.clone()
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.state.borrow().log.iter().map(|l| l.command).collect()
    }

    pub fn last_command(&self) -> Option<ActuatorCommand> {
        self.state.borrow().log.last().map(|l| l.command)
    }

    fn begin(&self, command: ActuatorCommand) -> Result<(), PortError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.check_fault()?;
        state.sync(now);
        state.log.push(LoggedCommand { at: now, command });
        Ok(())
    }
}

impl ActuatorPort for SimActuator {
    fn run(&mut self, speed: i32) -> Result<(), PortError> {
        self.begin(ActuatorCommand::RunContinuous { speed })?;
        self.state.borrow_mut().motion = Motion::Continuous {
            speed: f64::from(speed),
        };
        Ok(())
    }

    fn run_to_angle(
        &mut self,
        speed: i32,
        angle_delta: i32,
        wait: Wait,
    ) -> Result<i32, PortError> {
        self.begin(ActuatorCommand::RunToAngle {
            speed,
            target_delta: angle_delta,
            wait,
        })?;

        let (target, stalled) = {
            let mut state = self.state.borrow_mut();
            let target = state.angle + f64::from(angle_delta);
            state.motion = Motion::ToTarget {
                speed: f64::from(speed),
                target,
            };
            (target, state.stalled)
        };

        if wait == Wait::Block {
            if angle_delta != 0 && (stalled || speed == 0) {
                return Err(PortError::stalled(self.name()));
            }
            let travel = f64::from(angle_delta.abs()) / f64::from(speed.abs().max(1));
            self.clock.advance(Duration::from_secs_f64(travel));

            let now = self.clock.now();
            let mut state = self.state.borrow_mut();
            state.sync(now);
            if let Motion::ToTarget { .. } = state.motion {
                // float residue from the duration round-trip
                let remaining = target - state.angle;
                state.advance(remaining);
                state.motion = Motion::Holding;
            }
        }
        self.angle()
    }

    fn run_for_duration(
        &mut self,
        speed: i32,
        duration: Duration,
        wait: Wait,
    ) -> Result<(), PortError> {
        self.begin(ActuatorCommand::RunForDuration {
            speed,
            duration,
            wait,
        })?;
        let until = self.clock.now() + duration;
        self.state.borrow_mut().motion = Motion::Timed {
            speed: f64::from(speed),
            until,
        };
        if wait == Wait::Block {
            self.clock.advance(duration);
            self.state.borrow_mut().sync(self.clock.now());
        }
        Ok(())
    }

    fn hold(&mut self) -> Result<(), PortError> {
        self.begin(ActuatorCommand::Hold)?;
        self.state.borrow_mut().motion = Motion::Holding;
        Ok(())
    }

    fn angle(&mut self) -> Result<i32, PortError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.check_fault()?;
        state.check_encoder()?;
        state.sync(now);
        Ok(state.angle.round() as i32)
    }

    fn reset_angle(&mut self, origin: i32) -> Result<(), PortError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.check_fault()?;
        state.sync(now);
        let shift = f64::from(origin) - state.angle;
        state.angle = f64::from(origin);
        if let Motion::ToTarget { target, speed } = state.motion {
            state.motion = Motion::ToTarget {
                speed,
                target: target + shift,
            };
        }
        Ok(())
    }

    fn is_done(&mut self) -> Result<bool, PortError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.check_fault()?;
        state.sync(now);
        Ok(!matches!(
            state.motion,
            Motion::ToTarget { .. } | Motion::Timed { .. }
        ))
    }
}
