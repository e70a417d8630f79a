//! # System state machine
//!
//! The outer application state machine of the leader. Exactly one of the states is active at a
//! time:
//!
//! - `Startup` - The active parameter set is selected, the vehicle waits for the start delay.
//! - `Driving` - The vehicle follows the line from the start line to the end line.
//! - `Ready` - The vehicle is stopped and the result of the last lap attempt is recorded. Another
//!   attempt is started after the restart delay while attempts remain.
//!
//! Allowed transitions are Startup -> Driving, Driving -> Ready and Ready -> Driving. Any other
//! requested transition is rejected and the current state stays active.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod driving;
mod ready;
mod startup;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use serde::Serialize;
use util::module::State;

use crate::{board::Board, params::LeaderExecParams};

pub use self::{
    driving::{Driving, DrivingReport, LineStatus, TrackStatus},
    ready::Ready,
    startup::Startup,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Data lent to the active state every cycle.
pub struct SystemContext {
    /// Hardware collaborators
    pub board: Board,

    /// Executable parameters
    pub params: LeaderExecParams,

    /// Results of all lap attempts so far, oldest first
    pub laps: Vec<LapRecord>,
}

/// Record of a single lap attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LapRecord {
    /// Attempt number, starting at 1
    pub attempt: u32,

    /// Name of the parameter set driven with
    pub parameter_set: String,

    pub result: LapResult,

    pub report: DrivingReport,
}

/// The system state machine.
pub struct SystemStateMachine {
    state: SystemState,

    /// Set once the entry of the initial state has run
    started: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of a lap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LapResult {
    /// The end line was reached.
    Finished { lap_time_ms: u64 },

    /// The track was lost and not found again within the maximum search distance.
    TrackLost,

    /// The maximum duration of an attempt elapsed.
    Timeout,

    /// The line sensors delivered unusable data.
    Fault,
}

/// Transition requested by a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Start a lap attempt.
    Drive,

    /// The lap attempt is over.
    Ready {
        result: LapResult,
        report: DrivingReport,
    },
}

/// The states of the system.
#[derive(Debug)]
pub enum SystemState {
    Startup(Startup),
    Driving(Driving),
    Ready(Ready),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LapResult {
    /// The lap time, if the lap was finished.
    pub fn lap_time_ms(&self) -> Option<u64> {
        match self {
            LapResult::Finished { lap_time_ms } => Some(*lap_time_ms),
            _ => None
        }
    }
}

impl SystemContext {
    pub fn new(board: Board, params: LeaderExecParams) -> Self {
        Self {
            board,
            params,
            laps: Vec::new(),
        }
    }
}

impl SystemState {
    /// Name of the state, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SystemState::Startup(_) => "Startup",
            SystemState::Driving(_) => "Driving",
            SystemState::Ready(_) => "Ready",
        }
    }

    /// The transition table: the state to move to for a requested transition, or `None` if the
    /// transition isn't allowed from this state.
    fn next(&self, transition: Transition) -> Option<SystemState> {
        match (self, transition) {
            (SystemState::Startup(_), Transition::Drive)
            | (SystemState::Ready(_), Transition::Drive) => 
                Some(SystemState::Driving(Driving::new())),
            (SystemState::Driving(_), Transition::Ready { result, report }) => 
                Some(SystemState::Ready(Ready::new(result, report))),
            _ => None
        }
    }
}

impl State for SystemState {
    type Context = SystemContext;
    type Transition = Transition;

    fn entry(&mut self, ctx: &mut SystemContext) {
        match self {
            SystemState::Startup(s) => s.entry(ctx),
            SystemState::Driving(s) => s.entry(ctx),
            SystemState::Ready(s) => s.entry(ctx),
        }
    }

    fn process(&mut self, ctx: &mut SystemContext) -> Option<Transition> {
        match self {
            SystemState::Startup(s) => s.process(ctx),
            SystemState::Driving(s) => s.process(ctx),
            SystemState::Ready(s) => s.process(ctx),
        }
    }

    fn exit(&mut self, ctx: &mut SystemContext) {
        match self {
            SystemState::Startup(s) => s.exit(ctx),
            SystemState::Driving(s) => s.exit(ctx),
            SystemState::Ready(s) => s.exit(ctx),
        }
    }
}

impl SystemStateMachine {
    /// Create a new state machine in the `Startup` state. The entry of `Startup` runs on the first
    /// call to `process`.
    pub fn new() -> Self {
        Self {
            state: SystemState::Startup(Startup::new()),
            started: false,
        }
    }

    /// The currently active state.
    pub fn state(&self) -> &SystemState {
        &self.state
    }

    /// `true` once the last lap attempt is over and no further attempt will start.
    pub fn is_done(&self) -> bool {
        match &self.state {
            SystemState::Ready(r) => r.is_done(),
            _ => false
        }
    }

    /// Step the active state by one cycle, performing any transition it requests.
    pub fn process(&mut self, ctx: &mut SystemContext) {
        if !self.started {
            info!("Entering {} state", self.state.name());
            self.state.entry(ctx);
            self.started = true;
        }

        let transition = match self.state.process(ctx) {
            Some(t) => t,
            None => return
        };

        match self.state.next(transition.clone()) {
            Some(mut next) => {
                info!("{} -> {}", self.state.name(), next.name());
                self.state.exit(ctx);
                next.entry(ctx);
                self.state = next;
            },
            None => warn!(
                "Transition {:?} is not allowed from the {} state, ignored",
                transition,
                self.state.name()
            )
        }
    }
}

impl Default for SystemStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::board::mock;

    fn ctx() -> (SystemContext, mock::SharedHw) {
        let (board, hw) = mock::board();
        (SystemContext::new(board, LeaderExecParams::default()), hw)
    }

    #[test]
    fn test_transition_table() {
        let startup = SystemState::Startup(Startup::new());
        let driving = SystemState::Driving(Driving::new());
        let ready = SystemState::Ready(Ready::new(LapResult::Timeout, DrivingReport::default()));
        let to_ready = Transition::Ready {
            result: LapResult::Fault,
            report: DrivingReport::default()
        };

        assert_eq!(startup.next(Transition::Drive).map(|s| s.name()), Some("Driving"));
        assert_eq!(driving.next(to_ready.clone()).map(|s| s.name()), Some("Ready"));
        assert_eq!(ready.next(Transition::Drive).map(|s| s.name()), Some("Driving"));

        assert!(startup.next(to_ready.clone()).is_none());
        assert!(driving.next(Transition::Drive).is_none());
        assert!(ready.next(to_ready).is_none());
    }

    #[test]
    fn test_startup_to_driving_after_delay() {
        let (mut ctx, hw) = ctx();
        let mut sm = SystemStateMachine::new();

        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Startup");

        hw.borrow_mut().now_ms = ctx.params.start_delay_ms - 1;
        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Startup");

        hw.borrow_mut().now_ms = ctx.params.start_delay_ms;
        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Driving");
        assert_eq!(hw.borrow().beeps, 1);

        // Driving's entry ran in the same cycle
        match sm.state() {
            SystemState::Driving(d) => {
                assert_eq!(d.line_status(), LineStatus::FindStartLine);
                assert_eq!(d.track_status(), TrackStatus::OnTrack);
            },
            s => panic!("Expected Driving, found {}", s.name())
        }
    }

    #[test]
    fn test_attempt_to_ready() {
        let (mut ctx, hw) = ctx();
        ctx.params.start_delay_ms = 0;
        let mut sm = SystemStateMachine::new();

        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Driving");

        // Lose the track and never find it again
        hw.borrow_mut().position = 0;
        sm.process(&mut ctx);
        assert!(hw.borrow().indicator);

        hw.borrow_mut().mileage = ctx.params.max_search_distance_mm + 1;
        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Driving");
        assert!(!sm.is_done());

        sm.process(&mut ctx);
        assert_eq!(sm.state().name(), "Ready");
        assert!(sm.is_done());

        // Driving's exit ran before Ready's entry
        assert!(!hw.borrow().indicator);
        assert_eq!(ctx.laps.len(), 1);
        assert_eq!(ctx.laps[0].result, LapResult::TrackLost);
        assert_eq!(ctx.laps[0].report.track_losses, 1);
    }
}
