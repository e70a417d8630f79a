//! # Startup state
//!
//! Gives the operator time to step away from the vehicle before the first attempt.

use log::info;
use util::{module::State, time::SimpleTimer};

use super::{SystemContext, Transition};

/// Startup state of the system.
#[derive(Debug, Default)]
pub struct Startup {
    start_delay_timer: SimpleTimer,
}

impl Startup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State for Startup {
    type Context = SystemContext;
    type Transition = Transition;

    fn entry(&mut self, ctx: &mut SystemContext) {
        let set = ctx.params.active_set();
        info!(
            "Parameter set {} \"{}\" selected: top speed {}, kp {}/{}, ki {}/{}, kd {}/{}",
            ctx.params.active_parameter_set,
            set.name,
            set.top_speed,
            set.kp.num, set.kp.den,
            set.ki.num, set.ki.den,
            set.kd.num, set.kd.den
        );

        self.start_delay_timer.start(ctx.params.start_delay_ms, ctx.board.now_ms());
    }

    fn process(&mut self, ctx: &mut SystemContext) -> Option<Transition> {
        if self.start_delay_timer.is_timeout(ctx.board.now_ms()) {
            ctx.board.buzzer.play_beep();
            Some(Transition::Drive)
        }
        else {
            None
        }
    }

    fn exit(&mut self, _ctx: &mut SystemContext) {
        self.start_delay_timer.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{board::mock, params::LeaderExecParams};

    #[test]
    fn test_start_delay() {
        let (board, hw) = mock::board();
        let mut params = LeaderExecParams::default();
        params.start_delay_ms = 100;
        let mut ctx = SystemContext::new(board, params);

        hw.borrow_mut().now_ms = 50;
        let mut startup = Startup::new();
        startup.entry(&mut ctx);

        hw.borrow_mut().now_ms = 149;
        assert_eq!(startup.process(&mut ctx), None);
        assert_eq!(hw.borrow().beeps, 0);

        hw.borrow_mut().now_ms = 150;
        assert_eq!(startup.process(&mut ctx), Some(Transition::Drive));
        assert_eq!(hw.borrow().beeps, 1);

        // Nothing is driven before the lap attempt
        assert!(hw.borrow().speed_cmds.is_empty());
    }
}
