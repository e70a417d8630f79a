//! # Ready state
//!
//! The vehicle stands still after a lap attempt. The attempt's result is added to the lap log and,
//! while attempts remain, the next attempt starts after the restart delay.

use log::{info, warn};
use util::{module::State, time::SimpleTimer};

use super::{DrivingReport, LapRecord, LapResult, SystemContext, Transition};

/// Ready state of the system.
#[derive(Debug)]
pub struct Ready {
    result: LapResult,
    report: DrivingReport,

    /// Running while another attempt is pending
    restart_timer: SimpleTimer,
}

impl Ready {
    pub fn new(result: LapResult, report: DrivingReport) -> Self {
        Self {
            result,
            report,
            restart_timer: SimpleTimer::new(),
        }
    }

    /// `true` once all attempts have been driven and the vehicle stays here.
    pub fn is_done(&self) -> bool {
        !self.restart_timer.is_running()
    }
}

impl State for Ready {
    type Context = SystemContext;
    type Transition = Transition;

    fn entry(&mut self, ctx: &mut SystemContext) {
        ctx.board.stop();

        let attempt = ctx.laps.len() as u32 + 1;

        match self.result {
            LapResult::Finished { lap_time_ms } => 
                info!("Attempt {}: lap finished in {} ms", attempt, lap_time_ms),
            result => warn!("Attempt {}: lap aborted ({:?})", attempt, result)
        }
        info!(
            "Attempt {}: {} track losses, {} steering updates",
            attempt, self.report.track_losses, self.report.steering_updates
        );

        ctx.laps.push(LapRecord {
            attempt,
            parameter_set: ctx.params.active_set().name.clone(),
            result: self.result,
            report: self.report,
        });

        if attempt < ctx.params.num_attempts {
            self.restart_timer.start(ctx.params.restart_delay_ms, ctx.board.now_ms());
        }
        else {
            info!("All {} attempts driven", ctx.params.num_attempts);
        }
    }

    fn process(&mut self, ctx: &mut SystemContext) -> Option<Transition> {
        if self.restart_timer.is_timeout(ctx.board.now_ms()) {
            ctx.board.buzzer.play_beep();
            Some(Transition::Drive)
        }
        else {
            None
        }
    }

    fn exit(&mut self, _ctx: &mut SystemContext) {
        self.restart_timer.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{board::mock, params::LeaderExecParams};

    #[test]
    fn test_last_attempt() {
        let (board, hw) = mock::board();
        let mut ctx = SystemContext::new(board, LeaderExecParams::default());

        let result = LapResult::Finished { lap_time_ms: 1234 };
        let mut ready = Ready::new(result, DrivingReport::default());
        ready.entry(&mut ctx);

        assert_eq!(hw.borrow().last_speed(), Some((0, 0)));
        assert_eq!(ctx.laps.len(), 1);
        assert_eq!(ctx.laps[0].attempt, 1);
        assert_eq!(ctx.laps[0].parameter_set, "PD VF");
        assert_eq!(ctx.laps[0].result.lap_time_ms(), Some(1234));
        assert!(ready.is_done());

        hw.borrow_mut().now_ms = 1_000_000;
        assert_eq!(ready.process(&mut ctx), None);
    }

    #[test]
    fn test_restart() {
        let (board, hw) = mock::board();
        let mut params = LeaderExecParams::default();
        params.num_attempts = 2;
        params.restart_delay_ms = 500;
        let mut ctx = SystemContext::new(board, params);

        let mut ready = Ready::new(LapResult::TrackLost, DrivingReport::default());
        ready.entry(&mut ctx);
        assert!(!ready.is_done());
        assert_eq!(ctx.laps[0].result, LapResult::TrackLost);

        hw.borrow_mut().now_ms = 499;
        assert_eq!(ready.process(&mut ctx), None);
        hw.borrow_mut().now_ms = 500;
        assert_eq!(ready.process(&mut ctx), Some(Transition::Drive));

        ready.exit(&mut ctx);

        // The second attempt is the last one
        let mut ready = Ready::new(LapResult::Timeout, DrivingReport::default());
        ready.entry(&mut ctx);
        assert_eq!(ctx.laps.len(), 2);
        assert_eq!(ctx.laps[1].attempt, 2);
        assert!(ready.is_done());
    }
}
