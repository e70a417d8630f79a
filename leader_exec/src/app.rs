//! # Application scheduler
//!
//! Runs the leader at a fixed cycle rate. Every cycle, strictly in this order:
//!
//! 1. Inbound speed setpoints are applied and the speedometer is updated.
//! 2. Each control period the drive is actuated, then the odometry is updated, since the odometry
//!    depends on the freshest measured speed.
//! 3. Each reporting period the vehicle data is sent to the telemetry sink.
//! 4. The active system state is stepped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use comms_if::{cmd::SpeedSetpoint, tm::VehicleData};
use util::time::SimpleTimer;

use crate::{
    board::Board,
    params::LeaderExecParams,
    setpoint_client::SetpointClientError,
    system::{LapRecord, SystemContext, SystemStateMachine},
    tm_server::TmServerError,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of setpoint messages handled in one cycle, so a flood of messages can't stall
/// the control loop.
const MAX_SETPOINTS_PER_CYCLE: usize = 16;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Destination of the periodic vehicle data telemetry.
pub trait VehicleDataSink {
    /// Send the data, without blocking.
    fn send_vehicle_data(&mut self, data: &VehicleData) -> Result<(), TmServerError>;
}

/// Source of inbound speed setpoint commands.
pub trait SetpointSource {
    /// Receive the raw payload of one pending setpoint message, or `Ok(None)` if there is none.
    fn recv_setpoint(&mut self) -> Result<Option<Vec<u8>>, SetpointClientError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The leader application.
pub struct App {
    ctx: SystemContext,
    state_machine: SystemStateMachine,

    control_interval: SimpleTimer,
    report_timer: SimpleTimer,

    tm_sink: Option<Box<dyn VehicleDataSink>>,
    setpoint_source: Option<Box<dyn SetpointSource>>,

    /// Number of lap records already handed out by `new_laps`
    num_laps_taken: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl App {
    /// Create the application.
    ///
    /// Without a telemetry sink reporting is disabled for the whole run, without a setpoint source
    /// no setpoints are received.
    pub fn new(
        board: Board,
        params: LeaderExecParams,
        tm_sink: Option<Box<dyn VehicleDataSink>>,
        setpoint_source: Option<Box<dyn SetpointSource>>
    ) -> Self {
        Self {
            ctx: SystemContext::new(board, params),
            state_machine: SystemStateMachine::new(),
            control_interval: SimpleTimer::new(),
            report_timer: SimpleTimer::new(),
            tm_sink,
            setpoint_source,
            num_laps_taken: 0,
        }
    }

    /// Arm the cycle timers. Must be called once before the first `cycle`.
    pub fn setup(&mut self) {
        let now_ms = self.ctx.board.now_ms();

        self.control_interval.start(self.ctx.params.control_period_ms, now_ms);

        if self.tm_sink.is_some() {
            self.report_timer.start(self.ctx.params.reporting_period_ms, now_ms);
        }
        else {
            warn!("No telemetry channel, vehicle data won't be reported");
        }
    }

    /// Run one cycle.
    pub fn cycle(&mut self) {
        self.process_setpoints();
        self.ctx.board.speedometer.process();

        let now_ms = self.ctx.board.now_ms();

        if self.control_interval.is_timeout(now_ms) {
            self.ctx.board.drive.process(self.ctx.params.control_period_ms);

            // Only after the drive, the odometry needs the latest wheel speed
            self.ctx.board.odometry.process();

            self.control_interval.restart(now_ms);
        }

        if self.report_timer.is_timeout(now_ms) {
            self.report_vehicle_data();
            self.report_timer.restart(now_ms);
        }

        self.state_machine.process(&mut self.ctx);
    }

    /// `true` once all lap attempts are over.
    pub fn is_done(&self) -> bool {
        self.state_machine.is_done()
    }

    /// Lap records added since the last call.
    pub fn new_laps(&mut self) -> Vec<LapRecord> {
        let laps = self.ctx.laps[self.num_laps_taken..].to_vec();
        self.num_laps_taken = self.ctx.laps.len();

        laps
    }

    /// All lap records so far.
    pub fn laps(&self) -> &[LapRecord] {
        &self.ctx.laps
    }

    pub fn state_machine(&self) -> &SystemStateMachine {
        &self.state_machine
    }

    /// Current vehicle data from the odometry and the speedometer.
    pub fn vehicle_data(&self) -> VehicleData {
        let board = &self.ctx.board;
        let (x_pos, y_pos) = board.odometry.position();

        VehicleData {
            x_pos,
            y_pos,
            orientation: board.odometry.orientation(),
            left: board.speedometer.linear_speed_left(),
            right: board.speedometer.linear_speed_right(),
            center: board.speedometer.linear_speed_center(),
        }
    }

    fn report_vehicle_data(&mut self) {
        let data = self.vehicle_data();

        if let Some(ref mut sink) = self.tm_sink {
            // Delivery is best effort
            if let Err(e) = sink.send_vehicle_data(&data) {
                warn!("Could not send vehicle data: {}", e);
            }
        }
    }

    fn process_setpoints(&mut self) {
        let source = match self.setpoint_source {
            Some(ref mut s) => s,
            None => return
        };

        for _ in 0..MAX_SETPOINTS_PER_CYCLE {
            let payload = match source.recv_setpoint() {
                Ok(Some(p)) => p,
                Ok(None) => break,
                Err(e) => {
                    warn!("Could not receive setpoint: {}", e);
                    break
                }
            };

            // Malformed setpoints are dropped
            if let Some(sp) = SpeedSetpoint::from_payload(Some(payload.as_slice())) {
                info!("Speed setpoint received: left {}, right {}", sp.left, sp.right);
                self.ctx.board.drive.set_linear_speed(sp.left as i32, sp.right as i32);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use super::*;
    use crate::board::mock::{self, SharedHw};

    struct MockSink(Rc<RefCell<Vec<VehicleData>>>);

    impl VehicleDataSink for MockSink {
        fn send_vehicle_data(&mut self, data: &VehicleData) -> Result<(), TmServerError> {
            self.0.borrow_mut().push(*data);
            Ok(())
        }
    }

    struct MockSource(VecDeque<Vec<u8>>);

    impl SetpointSource for MockSource {
        fn recv_setpoint(&mut self) -> Result<Option<Vec<u8>>, SetpointClientError> {
            Ok(self.0.pop_front())
        }
    }

    fn app(
        sink: Option<Box<dyn VehicleDataSink>>,
        source: Option<Box<dyn SetpointSource>>
    ) -> (App, SharedHw) {
        let (board, hw) = mock::board();
        let mut app = App::new(board, LeaderExecParams::default(), sink, source);
        app.setup();

        (app, hw)
    }

    fn cycle_at(app: &mut App, hw: &SharedHw, now_ms: u64) {
        hw.borrow_mut().now_ms = now_ms;
        app.cycle();
    }

    #[test]
    fn test_cycle_order() {
        let (mut app, hw) = app(None, None);
        let control_period = app.ctx.params.control_period_ms;

        cycle_at(&mut app, &hw, 0);
        assert_eq!(hw.borrow().calls, vec!["speedometer"]);

        hw.borrow_mut().calls.clear();
        cycle_at(&mut app, &hw, control_period);
        assert_eq!(hw.borrow().calls, vec!["speedometer", "drive", "odometry"]);

        // Control interval restarted
        hw.borrow_mut().calls.clear();
        cycle_at(&mut app, &hw, control_period + 1);
        assert_eq!(hw.borrow().calls, vec!["speedometer"]);
    }

    #[test]
    fn test_reporting() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let (mut app, hw) = app(Some(Box::new(MockSink(sent.clone()))), None);
        let period = app.ctx.params.reporting_period_ms;

        {
            let mut hw = hw.borrow_mut();
            hw.xy = (120, -4);
            hw.orientation = 1571;
            hw.speeds = (100, 80, 90);
        }

        cycle_at(&mut app, &hw, period - 1);
        assert!(sent.borrow().is_empty());

        cycle_at(&mut app, &hw, period);
        assert_eq!(
            *sent.borrow(),
            vec![VehicleData {
                x_pos: 120,
                y_pos: -4,
                orientation: 1571,
                left: 100,
                right: 80,
                center: 90
            }]
        );

        cycle_at(&mut app, &hw, 2 * period - 1);
        assert_eq!(sent.borrow().len(), 1);
        cycle_at(&mut app, &hw, 2 * period);
        assert_eq!(sent.borrow().len(), 2);
    }

    #[test]
    fn test_reporting_disabled() {
        let (mut app, hw) = app(None, None);
        assert!(!app.report_timer.is_running());

        // Nothing to report to, the cycle runs regardless
        for t in 0..200 {
            cycle_at(&mut app, &hw, t);
        }
        assert!(!app.report_timer.is_running());
    }

    #[test]
    fn test_setpoints() {
        let payloads = vec![
            SpeedSetpoint { left: 120, right: -30 }.to_payload().to_vec(),
            vec![1, 2, 3],
            Vec::new(),
            vec![0; 8],
        ];
        let source = MockSource(payloads.into_iter().collect());
        let (mut app, hw) = app(None, Some(Box::new(source)));

        cycle_at(&mut app, &hw, 0);

        // Only the well formed setpoint reaches the drive
        assert_eq!(hw.borrow().speed_cmds, vec![(120, -30)]);
    }

    #[test]
    fn test_runs_to_done() {
        let (mut app, hw) = app(None, None);
        let start_delay = app.ctx.params.start_delay_ms;

        for t in 0..=start_delay {
            cycle_at(&mut app, &hw, t);
        }
        assert_eq!(app.state_machine().state().name(), "Driving");
        assert!(app.new_laps().is_empty());

        // Lose the line for longer than the search distance
        hw.borrow_mut().position = 0;
        cycle_at(&mut app, &hw, start_delay + 1);
        hw.borrow_mut().mileage = 10_000;
        cycle_at(&mut app, &hw, start_delay + 2);
        cycle_at(&mut app, &hw, start_delay + 3);

        assert!(app.is_done());
        assert_eq!(app.laps().len(), 1);

        let laps = app.new_laps();
        assert_eq!(laps.len(), 1);
        assert_eq!(laps[0].attempt, 1);
        assert!(app.new_laps().is_empty());
    }
}
