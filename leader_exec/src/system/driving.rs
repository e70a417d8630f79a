//! # Driving state
//!
//! Follows the line from the start line to the end line and measures the lap time.
//!
//! Each cycle the fused line position is read and smoothed. While on track the steering PID
//! controller is run at its own fixed period and the debounced start/end line detector advances
//! the line status. If the smoothed position shows a gap the vehicle drives straight on, looking
//! for the line with the raw (unsmoothed) position, until the maximum search distance is used up.
//! The whole attempt is bounded by the observation timer.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, trace, warn};
use serde::Serialize;
use util::{maths::MovingAverage, module::State, time::SimpleTimer};

use super::{LapResult, SystemContext, Transition};
use crate::{
    board::Board,
    line_detect::{is_track_gap, StartEndLineDetector},
    pid_ctrl::PidController,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of position samples averaged for the gap detection while on track.
const POS_MOV_AVG_SIZE: usize = 2;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Driving state of the system.
#[derive(Debug)]
pub struct Driving {
    /// Bounds the duration of the whole attempt
    observation_timer: SimpleTimer,

    /// Paces the steering controller
    pid_process_timer: SimpleTimer,

    /// Measures the lap time from the start line
    lap_timer: SimpleTimer,

    line_status: LineStatus,
    track_status: TrackStatus,

    pos_mov_avg: MovingAverage<i32, POS_MOV_AVG_SIZE>,
    line_detector: StartEndLineDetector,
    pid_ctrl: PidController,

    /// Top speed of the active parameter set
    top_speed: i32,

    /// Set once the attempt is over
    result: Option<LapResult>,

    report: DrivingReport,
}

/// Counters describing one lap attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrivingReport {
    /// Number of times the track was lost
    pub track_losses: u32,

    /// Number of times the PID history was resynchronised after finding the track again
    pub pid_resyncs: u32,

    /// Number of steering calculations
    pub steering_updates: u32,

    /// Number of times the observation timer cut the attempt off
    pub safety_cutoffs: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Progress along the track. Only ever moves forward within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LineStatus {
    FindStartLine,
    StartLineDetected,
    FindEndLine,
}

/// Whether the vehicle currently sees the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    OnTrack,
    Lost,
    Finished,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Driving {
    pub fn new() -> Self {
        Self {
            observation_timer: SimpleTimer::new(),
            pid_process_timer: SimpleTimer::new(),
            lap_timer: SimpleTimer::new(),
            line_status: LineStatus::FindStartLine,
            track_status: TrackStatus::OnTrack,
            pos_mov_avg: MovingAverage::new(),
            line_detector: StartEndLineDetector::new(),
            pid_ctrl: PidController::new(),
            top_speed: 0,
            result: None,
            report: DrivingReport::default(),
        }
    }

    pub fn line_status(&self) -> LineStatus {
        self.line_status
    }

    pub fn track_status(&self) -> TrackStatus {
        self.track_status
    }

    pub fn report(&self) -> &DrivingReport {
        &self.report
    }

    /// Finish the attempt with the given result, stopping the vehicle straight away.
    fn finish(&mut self, board: &mut Board, result: LapResult) {
        // Stop before anything else
        board.stop();

        match result {
            LapResult::Finished { .. } => board.buzzer.play_beep(),
            _ => board.buzzer.play_alarm(),
        }

        self.track_status = TrackStatus::Finished;
        self.result = Some(result);
    }

    fn process_on_track(
        &mut self,
        board: &mut Board,
        position: i32,
        pid_period_ms: u64,
        now_ms: u64
    ) {
        // Track lost just now?
        if is_track_gap(self.pos_mov_avg.result(), board.max_position()) {
            info!("Track lost at position {}", position);
            self.track_status = TrackStatus::Lost;
            self.report.track_losses += 1;

            // The search distance is measured from here
            board.odometry.clear_mileage();
            board.indicator.enable(true);
            return;
        }

        let line_detected = self.line_detector.update(board.line_sensors.sensor_values());

        match (line_detected, self.line_status) {
            (true, LineStatus::FindStartLine) => {
                info!("Start line detected");
                self.line_status = LineStatus::StartLineDetected;
                board.buzzer.play_beep();
                self.lap_timer.start(0, now_ms);
            },
            (true, LineStatus::FindEndLine) => {
                let lap_time_ms = self.lap_timer.current_duration(now_ms);
                info!("End line detected, lap time {} ms", lap_time_ms);
                self.finish(board, LapResult::Finished { lap_time_ms });
            },
            (false, LineStatus::StartLineDetected) => {
                self.line_status = LineStatus::FindEndLine;
            },
            _ => ()
        }

        if self.track_status != TrackStatus::Finished && self.pid_process_timer.is_timeout(now_ms) {
            self.adapt_driving(board, position, now_ms);
            self.pid_process_timer.start(pid_period_ms, now_ms);
        }
    }

    fn process_track_lost(
        &mut self,
        board: &mut Board,
        position: i32,
        max_search_distance_mm: u32
    ) {
        // Back on track? Checked on the raw position, not the smoothed one.
        if !is_track_gap(position, board.max_position()) {
            info!("Track found again at position {}", position);
            self.track_status = TrackStatus::OnTrack;
            self.pid_ctrl.resync();
            self.report.pid_resyncs += 1;
            board.indicator.enable(false);
        }
        else if board.odometry.mileage_center() > max_search_distance_mm {
            warn!(
                "Track not found within {} mm, aborting the attempt",
                max_search_distance_mm
            );
            self.finish(board, LapResult::TrackLost);
        }
        else {
            // Drive straight on, best effort to find the track again
            board.drive.set_linear_speed(self.top_speed, self.top_speed);
        }
    }

    /// Run the steering controller and command the drive.
    fn adapt_driving(&mut self, board: &mut Board, position: i32, now_ms: u64) {
        // The line is followed when it's under the middle of the sensor array
        let set_point = board.max_position() / 2;

        let speed_difference = self.pid_ctrl.calculate(set_point, position, now_ms);

        // One wheel always turns at top speed, the other one slows down to at most standstill.
        // The vehicle never reverses to steer.
        let left = self.top_speed.saturating_sub(speed_difference).max(0).min(self.top_speed);
        let right = self.top_speed.saturating_add(speed_difference).max(0).min(self.top_speed);

        trace!(
            "Position {}, speed difference {}, left {}, right {}",
            position, speed_difference, left, right
        );

        board.drive.set_linear_speed(left, right);
        self.report.steering_updates += 1;
    }

    /// `true` if the sensor data can't be used for driving.
    fn is_sensor_fault(board: &Board) -> bool {
        let sensors = &board.line_sensors;
        let num_sensors = sensors.num_sensors();
        let value_max = sensors.sensor_value_max();

        num_sensors < 2
            || sensors.sensor_values().len() != num_sensors
            || sensors.sensor_values().iter().any(|v| *v > value_max)
    }
}

impl State for Driving {
    type Context = SystemContext;
    type Transition = Transition;

    fn entry(&mut self, ctx: &mut SystemContext) {
        let now_ms = ctx.board.now_ms();
        let set = ctx.params.active_set();
        let max_speed = ctx.board.drive.max_motor_speed();

        self.observation_timer.start(ctx.params.observation_duration_ms, now_ms);
        // First steering update right away
        self.pid_process_timer.start(0, now_ms);
        self.lap_timer.stop();
        self.line_status = LineStatus::FindStartLine;

        // Assume the vehicle has been placed on the track
        self.track_status = TrackStatus::OnTrack;

        self.pos_mov_avg.clear();
        self.line_detector.clear();
        self.result = None;
        self.report = DrivingReport::default();

        if set.top_speed > max_speed {
            warn!(
                "Top speed {} of parameter set \"{}\" exceeds the drive's maximum, limited to {}",
                set.top_speed, set.name, max_speed
            );
        }
        self.top_speed = set.top_speed.min(max_speed);
        self.pid_ctrl.clear();
        self.pid_ctrl.set_p_factor(set.kp);
        self.pid_ctrl.set_i_factor(set.ki);
        self.pid_ctrl.set_d_factor(set.kd);
        self.pid_ctrl.set_sample_time(ctx.params.pid_process_period_ms);
        self.pid_ctrl.set_limits(-max_speed, max_speed);
        self.pid_ctrl.set_derivative_on_measurement(true);

        info!("Driving with parameter set \"{}\", top speed {}", set.name, self.top_speed);
    }

    fn process(&mut self, ctx: &mut SystemContext) -> Option<Transition> {
        let board = &mut ctx.board;
        let now_ms = board.now_ms();

        // Max. time for the attempt over? This overrides everything else in this cycle.
        if self.track_status != TrackStatus::Finished && self.observation_timer.is_timeout(now_ms) {
            warn!("Maximum attempt duration elapsed, stopping");
            self.report.safety_cutoffs += 1;
            self.finish(board, LapResult::Timeout);
            return None;
        }

        let position = board.line_sensors.read_line();
        self.pos_mov_avg.write(position);

        if self.track_status != TrackStatus::Finished && Self::is_sensor_fault(board) {
            warn!(
                "Unusable line sensor data for {} sensors (max value {}): {:?}",
                board.line_sensors.num_sensors(),
                board.line_sensors.sensor_value_max(),
                board.line_sensors.sensor_values()
            );
            self.finish(board, LapResult::Fault);
        }

        match self.track_status {
            TrackStatus::OnTrack => self.process_on_track(
                board, position, ctx.params.pid_process_period_ms, now_ms
            ),
            TrackStatus::Lost => self.process_track_lost(
                board, position, ctx.params.max_search_distance_mm
            ),
            TrackStatus::Finished => {
                return Some(Transition::Ready {
                    result: self.result.unwrap_or(LapResult::Fault),
                    report: self.report,
                })
            }
        }

        None
    }

    fn exit(&mut self, ctx: &mut SystemContext) {
        self.observation_timer.stop();
        ctx.board.indicator.enable(false);
    }
}

impl Default for Driving {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
