//! # Simulation board
//!
//! A kinematic simulation of the vehicle on a straight test track, implementing all hardware
//! collaborators of the [`Board`]. Nothing here is physically accurate: the wheels reach their
//! demanded speed instantly and the odometry is perfect. It's good enough to drive the control
//! core through whole laps without hardware.
//!
//! The track runs along the world x axis at y = 0. The start and end lines are bands across the
//! whole sensor array, gaps are regions of the track without a line.
//!
//! The simulation clock only moves when [`Sim::advance`] is called, so runs are deterministic.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cell::RefCell, rc::Rc};

use log::{debug, info};
use serde::Deserialize;

use crate::board::{
    max_position, Board, Buzzer, Clock, Drive, Indicator, LineSensors, Odometry,
    Speedometer, POSITION_PER_SENSOR,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Channel value below which a sensor's reading doesn't contribute to the fused position.
const SENSOR_NOISE_THRESHOLD: u16 = 50;

/// Channel value above which a sensor is considered to see the line, for the fused position.
const SENSOR_LINE_THRESHOLD: u16 = 200;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated vehicle and track.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Number of line sensors
    pub num_sensors: usize,

    /// Lateral distance between two neighbouring sensors.
    ///
    /// Units: mm
    pub sensor_spacing_mm: f64,

    /// Distance of the sensor array ahead of the wheel axle.
    ///
    /// Units: mm
    pub sensor_offset_mm: f64,

    /// Maximum value of a single sensor channel
    pub sensor_value_max: u16,

    /// Width of the line.
    ///
    /// Units: mm
    pub line_width_mm: f64,

    /// Distance over which a sensor's reading fades out beyond the edge of the line.
    ///
    /// Units: mm
    pub line_edge_mm: f64,

    /// Position of the start of the start line band along the track.
    ///
    /// Units: mm
    pub start_line_x_mm: f64,

    /// Position of the start of the end line band along the track.
    ///
    /// Units: mm
    pub end_line_x_mm: f64,

    /// Length of the start and end line bands along the track.
    ///
    /// Units: mm
    pub line_band_mm: f64,

    /// Regions of the track without a line
    pub gaps: Vec<GapRegion>,

    /// Distance between the wheels.
    ///
    /// Units: mm
    pub wheel_base_mm: f64,

    /// Number of encoder steps per mm of wheel travel
    pub steps_per_mm: f64,

    /// Maximum wheel speed.
    ///
    /// Units: steps/second
    pub max_motor_speed: i32,

    /// Initial lateral offset of the vehicle from the line.
    ///
    /// Units: mm
    pub initial_y_mm: f64,

    /// Initial heading of the vehicle relative to the track.
    ///
    /// Units: rad
    pub initial_heading_rad: f64,
}

/// A region of the track without a line.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GapRegion {
    /// Units: mm
    pub start_x_mm: f64,

    /// Units: mm
    pub end_x_mm: f64,
}

/// Simulation state shared by all simulated collaborators.
#[derive(Debug)]
pub struct SimWorld {
    params: SimParams,

    now_ms: u64,

    /// Pose of the axle centre, (x mm, y mm, heading rad)
    pose: (f64, f64, f64),

    /// Demanded wheel speeds, steps/second
    demand: (i32, i32),

    /// Current wheel speeds, steps/second
    wheel_speed: (i32, i32),

    /// Distance travelled by the vehicle centre since the last clear, mm
    mileage_mm: f64,

    /// Odometry estimate, updated by `Odometry::process`
    odometry_pose: (i32, i32, i32),

    /// Speedometer estimate in mm/s, updated by `Speedometer::process`
    speeds: (i32, i32, i32),

    indicator: bool,
    num_beeps: u32,
    num_alarms: u32,
}

/// Handle to the simulation, used by the executable to drive the simulation clock.
pub struct Sim {
    world: Rc<RefCell<SimWorld>>,
}

struct SimClock(Rc<RefCell<SimWorld>>);

struct SimLineSensors {
    world: Rc<RefCell<SimWorld>>,
    values: Vec<u16>,

    /// Fused position of the last read that saw the line
    last_position: i32,
}

struct SimDrive(Rc<RefCell<SimWorld>>);

struct SimOdometry(Rc<RefCell<SimWorld>>);

struct SimSpeedometer(Rc<RefCell<SimWorld>>);

struct SimIndicator(Rc<RefCell<SimWorld>>);

struct SimBuzzer(Rc<RefCell<SimWorld>>);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            num_sensors: 5,
            sensor_spacing_mm: 8.0,
            sensor_offset_mm: 30.0,
            sensor_value_max: 1000,
            line_width_mm: 15.0,
            line_edge_mm: 4.0,
            start_line_x_mm: 100.0,
            end_line_x_mm: 600.0,
            line_band_mm: 20.0,
            gaps: Vec::new(),
            wheel_base_mm: 85.0,
            steps_per_mm: 8.0,
            max_motor_speed: 4000,
            initial_y_mm: 0.0,
            initial_heading_rad: 0.0,
        }
    }
}

impl Sim {
    pub fn new(params: SimParams) -> Self {
        let pose = (0.0, params.initial_y_mm, params.initial_heading_rad);

        let world = SimWorld {
            params,
            now_ms: 0,
            pose,
            demand: (0, 0),
            wheel_speed: (0, 0),
            mileage_mm: 0.0,
            odometry_pose: (0, 0, 0),
            speeds: (0, 0, 0),
            indicator: false,
            num_beeps: 0,
            num_alarms: 0,
        };

        Self {
            world: Rc::new(RefCell::new(world))
        }
    }

    /// Create a board whose collaborators all act on this simulation.
    pub fn board(&self) -> Board {
        let num_sensors = self.world.borrow().params.num_sensors;

        Board {
            clock: Box::new(SimClock(self.world.clone())),
            line_sensors: Box::new(SimLineSensors {
                world: self.world.clone(),
                values: vec![0; num_sensors],
                last_position: max_position(num_sensors) / 2,
            }),
            drive: Box::new(SimDrive(self.world.clone())),
            odometry: Box::new(SimOdometry(self.world.clone())),
            speedometer: Box::new(SimSpeedometer(self.world.clone())),
            indicator: Box::new(SimIndicator(self.world.clone())),
            buzzer: Box::new(SimBuzzer(self.world.clone())),
        }
    }

    /// Move the simulation on by the given time.
    pub fn advance(&self, dt_ms: u64) {
        self.world.borrow_mut().advance(dt_ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.world.borrow().now_ms
    }

    /// True pose of the vehicle, (x mm, y mm, heading rad).
    pub fn pose(&self) -> (f64, f64, f64) {
        self.world.borrow().pose
    }

    /// Number of beeps and alarms played so far.
    pub fn num_sounds(&self) -> (u32, u32) {
        let world = self.world.borrow();
        (world.num_beeps, world.num_alarms)
    }
}

impl SimWorld {
    fn advance(&mut self, dt_ms: u64) {
        let dt_s = dt_ms as f64 / 1000.0;
        let steps_per_mm = self.params.steps_per_mm;

        let left_mm = self.wheel_speed.0 as f64 / steps_per_mm * dt_s;
        let right_mm = self.wheel_speed.1 as f64 / steps_per_mm * dt_s;
        let centre_mm = (left_mm + right_mm) / 2.0;

        let (x, y, heading) = self.pose;
        let heading_mid = heading + (right_mm - left_mm) / self.params.wheel_base_mm / 2.0;

        self.pose = (
            x + centre_mm * heading_mid.cos(),
            y + centre_mm * heading_mid.sin(),
            heading + (right_mm - left_mm) / self.params.wheel_base_mm,
        );
        self.mileage_mm += centre_mm.abs();
        self.now_ms += dt_ms;
    }

    /// Channel values of all sensors at the current pose, leftmost sensor first.
    fn sensor_values(&self) -> Vec<u16> {
        let p = &self.params;
        let (x, y, heading) = self.pose;
        let mid = (p.num_sensors as f64 - 1.0) / 2.0;

        (0..p.num_sensors)
            .map(|i| {
                // Vehicle frame: x forward, y to the left
                let lateral = (mid - i as f64) * p.sensor_spacing_mm;
                let sx = x + p.sensor_offset_mm * heading.cos() - lateral * heading.sin();
                let sy = y + p.sensor_offset_mm * heading.sin() + lateral * heading.cos();

                (self.reflectance(sx, sy) * p.sensor_value_max as f64).round() as u16
            })
            .collect()
    }

    /// Reflectance of the track at the point, 0 (no line) to 1 (line).
    fn reflectance(&self, x: f64, y: f64) -> f64 {
        let p = &self.params;

        let in_band = |start: f64| x >= start && x < start + p.line_band_mm;
        if in_band(p.start_line_x_mm) || in_band(p.end_line_x_mm) {
            return 1.0;
        }

        if p.gaps.iter().any(|g| x >= g.start_x_mm && x < g.end_x_mm) {
            return 0.0;
        }

        let beyond_edge = y.abs() - p.line_width_mm / 2.0;
        if beyond_edge <= 0.0 {
            1.0
        }
        else if p.line_edge_mm > 0.0 {
            (1.0 - beyond_edge / p.line_edge_mm).max(0.0)
        }
        else {
            0.0
        }
    }
}

impl Clock for SimClock {
    fn millis(&self) -> u64 {
        self.0.borrow().now_ms
    }
}

impl LineSensors for SimLineSensors {
    fn read_line(&mut self) -> i32 {
        self.values = self.world.borrow().sensor_values();

        let mut weighted: i64 = 0;
        let mut sum: i64 = 0;
        let mut on_line = false;

        for (i, v) in self.values.iter().enumerate() {
            if *v > SENSOR_LINE_THRESHOLD {
                on_line = true;
            }
            if *v > SENSOR_NOISE_THRESHOLD {
                weighted += *v as i64 * i as i64 * POSITION_PER_SENSOR as i64;
                sum += *v as i64;
            }
        }

        let max = max_position(self.values.len());

        if !on_line || sum == 0 {
            // Saturate at the side the line was last seen at
            return if self.last_position < max / 2 { 0 } else { max };
        }

        self.last_position = (weighted / sum) as i32;
        self.last_position
    }

    fn sensor_values(&self) -> &[u16] {
        &self.values
    }

    fn num_sensors(&self) -> usize {
        self.values.len()
    }

    fn sensor_value_max(&self) -> u16 {
        self.world.borrow().params.sensor_value_max
    }
}

impl Drive for SimDrive {
    fn set_linear_speed(&mut self, left: i32, right: i32) {
        let mut world = self.0.borrow_mut();
        let max = world.params.max_motor_speed;

        world.demand = (left.max(-max).min(max), right.max(-max).min(max));
    }

    fn max_motor_speed(&self) -> i32 {
        self.0.borrow().params.max_motor_speed
    }

    fn process(&mut self, _period_ms: u64) {
        let mut world = self.0.borrow_mut();
        world.wheel_speed = world.demand;
    }
}

impl Odometry for SimOdometry {
    fn clear_mileage(&mut self) {
        self.0.borrow_mut().mileage_mm = 0.0;
    }

    fn mileage_center(&self) -> u32 {
        self.0.borrow().mileage_mm as u32
    }

    fn position(&self) -> (i32, i32) {
        let (x, y, _) = self.0.borrow().odometry_pose;
        (x, y)
    }

    fn orientation(&self) -> i32 {
        self.0.borrow().odometry_pose.2
    }

    fn process(&mut self) {
        let mut world = self.0.borrow_mut();
        let (x, y, heading) = world.pose;

        world.odometry_pose = (x as i32, y as i32, (heading * 1000.0) as i32);
    }
}

impl Speedometer for SimSpeedometer {
    fn linear_speed_left(&self) -> i32 {
        self.0.borrow().speeds.0
    }

    fn linear_speed_right(&self) -> i32 {
        self.0.borrow().speeds.1
    }

    fn linear_speed_center(&self) -> i32 {
        self.0.borrow().speeds.2
    }

    fn process(&mut self) {
        let mut world = self.0.borrow_mut();
        let steps_per_mm = world.params.steps_per_mm;
        let left = (world.wheel_speed.0 as f64 / steps_per_mm) as i32;
        let right = (world.wheel_speed.1 as f64 / steps_per_mm) as i32;

        world.speeds = (left, right, (left + right) / 2);
    }
}

impl Indicator for SimIndicator {
    fn enable(&mut self, on: bool) {
        let mut world = self.0.borrow_mut();

        if world.indicator != on {
            debug!("Indicator {}", if on { "on" } else { "off" });
        }
        world.indicator = on;
    }
}

impl Buzzer for SimBuzzer {
    fn play_beep(&mut self) {
        info!("BEEP");
        self.0.borrow_mut().num_beeps += 1;
    }

    fn play_alarm(&mut self) {
        info!("ALARM");
        self.0.borrow_mut().num_alarms += 1;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
