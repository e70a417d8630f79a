//! # Board module
//!
//! Interfaces to the hardware collaborators of the leader. The executable constructs a [`Board`]
//! once and hands it to the [`App`](crate::app::App), which lends it to the active system state
//! each cycle. There is exactly one board per process, owned rather than global.

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distance in position units between two neighbouring line sensors.
pub const POSITION_PER_SENSOR: i32 = 1000;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Monotonic millisecond clock.
pub trait Clock {
    fn millis(&self) -> u64;
}

/// Array of reflectance line sensors.
pub trait LineSensors {
    /// Read the fused line position in `[0, (num_sensors - 1) * 1000]`.
    ///
    /// If no sensor sees the line the position saturates at the edge the line was last seen at.
    fn read_line(&mut self) -> i32;

    /// Raw per-channel values from the last read, one per sensor, leftmost first.
    fn sensor_values(&self) -> &[u16];

    /// Number of sensors in the array.
    fn num_sensors(&self) -> usize;

    /// Maximum value a single channel can report.
    fn sensor_value_max(&self) -> u16;
}

/// Differential drive.
pub trait Drive {
    /// Set the linear speed demand of the left and right wheels.
    ///
    /// Units: steps/second
    fn set_linear_speed(&mut self, left: i32, right: i32);

    /// Maximum linear speed a wheel can be driven at.
    ///
    /// Units: steps/second
    fn max_motor_speed(&self) -> i32;

    /// Run the drive's speed control for one control period.
    fn process(&mut self, period_ms: u64);
}

/// Dead reckoning from the wheel encoders.
pub trait Odometry {
    /// Reset the mileage to zero.
    fn clear_mileage(&mut self);

    /// Distance travelled by the vehicle centre since the last clear.
    ///
    /// Units: mm
    fn mileage_center(&self) -> u32;

    /// Position in the odometry frame.
    ///
    /// Units: mm
    fn position(&self) -> (i32, i32);

    /// Orientation in the odometry frame.
    ///
    /// Units: mrad
    fn orientation(&self) -> i32;

    /// Update the odometry from the latest wheel movement.
    fn process(&mut self);
}

/// Wheel speed estimation.
///
/// Units: mm/s
pub trait Speedometer {
    fn linear_speed_left(&self) -> i32;
    fn linear_speed_right(&self) -> i32;
    fn linear_speed_center(&self) -> i32;

    /// Update the speed estimates from the wheel encoders.
    fn process(&mut self);
}

/// Visual indicator shown to the operator, e.g. an LED.
pub trait Indicator {
    fn enable(&mut self, on: bool);
}

/// Sound output.
pub trait Buzzer {
    /// Short confirmation beep.
    fn play_beep(&mut self);

    /// Alarm, played when a run is aborted.
    fn play_alarm(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// All hardware collaborators of the leader.
pub struct Board {
    pub clock: Box<dyn Clock>,
    pub line_sensors: Box<dyn LineSensors>,
    pub drive: Box<dyn Drive>,
    pub odometry: Box<dyn Odometry>,
    pub speedometer: Box<dyn Speedometer>,
    pub indicator: Box<dyn Indicator>,
    pub buzzer: Box<dyn Buzzer>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Board {
    /// Current monotonic time.
    pub fn now_ms(&self) -> u64 {
        self.clock.millis()
    }

    /// Command both wheels to zero speed.
    pub fn stop(&mut self) {
        self.drive.set_linear_speed(0, 0);
    }

    /// Largest fused position the line sensors can report.
    pub fn max_position(&self) -> i32 {
        max_position(self.line_sensors.num_sensors())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Largest fused position for an array of `num_sensors` sensors.
pub fn max_position(num_sensors: usize) -> i32 {
    (num_sensors.saturating_sub(1) as i32) * POSITION_PER_SENSOR
}

// ------------------------------------------------------------------------------------------------
// MOCKS
// ------------------------------------------------------------------------------------------------

/// Shared-state mock collaborators for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::{cell::RefCell, rc::Rc};
    use super::*;

    /// Everything the mocks observe and report, shared between the board and the test.
    #[derive(Debug, Default)]
    pub struct MockHw {
        pub now_ms: u64,
        pub position: i32,
        pub sensor_values: Vec<u16>,
        pub max_motor_speed: i32,
        pub speed_cmds: Vec<(i32, i32)>,
        pub mileage: u32,
        pub mileage_clears: u32,
        pub xy: (i32, i32),
        pub orientation: i32,
        pub speeds: (i32, i32, i32),
        pub indicator: bool,
        pub beeps: u32,
        pub alarms: u32,
        /// Order in which the `process` functions were called.
        pub calls: Vec<&'static str>,
    }

    pub type SharedHw = Rc<RefCell<MockHw>>;

    struct Mock {
        hw: SharedHw,
        values: Vec<u16>,
    }

    impl MockHw {
        /// Last speed command sent to the drive.
        pub fn last_speed(&self) -> Option<(i32, i32)> {
            self.speed_cmds.last().copied()
        }

        /// Set every channel to the same value.
        pub fn set_all_sensors(&mut self, value: u16) {
            for v in self.sensor_values.iter_mut() {
                *v = value;
            }
        }
    }

    /// Create a board of five sensors, with the line centred and nothing else happening.
    pub fn board() -> (Board, SharedHw) {
        let hw = Rc::new(RefCell::new(MockHw {
            position: 2000,
            sensor_values: vec![0, 0, 1000, 0, 0],
            max_motor_speed: 400,
            ..Default::default()
        }));

        let mk = || Box::new(Mock { hw: hw.clone(), values: Vec::new() });

        let board = Board {
            clock: mk(),
            line_sensors: mk(),
            drive: mk(),
            odometry: mk(),
            speedometer: mk(),
            indicator: mk(),
            buzzer: mk(),
        };

        (board, hw)
    }

    impl Clock for Mock {
        fn millis(&self) -> u64 {
            self.hw.borrow().now_ms
        }
    }

    impl LineSensors for Mock {
        fn read_line(&mut self) -> i32 {
            let hw = self.hw.borrow();
            self.values = hw.sensor_values.clone();
            hw.position
        }

        fn sensor_values(&self) -> &[u16] {
            &self.values
        }

        fn num_sensors(&self) -> usize {
            self.hw.borrow().sensor_values.len()
        }

        fn sensor_value_max(&self) -> u16 {
            1000
        }
    }

    impl Drive for Mock {
        fn set_linear_speed(&mut self, left: i32, right: i32) {
            self.hw.borrow_mut().speed_cmds.push((left, right));
        }

        fn max_motor_speed(&self) -> i32 {
            self.hw.borrow().max_motor_speed
        }

        fn process(&mut self, _period_ms: u64) {
            self.hw.borrow_mut().calls.push("drive");
        }
    }

    impl Odometry for Mock {
        fn clear_mileage(&mut self) {
            let mut hw = self.hw.borrow_mut();
            hw.mileage = 0;
            hw.mileage_clears += 1;
        }

        fn mileage_center(&self) -> u32 {
            self.hw.borrow().mileage
        }

        fn position(&self) -> (i32, i32) {
            self.hw.borrow().xy
        }

        fn orientation(&self) -> i32 {
            self.hw.borrow().orientation
        }

        fn process(&mut self) {
            self.hw.borrow_mut().calls.push("odometry");
        }
    }

    impl Speedometer for Mock {
        fn linear_speed_left(&self) -> i32 {
            self.hw.borrow().speeds.0
        }

        fn linear_speed_right(&self) -> i32 {
            self.hw.borrow().speeds.1
        }

        fn linear_speed_center(&self) -> i32 {
            self.hw.borrow().speeds.2
        }

        fn process(&mut self) {
            self.hw.borrow_mut().calls.push("speedometer");
        }
    }

    impl Indicator for Mock {
        fn enable(&mut self, on: bool) {
            self.hw.borrow_mut().indicator = on;
        }
    }

    impl Buzzer for Mock {
        fn play_beep(&mut self) {
            self.hw.borrow_mut().beeps += 1;
        }

        fn play_alarm(&mut self) {
            self.hw.borrow_mut().alarms += 1;
        }
    }
}
