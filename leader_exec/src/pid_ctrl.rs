//! # PID controller module
//!
//! A fixed-point PID controller with rational gains. All arithmetic is integer, intermediate
//! values are widened to `i64` and divisions truncate toward zero, so the controller output is
//! bit-for-bit reproducible.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rational gain `num / den`.
///
/// A gain with a zero denominator is treated as zero, parameter loading rejects such gains before
/// they can reach a controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gain {
    pub num: i32,
    pub den: i32,
}

/// Fixed-point PID controller.
#[derive(Debug, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: Gain,

    /// Integral gain
    k_i: Gain,

    /// Derivative gain
    k_d: Gain,

    /// Minimum time between two calculations
    sample_time_ms: u64,

    min_output: i32,
    max_output: i32,

    /// If set the D-term is taken from the change in the process value instead of the change in
    /// the error, so set point changes don't produce spikes.
    derivative_on_measurement: bool,

    /// The integral accumulation, kept inside the anti-windup bound
    integral: i64,

    last_error: i32,
    last_process_value: i32,
    last_output: i32,

    /// Time of the last calculation, `None` if never calculated
    last_time_ms: Option<u64>,

    /// Set when the history is stale and must be taken from the next measurement
    is_resync: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gain {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// `true` if the gain can be applied, i.e. the denominator isn't zero.
    pub fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// Multiply the value by this gain.
    pub fn apply(&self, value: i64) -> i64 {
        if self.den == 0 {
            return 0;
        }

        value * self.num as i64 / self.den as i64
    }
}

impl PidController {

    /// Create a controller with zero gains, no output limits and a sample time of zero.
    pub fn new() -> Self {
        Self {
            k_p: Gain::default(),
            k_i: Gain::default(),
            k_d: Gain::default(),
            sample_time_ms: 0,
            min_output: i32::MIN,
            max_output: i32::MAX,
            derivative_on_measurement: false,
            integral: 0,
            last_error: 0,
            last_process_value: 0,
            last_output: 0,
            last_time_ms: None,
            is_resync: true,
        }
    }

    pub fn set_p_factor(&mut self, gain: Gain) {
        self.k_p = gain;
    }

    pub fn set_i_factor(&mut self, gain: Gain) {
        self.k_i = gain;
        self.integral = self.limit_integral(self.integral);
    }

    pub fn set_d_factor(&mut self, gain: Gain) {
        self.k_d = gain;
    }

    pub fn set_sample_time(&mut self, sample_time_ms: u64) {
        self.sample_time_ms = sample_time_ms;
    }

    /// Set the output limits. Inverted limits are swapped.
    pub fn set_limits(&mut self, min: i32, max: i32) {
        self.min_output = min.min(max);
        self.max_output = max.max(min);
        self.integral = self.limit_integral(self.integral);
    }

    pub fn set_derivative_on_measurement(&mut self, enable: bool) {
        self.derivative_on_measurement = enable;
    }

    /// Clear all history. The next calculation always computes.
    pub fn clear(&mut self) {
        self.integral = 0;
        self.last_error = 0;
        self.last_process_value = 0;
        self.last_output = 0;
        self.last_time_ms = None;
        self.is_resync = true;
    }

    /// Resynchronise the history to the next measurement.
    ///
    /// Used after a control gap: the next calculation takes its measurement as the previous one
    /// (no derivative kick), drops the accumulated integral, and computes regardless of the sample
    /// time.
    pub fn resync(&mut self) {
        self.is_resync = true;
    }

    /// `true` if a resync is pending for the next calculation.
    pub fn is_resync_pending(&self) -> bool {
        self.is_resync
    }

    /// Calculate the controller output for the given set point and process value.
    ///
    /// If less than the sample time elapsed since the last calculation the previous output is
    /// returned unchanged.
    pub fn calculate(&mut self, set_point: i32, process_value: i32, now_ms: u64) -> i32 {
        let is_due = match self.last_time_ms {
            Some(t) => now_ms.saturating_sub(t) >= self.sample_time_ms,
            None => true
        };

        if !is_due && !self.is_resync {
            return self.last_output;
        }

        let error = set_point as i64 - process_value as i64;

        if self.is_resync {
            self.integral = 0;
            self.last_error = error as i32;
            self.last_process_value = process_value;
            self.is_resync = false;
        }

        let p = self.k_p.apply(error);

        self.integral = self.limit_integral(self.integral + error);
        let i = self.k_i.apply(self.integral);

        let d = if self.derivative_on_measurement {
            -self.k_d.apply(process_value as i64 - self.last_process_value as i64)
        }
        else {
            self.k_d.apply(error - self.last_error as i64)
        };

        let output = (p + i + d)
            .max(self.min_output as i64)
            .min(self.max_output as i64) as i32;

        self.last_error = error as i32;
        self.last_process_value = process_value;
        self.last_output = output;
        self.last_time_ms = Some(now_ms);

        output
    }

    /// Keep the integral such that the I-term alone never exceeds the output limits.
    fn limit_integral(&self, integral: i64) -> i64 {
        if self.k_i.num == 0 || self.k_i.den == 0 {
            return 0;
        }

        let max_abs_output = (self.min_output as i64).abs().max((self.max_output as i64).abs());
        let bound = max_abs_output * (self.k_i.den as i64).abs() / (self.k_i.num as i64).abs();

        integral.max(-bound).min(bound)
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn p_only(num: i32, den: i32) -> PidController {
        let mut pid = PidController::new();
        pid.set_p_factor(Gain::new(num, den));
        pid.set_sample_time(10);
        pid.set_limits(-400, 400);
        pid
    }

    #[test]
    fn test_gain_truncates_toward_zero() {
        assert_eq!(Gain::new(1, 3).apply(10), 3);
        assert_eq!(Gain::new(1, 3).apply(-10), -3);
        assert_eq!(Gain::new(3, 2).apply(-5), -7);
        assert_eq!(Gain::new(5, 0).apply(100), 0);
        assert!(!Gain::new(5, 0).is_valid());
    }

    #[test]
    fn test_proportional_and_limits() {
        let mut pid = p_only(1, 2);

        assert_eq!(pid.calculate(2000, 1800, 0), 100);
        assert_eq!(pid.calculate(2000, 2200, 10), -100);

        // Saturates at the limits
        assert_eq!(pid.calculate(2000, 0, 20), 400);
        assert_eq!(pid.calculate(0, 4000, 30), -400);
    }

    #[test]
    fn test_returns_previous_output_before_sample_time() {
        let mut pid = p_only(1, 1);

        assert_eq!(pid.calculate(100, 50, 0), 50);
        assert_eq!(pid.calculate(100, 0, 5), 50);
        assert_eq!(pid.calculate(100, 0, 9), 50);
        assert_eq!(pid.calculate(100, 0, 10), 100);
    }

    #[test]
    fn test_integral_anti_windup() {
        let mut pid = PidController::new();
        pid.set_i_factor(Gain::new(1, 10));
        pid.set_limits(-100, 100);

        // A large persistent error would wind the integral up far beyond the limit
        for t in 0..100 {
            pid.calculate(1000, 0, t);
        }
        assert_eq!(pid.calculate(1000, 0, 100), 100);

        // With anti-windup the I-term unwinds as soon as the error reverses, rather than staying
        // saturated for as many cycles as it was wound up.
        let out = pid.calculate(0, 500, 101);
        assert!(out < 100, "I-term still saturated: {}", out);
        assert_eq!(out, 50);
    }

    #[test]
    fn test_derivative_on_measurement() {
        let mut pid = PidController::new();
        pid.set_d_factor(Gain::new(1, 1));
        pid.set_derivative_on_measurement(true);

        // First calculation syncs the history, so no kick
        assert_eq!(pid.calculate(2000, 1000, 0), 0);

        // A set point change produces no derivative output
        assert_eq!(pid.calculate(3000, 1000, 1), 0);

        // A measurement change does, opposing the change
        assert_eq!(pid.calculate(3000, 1100, 2), -100);
    }

    #[test]
    fn test_derivative_on_error() {
        let mut pid = PidController::new();
        pid.set_d_factor(Gain::new(1, 1));

        assert_eq!(pid.calculate(2000, 1000, 0), 0);
        assert_eq!(pid.calculate(3000, 1000, 1), 1000);
    }

    #[test]
    fn test_resync() {
        let mut pid = PidController::new();
        pid.set_i_factor(Gain::new(1, 1));
        pid.set_d_factor(Gain::new(1, 1));
        pid.set_derivative_on_measurement(true);
        pid.set_sample_time(10);
        pid.set_limits(-10_000, 10_000);

        pid.calculate(2000, 1900, 0);
        pid.calculate(2000, 1900, 10);
        assert!(!pid.is_resync_pending());

        // After a gap the measurement jumped, without resync the derivative would kick by -1000
        pid.resync();
        assert!(pid.is_resync_pending());

        // Computes immediately, with the integral dropped and no derivative
        assert_eq!(pid.calculate(2000, 2900, 11), -900);
        assert!(!pid.is_resync_pending());
    }
}
