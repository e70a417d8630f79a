//! # Leader Executable Parameters
//!
//! This module provides parameters for the leader executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::NetParams;
use serde::Deserialize;

use crate::pid_ctrl::Gain;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderExecParams {

    /// Target period of one cycle of the main loop.
    ///
    /// Units: milliseconds
    pub cycle_period_ms: u64,

    /// Period of the drive control and odometry update.
    ///
    /// Units: milliseconds
    pub control_period_ms: u64,

    /// Period of the vehicle data telemetry.
    ///
    /// Units: milliseconds
    pub reporting_period_ms: u64,

    /// Period of the steering PID controller.
    ///
    /// Units: milliseconds
    pub pid_process_period_ms: u64,

    /// Maximum duration of one lap attempt, after which the vehicle is stopped.
    ///
    /// Units: milliseconds
    pub observation_duration_ms: u64,

    /// Maximum distance driven straight on while searching for a lost track.
    ///
    /// Units: mm
    pub max_search_distance_mm: u32,

    /// Delay between startup and the vehicle starting to drive.
    ///
    /// Units: milliseconds
    pub start_delay_ms: u64,

    /// Delay in the ready state before the next attempt is started.
    ///
    /// Units: milliseconds
    pub restart_delay_ms: u64,

    /// Number of lap attempts to drive before the executable stops.
    pub num_attempts: u32,

    /// Index into `parameter_sets` of the set used for driving.
    pub active_parameter_set: usize,

    /// Available driving parameter sets.
    pub parameter_sets: Vec<ParameterSet>,

    /// Network endpoints, if `None` the leader runs without telemetry or setpoint channels.
    #[serde(default)]
    pub net: Option<NetParams>,
}

/// A set of driving parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParameterSet {
    /// Name shown to the operator.
    pub name: String,

    /// Maximum speed of each wheel while following the line.
    ///
    /// Units: steps/second
    pub top_speed: i32,

    /// Proportional gain of the steering controller
    pub kp: Gain,

    /// Integral gain of the steering controller
    pub ki: Gain,

    /// Derivative gain of the steering controller
    pub kd: Gain,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("No parameter sets are defined")]
    NoParameterSets,

    #[error("Active parameter set {0} is out of range, only {1} sets are defined")]
    ActiveSetOutOfRange(usize, usize),

    #[error("Parameter set \"{0}\" has a zero denominator in its {1} gain")]
    ZeroDenominator(String, &'static str),

    #[error("Parameter set \"{0}\" has a non-positive top speed ({1})")]
    InvalidTopSpeed(String, i32),

    #[error("The {0} period must not be zero")]
    ZeroPeriod(&'static str),

    #[error("At least one lap attempt must be made")]
    NoAttempts,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LeaderExecParams {

    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.parameter_sets.is_empty() {
            return Err(ParamsError::NoParameterSets);
        }

        if self.active_parameter_set >= self.parameter_sets.len() {
            return Err(ParamsError::ActiveSetOutOfRange(
                self.active_parameter_set,
                self.parameter_sets.len()
            ));
        }

        for set in self.parameter_sets.iter() {
            set.validate()?;
        }

        for (name, period) in [
            ("control", self.control_period_ms),
            ("reporting", self.reporting_period_ms),
            ("PID process", self.pid_process_period_ms),
        ].iter() {
            if *period == 0 {
                return Err(ParamsError::ZeroPeriod(*name));
            }
        }

        if self.num_attempts == 0 {
            return Err(ParamsError::NoAttempts);
        }

        Ok(())
    }

    /// The parameter set used for driving.
    ///
    /// Falls back to the first set if the active index is out of range, `validate()` rejects such
    /// parameters so this is only reachable with unvalidated parameters.
    pub fn active_set(&self) -> &ParameterSet {
        self.parameter_sets.get(self.active_parameter_set)
            .or_else(|| self.parameter_sets.first())
            .unwrap_or(&FALLBACK_SET)
    }
}

impl ParameterSet {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.top_speed <= 0 {
            return Err(ParamsError::InvalidTopSpeed(self.name.clone(), self.top_speed));
        }

        for (term, gain) in [("P", self.kp), ("I", self.ki), ("D", self.kd)].iter() {
            if !gain.is_valid() {
                return Err(ParamsError::ZeroDenominator(self.name.clone(), *term));
            }
        }

        Ok(())
    }
}

/// Stationary set, used only if no sets are defined at all.
static FALLBACK_SET: ParameterSet = ParameterSet {
    name: String::new(),
    top_speed: 0,
    kp: Gain::new(0, 1),
    ki: Gain::new(0, 1),
    kd: Gain::new(0, 1),
};

impl Default for LeaderExecParams {
    fn default() -> Self {
        Self {
            cycle_period_ms: 1,
            control_period_ms: 5,
            reporting_period_ms: 50,
            pid_process_period_ms: 10,
            observation_duration_ms: 180_000,
            max_search_distance_mm: 200,
            start_delay_ms: 1_000,
            restart_delay_ms: 2_000,
            num_attempts: 1,
            active_parameter_set: 0,
            parameter_sets: vec![
                ParameterSet {
                    name: "PD VF".into(),
                    top_speed: 300,
                    kp: Gain::new(1, 8),
                    ki: Gain::new(0, 1),
                    kd: Gain::new(1, 2),
                },
                ParameterSet {
                    name: "PD S".into(),
                    top_speed: 150,
                    kp: Gain::new(1, 12),
                    ki: Gain::new(0, 1),
                    kd: Gain::new(1, 8),
                },
            ],
            net: None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert_eq!(LeaderExecParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate() {
        let mut params = LeaderExecParams::default();
        params.active_parameter_set = 2;
        assert_eq!(params.validate(), Err(ParamsError::ActiveSetOutOfRange(2, 2)));

        let mut params = LeaderExecParams::default();
        params.parameter_sets[1].kd = Gain::new(1, 0);
        assert_eq!(
            params.validate(),
            Err(ParamsError::ZeroDenominator("PD S".into(), "D"))
        );

        let mut params = LeaderExecParams::default();
        params.parameter_sets[0].top_speed = 0;
        assert_eq!(
            params.validate(),
            Err(ParamsError::InvalidTopSpeed("PD VF".into(), 0))
        );

        let mut params = LeaderExecParams::default();
        params.parameter_sets.clear();
        assert_eq!(params.validate(), Err(ParamsError::NoParameterSets));

        let mut params = LeaderExecParams::default();
        params.pid_process_period_ms = 0;
        assert_eq!(params.validate(), Err(ParamsError::ZeroPeriod("PID process")));
    }

    #[test]
    fn test_parse() {
        let params: LeaderExecParams = util::params::from_str(r#"
            cycle_period_ms = 1
            control_period_ms = 5
            reporting_period_ms = 50
            pid_process_period_ms = 10
            observation_duration_ms = 180000
            max_search_distance_mm = 200
            start_delay_ms = 1000
            restart_delay_ms = 2000
            num_attempts = 3
            active_parameter_set = 1

            [[parameter_sets]]
            name = "PD VF"
            top_speed = 300
            kp = { num = 1, den = 8 }
            ki = { num = 0, den = 1 }
            kd = { num = 1, den = 2 }

            [[parameter_sets]]
            name = "PID S"
            top_speed = 150
            kp = { num = 1, den = 12 }
            ki = { num = 1, den = 200 }
            kd = { num = 1, den = 8 }
        "#).unwrap();

        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.active_set().name, "PID S");
        assert_eq!(params.active_set().ki, Gain::new(1, 200));
        assert!(params.net.is_none());
    }

    #[test]
    fn test_shipped_params() {
        let params: LeaderExecParams = util::params::load_from_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../params/leader_exec.toml")
        ).unwrap();

        assert_eq!(params.validate(), Ok(()));
        assert!(params.net.is_some());
    }
}
