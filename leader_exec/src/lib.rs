//! # Leader library.
//!
//! This library allows other crates in the workspace to access items defined inside the leader
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Application scheduler - runs the fixed period cycle and the system state machine
pub mod app;

/// Board - interfaces to the hardware collaborators
pub mod board;

/// Line detection - start/end line and track gap detection
pub mod line_detect;

/// Parameters of the leader executable
pub mod params;

/// PID controller - fixed-point steering controller
pub mod pid_ctrl;

/// Setpoint client - receives speed setpoints from a remote client
pub mod setpoint_client;

/// Simulation board - runs the leader without hardware
pub mod sim;

/// System state machine - startup, driving and ready states
pub mod system;

/// Telemetry server - publishes vehicle data
pub mod tm_server;
