//! # Communications interface crate.
//!
//! Provides the communications interfaces shared between the convoy leader and its remote
//! clients.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Inbound commands, such as speed setpoints
pub mod cmd;

/// Network module
pub mod net;

/// Outbound telemetry
pub mod tm;
