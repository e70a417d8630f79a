//! # Telemetry module
//!
//! Telemetry produced by the leader for remote clients.

use serde::{Deserialize, Serialize};

/// Current vehicle data, reported periodically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleData {
    /// Position along the x axis of the odometry frame.
    ///
    /// Units: mm
    pub x_pos: i32,

    /// Position along the y axis of the odometry frame.
    ///
    /// Units: mm
    pub y_pos: i32,

    /// Orientation in the odometry frame.
    ///
    /// Units: mrad
    pub orientation: i32,

    /// Linear speed of the left wheel.
    ///
    /// Units: mm/s
    pub left: i32,

    /// Linear speed of the right wheel.
    ///
    /// Units: mm/s
    pub right: i32,

    /// Linear speed of the vehicle centre.
    ///
    /// Units: mm/s
    pub center: i32,
}
