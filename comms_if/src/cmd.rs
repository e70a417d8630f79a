//! # Inbound command module
//!
//! Commands received by the leader from a remote client. Each command is carried as a fixed-size
//! binary payload, anything that doesn't match that size exactly is rejected.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Size of the speed setpoint payload in bytes: two little endian `i16`.
pub const SPEED_SETPOINT_DLC: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Override of the left and right wheel speeds.
///
/// Units: steps/second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedSetpoint {
    pub left: i16,
    pub right: i16,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedSetpoint {
    /// Decode a setpoint from a raw payload.
    ///
    /// Returns `None` if there's no payload or it isn't exactly [`SPEED_SETPOINT_DLC`] bytes.
    pub fn from_payload(payload: Option<&[u8]>) -> Option<Self> {
        match payload {
            Some(p) if p.len() == SPEED_SETPOINT_DLC => Some(Self {
                left: LittleEndian::read_i16(&p[0..2]),
                right: LittleEndian::read_i16(&p[2..4]),
            }),
            _ => None
        }
    }

    /// Encode the setpoint into its payload.
    pub fn to_payload(&self) -> [u8; SPEED_SETPOINT_DLC] {
        let mut buf = [0u8; SPEED_SETPOINT_DLC];
        LittleEndian::write_i16(&mut buf[0..2], self.left);
        LittleEndian::write_i16(&mut buf[2..4], self.right);
        buf
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_payload() {
        assert_eq!(
            SpeedSetpoint::from_payload(Some(&[0x10, 0x00, 0xF6, 0xFF])),
            Some(SpeedSetpoint { left: 16, right: -10 })
        );

        let sp = SpeedSetpoint { left: -300, right: 1200 };
        assert_eq!(SpeedSetpoint::from_payload(Some(&sp.to_payload())), Some(sp));
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        assert_eq!(SpeedSetpoint::from_payload(None), None);
        assert_eq!(SpeedSetpoint::from_payload(Some(&[])), None);
        assert_eq!(SpeedSetpoint::from_payload(Some(&[1, 2, 3])), None);
        assert_eq!(SpeedSetpoint::from_payload(Some(&[1, 2, 3, 4, 5])), None);
    }
}
