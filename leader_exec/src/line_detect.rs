//! # Line detection
//!
//! Detection of the start/end line crossing and of gaps in the track, from the line sensors.

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive positive cycles before a start/end line crossing is reported.
pub const LINE_DEBOUNCE_CNT: u8 = 3;

/// Channel value at or above which a sensor is considered to see the (high reflectance) line.
pub const LINE_SENSOR_ON_LINE_VALUE: u16 = 200;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Debounced detector for the full-width start/end line.
///
/// The line is only considered crossed once the outermost channels and the average of all
/// interior channels have seen it for [`LINE_DEBOUNCE_CNT`] consecutive cycles. Without this a
/// slow vehicle flickering over the edge of the start line would see it as the end line too.
#[derive(Debug, Default, Clone)]
pub struct StartEndLineDetector {
    debounce: u8,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StartEndLineDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.debounce = 0;
    }

    /// Feed this cycle's raw sensor values, returns `true` while the crossing is detected.
    ///
    /// Interior channels are averaged into a single composite value so the detection doesn't
    /// depend on the width of the line. With fewer than three channels there is no interior and
    /// only the outer channels are considered.
    pub fn update(&mut self, sensor_values: &[u16]) -> bool {
        if is_full_width_line(sensor_values) {
            if self.debounce < LINE_DEBOUNCE_CNT {
                self.debounce += 1;
            }
        }
        else {
            self.debounce = 0;
        }

        self.debounce >= LINE_DEBOUNCE_CNT
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// `true` if the fused position is at either sentinel extreme, i.e. no sensor sees the line.
///
/// No debouncing is done here, callers choose whether to pass a filtered or a raw position.
pub fn is_track_gap(position: i32, max_position: i32) -> bool {
    position <= 0 || position >= max_position
}

/// `true` if all channels see the line in this cycle.
fn is_full_width_line(sensor_values: &[u16]) -> bool {
    let (left, right) = match (sensor_values.first(), sensor_values.last()) {
        (Some(l), Some(r)) => (*l, *r),
        _ => return false
    };

    let interior: &[u16] = if sensor_values.len() > 2 {
        &sensor_values[1..sensor_values.len() - 1]
    }
    else {
        &[]
    };

    let middle_on_line = match interior.len() {
        0 => true,
        n => {
            let sum: u32 = interior.iter().map(|v| *v as u32).sum();
            sum / n as u32 >= LINE_SENSOR_ON_LINE_VALUE as u32
        }
    };

    left >= LINE_SENSOR_ON_LINE_VALUE 
        && right >= LINE_SENSOR_ON_LINE_VALUE 
        && middle_on_line
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const LINE: [u16; 5] = [900, 800, 1000, 700, 650];
    const TRACK: [u16; 5] = [0, 100, 1000, 100, 0];

    #[test]
    fn test_is_track_gap() {
        for num_sensors in 2..=8 {
            let max = crate::board::max_position(num_sensors);
            assert!(is_track_gap(0, max));
            assert!(is_track_gap(max, max));
            assert!(!is_track_gap(max / 2, max));
            assert!(is_track_gap(-1, max));
            assert!(is_track_gap(max + 1, max));
        }
    }

    #[test]
    fn test_debounce_resets_on_miss() {
        let mut det = StartEndLineDetector::new();

        assert!(!det.update(&LINE));
        assert!(!det.update(&LINE));
        assert!(!det.update(&TRACK));
        assert!(!det.update(&LINE));
        assert!(!det.update(&LINE));
    }

    #[test]
    fn test_debounce_detects_from_third_cycle() {
        let mut det = StartEndLineDetector::new();

        assert!(!det.update(&LINE));
        assert!(!det.update(&LINE));
        assert!(det.update(&LINE));
        assert!(det.update(&LINE));
        assert!(det.update(&LINE));
        assert!(!det.update(&TRACK));
    }

    #[test]
    fn test_composite_interior() {
        // One bright interior channel lifts the composite over the threshold
        assert!(is_full_width_line(&[200, 0, 600, 0, 200]));
        // but a dark outer channel doesn't count
        assert!(!is_full_width_line(&[199, 1000, 1000, 1000, 1000]));
        assert!(!is_full_width_line(&[1000, 100, 100, 100, 1000]));

        assert!(is_full_width_line(&[300, 300]));
        assert!(!is_full_width_line(&[]));
    }
}
