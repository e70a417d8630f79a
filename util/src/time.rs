//! General time utility functions and polled timers

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// A monotonic countdown timer which is polled rather than waited on.
///
/// The timer never reads a clock itself, the current monotonic time in milliseconds is passed into
/// every call. A stopped timer never times out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimpleTimer {
    /// Time at which the timer was (re)started, or `None` if stopped.
    start_ms: Option<u64>,

    /// Duration until the timer times out.
    duration_ms: u64,
}

impl SimpleTimer {
    /// Create a new stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer with the given duration. A duration of zero times out immediately.
    pub fn start(&mut self, duration_ms: u64, now_ms: u64) {
        self.duration_ms = duration_ms;
        self.start_ms = Some(now_ms);
    }

    /// Restart the timer with the duration it was last started with.
    pub fn restart(&mut self, now_ms: u64) {
        self.start_ms = Some(now_ms);
    }

    /// Stop the timer.
    pub fn stop(&mut self) {
        self.start_ms = None;
    }

    /// Returns `true` if the timer is running.
    pub fn is_running(&self) -> bool {
        self.start_ms.is_some()
    }

    /// Returns `true` if the timer is running and its duration has elapsed.
    pub fn is_timeout(&self, now_ms: u64) -> bool {
        match self.start_ms {
            Some(start) => now_ms.saturating_sub(start) >= self.duration_ms,
            None => false
        }
    }

    /// Time since the timer was (re)started, or 0 if it's stopped.
    pub fn current_duration(&self, now_ms: u64) -> u64 {
        self.start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_simple_timer() {
        let mut timer = SimpleTimer::new();
        assert!(!timer.is_running());
        assert!(!timer.is_timeout(1_000));
        assert_eq!(timer.current_duration(1_000), 0);

        timer.start(10, 100);
        assert!(timer.is_running());
        assert!(!timer.is_timeout(109));
        assert!(timer.is_timeout(110));
        assert_eq!(timer.current_duration(125), 25);

        timer.restart(120);
        assert!(!timer.is_timeout(125));
        assert!(timer.is_timeout(130));

        timer.stop();
        assert!(!timer.is_timeout(10_000));
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let mut timer = SimpleTimer::new();
        timer.start(0, 42);
        assert!(timer.is_timeout(42));
    }
}
