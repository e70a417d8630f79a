//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::PrimInt;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Integer moving average over the last `N` samples.
///
/// Until `N` samples have been written the average is taken over the samples written so far, so
/// the first sample after a `clear()` is passed straight through. Sums are accumulated as `i64`.
#[derive(Debug, Clone)]
pub struct MovingAverage<T, const N: usize> {
    values: [T; N],
    write_idx: usize,
    count: usize,
    result: T,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: PrimInt, const N: usize> MovingAverage<T, N> {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self {
            values: [T::zero(); N],
            write_idx: 0,
            count: 0,
            result: T::zero(),
        }
    }

    /// Discard all samples and reset the result to zero.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Write a new sample into the filter and return the updated average.
    pub fn write(&mut self, value: T) -> T {
        if N == 0 {
            self.result = value;
            return value;
        }

        self.values[self.write_idx] = value;
        self.write_idx = (self.write_idx + 1) % N;

        if self.count < N {
            self.count += 1;
        }

        let sum: i64 = self.values[..self.count]
            .iter()
            .map(|v| v.to_i64().unwrap_or(0))
            .sum();

        // The mean of values of type T always fits in T.
        self.result = T::from(sum / self.count as i64).unwrap_or_else(T::zero);

        self.result
    }

    /// The current average.
    pub fn result(&self) -> T {
        self.result
    }
}

impl<T: PrimInt, const N: usize> Default for MovingAverage<T, N> {
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

    #[test]
    fn test_moving_average() {
        let mut avg: MovingAverage<i32, 2> = MovingAverage::new();
        assert_eq!(avg.result(), 0);

        // First sample passes straight through
        assert_eq!(avg.write(2000), 2000);
        assert_eq!(avg.write(4000), 3000);
        assert_eq!(avg.write(4000), 4000);
        assert_eq!(avg.write(0), 2000);
        assert_eq!(avg.result(), 2000);

        avg.clear();
        assert_eq!(avg.result(), 0);
        assert_eq!(avg.write(-7), -7);
    }

    #[test]
    fn test_moving_average_no_overflow() {
        let mut avg: MovingAverage<i16, 4> = MovingAverage::new();
        for _ in 0..4 {
            avg.write(i16::MAX);
        }
        assert_eq!(avg.result(), i16::MAX);
    }
}
