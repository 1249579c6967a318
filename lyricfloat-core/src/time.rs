//! Time and duration conversion utilities.
//!
//! Lyric timing is expressed in floating-point seconds, while timers and
//! instants work with [`Duration`]. These helpers convert between the two with
//! explicit saturation instead of panicking on negative or non-finite values.

use std::time::Duration;

/// Extension trait for converting floating-point seconds to a [`Duration`].
pub trait SecondsExt {
    /// Convert seconds to a duration, saturating at the representable range.
    ///
    /// Negative values and NaN become [`Duration::ZERO`]; values too large to
    /// represent become [`Duration::MAX`].
    fn to_duration_saturating(self) -> Duration;
}

impl SecondsExt for f64 {
    fn to_duration_saturating(self) -> Duration {
        if self.is_nan() || self <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self).unwrap_or(Duration::MAX)
    }
}

/// Extension trait for saturating duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_duration_positive() {
        assert_eq!(2.5_f64.to_duration_saturating(), Duration::from_millis(2500));
    }

    #[test]
    fn test_to_duration_negative_is_zero() {
        assert_eq!((-1.0_f64).to_duration_saturating(), Duration::ZERO);
    }

    #[test]
    fn test_to_duration_nan_is_zero() {
        assert_eq!(f64::NAN.to_duration_saturating(), Duration::ZERO);
    }

    #[test]
    fn test_to_duration_infinite_saturates() {
        assert_eq!(f64::INFINITY.to_duration_saturating(), Duration::MAX);
    }

    #[test]
    fn test_as_millis_u64() {
        let duration = Duration::from_millis(1234);
        assert_eq!(duration.as_millis_u64(), 1234);
    }

    #[test]
    fn test_as_millis_u64_zero() {
        assert_eq!(Duration::ZERO.as_millis_u64(), 0);
    }
}
