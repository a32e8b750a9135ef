//! Timeout value.

use std::fmt;
use std::time::Duration;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// A relative timeout, stored as nanoseconds.
///
/// Used both for delay operations and for guards linked to a primary
/// operation. Conversions saturate instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timeout {
    nanos: u64,
}

impl Timeout {
    pub const ZERO: Self = Self { nanos: 0 };

    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self::from_nanos(micros.saturating_mul(NANOS_PER_MICRO))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::from_nanos(millis.saturating_mul(NANOS_PER_MILLI))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self::from_nanos(secs.saturating_mul(NANOS_PER_SECOND))
    }

    pub const fn from_minutes(minutes: u64) -> Self {
        Self::from_secs(minutes.saturating_mul(SECONDS_PER_MINUTE))
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self::from_secs(hours.saturating_mul(SECONDS_PER_HOUR))
    }

    pub const fn from_days(days: u64) -> Self {
        Self::from_secs(days.saturating_mul(SECONDS_PER_DAY))
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.nanos
    }

    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.nanos / NANOS_PER_MICRO
    }

    #[inline]
    pub const fn as_millis(self) -> u64 {
        self.nanos / NANOS_PER_MILLI
    }

    /// `(seconds, nanoseconds)` as a kernel time-spec wants them.
    #[inline]
    pub const fn seconds_and_nanos(self) -> (u64, u32) {
        (self.nanos / NANOS_PER_SECOND, (self.nanos % NANOS_PER_SECOND) as u32)
    }

    pub const fn as_duration(self) -> Duration {
        Duration::from_nanos(self.nanos)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::from_nanos(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl From<Timeout> for Duration {
    fn from(timeout: Timeout) -> Self {
        timeout.as_duration()
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timeout({}ns)", self.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(Timeout::from_micros(3).as_nanos(), 3_000);
        assert_eq!(Timeout::from_millis(50).as_micros(), 50_000);
        assert_eq!(Timeout::from_secs(2).as_millis(), 2_000);
        assert_eq!(Timeout::from_minutes(1), Timeout::from_secs(60));
        assert_eq!(Timeout::from_hours(1), Timeout::from_minutes(60));
        assert_eq!(Timeout::from_days(1), Timeout::from_hours(24));
    }

    #[test]
    fn test_seconds_and_nanos() {
        let t = Timeout::from_nanos(2_500_000_123);
        assert_eq!(t.seconds_and_nanos(), (2, 500_000_123));
        assert_eq!(t.as_duration(), Duration::new(2, 500_000_123));
    }

    #[test]
    fn test_saturates() {
        assert_eq!(Timeout::from_days(u64::MAX).as_nanos(), u64::MAX);
        assert_eq!(Timeout::from(Duration::MAX).as_nanos(), u64::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Timeout::from_micros(1).to_string(), "Timeout(1000ns)");
    }
}
