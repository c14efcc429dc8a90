//! Race time values.
//!
//! [`OTime`] is a wall-clock time of day stored as non-negative
//! milliseconds, with a day component for multi-day events. Arithmetic
//! is saturating (a time never goes negative) and elapsed-time
//! computation is day-rollover aware: a finish punched "before" the
//! start is interpreted as the next day when the race is configured to
//! reduce times into an under-24h window.

use std::fmt;
use std::str::FromStr;

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MSEC_PER_SEC: i64 = 1_000;
const MSEC_PER_MINUTE: i64 = 60 * MSEC_PER_SEC;
const MSEC_PER_HOUR: i64 = 60 * MSEC_PER_MINUTE;
const MSEC_PER_DAY: i64 = 24 * MSEC_PER_HOUR;

/// Maximum supported decimal places of a second for device ticks.
pub const MAX_TIME_ACCURACY: u8 = 3;

/// Rounding mode applied when reducing a time to the configured accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRounding {
    /// Round to nearest (half away from zero).
    #[default]
    Math,
    /// Truncate toward zero.
    Down,
    /// Round up to the next unit.
    Up,
}

/// Errors from parsing a time string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    /// The string did not look like `H:MM:SS[.mmm]`.
    #[error("invalid time format: {0:?}")]
    Format(String),
    /// A component was out of range (e.g. 61 minutes).
    #[error("time component out of range in {0:?}")]
    OutOfRange(String),
}

/// A wall-clock race time, non-negative, millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OTime(i64);

impl OTime {
    /// The zero time.
    pub const ZERO: Self = Self(0);

    /// Creates a time from day/hour/minute/second components.
    #[must_use]
    pub const fn new(day: i64, hour: i64, minute: i64, sec: i64) -> Self {
        Self::from_msec(day * MSEC_PER_DAY + hour * MSEC_PER_HOUR + minute * MSEC_PER_MINUTE + sec * MSEC_PER_SEC)
    }

    /// Creates a time from hour/minute/second of the first day.
    #[must_use]
    pub const fn hms(hour: i64, minute: i64, sec: i64) -> Self {
        Self::new(0, hour, minute, sec)
    }

    /// Creates a time from total milliseconds, clamping negatives to zero.
    #[must_use]
    pub const fn from_msec(msec: i64) -> Self {
        if msec < 0 { Self(0) } else { Self(msec) }
    }

    /// Creates a time from whole seconds.
    #[must_use]
    pub const fn from_sec(sec: i64) -> Self {
        Self::from_msec(sec * MSEC_PER_SEC)
    }

    /// The current local wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let now = chrono::Local::now().time();
        Self::from_msec(
            i64::from(now.num_seconds_from_midnight()) * MSEC_PER_SEC
                + i64::from(now.nanosecond() / 1_000_000),
        )
    }

    /// Total milliseconds.
    #[must_use]
    pub const fn as_msec(self) -> i64 {
        self.0
    }

    /// Day component.
    #[must_use]
    pub const fn day(self) -> i64 {
        self.0 / MSEC_PER_DAY
    }

    /// Hour within the day.
    #[must_use]
    pub const fn hour(self) -> i64 {
        (self.0 % MSEC_PER_DAY) / MSEC_PER_HOUR
    }

    /// Minute within the hour.
    #[must_use]
    pub const fn minute(self) -> i64 {
        (self.0 % MSEC_PER_HOUR) / MSEC_PER_MINUTE
    }

    /// Second within the minute.
    #[must_use]
    pub const fn sec(self) -> i64 {
        (self.0 % MSEC_PER_MINUTE) / MSEC_PER_SEC
    }

    /// Millisecond within the second.
    #[must_use]
    pub const fn msec(self) -> i64 {
        self.0 % MSEC_PER_SEC
    }

    /// True if this is the zero time.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self::from_msec(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction, clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self::from_msec(self.0 - other.0)
    }

    /// Multiplies a duration-like time by a count (penalty accounting).
    #[must_use]
    pub const fn times(self, n: u32) -> Self {
        Self::from_msec(self.0.saturating_mul(n as i64))
    }

    /// Elapsed time from `start` to `self`.
    ///
    /// With `rollover` set, a finish earlier in the day than the start
    /// is reduced into the under-24h window by borrowing one day.
    /// Without it the difference saturates at zero (absolute times are
    /// expected to already carry their day component).
    #[must_use]
    pub const fn elapsed_from(self, start: Self, rollover: bool) -> Self {
        if rollover && self.0 < start.0 {
            Self::from_msec(self.0 + MSEC_PER_DAY - start.0)
        } else {
            self.saturating_sub(start)
        }
    }

    /// Converts to device ticks at `accuracy` decimal places of a second.
    ///
    /// Accuracy 0 yields whole seconds, 3 yields milliseconds. Values
    /// above [`MAX_TIME_ACCURACY`] are treated as milliseconds.
    #[must_use]
    pub const fn to_ticks(self, accuracy: u8) -> i64 {
        self.0 / tick_unit(accuracy)
    }

    /// Reconstructs a time from device ticks at `accuracy` decimals.
    #[must_use]
    pub const fn from_ticks(ticks: i64, accuracy: u8) -> Self {
        Self::from_msec(ticks.saturating_mul(tick_unit(accuracy)))
    }

    /// Rounds to `accuracy` decimal places using the given mode.
    #[must_use]
    pub const fn round(self, accuracy: u8, mode: TimeRounding) -> Self {
        let unit = tick_unit(accuracy);
        let msec = match mode {
            TimeRounding::Math => (self.0 + unit / 2) / unit * unit,
            TimeRounding::Down => self.0 / unit * unit,
            TimeRounding::Up => (self.0 + unit - 1) / unit * unit,
        };
        Self::from_msec(msec)
    }
}

/// Milliseconds per tick at the given accuracy.
const fn tick_unit(accuracy: u8) -> i64 {
    match accuracy {
        0 => 1_000,
        1 => 100,
        2 => 10,
        _ => 1,
    }
}

impl fmt::Display for OTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02}:{:02}",
            self.day() * 24 + self.hour(),
            self.minute(),
            self.sec()
        )?;
        if self.msec() != 0 {
            write!(f, ".{:03}", self.msec())?;
        }
        Ok(())
    }
}

impl FromStr for OTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimeParseError::Format(s.to_string());
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (s, None),
        };
        let parts: Vec<&str> = whole.split(':').collect();
        if parts.len() != 3 {
            return Err(bad());
        }
        let hour: i64 = parts[0].parse().map_err(|_| bad())?;
        let minute: i64 = parts[1].parse().map_err(|_| bad())?;
        let sec: i64 = parts[2].parse().map_err(|_| bad())?;
        if hour < 0 || !(0..60).contains(&minute) || !(0..60).contains(&sec) {
            return Err(TimeParseError::OutOfRange(s.to_string()));
        }
        let msec = match frac {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 3 => return Err(bad()),
            Some(f) => {
                let n: i64 = f.parse().map_err(|_| bad())?;
                // ".5" means 500 ms
                n * 10_i64.pow(3 - u32::try_from(f.len()).map_err(|_| bad())?)
            }
        };
        Ok(Self::from_msec(
            hour * MSEC_PER_HOUR + minute * MSEC_PER_MINUTE + sec * MSEC_PER_SEC + msec,
        ))
    }
}

impl TryFrom<String> for OTime {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OTime> for String {
    fn from(t: OTime) -> Self {
        t.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_round_trip() {
        let t = OTime::new(1, 10, 45, 30);
        assert_eq!(t.day(), 1);
        assert_eq!(t.hour(), 10);
        assert_eq!(t.minute(), 45);
        assert_eq!(t.sec(), 30);
        assert_eq!(t.msec(), 0);
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let a = OTime::hms(10, 0, 0);
        let b = OTime::hms(11, 0, 0);
        assert_eq!(a.saturating_sub(b), OTime::ZERO);
        assert_eq!(b.saturating_sub(a), OTime::hms(1, 0, 0));
    }

    #[test]
    fn elapsed_rolls_over_midnight() {
        let start = OTime::hms(23, 30, 0);
        let finish = OTime::hms(0, 15, 0);
        assert_eq!(finish.elapsed_from(start, true), OTime::hms(0, 45, 0));
        // without rollover the difference clamps at zero
        assert_eq!(finish.elapsed_from(start, false), OTime::ZERO);
    }

    #[test]
    fn elapsed_absolute_uses_day_component() {
        let start = OTime::new(0, 23, 30, 0);
        let finish = OTime::new(1, 0, 15, 0);
        assert_eq!(finish.elapsed_from(start, false), OTime::hms(0, 45, 0));
    }

    #[test]
    fn tick_round_trip_within_one_day() {
        for accuracy in 0..=MAX_TIME_ACCURACY {
            for msec in [0, 999, 1_000, 3_601_000, 86_399_999] {
                let t = OTime::from_msec(msec).round(accuracy, TimeRounding::Down);
                assert_eq!(OTime::from_ticks(t.to_ticks(accuracy), accuracy), t);
            }
        }
    }

    #[test]
    fn rounding_modes() {
        let t = OTime::from_msec(10_500);
        assert_eq!(t.round(0, TimeRounding::Math), OTime::from_sec(11));
        assert_eq!(t.round(0, TimeRounding::Down), OTime::from_sec(10));
        assert_eq!(t.round(0, TimeRounding::Up), OTime::from_sec(11));

        let t = OTime::from_msec(10_400);
        assert_eq!(t.round(0, TimeRounding::Math), OTime::from_sec(10));
        assert_eq!(t.round(1, TimeRounding::Math), OTime::from_msec(10_400));
    }

    #[test]
    fn display_and_parse_round_trip() {
        for s in ["0:00:00", "10:45:30", "26:03:07", "0:00:01.250"] {
            let t: OTime = s.parse().unwrap();
            assert_eq!(t.to_string(), s);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<OTime>().is_err());
        assert!("10:45".parse::<OTime>().is_err());
        assert!("10:61:00".parse::<OTime>().is_err());
        assert!("10:00:00.1234".parse::<OTime>().is_err());
    }

    #[test]
    fn serde_uses_time_strings() {
        let t = OTime::hms(10, 45, 30);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"10:45:30\"");
        let parsed: OTime = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn penalty_multiplication() {
        assert_eq!(OTime::from_sec(60).times(3), OTime::hms(0, 3, 0));
        assert_eq!(OTime::from_sec(60).times(0), OTime::ZERO);
    }
}
