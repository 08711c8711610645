//! Check-in time arithmetic
//!
//! The carrier opens check-in exactly 24 hours before departure. A small
//! skew buffer is added so a request never lands a moment too early.

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Hours between the opening of check-in and departure
pub const CHECK_IN_WINDOW_HOURS: i64 = 24;

/// Default clock-skew buffer in seconds
pub const DEFAULT_SKEW_SECS: i64 = 5;

/// Compute the check-in instant for a departure.
///
/// Returns `departure - 24h + skew_secs` in the departure's own UTC offset.
/// No truncation and no comparison against the clock happens here; an
/// instant in the past is still returned.
pub fn check_in_instant(departure: DateTime<FixedOffset>, skew_secs: i64) -> DateTime<FixedOffset> {
    departure - TimeDelta::hours(CHECK_IN_WINDOW_HOURS) + TimeDelta::seconds(skew_secs)
}

/// Start of the minute containing `instant`, offset preserved.
///
/// Dispatchers that only fire on whole minutes key their work by this value.
pub fn dispatch_minute(instant: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let secs = i64::from(instant.second());
    let truncated = *instant - TimeDelta::seconds(secs);
    truncated.with_nanosecond(0).unwrap_or(truncated)
}

/// Unix timestamp of the minute containing `instant`
pub fn minute_timestamp(instant: &DateTime<FixedOffset>) -> i64 {
    dispatch_minute(instant).timestamp()
}

/// Parse a departure time as sent by the airline, e.g.
/// `2017-02-09T07:50:00.000-06:00`
pub fn parse_departure(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim())
}

/// A derived check-in time.
///
/// Ordering and equality compare the absolute instant, so two values in
/// different offsets describing the same moment are equal. The text form is
/// RFC 3339 in its own offset and parses back to the identical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckInInstant(DateTime<FixedOffset>);

impl CheckInInstant {
    /// Derive from a departure, dropping sub-second noise
    pub fn for_departure(departure: DateTime<FixedOffset>, skew_secs: i64) -> Self {
        let at = check_in_instant(departure, skew_secs);
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    pub fn at(&self) -> DateTime<FixedOffset> {
        self.0
    }

    pub fn dispatch_minute(&self) -> DateTime<FixedOffset> {
        dispatch_minute(&self.0)
    }

    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw.trim()).map(Self)
    }

    /// Human-readable form used in emails, e.g. `Fri, Aug 21, 2099 7:35 AM`
    pub fn day_datetime_string(&self) -> String {
        self.0.format("%a, %b %-d, %Y %-I:%M %p").to_string()
    }
}

impl From<DateTime<FixedOffset>> for CheckInInstant {
    fn from(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }
}

impl fmt::Display for CheckInInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }
}

impl Serialize for CheckInInstant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CheckInInstant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Result is always exactly 24h minus skew before departure, same offset
        #[test]
        fn offset_and_distance_preserved(
            secs in 0i64..4_000_000_000i64,
            offset_minutes in -14 * 60i32..=14 * 60i32,
            skew in 0i64..60i64,
        ) {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let departure = DateTime::from_timestamp(secs, 0).unwrap().with_timezone(&offset);
            let result = check_in_instant(departure, skew);
            prop_assert_eq!(result.offset(), departure.offset());
            prop_assert_eq!((departure - result).num_seconds(), 24 * 3600 - skew);
        }

        /// Minute buckets never move forward and never drop more than a minute
        #[test]
        fn dispatch_minute_bounded(secs in 0i64..4_000_000_000i64, nanos in 0u32..1_000_000_000u32) {
            let instant = DateTime::from_timestamp(secs, nanos).unwrap().fixed_offset();
            let bucket = dispatch_minute(&instant);
            prop_assert!(bucket <= instant);
            prop_assert!(instant - bucket < TimeDelta::minutes(1));
            prop_assert_eq!(bucket.second(), 0);
        }

        /// Text form parses back to the same instant and offset
        #[test]
        fn display_round_trip(secs in 0i64..4_000_000_000i64, offset_minutes in -14 * 60i32..=14 * 60i32) {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let instant = CheckInInstant::from(DateTime::from_timestamp(secs, 0).unwrap().with_timezone(&offset));
            let parsed = CheckInInstant::parse(&instant.to_string()).unwrap();
            prop_assert_eq!(parsed, instant);
            let (parsed_at, instant_at) = (parsed.at(), instant.at());
            prop_assert_eq!(parsed_at.offset(), instant_at.offset());
        }
    }
}
