use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

use crate::error::EtError;

const CANONICAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const ISO_LOCAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_OF_DAY: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// A reading instant, rendered as `YYYY-MM-DD HH:MM:SS`.
///
/// Sub-second precision is dropped on construction so that the string form and
/// the ordering always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    pub fn new(dt: PrimitiveDateTime) -> Self {
        let time = dt.time();
        let truncated = Time::from_hms(time.hour(), time.minute(), time.second()).unwrap_or(time);
        Self(dt.replace_time(truncated))
    }

    pub fn date(&self) -> Date {
        self.0.date()
    }

    pub fn datetime(&self) -> PrimitiveDateTime {
        self.0
    }

    /// `HH:MM:SS` component, used as the chart label within a day.
    pub fn time_of_day(&self) -> String {
        self.0.time().format(TIME_OF_DAY).unwrap_or_default()
    }

    /// Elapsed seconds from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: &Timestamp) -> f64 {
        (self.0 - earlier.0).as_seconds_f64()
    }
}

impl From<PrimitiveDateTime> for Timestamp {
    fn from(dt: PrimitiveDateTime) -> Self {
        Self::new(dt)
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(dt: OffsetDateTime) -> Self {
        let utc = dt.to_offset(UtcOffset::UTC);
        Self::new(PrimitiveDateTime::new(utc.date(), utc.time()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.format(CANONICAL).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl FromStr for Timestamp {
    type Err = EtError;

    /// Accepts the canonical form, the `T`-separated local form and RFC 3339
    /// (converted to UTC).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = PrimitiveDateTime::parse(s, CANONICAL) {
            return Ok(Self::new(dt));
        }
        if let Ok(dt) = PrimitiveDateTime::parse(s, ISO_LOCAL) {
            return Ok(Self::new(dt));
        }
        OffsetDateTime::parse(s, &Rfc3339)
            .map(Self::from)
            .map_err(|e| EtError::InvalidTimestamp(format!("'{s}': {e}")))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<Date, EtError> {
    Date::parse(s.trim(), DATE).map_err(|e| EtError::InvalidTimestamp(format!("date '{s}': {e}")))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE).unwrap_or_default()
}
