//! Message timestamps: ISO-8601 UTC with exactly three fractional digits, so
//! stored strings sort the same way the instants do.

use std::sync::Mutex;

use serde::{Deserialize, Deserializer, Serializer};
use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    Duration, OffsetDateTime, UtcOffset,
};

const FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

pub fn format(ts: OffsetDateTime) -> Result<String, time::error::Format> {
    ts.to_offset(UtcOffset::UTC).format(FORMAT)
}

pub fn parse(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339).map(|ts| ts.to_offset(UtcOffset::UTC))
}

pub fn truncate_millis(ts: OffsetDateTime) -> OffsetDateTime {
    ts - Duration::nanoseconds(i64::from(ts.nanosecond() % 1_000_000))
}

pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    let value = format(*ts).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&value)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
    let value = String::deserialize(deserializer)?;
    parse(&value).map_err(serde::de::Error::custom)
}

/// Hands out millisecond timestamps that strictly increase within the process,
/// even if the wall clock stalls or steps backwards.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<OffsetDateTime>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            last: Mutex::new(OffsetDateTime::UNIX_EPOCH),
        }
    }
}

impl MonotonicClock {
    pub fn now(&self) -> OffsetDateTime {
        self.observe(OffsetDateTime::now_utc())
    }

    fn observe(&self, wall: OffsetDateTime) -> OffsetDateTime {
        let wall = truncate_millis(wall);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = if wall > *last {
            wall
        } else {
            *last + Duration::milliseconds(1)
        };
        *last = next;
        next
    }
}
