//! Time sources and datetime intervals.
//!
//! Everything in the domain asks a [`DateTimeFactory`] for the current time
//! instead of reading the wall clock, which is what lets a replay drive a
//! strategy through historical data deterministically.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::cell::Cell;
use std::fmt;

use super::error::CoinratError;

pub trait DateTimeFactory {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentUtcDateTimeFactory;

impl DateTimeFactory for CurrentUtcDateTimeFactory {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock that only moves when told to.
///
/// Shared behind an `Rc` between the replayer (which moves it) and the
/// strategy and market (which read it), hence the `Cell`.
#[derive(Debug)]
pub struct FrozenDateTimeFactory {
    current: Cell<DateTime<Utc>>,
}

impl FrozenDateTimeFactory {
    pub fn new(start: DateTime<Utc>) -> Self {
        FrozenDateTimeFactory {
            current: Cell::new(start),
        }
    }

    /// Advance the clock by exactly `delta`. Zero or negative deltas are
    /// rejected so a replay loop driven by this clock always terminates.
    pub fn move_by(&self, delta: Duration) -> Result<(), CoinratError> {
        if delta <= Duration::zero() {
            return Err(CoinratError::InvalidTimeDelta {
                seconds: delta.num_seconds(),
            });
        }
        let current = self.current.get();
        let moved = current
            .checked_add_signed(delta)
            .ok_or_else(|| CoinratError::DateTimeOutOfRange {
                reason: format!("{} + {}s", current.to_rfc3339(), delta.num_seconds()),
            })?;
        self.current.set(moved);
        Ok(())
    }
}

impl DateTimeFactory for FrozenDateTimeFactory {
    fn now(&self) -> DateTime<Utc> {
        self.current.get()
    }
}

/// Half-open `[since, till)` range where either bound may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeInterval {
    pub since: Option<DateTime<Utc>>,
    pub till: Option<DateTime<Utc>>,
}

impl DateTimeInterval {
    pub fn new(since: Option<DateTime<Utc>>, till: Option<DateTime<Utc>>) -> Self {
        DateTimeInterval { since, till }
    }

    pub fn closed(since: DateTime<Utc>, till: DateTime<Utc>) -> Self {
        DateTimeInterval {
            since: Some(since),
            till: Some(till),
        }
    }

    /// Both bounds are known.
    pub fn is_closed(&self) -> bool {
        self.since.is_some() && self.till.is_some()
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.since.is_none_or(|since| since <= time) && self.till.is_none_or(|till| time < till)
    }
}

impl fmt::Display for DateTimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<DateTime<Utc>>| b.map_or("None".to_string(), |t| t.to_rfc3339());
        write!(f, "[{}, {})", bound(self.since), bound(self.till))
    }
}

pub fn serialize_datetime_interval(interval: &DateTimeInterval) -> Value {
    json!({
        "since": interval.since.map(|t| t.to_rfc3339()),
        "till": interval.till.map(|t| t.to_rfc3339()),
    })
}

pub fn deserialize_datetime_interval(value: &Value) -> Result<DateTimeInterval, CoinratError> {
    let bound = |key: &str| -> Result<Option<DateTime<Utc>>, CoinratError> {
        match value.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => parse_datetime(s)
                .map(Some)
                .map_err(|e| CoinratError::deserialize("interval", e)),
            Some(other) => Err(CoinratError::deserialize(
                "interval",
                format!("{key} must be a string, got {other}"),
            )),
        }
    };
    Ok(DateTimeInterval::new(bound("since")?, bound("till")?))
}

/// Parse an RFC 3339 timestamp and normalise it to UTC.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value.trim()).map(|t| t.with_timezone(&Utc))
}
