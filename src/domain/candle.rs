//! Candle representation, candle sizes and minute-candle aggregation.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::datetime::parse_datetime;
use super::error::CoinratError;
use super::pair::Pair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleSizeUnit {
    Minute,
    Hour,
    Day,
}

impl CandleSizeUnit {
    fn as_str(&self) -> &'static str {
        match self {
            CandleSizeUnit::Minute => "minute",
            CandleSizeUnit::Hour => "hour",
            CandleSizeUnit::Day => "day",
        }
    }
}

/// Width of a candle bucket, e.g. `1-minute`, `4-hour`, `1-day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandleSize {
    unit: CandleSizeUnit,
    size: u32,
}

impl CandleSize {
    pub fn new(unit: CandleSizeUnit, size: u32) -> Result<Self, CoinratError> {
        if size == 0 {
            return Err(CoinratError::InvalidCandleSize {
                value: format!("0-{}", unit.as_str()),
                reason: "size must be at least 1".into(),
            });
        }
        Ok(CandleSize { unit, size })
    }

    pub fn one_minute() -> Self {
        CandleSize {
            unit: CandleSizeUnit::Minute,
            size: 1,
        }
    }

    pub fn one_day() -> Self {
        CandleSize {
            unit: CandleSizeUnit::Day,
            size: 1,
        }
    }

    pub fn unit(&self) -> CandleSizeUnit {
        self.unit
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn as_duration(&self) -> Duration {
        let size = i64::from(self.size);
        match self.unit {
            CandleSizeUnit::Minute => Duration::minutes(size),
            CandleSizeUnit::Hour => Duration::hours(size),
            CandleSizeUnit::Day => Duration::days(size),
        }
    }

    /// Start of the bucket containing `time`. Buckets are aligned to the Unix epoch.
    pub fn floor(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.as_duration().num_seconds();
        let offset = time.timestamp().rem_euclid(width);
        time - Duration::seconds(offset)
            - Duration::nanoseconds(i64::from(time.timestamp_subsec_nanos()))
    }
}

impl fmt::Display for CandleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.size, self.unit.as_str())
    }
}

impl FromStr for CandleSize {
    type Err = CoinratError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoinratError::InvalidCandleSize {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (size, unit) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected <size>-<unit>"))?;
        let size: u32 = size.parse().map_err(|_| invalid("size is not a number"))?;
        let unit = match unit {
            "minute" => CandleSizeUnit::Minute,
            "hour" => CandleSizeUnit::Hour,
            "day" => CandleSizeUnit::Day,
            _ => return Err(invalid("unit must be minute, hour or day")),
        };
        CandleSize::new(unit, size)
    }
}

pub fn serialize_candle_size(candle_size: &CandleSize) -> String {
    candle_size.to_string()
}

pub fn deserialize_candle_size(serialized: &str) -> Result<CandleSize, CoinratError> {
    serialized.parse()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub market_name: String,
    pub pair: Pair,
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub candle_size: CandleSize,
}

impl Candle {
    /// (open + close) / 2
    pub fn average_price(&self) -> Result<Decimal, CoinratError> {
        self.open
            .checked_add(self.close)
            .map(|sum| sum / Decimal::TWO)
            .ok_or_else(|| CoinratError::overflow("average price"))
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Merge minute candles (sorted ascending by time) into `candle_size` buckets.
pub fn aggregate_candles(minute_candles: &[Candle], candle_size: CandleSize) -> Vec<Candle> {
    let mut aggregated: Vec<Candle> = Vec::new();

    for candle in minute_candles {
        let bucket = candle_size.floor(candle.time);
        match aggregated.last_mut() {
            Some(last) if last.time == bucket => {
                last.high = last.high.max(candle.high);
                last.low = last.low.min(candle.low);
                last.close = candle.close;
            }
            _ => aggregated.push(Candle {
                time: bucket,
                candle_size,
                ..candle.clone()
            }),
        }
    }

    aggregated
}

pub fn serialize_candle(candle: &Candle) -> Value {
    json!({
        "market": candle.market_name,
        "pair": candle.pair.to_string(),
        "time": candle.time.to_rfc3339(),
        "open": candle.open.to_string(),
        "high": candle.high.to_string(),
        "low": candle.low.to_string(),
        "close": candle.close.to_string(),
        "candle_size": candle.candle_size.to_string(),
    })
}

pub fn deserialize_candle(value: &Value) -> Result<Candle, CoinratError> {
    let field = |key: &str| -> Result<&str, CoinratError> {
        value
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| CoinratError::deserialize("candle", format!("missing field {key}")))
    };
    let decimal = |key: &str| -> Result<Decimal, CoinratError> {
        Decimal::from_str(field(key)?)
            .map_err(|e| CoinratError::deserialize("candle", format!("{key}: {e}")))
    };

    Ok(Candle {
        market_name: field("market")?.to_string(),
        pair: field("pair")?.parse()?,
        time: parse_datetime(field("time")?)
            .map_err(|e| CoinratError::deserialize("candle", format!("time: {e}")))?,
        open: decimal("open")?,
        high: decimal("high")?,
        low: decimal("low")?,
        close: decimal("close")?,
        candle_size: match value.get("candle_size").and_then(Value::as_str) {
            Some(size) => size.parse()?,
            None => CandleSize::one_minute(),
        },
    })
}
