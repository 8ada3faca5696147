//! Heikin-Ashi smoothed candles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::error::CoinratError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeikinAshiCandle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl HeikinAshiCandle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

fn midpoint(a: Decimal, b: Decimal) -> Result<Decimal, CoinratError> {
    a.checked_add(b)
        .map(|sum| sum / Decimal::TWO)
        .ok_or_else(|| CoinratError::overflow("heikin-ashi open"))
}

/// (open + high + low + close) / 4
fn smoothed_close(candle: &Candle) -> Result<Decimal, CoinratError> {
    candle
        .open
        .checked_add(candle.high)
        .and_then(|sum| sum.checked_add(candle.low))
        .and_then(|sum| sum.checked_add(candle.close))
        .map(|sum| sum / Decimal::from(4))
        .ok_or_else(|| CoinratError::overflow("heikin-ashi close"))
}

fn build(candle: &Candle, open: Decimal) -> Result<HeikinAshiCandle, CoinratError> {
    let close = smoothed_close(candle)?;
    Ok(HeikinAshiCandle {
        time: candle.time,
        open,
        high: candle.high.max(open).max(close),
        low: candle.low.min(open).min(close),
        close,
    })
}

/// Seed candle for a series with no smoothed predecessor.
pub fn create_initial_heikin_ashi_candle(
    candle: &Candle,
) -> Result<HeikinAshiCandle, CoinratError> {
    build(candle, midpoint(candle.open, candle.close)?)
}

pub fn candle_to_heikin_ashi(
    candle: &Candle,
    previous: &HeikinAshiCandle,
) -> Result<HeikinAshiCandle, CoinratError> {
    build(candle, midpoint(previous.open, previous.close)?)
}
