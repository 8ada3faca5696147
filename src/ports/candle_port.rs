//! Candle storage port trait.

use chrono::{DateTime, Utc};

use crate::domain::candle::{Candle, CandleSize};
use crate::domain::datetime::DateTimeInterval;
use crate::domain::error::CoinratError;
use crate::domain::pair::Pair;

pub trait CandleStorage {
    fn name(&self) -> &str;

    /// Candles of `candle_size` overlapping `interval`, ascending by time.
    ///
    /// The first and last bucket can be partial, so a window of N periods
    /// may come back as N or N + 1 candles.
    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>, CoinratError>;

    /// The minute candle covering `at`, or `CandleNotFound`.
    fn get_last_minute_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        at: DateTime<Utc>,
    ) -> Result<Candle, CoinratError>;

    fn write_candles(&self, candles: &[Candle]) -> Result<(), CoinratError>;
}
