//! CSV minute candle import.
//!
//! Expected header: `time,open,high,low,close`, with `time` in RFC 3339.
//! The market and pair are given by the caller, not read from the file.

use crate::domain::candle::{Candle, CandleSize};
use crate::domain::datetime::parse_datetime;
use crate::domain::error::CoinratError;
use crate::domain::pair::Pair;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const RECORD: &str = "candle csv";

pub fn load_candles_csv(
    path: &Path,
    market_name: &str,
    pair: &Pair,
) -> Result<Vec<Candle>, CoinratError> {
    let content = fs::read_to_string(path)?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let row = index + 1;
        let record = result.map_err(|e| CoinratError::deserialize(RECORD, e))?;
        let column = |position: usize, name: &str| {
            record
                .get(position)
                .map(str::trim)
                .ok_or_else(|| row_error(row, format!("missing {name} column")))
        };
        let price = |position: usize, name: &str| {
            let raw = column(position, name)?;
            Decimal::from_str(raw)
                .map_err(|e| row_error(row, format!("invalid {name} {raw:?}: {e}")))
        };

        let raw_time = column(0, "time")?;
        let time = parse_datetime(raw_time)
            .map_err(|e| row_error(row, format!("invalid time {raw_time:?}: {e}")))?;

        candles.push(Candle {
            market_name: market_name.to_string(),
            pair: pair.clone(),
            time: CandleSize::one_minute().floor(time),
            open: price(1, "open")?,
            high: price(2, "high")?,
            low: price(3, "low")?,
            close: price(4, "close")?,
            candle_size: CandleSize::one_minute(),
        });
    }

    candles.sort_by_key(|c| c.time);
    Ok(candles)
}

fn row_error(row: usize, reason: String) -> CoinratError {
    CoinratError::deserialize(RECORD, format!("row {row}: {reason}"))
}
