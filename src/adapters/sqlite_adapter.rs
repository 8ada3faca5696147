//! SQLite candle and order storage.

use crate::domain::candle::{aggregate_candles, Candle, CandleSize};
use crate::domain::datetime::DateTimeInterval;
use crate::domain::error::CoinratError;
use crate::domain::order::{deserialize_order, serialize_order, Order, OrderStatus};
use crate::domain::pair::Pair;
use crate::ports::candle_port::CandleStorage;
use crate::ports::config_port::ConfigPort;
use crate::ports::order_port::OrderStorage;
use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const STORAGE_NAME: &str = "sqlite";

/// Fixed-width UTC format so that text comparison orders by time.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct SqliteStorage {
    pool: Pool<SqliteConnectionManager>,
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT).map(|t| t.and_utc())
}

fn conversion_error(
    column: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(error))
}

fn query_error(e: rusqlite::Error) -> CoinratError {
    CoinratError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteStorage {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CoinratError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| CoinratError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|size| *size >= 1)
            .ok_or_else(|| CoinratError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("{pool_size} is not a positive 32-bit pool size"),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| CoinratError::Database {
                    reason: e.to_string(),
                })?;

        log::debug!("opened sqlite storage at {db_path} (pool size {pool_size})");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CoinratError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| CoinratError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, CoinratError> {
        self.pool.get().map_err(|e: r2d2::Error| CoinratError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), CoinratError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS minute_candles (
                market TEXT NOT NULL,
                pair TEXT NOT NULL,
                time TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                PRIMARY KEY (market, pair, time)
            );
            CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                market TEXT NOT NULL,
                pair TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_market_pair ON orders(market, pair);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn select_candles(
        &self,
        market_name: &str,
        pair: &Pair,
        since: &str,
        till: &str,
    ) -> Result<Vec<Candle>, CoinratError> {
        let conn = self.connection()?;

        let query = "SELECT time, open, high, low, close
                     FROM minute_candles
                     WHERE market = ?1 AND pair = ?2 AND time >= ?3 AND time <= ?4
                     ORDER BY time ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(params![market_name, pair.to_string(), since, till], |row| {
                let time: String = row.get(0)?;
                let decimal = |column: usize| -> rusqlite::Result<Decimal> {
                    let raw: String = row.get(column)?;
                    Decimal::from_str(&raw).map_err(|e| conversion_error(column, e))
                };
                Ok(Candle {
                    market_name: market_name.to_string(),
                    pair: pair.clone(),
                    time: parse_time(&time).map_err(|e| conversion_error(0, e))?,
                    open: decimal(1)?,
                    high: decimal(2)?,
                    low: decimal(3)?,
                    close: decimal(4)?,
                    candle_size: CandleSize::one_minute(),
                })
            })
            .map_err(query_error)?;

        let mut candles = Vec::new();
        for row in rows {
            candles.push(row.map_err(query_error)?);
        }
        Ok(candles)
    }
}

impl CandleStorage for SqliteStorage {
    fn name(&self) -> &str {
        STORAGE_NAME
    }

    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>, CoinratError> {
        let since = interval
            .since
            .map(|since| format_time(candle_size.floor(since)))
            .unwrap_or_default();
        // '~' sorts after every digit, so an open end matches everything.
        let till = interval.till.map(format_time).unwrap_or_else(|| "~".into());

        let minutes = self.select_candles(market_name, pair, &since, &till)?;
        Ok(aggregate_candles(&minutes, candle_size))
    }

    fn get_last_minute_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        at: DateTime<Utc>,
    ) -> Result<Candle, CoinratError> {
        let minute = format_time(CandleSize::one_minute().floor(at));
        self.select_candles(market_name, pair, &minute, &minute)?
            .pop()
            .ok_or_else(|| CoinratError::CandleNotFound {
                market: market_name.to_string(),
                pair: pair.to_string(),
                at,
            })
    }

    fn write_candles(&self, candles: &[Candle]) -> Result<(), CoinratError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;

        for candle in candles {
            tx.execute(
                "INSERT OR REPLACE INTO minute_candles (market, pair, time, open, high, low, close)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    candle.market_name,
                    candle.pair.to_string(),
                    format_time(CandleSize::one_minute().floor(candle.time)),
                    candle.open.to_string(),
                    candle.high.to_string(),
                    candle.low.to_string(),
                    candle.close.to_string(),
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        log::debug!("{} candles written to {}", candles.len(), STORAGE_NAME);
        Ok(())
    }
}

impl OrderStorage for SqliteStorage {
    fn name(&self) -> &str {
        STORAGE_NAME
    }

    fn save_order(&self, order: &Order) -> Result<(), CoinratError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO orders (order_id, market, pair, status, created_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                order.order_id().to_string(),
                order.market_name(),
                order.pair().to_string(),
                order.status().to_string(),
                format_time(order.created_at()),
                serialize_order(order).to_string(),
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, CoinratError> {
        let conn = self.connection()?;

        let query = "SELECT payload FROM orders
                     WHERE market = ?1 AND pair = ?2 AND (?3 IS NULL OR status = ?3)
                     ORDER BY created_at ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map(
                params![market_name, pair.to_string(), status.map(|s| s.to_string())],
                |row| row.get::<_, String>(0),
            )
            .map_err(query_error)?;

        let mut orders = Vec::new();
        for row in rows {
            let payload = row.map_err(query_error)?;
            let value: serde_json::Value = serde_json::from_str(&payload)
                .map_err(|e| CoinratError::deserialize("order", e))?;
            orders.push(deserialize_order(&value)?);
        }
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Direction, OrderFields};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn section_entries(&self, _section: &str) -> Vec<(String, String)> {
            Vec::new()
        }
    }

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.initialize_schema().unwrap();
        storage
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap()
    }

    fn minute_candle(time: DateTime<Utc>, close: Decimal) -> Candle {
        Candle {
            market_name: "bittrex".into(),
            pair: Pair::new("USD", "BTC"),
            time,
            open: dec!(100),
            high: dec!(200),
            low: dec!(50),
            close,
            candle_size: CandleSize::one_minute(),
        }
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteStorage::from_config(&config);
        match result {
            Err(CoinratError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    struct PoolSizeConfig(i64);

    impl ConfigPort for PoolSizeConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            (section == "sqlite" && key == "path").then(|| ":memory:".to_string())
        }
        fn get_int(&self, _section: &str, key: &str, default: i64) -> i64 {
            if key == "pool_size" {
                self.0
            } else {
                default
            }
        }
        fn section_entries(&self, _section: &str) -> Vec<(String, String)> {
            Vec::new()
        }
    }

    #[test]
    fn from_config_rejects_out_of_range_pool_size() {
        for pool_size in [0, -3, i64::from(u32::MAX) + 1] {
            match SqliteStorage::from_config(&PoolSizeConfig(pool_size)) {
                Err(CoinratError::ConfigInvalid { section, key, .. }) => {
                    assert_eq!(section, "sqlite");
                    assert_eq!(key, "pool_size");
                }
                Err(other) => panic!("expected ConfigInvalid, got: {other}"),
                Ok(_) => panic!("expected error for pool size {pool_size}"),
            }
        }
    }

    #[test]
    fn candles_are_aggregated_on_read() {
        let storage = storage();
        let candles: Vec<Candle> = (0..6)
            .map(|h| minute_candle(start() + Duration::hours(h * 12), Decimal::from(100 + h)))
            .collect();
        storage.write_candles(&candles).unwrap();

        let interval = DateTimeInterval::closed(start(), start() + Duration::days(2));
        let days = CandleStorage::find_by(
            &storage,
            "bittrex",
            &Pair::new("USD", "BTC"),
            &interval,
            CandleSize::one_day(),
        )
        .unwrap();

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].time, start());
        assert_eq!(days[0].close, dec!(101));
        assert_eq!(days[1].close, dec!(103));
        assert_eq!(days[2].close, dec!(104));
    }

    #[test]
    fn last_minute_candle_round_trips_decimals() {
        let storage = storage();
        storage
            .write_candles(&[minute_candle(start(), dec!(8123.45678901))])
            .unwrap();

        let at = start() + Duration::seconds(59);
        let candle = storage
            .get_last_minute_candle("bittrex", &Pair::new("USD", "BTC"), at)
            .unwrap();
        assert_eq!(candle.close, dec!(8123.45678901));

        let missing = storage.get_last_minute_candle(
            "bittrex",
            &Pair::new("USD", "BTC"),
            start() + Duration::minutes(5),
        );
        assert!(matches!(missing, Err(CoinratError::CandleNotFound { .. })));
    }

    #[test]
    fn orders_are_saved_replaced_and_filtered() {
        let storage = storage();
        let pair = Pair::new("USD", "BTC");
        let mut order = Order::new(OrderFields::open_limit(
            Uuid::new_v4(),
            "bittrex",
            Direction::Buy,
            start(),
            pair.clone(),
            dec!(0.5),
            dec!(8000),
        ))
        .unwrap();
        storage.save_order(&order).unwrap();
        assert_eq!(
            OrderStorage::find_by(&storage, "bittrex", &pair, Some(OrderStatus::Open))
                .unwrap()
                .len(),
            1
        );

        order.close(start() + Duration::minutes(1)).unwrap();
        storage.save_order(&order).unwrap();

        let all = OrderStorage::find_by(&storage, "bittrex", &pair, None).unwrap();
        assert_eq!(all, vec![order]);
        assert!(
            OrderStorage::find_by(&storage, "bittrex", &pair, Some(OrderStatus::Open))
                .unwrap()
                .is_empty()
        );
    }
}
