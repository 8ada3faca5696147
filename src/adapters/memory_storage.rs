//! In-memory candle and order storage.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::domain::candle::{aggregate_candles, Candle, CandleSize};
use crate::domain::datetime::DateTimeInterval;
use crate::domain::error::CoinratError;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::pair::Pair;
use crate::ports::candle_port::CandleStorage;
use crate::ports::order_port::OrderStorage;

type CandleSeries = BTreeMap<DateTime<Utc>, Candle>;

/// Minute candles kept per market and pair, keyed by minute.
pub struct MemoryCandleStorage {
    name: String,
    candles: RefCell<BTreeMap<(String, Pair), CandleSeries>>,
}

impl MemoryCandleStorage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            candles: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn candle_count(&self) -> usize {
        self.candles.borrow().values().map(BTreeMap::len).sum()
    }
}

impl CandleStorage for MemoryCandleStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>, CoinratError> {
        let candles = self.candles.borrow();
        let Some(series) = candles.get(&(market_name.to_string(), pair.clone())) else {
            return Ok(Vec::new());
        };

        let since = interval.since.map(|since| candle_size.floor(since));
        let minutes: Vec<Candle> = series
            .values()
            .filter(|c| since.is_none_or(|since| c.time >= since))
            .filter(|c| interval.till.is_none_or(|till| c.time <= till))
            .cloned()
            .collect();

        Ok(aggregate_candles(&minutes, candle_size))
    }

    fn get_last_minute_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        at: DateTime<Utc>,
    ) -> Result<Candle, CoinratError> {
        let minute = CandleSize::one_minute().floor(at);
        self.candles
            .borrow()
            .get(&(market_name.to_string(), pair.clone()))
            .and_then(|series| series.get(&minute))
            .cloned()
            .ok_or_else(|| CoinratError::CandleNotFound {
                market: market_name.to_string(),
                pair: pair.to_string(),
                at,
            })
    }

    fn write_candles(&self, candles: &[Candle]) -> Result<(), CoinratError> {
        let mut stored = self.candles.borrow_mut();
        for candle in candles {
            let minute = CandleSize::one_minute().floor(candle.time);
            stored
                .entry((candle.market_name.clone(), candle.pair.clone()))
                .or_default()
                .insert(
                    minute,
                    Candle {
                        time: minute,
                        candle_size: CandleSize::one_minute(),
                        ..candle.clone()
                    },
                );
        }
        log::debug!("{} candles written to {}", candles.len(), self.name);
        Ok(())
    }
}

pub struct MemoryOrderStorage {
    name: String,
    orders: RefCell<Vec<Order>>,
}

impl MemoryOrderStorage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            orders: RefCell::new(Vec::new()),
        }
    }

    /// Every stored order, in insertion order.
    pub fn orders(&self) -> Vec<Order> {
        self.orders.borrow().clone()
    }
}

impl OrderStorage for MemoryOrderStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn save_order(&self, order: &Order) -> Result<(), CoinratError> {
        let mut orders = self.orders.borrow_mut();
        match orders.iter_mut().find(|o| o.order_id() == order.order_id()) {
            Some(existing) => *existing = order.clone(),
            None => orders.push(order.clone()),
        }
        Ok(())
    }

    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, CoinratError> {
        let mut found: Vec<Order> = self
            .orders
            .borrow()
            .iter()
            .filter(|o| o.market_name() == market_name && o.pair() == pair)
            .filter(|o| status.is_none_or(|s| o.status() == s))
            .cloned()
            .collect();
        found.sort_by_key(|o| o.created_at());
        Ok(found)
    }
}
