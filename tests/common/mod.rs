#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use coinrat::adapters::memory_storage::{MemoryCandleStorage, MemoryOrderStorage};
use coinrat::domain::candle::{Candle, CandleSize};
use coinrat::domain::configuration::RawConfiguration;
use coinrat::domain::datetime::DateTimeInterval;
use coinrat::domain::order::Order;
use coinrat::domain::pair::Pair;
use coinrat::domain::replayer::StrategyReplayer;
use coinrat::domain::strategy_run::{StrategyRun, StrategyRunMarket};
use coinrat::plugins::Plugins;
use coinrat::ports::event_port::EventEmitter;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

pub const MARKET: &str = "bittrex";

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    NewOrder { storage: String, order: Order },
    NewCandles { storage: String, count: usize },
    NewStrategyRun { strategy_run_id: Uuid },
}

#[derive(Default)]
pub struct RecordingEventEmitter {
    pub events: RefCell<Vec<RecordedEvent>>,
}

impl RecordingEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::NewOrder { order, .. } => Some(order.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventEmitter for RecordingEventEmitter {
    fn emit_new_order(&self, order_storage_name: &str, order: &Order) {
        self.events.borrow_mut().push(RecordedEvent::NewOrder {
            storage: order_storage_name.to_string(),
            order: order.clone(),
        });
    }

    fn emit_new_candles(&self, candle_storage_name: &str, candles: &[Candle]) {
        self.events.borrow_mut().push(RecordedEvent::NewCandles {
            storage: candle_storage_name.to_string(),
            count: candles.len(),
        });
    }

    fn emit_new_strategy_run(&self, strategy_run: &StrategyRun) {
        self.events.borrow_mut().push(RecordedEvent::NewStrategyRun {
            strategy_run_id: strategy_run.strategy_run_id,
        });
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

pub fn pair() -> Pair {
    Pair::new("USD", "BTC")
}

/// One minute candle at midnight of day `n`, with one-unit wicks.
pub fn daily_candle(n: i64, open: Decimal, close: Decimal) -> Candle {
    Candle {
        market_name: MARKET.into(),
        pair: pair(),
        time: day(n),
        open,
        high: open.max(close) + Decimal::ONE,
        low: open.min(close) - Decimal::ONE,
        close,
        candle_size: CandleSize::one_minute(),
    }
}

/// Opens at 100 + 10n and closes 8 higher.
pub fn rising_candles(days: std::ops::Range<i64>) -> Vec<Candle> {
    days.map(|n| {
        let open = Decimal::from(100 + 10 * n);
        daily_candle(n, open, open + Decimal::from(8))
    })
    .collect()
}

/// Rises through day 9, then opens 10 lower every day and closes 8 lower.
pub fn rise_then_fall_candles(days: std::ops::Range<i64>) -> Vec<Candle> {
    days.map(|n| {
        if n <= 9 {
            let open = Decimal::from(100 + 10 * n);
            daily_candle(n, open, open + Decimal::from(8))
        } else {
            let open = Decimal::from(190 - 10 * (n - 9));
            daily_candle(n, open, open - Decimal::from(8))
        }
    })
    .collect()
}

/// Alternates 100 -> 110 and 110 -> 100 with identical wicks.
pub fn choppy_candles(days: std::ops::Range<i64>) -> Vec<Candle> {
    days.map(|n| {
        if n % 2 == 0 {
            daily_candle(n, Decimal::from(100), Decimal::from(110))
        } else {
            daily_candle(n, Decimal::from(110), Decimal::from(100))
        }
    })
    .collect()
}

pub fn market_configuration(entries: &[(&str, &str)]) -> RawConfiguration {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect()
}

pub fn strategy_run(since: i64, till: i64, market_configuration: RawConfiguration) -> StrategyRun {
    StrategyRun {
        strategy_run_id: Uuid::new_v4(),
        run_at: Utc::now(),
        pair: pair(),
        markets: vec![StrategyRunMarket {
            plugin_name: "mock".into(),
            market_name: MARKET.into(),
            market_configuration,
        }],
        strategy_name: "heikin_ashi".into(),
        strategy_configuration: RawConfiguration::new(),
        interval: DateTimeInterval::closed(day(since), day(till)),
        candle_storage_name: "memory".into(),
        order_storage_name: "memory".into(),
    }
}

pub struct ReplayFixture {
    pub candles: Rc<MemoryCandleStorage>,
    pub orders: Rc<MemoryOrderStorage>,
    pub events: Rc<RecordingEventEmitter>,
    pub replayer: StrategyReplayer,
}

pub fn replay_fixture(candles: &[Candle]) -> ReplayFixture {
    use coinrat::ports::candle_port::CandleStorage;

    let candle_storage = Rc::new(MemoryCandleStorage::new("memory"));
    candle_storage.write_candles(candles).unwrap();
    let order_storage = Rc::new(MemoryOrderStorage::new("memory"));
    let events = Rc::new(RecordingEventEmitter::new());

    let mut plugins = Plugins::with_defaults();
    plugins.register_candle_storage(candle_storage.clone());
    plugins.register_order_storage(order_storage.clone());

    ReplayFixture {
        candles: candle_storage,
        orders: order_storage,
        events: events.clone(),
        replayer: StrategyReplayer::new(Rc::new(plugins), events),
    }
}
