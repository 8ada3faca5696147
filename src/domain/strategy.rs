//! Strategy and runner traits.

use chrono::Duration;
use std::rc::Rc;
use uuid::Uuid;

use super::datetime::DateTimeFactory;
use super::error::CoinratError;
use super::pair::Pair;
use super::strategy_run::StrategyRun;
use crate::ports::candle_port::CandleStorage;
use crate::ports::event_port::EventEmitter;
use crate::ports::market_port::Market;
use crate::ports::order_port::OrderStorage;

/// Stateful tick handler. A strategy reads candles, decides, and places
/// orders through the markets it is handed on every tick.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Fixed cadence between two ticks.
    fn get_seconds_delay_between_runs(&self) -> Duration;

    fn tick(&mut self, markets: &mut [&mut dyn Market], pair: &Pair) -> Result<(), CoinratError>;
}

/// Collaborators a strategy is constructed with.
#[derive(Clone)]
pub struct StrategyDependencies {
    pub strategy_run_id: Uuid,
    pub candle_storage: Rc<dyn CandleStorage>,
    pub order_storage: Rc<dyn OrderStorage>,
    pub event_emitter: Rc<dyn EventEmitter>,
    pub datetime_factory: Rc<dyn DateTimeFactory>,
}

pub trait StrategyRunner {
    fn run(&self, strategy_run: &StrategyRun) -> Result<(), CoinratError>;
}
