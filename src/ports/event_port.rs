//! Event emitter port trait.
//!
//! Emission is fire-and-forget: the core never waits for or inspects an
//! acknowledgment.

use crate::domain::candle::Candle;
use crate::domain::order::Order;
use crate::domain::strategy_run::StrategyRun;

pub trait EventEmitter {
    fn emit_new_order(&self, order_storage_name: &str, order: &Order);

    fn emit_new_candles(&self, _candle_storage_name: &str, _candles: &[Candle]) {}

    fn emit_new_strategy_run(&self, _strategy_run: &StrategyRun) {}
}
