//! Event emitter that writes events to the log.

use crate::domain::candle::Candle;
use crate::domain::order::Order;
use crate::domain::strategy_run::StrategyRun;
use crate::ports::event_port::EventEmitter;

pub struct LogEventEmitter;

impl EventEmitter for LogEventEmitter {
    fn emit_new_order(&self, order_storage_name: &str, order: &Order) {
        log::info!("new order in {order_storage_name}: {order}");
    }

    fn emit_new_candles(&self, candle_storage_name: &str, candles: &[Candle]) {
        log::debug!("{} new candles in {candle_storage_name}", candles.len());
    }

    fn emit_new_strategy_run(&self, strategy_run: &StrategyRun) {
        log::info!(
            "strategy run {} started: {} on {} [{}]",
            strategy_run.strategy_run_id,
            strategy_run.strategy_name,
            strategy_run.pair,
            strategy_run.interval,
        );
    }
}
