//! Deterministic replay of a strategy over stored candles.

use std::rc::Rc;

use super::configuration::format_data_to_typed;
use super::datetime::{DateTimeFactory, FrozenDateTimeFactory};
use super::error::CoinratError;
use super::strategy::{StrategyDependencies, StrategyRunner};
use super::strategy_run::StrategyRun;
use crate::adapters::mock_market::MARKET_PLUGIN_NAME;
use crate::plugins::Plugins;
use crate::ports::event_port::EventEmitter;

/// Runs a strategy against a mock market on a frozen clock, one tick per
/// strategy delay, from `interval.since` until `interval.till`.
pub struct StrategyReplayer {
    plugins: Rc<Plugins>,
    event_emitter: Rc<dyn EventEmitter>,
}

impl StrategyReplayer {
    pub fn new(plugins: Rc<Plugins>, event_emitter: Rc<dyn EventEmitter>) -> Self {
        StrategyReplayer {
            plugins,
            event_emitter,
        }
    }
}

impl StrategyRunner for StrategyReplayer {
    fn run(&self, strategy_run: &StrategyRun) -> Result<(), CoinratError> {
        let (Some(since), Some(till)) = (strategy_run.interval.since, strategy_run.interval.till)
        else {
            return Err(CoinratError::OpenInterval);
        };

        let order_storage = self.plugins.order_storage(&strategy_run.order_storage_name)?;
        let candle_storage = self.plugins.candle_storage(&strategy_run.candle_storage_name)?;

        let datetime_factory = Rc::new(FrozenDateTimeFactory::new(since));

        let strategy_plugin = self.plugins.strategy(&strategy_run.strategy_name)?;
        let strategy_configuration = format_data_to_typed(
            &strategy_run.strategy_name,
            &strategy_run.strategy_configuration,
            &(strategy_plugin.configuration_structure)(),
        )?;
        let mut strategy = (strategy_plugin.create)(
            StrategyDependencies {
                strategy_run_id: strategy_run.strategy_run_id,
                candle_storage: candle_storage.clone(),
                order_storage,
                event_emitter: self.event_emitter.clone(),
                datetime_factory: datetime_factory.clone(),
            },
            &strategy_configuration,
        )?;

        let run_market = strategy_run
            .markets
            .first()
            .ok_or_else(|| CoinratError::UnexpectedMarketCount {
                strategy: strategy_run.strategy_name.clone(),
                expected: 1,
                given: 0,
            })?;
        // Replays always trade against the simulated market.
        let market_plugin = self.plugins.market(MARKET_PLUGIN_NAME)?;
        let market_configuration = format_data_to_typed(
            &run_market.market_name,
            &run_market.market_configuration,
            &(market_plugin.configuration_structure)(),
        )?;
        let mut market = (market_plugin.create)(
            &run_market.market_name,
            datetime_factory.clone(),
            &market_configuration,
        )?;

        self.event_emitter.emit_new_strategy_run(strategy_run);
        log::info!(
            "replaying {} on {} {} from {} till {}",
            strategy.name(),
            market.name(),
            strategy_run.pair,
            since.to_rfc3339(),
            till.to_rfc3339(),
        );

        let pair = &strategy_run.pair;
        while datetime_factory.now() < till {
            let current_candle =
                candle_storage.get_last_minute_candle(market.name(), pair, datetime_factory.now())?;
            market.mock_current_price(pair, current_candle.average_price()?)?;
            strategy.tick(&mut [market.as_mut()], pair)?;
            datetime_factory.move_by(strategy.get_seconds_delay_between_runs())?;
        }

        log::info!("replay {} finished", strategy_run.strategy_run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::log_event_emitter::LogEventEmitter;
    use crate::adapters::memory_storage::{MemoryCandleStorage, MemoryOrderStorage};
    use crate::domain::configuration::RawConfiguration;
    use crate::domain::datetime::DateTimeInterval;
    use crate::domain::pair::Pair;
    use crate::domain::strategy_run::StrategyRunMarket;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn strategy_run(interval: DateTimeInterval, markets: Vec<StrategyRunMarket>) -> StrategyRun {
        StrategyRun {
            strategy_run_id: Uuid::new_v4(),
            run_at: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
            pair: Pair::new("USD", "BTC"),
            markets,
            strategy_name: "heikin_ashi".into(),
            strategy_configuration: RawConfiguration::new(),
            interval,
            candle_storage_name: "memory".into(),
            order_storage_name: "memory".into(),
        }
    }

    fn bittrex() -> StrategyRunMarket {
        StrategyRunMarket {
            plugin_name: "mock".into(),
            market_name: "bittrex".into(),
            market_configuration: RawConfiguration::new(),
        }
    }

    fn replayer() -> StrategyReplayer {
        let mut plugins = Plugins::with_defaults();
        plugins.register_candle_storage(Rc::new(MemoryCandleStorage::new("memory")));
        plugins.register_order_storage(Rc::new(MemoryOrderStorage::new("memory")));
        StrategyReplayer::new(Rc::new(plugins), Rc::new(LogEventEmitter))
    }

    #[test]
    fn open_interval_is_rejected() {
        let since = Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap();
        let run = strategy_run(DateTimeInterval::new(Some(since), None), vec![bittrex()]);
        assert!(matches!(
            replayer().run(&run),
            Err(CoinratError::OpenInterval)
        ));
    }

    #[test]
    fn run_without_markets_is_rejected() {
        let run = strategy_run(
            DateTimeInterval::closed(
                Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2017, 12, 2, 0, 0, 0).unwrap(),
            ),
            vec![],
        );
        assert!(matches!(
            replayer().run(&run),
            Err(CoinratError::UnexpectedMarketCount { given: 0, .. })
        ));
    }

    #[test]
    fn empty_interval_runs_no_ticks() {
        let at = Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap();
        let run = strategy_run(DateTimeInterval::closed(at, at), vec![bittrex()]);
        replayer().run(&run).unwrap();
    }

    #[test]
    fn missing_candle_aborts_run() {
        let run = strategy_run(
            DateTimeInterval::closed(
                Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2017, 12, 2, 0, 0, 0).unwrap(),
            ),
            vec![bittrex()],
        );
        assert!(matches!(
            replayer().run(&run),
            Err(CoinratError::CandleNotFound { .. })
        ));
    }
}
