//! Plugin registry: resolves strategies, markets and storages by name.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::adapters::mock_market::{MockMarket, MockMarketConfiguration, MARKET_PLUGIN_NAME};
use crate::domain::configuration::{Configuration, ConfigurationStructure};
use crate::domain::datetime::DateTimeFactory;
use crate::domain::error::CoinratError;
use crate::domain::heikin_ashi::{HeikinAshiConfiguration, HeikinAshiStrategy, STRATEGY_NAME};
use crate::domain::strategy::{Strategy, StrategyDependencies};
use crate::ports::candle_port::CandleStorage;
use crate::ports::market_port::Market;
use crate::ports::order_port::OrderStorage;

pub type StrategyFactory =
    fn(StrategyDependencies, &Configuration) -> Result<Box<dyn Strategy>, CoinratError>;

pub type MarketFactory =
    fn(&str, Rc<dyn DateTimeFactory>, &Configuration) -> Result<Box<dyn Market>, CoinratError>;

#[derive(Clone, Copy)]
pub struct StrategyPlugin {
    pub name: &'static str,
    pub configuration_structure: fn() -> ConfigurationStructure,
    pub create: StrategyFactory,
}

#[derive(Clone, Copy)]
pub struct MarketPlugin {
    pub name: &'static str,
    pub configuration_structure: fn() -> ConfigurationStructure,
    pub create: MarketFactory,
}

fn create_heikin_ashi(
    dependencies: StrategyDependencies,
    configuration: &Configuration,
) -> Result<Box<dyn Strategy>, CoinratError> {
    let configuration = HeikinAshiConfiguration::from_configuration(configuration)?;
    Ok(Box::new(HeikinAshiStrategy::new(dependencies, configuration)))
}

fn create_mock_market(
    market_name: &str,
    datetime_factory: Rc<dyn DateTimeFactory>,
    configuration: &Configuration,
) -> Result<Box<dyn Market>, CoinratError> {
    let configuration = MockMarketConfiguration::from_configuration(configuration)?;
    Ok(Box::new(MockMarket::new(
        market_name,
        datetime_factory,
        configuration,
    )))
}

pub const HEIKIN_ASHI_PLUGIN: StrategyPlugin = StrategyPlugin {
    name: STRATEGY_NAME,
    configuration_structure: HeikinAshiConfiguration::configuration_structure,
    create: create_heikin_ashi,
};

pub const MOCK_MARKET_PLUGIN: MarketPlugin = MarketPlugin {
    name: MARKET_PLUGIN_NAME,
    configuration_structure: MockMarketConfiguration::configuration_structure,
    create: create_mock_market,
};

/// Everything a run can refer to by name.
///
/// Strategies and markets are registered as factories since each run builds
/// fresh instances. Storages are registered as shared instances.
#[derive(Default)]
pub struct Plugins {
    strategies: BTreeMap<String, StrategyPlugin>,
    markets: BTreeMap<String, MarketPlugin>,
    candle_storages: BTreeMap<String, Rc<dyn CandleStorage>>,
    order_storages: BTreeMap<String, Rc<dyn OrderStorage>>,
}

impl Plugins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in strategies and markets. Storages still have to be registered.
    pub fn with_defaults() -> Self {
        let mut plugins = Self::new();
        plugins.register_strategy(HEIKIN_ASHI_PLUGIN);
        plugins.register_market(MOCK_MARKET_PLUGIN);
        plugins
    }

    pub fn register_strategy(&mut self, plugin: StrategyPlugin) {
        self.strategies.insert(plugin.name.to_string(), plugin);
    }

    pub fn register_market(&mut self, plugin: MarketPlugin) {
        self.markets.insert(plugin.name.to_string(), plugin);
    }

    pub fn register_candle_storage(&mut self, storage: Rc<dyn CandleStorage>) {
        self.candle_storages
            .insert(storage.name().to_string(), storage);
    }

    pub fn register_order_storage(&mut self, storage: Rc<dyn OrderStorage>) {
        self.order_storages
            .insert(storage.name().to_string(), storage);
    }

    pub fn strategy(&self, name: &str) -> Result<&StrategyPlugin, CoinratError> {
        self.strategies.get(name).ok_or_else(|| unknown("strategy", name))
    }

    pub fn market(&self, name: &str) -> Result<&MarketPlugin, CoinratError> {
        self.markets.get(name).ok_or_else(|| unknown("market", name))
    }

    pub fn candle_storage(&self, name: &str) -> Result<Rc<dyn CandleStorage>, CoinratError> {
        self.candle_storages
            .get(name)
            .cloned()
            .ok_or_else(|| unknown("candle storage", name))
    }

    pub fn order_storage(&self, name: &str) -> Result<Rc<dyn OrderStorage>, CoinratError> {
        self.order_storages
            .get(name)
            .cloned()
            .ok_or_else(|| unknown("order storage", name))
    }

    pub fn available_strategies(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    pub fn available_markets(&self) -> Vec<&str> {
        self.markets.keys().map(String::as_str).collect()
    }

    pub fn available_candle_storages(&self) -> Vec<&str> {
        self.candle_storages.keys().map(String::as_str).collect()
    }

    pub fn available_order_storages(&self) -> Vec<&str> {
        self.order_storages.keys().map(String::as_str).collect()
    }
}

fn unknown(kind: &'static str, name: &str) -> CoinratError {
    CoinratError::UnknownPlugin {
        kind,
        name: name.to_string(),
    }
}
