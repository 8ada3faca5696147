//! Heikin-Ashi trend strategy.
//!
//! The strategy keeps three smoothed candles: the two last completed periods
//! and the period still in progress. Every tick it nudges a trend score by
//! the direction of the older completed candle and, once a new period has
//! completed, looks for two agreeing completed candles to trade on.
//!
//! References:
//! - <https://quantiacs.com/Blog/Intro-to-Algorithmic-Trading-with-Heikin-Ashi.aspx>
//! - <http://www.humbletraders.com/heikin-ashi-trading-strategy/>

pub mod candle;

use chrono::Duration;
use std::rc::Rc;
use uuid::Uuid;

use self::candle::{candle_to_heikin_ashi, create_initial_heikin_ashi_candle, HeikinAshiCandle};
use crate::domain::candle::{Candle, CandleSize};
use crate::domain::configuration::{Configuration, ConfigurationStructure, ConfigurationValue};
use crate::domain::datetime::{DateTimeFactory, DateTimeInterval};
use crate::domain::error::CoinratError;
use crate::domain::order::{Direction, Order, OrderFields};
use crate::domain::pair::Pair;
use crate::domain::strategy::{Strategy, StrategyDependencies};
use crate::ports::candle_port::CandleStorage;
use crate::ports::event_port::EventEmitter;
use crate::ports::market_port::Market;
use crate::ports::order_port::OrderStorage;

pub const STRATEGY_NAME: &str = "heikin_ashi";
pub const DEFAULT_CANDLE_SIZE: &str = "1-day";

/// Trend score saturates at +/- this value.
pub const MAX_TREND: i32 = 5;

const WARM_UP_PERIODS: i32 = 4;
const TICK_PERIODS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeikinAshiConfiguration {
    pub candle_size: CandleSize,
}

impl Default for HeikinAshiConfiguration {
    fn default() -> Self {
        HeikinAshiConfiguration {
            candle_size: CandleSize::one_day(),
        }
    }
}

impl HeikinAshiConfiguration {
    pub fn configuration_structure() -> ConfigurationStructure {
        ConfigurationStructure::new().field(
            "candle_size",
            "Candle size",
            ConfigurationValue::String(DEFAULT_CANDLE_SIZE.to_string()),
            "",
        )
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, CoinratError> {
        let raw = configuration.get_string("candle_size")?;
        let candle_size = raw.parse().map_err(|e| CoinratError::ConfigInvalid {
            section: configuration.section().to_string(),
            key: "candle_size".into(),
            reason: format!("{e}"),
        })?;
        Ok(HeikinAshiConfiguration { candle_size })
    }
}

#[derive(Debug, Clone)]
struct SmoothedCandles {
    second_previous: HeikinAshiCandle,
    first_previous: HeikinAshiCandle,
    current_unfinished: HeikinAshiCandle,
}

pub struct HeikinAshiStrategy {
    strategy_run_id: Uuid,
    candle_storage: Rc<dyn CandleStorage>,
    order_storage: Rc<dyn OrderStorage>,
    event_emitter: Rc<dyn EventEmitter>,
    datetime_factory: Rc<dyn DateTimeFactory>,
    candle_size: CandleSize,
    strategy_ticker: u64,
    candles: Option<SmoothedCandles>,
    trend: i32,
}

impl HeikinAshiStrategy {
    pub fn new(
        dependencies: StrategyDependencies,
        configuration: HeikinAshiConfiguration,
    ) -> Self {
        HeikinAshiStrategy {
            strategy_run_id: dependencies.strategy_run_id,
            candle_storage: dependencies.candle_storage,
            order_storage: dependencies.order_storage,
            event_emitter: dependencies.event_emitter,
            datetime_factory: dependencies.datetime_factory,
            candle_size: configuration.candle_size,
            strategy_ticker: 0,
            candles: None,
            trend: 0,
        }
    }

    pub fn trend(&self) -> i32 {
        self.trend
    }

    pub fn ticker(&self) -> u64 {
        self.strategy_ticker
    }

    /// Read `periods` candles back from now. Storage may hand back one
    /// extra, half-cut candle at the start; it is dropped.
    fn read_window(
        &self,
        market: &dyn Market,
        pair: &Pair,
        periods: i32,
    ) -> Result<Vec<Candle>, CoinratError> {
        let now = self.datetime_factory.now();
        let since = self
            .candle_size
            .as_duration()
            .checked_mul(periods)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| CoinratError::DateTimeOutOfRange {
                reason: format!("{} periods of {} before {}", periods, self.candle_size, now),
            })?;
        let interval = DateTimeInterval::closed(since, now);
        let mut candles = self
            .candle_storage
            .find_by(market.name(), pair, &interval, self.candle_size)?;

        let expected = periods as usize;
        if candles.len() != expected && candles.len() != expected + 1 {
            return Err(CoinratError::InsufficientCandles {
                expected: format!("{} or {}", expected, expected + 1),
                got: candles.len(),
            });
        }
        if candles.len() == expected + 1 {
            candles.remove(0);
        }
        Ok(candles)
    }

    fn first_tick_initialize_strategy_data(
        &mut self,
        market: &dyn Market,
        pair: &Pair,
    ) -> Result<(), CoinratError> {
        let candles = self.read_window(market, pair, WARM_UP_PERIODS)?;

        let first = create_initial_heikin_ashi_candle(&candles[0])?;
        let second_previous = candle_to_heikin_ashi(&candles[1], &first)?;
        let first_previous = candle_to_heikin_ashi(&candles[2], &second_previous)?;
        let current_unfinished = candle_to_heikin_ashi(&candles[3], &first_previous)?;

        self.candles = Some(SmoothedCandles {
            second_previous,
            first_previous,
            current_unfinished,
        });
        Ok(())
    }

    fn steady_tick(&mut self, market: &mut dyn Market, pair: &Pair) -> Result<(), CoinratError> {
        let candles = self.read_window(market, pair, TICK_PERIODS)?;

        self.update_trend();

        let Some(state) = self.candles.as_mut() else {
            return Ok(());
        };
        if candles[0].time != state.current_unfinished.time {
            return Ok(());
        }

        let first_previous = candle_to_heikin_ashi(&candles[0], &state.first_previous)?;
        let current_unfinished = candle_to_heikin_ashi(&candles[1], &first_previous)?;
        state.second_previous = std::mem::replace(&mut state.first_previous, first_previous);
        state.current_unfinished = current_unfinished;

        self.log_tick();

        if let Err(e) = self.check_for_buy_or_sell(market, pair) {
            match e {
                // No pending-order state: skip this signal and wait for the next one.
                CoinratError::NotEnoughBalance { .. } => log::warn!("{e}"),
                _ => return Err(e),
            }
        }
        Ok(())
    }

    fn update_trend(&mut self) {
        let Some(state) = &self.candles else {
            return;
        };
        if state.second_previous.is_bearish() && self.trend > -MAX_TREND {
            self.trend -= 1;
        }
        if state.second_previous.is_bullish() && self.trend < MAX_TREND {
            self.trend += 1;
        }
    }

    fn check_for_buy_or_sell(
        &self,
        market: &mut dyn Market,
        pair: &Pair,
    ) -> Result<(), CoinratError> {
        let Some(state) = &self.candles else {
            return Ok(());
        };
        let both_bearish =
            state.first_previous.is_bearish() && state.second_previous.is_bearish();
        let both_bullish =
            state.first_previous.is_bullish() && state.second_previous.is_bullish();

        if self.trend >= MAX_TREND && both_bearish {
            self.create_order(market, pair, Direction::Sell)?;
        }
        // The buy side compares with `<=`, unlike the sell side; kept as is.
        if self.trend <= MAX_TREND && both_bullish {
            self.create_order(market, pair, Direction::Buy)?;
        }
        Ok(())
    }

    fn create_order(
        &self,
        market: &mut dyn Market,
        pair: &Pair,
        direction: Direction,
    ) -> Result<(), CoinratError> {
        let current_price = market.get_current_price(pair)?;
        log::info!(
            "{}ING at price: {}",
            direction.to_string().to_uppercase(),
            current_price
        );

        let quantity = match direction {
            Direction::Buy => market.calculate_maximal_amount_to_buy(pair, current_price)?,
            Direction::Sell => market.calculate_maximal_amount_to_sell(pair),
        };
        let order = Order::new(OrderFields::open_limit(
            self.strategy_run_id,
            market.name(),
            direction,
            self.datetime_factory.now(),
            pair.clone(),
            quantity,
            current_price,
        ))?;

        let order = market.place_order(order)?;
        self.event_emitter
            .emit_new_order(self.order_storage.name(), &order);
        self.order_storage.save_order(&order)
    }

    fn log_tick(&self) {
        let Some(state) = &self.candles else {
            return;
        };
        let direction = |c: &HeikinAshiCandle| if c.is_bearish() { "BEAR" } else { "BULL" };
        log::info!(
            "[{}] {} | Trend: {}, HA_Candle(-1): {}, HA_Candle(0): {}",
            state.current_unfinished.time.to_rfc3339(),
            self.strategy_ticker,
            self.trend,
            direction(&state.first_previous),
            direction(&state.second_previous),
        );
    }
}

fn single_market<'m, 'b>(
    markets: &'m mut [&'b mut dyn Market],
) -> Result<&'m mut (dyn Market + 'b), CoinratError> {
    let given = markets.len();
    match markets {
        [market] => Ok(&mut **market),
        _ => Err(CoinratError::UnexpectedMarketCount {
            strategy: "HeikinAshiStrategy".into(),
            expected: 1,
            given,
        }),
    }
}

impl Strategy for HeikinAshiStrategy {
    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    fn get_seconds_delay_between_runs(&self) -> Duration {
        self.candle_size.as_duration()
    }

    fn tick(&mut self, markets: &mut [&mut dyn Market], pair: &Pair) -> Result<(), CoinratError> {
        let market = single_market(markets)?;

        if self.candles.is_none() {
            self.first_tick_initialize_strategy_data(market, pair)?;
        } else {
            self.steady_tick(market, pair)?;
        }

        self.strategy_ticker += 1;
        Ok(())
    }
}
