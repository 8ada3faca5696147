//! Heikin-Ashi strategy driven tick by tick over arbitrary candle streams.

mod common;

use chrono::Duration;
use coinrat::adapters::memory_storage::{MemoryCandleStorage, MemoryOrderStorage};
use coinrat::adapters::mock_market::{MockMarket, MockMarketConfiguration};
use coinrat::domain::candle::Candle;
use coinrat::domain::datetime::FrozenDateTimeFactory;
use coinrat::domain::heikin_ashi::{HeikinAshiConfiguration, HeikinAshiStrategy, MAX_TREND};
use coinrat::domain::strategy::{Strategy, StrategyDependencies};
use coinrat::ports::candle_port::CandleStorage;
use coinrat::ports::market_port::Market;
use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::rc::Rc;
use uuid::Uuid;

/// Each flag picks a bullish or bearish day; moves are 1..=20 units.
fn candles_from_moves(moves: &[(bool, u32)]) -> Vec<Candle> {
    let mut price = Decimal::from(1000);
    moves
        .iter()
        .enumerate()
        .map(|(n, (up, size))| {
            let delta = Decimal::from(*size);
            let close = if *up { price + delta } else { price - delta };
            let candle = daily_candle(n as i64, price, close);
            price = close;
            candle
        })
        .collect()
}

fn replay_ticks(candles: &[Candle]) -> (Vec<i32>, Rc<MemoryOrderStorage>) {
    let clock = Rc::new(FrozenDateTimeFactory::new(day(4)));
    let candle_storage = Rc::new(MemoryCandleStorage::new("memory"));
    candle_storage.write_candles(candles).unwrap();
    let order_storage = Rc::new(MemoryOrderStorage::new("memory"));
    let events = Rc::new(RecordingEventEmitter::new());

    let mut strategy = HeikinAshiStrategy::new(
        StrategyDependencies {
            strategy_run_id: Uuid::new_v4(),
            candle_storage: candle_storage.clone(),
            order_storage: order_storage.clone(),
            event_emitter: events,
            datetime_factory: clock.clone(),
        },
        HeikinAshiConfiguration::default(),
    );
    let mut market = MockMarket::new(MARKET, clock.clone(), MockMarketConfiguration::default());

    let mut trends = Vec::new();
    for n in 4..candles.len() as i64 {
        let candle = candle_storage
            .get_last_minute_candle(MARKET, &pair(), day(n))
            .unwrap();
        market
            .mock_current_price(&pair(), candle.average_price().unwrap())
            .unwrap();
        strategy.tick(&mut [&mut market], &pair()).unwrap();
        trends.push(strategy.trend());
        clock.move_by(Duration::days(1)).unwrap();
    }
    (trends, order_storage)
}

#[test]
fn steady_rise_saturates_bullish_trend() {
    let (trends, orders) = replay_ticks(&rising_candles(0..14));

    assert_eq!(trends, vec![0, 1, 2, 3, 4, 5, 5, 5, 5, 5]);
    assert_eq!(*trends.last().unwrap(), MAX_TREND);
    let orders = orders.orders();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].is_buy());
    assert_eq!(orders[0].created_at(), day(5));
    assert_eq!(orders[0].rate(), Some(dec!(154)));
}

#[test]
fn choppy_market_keeps_trend_neutral() {
    let (trends, orders) = replay_ticks(&choppy_candles(0..8));

    assert_eq!(trends.len(), 4);
    // Alternating candles smooth into flat Heikin-Ashi candles.
    assert!(trends.iter().all(|trend| *trend == 0));
    assert!(trends.iter().all(|trend| trend.abs() < MAX_TREND));
    assert!(orders.orders().is_empty());
}

proptest! {
    #[test]
    fn trend_stays_within_bounds(
        moves in prop::collection::vec((any::<bool>(), 1u32..=20), 6..40)
    ) {
        let (trends, _) = replay_ticks(&candles_from_moves(&moves));
        for trend in trends {
            prop_assert!((-MAX_TREND..=MAX_TREND).contains(&trend));
        }
    }

    #[test]
    fn trend_moves_at_most_one_step_per_tick(
        moves in prop::collection::vec((any::<bool>(), 1u32..=20), 6..40)
    ) {
        let (trends, _) = replay_ticks(&candles_from_moves(&moves));
        for window in trends.windows(2) {
            prop_assert!((window[1] - window[0]).abs() <= 1);
        }
    }

    #[test]
    fn sells_never_follow_sells(
        moves in prop::collection::vec((any::<bool>(), 1u32..=20), 6..40)
    ) {
        // A sell moves the whole traded balance, so the next sell has nothing
        // to trade and is skipped. The account starts without BTC.
        let (_, orders) = replay_ticks(&candles_from_moves(&moves));
        let orders = orders.orders();
        if let Some(first) = orders.first() {
            prop_assert!(first.is_buy());
        }
        for window in orders.windows(2) {
            prop_assert!(!(window[0].is_sell() && window[1].is_sell()));
        }
    }
}
