//! Domain error types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Top-level error type for coinrat.
#[derive(Debug, thiserror::Error)]
pub enum CoinratError {
    #[error("strategy replayer cannot run simulation for non-closed interval")]
    OpenInterval,

    #[error("{strategy} expects exactly {expected} market(s), but {given} given")]
    UnexpectedMarketCount {
        strategy: String,
        expected: usize,
        given: usize,
    },

    #[error("expected to get {expected} candles, but {got} given; do you have enough data?")]
    InsufficientCandles { expected: String, got: usize },

    #[error("no candle for {pair} on {market} at {at}")]
    CandleNotFound {
        market: String,
        pair: String,
        at: DateTime<Utc>,
    },

    #[error("not enough {currency} to perform order: required {required}, available {available}")]
    NotEnoughBalance {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("no current price for {pair} on {market}")]
    PriceNotAvailable { market: String, pair: String },

    #[error("market {market} does not support price mocking")]
    PriceMockingUnsupported { market: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("cannot {action} order {order_id} in status {status}")]
    InvalidOrderTransition {
        order_id: String,
        action: &'static str,
        status: String,
    },

    #[error("invalid pair {value:?}: expected LEFT_RIGHT")]
    InvalidPair { value: String },

    #[error("invalid candle size {value:?}: {reason}")]
    InvalidCandleSize { value: String, reason: String },

    #[error("time can only move forward, got delta of {seconds}s")]
    InvalidTimeDelta { seconds: i64 },

    #[error("datetime out of range: {reason}")]
    DateTimeOutOfRange { reason: String },

    #[error("decimal overflow while computing {context}")]
    DecimalOverflow { context: &'static str },

    #[error("cannot deserialize {record}: {reason}")]
    Deserialize { record: &'static str, reason: String },

    #[error("{kind} {name:?} not provided by any plugin")]
    UnknownPlugin { kind: &'static str, name: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CoinratError> for std::process::ExitCode {
    fn from(err: &CoinratError) -> Self {
        let code: u8 = match err {
            CoinratError::Io(_) => 1,
            CoinratError::ConfigParse { .. }
            | CoinratError::ConfigMissing { .. }
            | CoinratError::ConfigInvalid { .. }
            | CoinratError::InvalidPair { .. }
            | CoinratError::InvalidCandleSize { .. } => 2,
            CoinratError::Database { .. } | CoinratError::DatabaseQuery { .. } => 3,
            CoinratError::OpenInterval
            | CoinratError::UnexpectedMarketCount { .. }
            | CoinratError::InsufficientCandles { .. }
            | CoinratError::InvalidTimeDelta { .. }
            | CoinratError::DateTimeOutOfRange { .. }
            | CoinratError::DecimalOverflow { .. }
            | CoinratError::InvalidOrder { .. }
            | CoinratError::InvalidOrderTransition { .. }
            | CoinratError::NotEnoughBalance { .. }
            | CoinratError::PriceMockingUnsupported { .. } => 4,
            CoinratError::CandleNotFound { .. }
            | CoinratError::PriceNotAvailable { .. }
            | CoinratError::Deserialize { .. }
            | CoinratError::UnknownPlugin { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

impl CoinratError {
    pub(crate) fn invalid_order(reason: impl Into<String>) -> Self {
        CoinratError::InvalidOrder {
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(context: &'static str) -> Self {
        CoinratError::DecimalOverflow { context }
    }

    pub(crate) fn deserialize(record: &'static str, reason: impl ToString) -> Self {
        CoinratError::Deserialize {
            record,
            reason: reason.to_string(),
        }
    }
}
