//! Port traits: the narrow interfaces the replay core consumes.

pub mod candle_port;
pub mod config_port;
pub mod event_port;
pub mod market_port;
pub mod order_port;
