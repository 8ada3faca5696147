//! Core domain types and logic.

pub mod candle;
pub mod configuration;
pub mod datetime;
pub mod error;
pub mod heikin_ashi;
pub mod order;
pub mod pair;
pub mod replayer;
pub mod strategy;
pub mod strategy_run;
