//! coinrat — cryptocurrency trading strategy replayer.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], name-based wiring in [`plugins`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod plugins;
pub mod ports;
