//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_event_emitter;
pub mod memory_storage;
pub mod mock_market;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
