//! DSMR P1 smart meter reader
//!
//! Locates the meter cable, frames the telegram stream, verifies checksums
//! and decodes the reference-coded lines into a nested reading.

pub mod config;
pub mod models;
pub mod obis_utils;
pub mod metering_p1;

// Re-export common types for easier access
pub use config::{ConfigError, ConfigHolder, P1Config};
pub use models::{ChannelKind, ProtocolProfile, Reading, Tariff};
pub use metering_p1::{process_telegram, P1Error, P1Event, P1Manager};
pub use metering_p1::connection::{ConnectionManager, ConnectionSettings, ConnectionState};
