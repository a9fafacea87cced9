//! Domain-level building blocks shared across the monitor binary and any
//! embedding process: address/hash newtypes, finding construction, watchlist
//! configuration, and telemetry wiring.

pub mod config;
pub mod model;
pub mod services;

pub use config::{ConfigError, MonitorConfig, Watchlist};
pub use model::*;
pub use services::alerts::{AlertEmitter, PendingTxAlerts};
