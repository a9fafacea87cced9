//! Shared service helpers such as alert construction and telemetry wiring.

pub mod alerts;
pub mod telemetry;

pub use alerts::*;
pub use telemetry::*;
