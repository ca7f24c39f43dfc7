//! Telemetry for the analytics engine.
//!
//! Counters and latency histograms are kept in-process and periodically
//! flushed to ClickHouse by the worker, next to the analytic tables.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
