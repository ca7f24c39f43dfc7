//! Background workers for the analytics engine.
//!
//! Periodic passes over every tenant:
//! - Customer recompute (RFM, segments, churn)
//! - KPI refresh
//! - Metrics flush to ClickHouse

pub mod scheduler;

pub use scheduler::*;
