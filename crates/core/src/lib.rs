//! Core types, stores, and validation for the analytics engine.

pub mod clock;
pub mod cohort;
pub mod customer;
pub mod dashboard;
pub mod date_range;
pub mod error;
pub mod facts;
pub mod forecast;
pub mod kpi;
pub mod limits;
pub mod query;
pub mod store;
pub mod tenant;

pub use clock::*;
pub use cohort::*;
pub use customer::*;
pub use dashboard::*;
pub use date_range::*;
pub use error::{Error, Result};
pub use facts::*;
pub use forecast::*;
pub use kpi::*;
pub use query::*;
pub use store::*;
pub use tenant::*;
