//! ClickHouse storage for the analytics engine.

pub mod client;
pub mod config;
pub mod executor;
pub mod facts;
pub mod health;
pub mod insert;
pub mod query;
pub mod rows;
pub mod schema;
pub mod store;

pub use client::ClickHouseClient;
pub use config::ClickHouseConfig;
pub use executor::ClickHouseQueryExecutor;
pub use facts::ClickHouseFactReader;
pub use health::check_connection;
pub use insert::{insert_customers, insert_facts, insert_metrics};
pub use query::*;
pub use schema::init_schema;
pub use store::ClickHouseStore;
