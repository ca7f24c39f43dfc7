//! ClickHouse client wrapper.

use clickhouse::Client;
use tracing::info;

use crate::config::ClickHouseConfig;
use engine_core::error::DbErrorCode;
use engine_core::{Error, Result};

/// ClickHouse client wrapper. Cloning shares the underlying HTTP pool.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        config.validate()?;

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Client bound to the server's `default` database, for DDL that must
    /// run before the configured database exists.
    pub fn server(&self) -> Client {
        self.inner.clone().with_database("default")
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

pub(crate) fn read_err(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::ReadFailed, format!("ClickHouse read failed: {e}"))
}

pub(crate) fn write_err(e: clickhouse::error::Error) -> Error {
    Error::database(DbErrorCode::WriteFailed, format!("ClickHouse write failed: {e}"))
}
