//! ClickHouse configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use engine_core::{Error, Result};

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    /// Database holding facts and analytic tables
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Query timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "analytics".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: default_database(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClickHouseConfig {
    /// Checks the URL scheme and the database identifier.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::internal(format!("invalid ClickHouse url {:?}: {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::internal(format!(
                "ClickHouse url must use http or https, got {}",
                url.scheme()
            )));
        }
        let valid_name = !self.database.is_empty()
            && self
                .database
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(Error::internal(format!(
                "invalid ClickHouse database name {:?}",
                self.database
            )));
        }
        Ok(())
    }
}
