//! Testcontainer setup for ClickHouse.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use clickhouse_client::ClickHouseConfig;

/// Container handle for ClickHouse.
pub struct TestContainers {
    #[allow(dead_code)]
    clickhouse: Option<ContainerAsync<GenericImage>>,
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_username: Option<String>,
    pub clickhouse_password: Option<String>,
}

impl TestContainers {
    /// Start ClickHouse, or reuse the server named by
    /// `ANALYTICS_TEST_CLICKHOUSE_URL`.
    pub async fn start() -> Self {
        if let Some(url) = std::env::var("ANALYTICS_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self {
                clickhouse: None,
                clickhouse_url: url,
                clickhouse_database: std::env::var("ANALYTICS_TEST_CLICKHOUSE_DB")
                    .unwrap_or_else(|_| "analytics_test".to_string()),
                clickhouse_username: std::env::var("ANALYTICS_TEST_CLICKHOUSE_USER").ok(),
                clickhouse_password: std::env::var("ANALYTICS_TEST_CLICKHOUSE_PASSWORD").ok(),
            };
        }

        let (clickhouse, clickhouse_url) = start_clickhouse().await;

        Self {
            clickhouse: Some(clickhouse),
            clickhouse_url,
            clickhouse_database: "analytics_test".to_string(),
            clickhouse_username: Some("default".to_string()),
            clickhouse_password: None,
        }
    }

    pub fn config(&self) -> ClickHouseConfig {
        ClickHouseConfig {
            url: self.clickhouse_url.clone(),
            database: self.clickhouse_database.clone(),
            username: self.clickhouse_username.clone(),
            password: self.clickhouse_password.clone(),
            timeout_secs: 30,
        }
    }
}

/// Start ClickHouse container, return container and HTTP URL.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DB", "analytics_test")
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_http(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
