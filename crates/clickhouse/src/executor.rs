//! Template execution against ClickHouse.
//!
//! Bound templates are wrapped so every row comes back as one JSONEachRow
//! string, which keeps arbitrary result shapes readable without a
//! per-template row struct.

use std::time::Instant;

use async_trait::async_trait;
use clickhouse::Row;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use engine_core::error::QueryErrorCode;
use engine_core::{BoundQuery, Error, QueryExecutor, QueryParam, Result, TenantId};

use crate::client::ClickHouseClient;
use crate::rows::date_param;

#[derive(Debug, Row, Deserialize)]
struct JsonRow {
    row: String,
}

/// [`QueryExecutor`] backed by ClickHouse.
#[derive(Clone)]
pub struct ClickHouseQueryExecutor {
    client: ClickHouseClient,
}

impl ClickHouseQueryExecutor {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

fn wrap(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';');
    format!("SELECT formatRowNoNewline('JSONEachRow', *) AS row FROM ({inner})")
}

fn exec_err(e: impl std::fmt::Display) -> Error {
    Error::query(QueryErrorCode::ExecutionFailed, format!("query failed: {e}"))
}

#[async_trait]
impl QueryExecutor for ClickHouseQueryExecutor {
    async fn execute(&self, tenant: TenantId, query: &BoundQuery) -> Result<Vec<Value>> {
        let start = Instant::now();
        let mut q = self.client.inner().query(&wrap(&query.sql));
        for param in &query.params {
            q = match param {
                QueryParam::Date(d) => q.bind(date_param(*d)),
                QueryParam::Text(s) => q.bind(s.as_str()),
                QueryParam::Int(i) => q.bind(*i),
                QueryParam::Float(x) => q.bind(*x),
            };
        }

        let rows: Vec<JsonRow> = q.fetch_all().await.map_err(|e| {
            warn!(tenant_id = %tenant, error = %e, "Template query failed");
            exec_err(e)
        })?;

        let values = rows
            .into_iter()
            .map(|r| serde_json::from_str::<Value>(&r.row).map_err(exec_err))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            tenant_id = %tenant,
            rows = values.len(),
            latency_ms = %start.elapsed().as_millis(),
            "Executed template query"
        );
        Ok(values)
    }
}
