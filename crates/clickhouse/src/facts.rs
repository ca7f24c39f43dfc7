//! Fact reader over `business_events` and `customers`.

use async_trait::async_trait;
use clickhouse::Row;
use serde::Deserialize;
use tracing::{debug, warn};

use engine_core::{
    CustomerId, CustomerSummary, DateRange, FactReader, FactRow, FactStatus, FirstEvent,
    MonthlyRevenue, Result, TenantId,
};
use telemetry::metrics;

use crate::client::{read_err, ClickHouseClient};
use crate::rows::{date_param, days_to_date, FactEventRow};

#[derive(Debug, Row, Deserialize)]
struct TenantRow {
    tenant_id: String,
}

#[derive(Debug, Row, Deserialize)]
struct SummaryRow {
    total_events: u64,
    total_revenue: f64,
    cancelled_events: u64,
    first_event_date: Option<i32>,
    last_event_date: Option<i32>,
}

#[derive(Debug, Row, Deserialize)]
struct FirstEventRow {
    customer_id: u64,
    first_event_date: i32,
}

#[derive(Debug, Row, Deserialize)]
struct MonthlyRevenueRow {
    month: i32,
    revenue: f64,
    transactions: u64,
}

/// [`FactReader`] backed by ClickHouse.
#[derive(Clone)]
pub struct ClickHouseFactReader {
    client: ClickHouseClient,
}

impl ClickHouseFactReader {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FactReader for ClickHouseFactReader {
    async fn list_tenants(&self) -> Result<Vec<TenantId>> {
        let rows: Vec<TenantRow> = self
            .client
            .inner()
            .query(
                "SELECT DISTINCT tenant_id FROM (\
                 SELECT tenant_id FROM business_events \
                 UNION ALL SELECT tenant_id FROM customers) ORDER BY tenant_id",
            )
            .fetch_all()
            .await
            .map_err(read_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|r| match r.tenant_id.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(tenant_id = %r.tenant_id, "Skipping tenant with malformed id");
                    None
                }
            })
            .collect())
    }

    async fn list_customers(&self, tenant: TenantId) -> Result<Vec<CustomerId>> {
        self.client
            .inner()
            .query("SELECT DISTINCT customer_id FROM customers FINAL WHERE tenant_id = ? ORDER BY customer_id")
            .bind(tenant.to_string())
            .fetch_all::<u64>()
            .await
            .map_err(read_err)
    }

    async fn list_events(
        &self,
        tenant: TenantId,
        range: DateRange,
        status: Option<FactStatus>,
    ) -> Result<Vec<FactRow>> {
        let mut sql = String::from(
            "SELECT ?fields FROM business_events \
             WHERE tenant_id = ? AND event_date BETWEEN ? AND ?",
        );
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY event_date, customer_id");

        let mut query = self
            .client
            .inner()
            .query(&sql)
            .bind(tenant.to_string())
            .bind(date_param(range.start))
            .bind(date_param(range.end));
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows: Vec<FactEventRow> = query.fetch_all().await.map_err(read_err)?;
        let total = rows.len();
        let facts: Vec<FactRow> = rows.into_iter().filter_map(FactEventRow::into_fact).collect();

        let unknown = (total - facts.len()) as u64;
        if unknown > 0 {
            metrics().fact_rows_skipped.inc_by(unknown);
            warn!(tenant_id = %tenant, skipped = unknown, "Skipped facts with unknown status");
        }
        debug!(tenant_id = %tenant, range = %range, rows = facts.len(), "Loaded facts");
        Ok(facts)
    }

    async fn customer_summary(
        &self,
        tenant: TenantId,
        customer: CustomerId,
    ) -> Result<CustomerSummary> {
        let row: SummaryRow = self
            .client
            .inner()
            .query(
                "SELECT \
                   countIf(status = 'completed') AS total_events, \
                   sumIf(amount, status = 'completed') AS total_revenue, \
                   countIf(status = 'cancelled') AS cancelled_events, \
                   if(total_events = 0, NULL, minIf(event_date, status = 'completed')) AS first_event_date, \
                   if(total_events = 0, NULL, maxIf(event_date, status = 'completed')) AS last_event_date \
                 FROM business_events \
                 WHERE tenant_id = ? AND customer_id = ? AND isFinite(amount) AND amount >= 0",
            )
            .bind(tenant.to_string())
            .bind(customer)
            .fetch_one()
            .await
            .map_err(read_err)?;

        Ok(CustomerSummary {
            customer_id: customer,
            first_event_date: row.first_event_date.map(days_to_date),
            last_event_date: row.last_event_date.map(days_to_date),
            total_events: row.total_events,
            total_revenue: row.total_revenue,
            cancelled_events: row.cancelled_events,
        })
    }

    async fn first_completed_events(&self, tenant: TenantId) -> Result<Vec<FirstEvent>> {
        let rows: Vec<FirstEventRow> = self
            .client
            .inner()
            .query(
                "SELECT customer_id, min(event_date) AS first_event_date \
                 FROM business_events \
                 WHERE tenant_id = ? AND status = 'completed' \
                 GROUP BY customer_id ORDER BY customer_id",
            )
            .bind(tenant.to_string())
            .fetch_all()
            .await
            .map_err(read_err)?;

        Ok(rows
            .into_iter()
            .map(|r| FirstEvent {
                customer_id: r.customer_id,
                first_event_date: days_to_date(r.first_event_date),
            })
            .collect())
    }

    async fn count_active_customers(
        &self,
        tenant: TenantId,
        customers: &[CustomerId],
        range: DateRange,
    ) -> Result<u64> {
        if customers.is_empty() {
            return Ok(0);
        }
        self.client
            .inner()
            .query(
                "SELECT uniqExact(customer_id) FROM business_events \
                 WHERE tenant_id = ? AND status = 'completed' \
                   AND event_date BETWEEN ? AND ? AND has(?, customer_id)",
            )
            .bind(tenant.to_string())
            .bind(date_param(range.start))
            .bind(date_param(range.end))
            .bind(customers)
            .fetch_one::<u64>()
            .await
            .map_err(read_err)
    }

    async fn monthly_revenue(
        &self,
        tenant: TenantId,
        range: DateRange,
    ) -> Result<Vec<MonthlyRevenue>> {
        let rows: Vec<MonthlyRevenueRow> = self
            .client
            .inner()
            .query(
                "SELECT toDate32(toStartOfMonth(event_date)) AS month, \
                        sum(amount) AS revenue, count() AS transactions \
                 FROM business_events \
                 WHERE tenant_id = ? AND status = 'completed' \
                   AND event_date BETWEEN ? AND ? AND isFinite(amount) AND amount >= 0 \
                 GROUP BY month ORDER BY month",
            )
            .bind(tenant.to_string())
            .bind(date_param(range.start))
            .bind(date_param(range.end))
            .fetch_all()
            .await
            .map_err(read_err)?;

        Ok(rows
            .into_iter()
            .map(|r| MonthlyRevenue {
                month: days_to_date(r.month),
                revenue: r.revenue,
                transactions: r.transactions,
            })
            .collect())
    }

    async fn count_completed_events(&self, tenant: TenantId, range: DateRange) -> Result<u64> {
        self.client
            .inner()
            .query(
                "SELECT count() FROM business_events \
                 WHERE tenant_id = ? AND status = 'completed' AND event_date BETWEEN ? AND ?",
            )
            .bind(tenant.to_string())
            .bind(date_param(range.start))
            .bind(date_param(range.end))
            .fetch_one::<u64>()
            .await
            .map_err(read_err)
    }
}
