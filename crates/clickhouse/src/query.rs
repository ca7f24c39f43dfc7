//! Query functions for reading data back (used in tests and admin).

use crate::client::{read_err, write_err, ClickHouseClient};
use crate::schema::ANALYTIC_TABLES;
use engine_core::{Result, TenantId};

/// Count facts for a tenant.
pub async fn count_facts(client: &ClickHouseClient, tenant: TenantId) -> Result<u64> {
    client
        .inner()
        .query("SELECT count() FROM business_events WHERE tenant_id = ?")
        .bind(tenant.to_string())
        .fetch_one()
        .await
        .map_err(read_err)
}

/// Count stored customer analytics rows for a tenant, after deduplication.
pub async fn count_customer_analytics(client: &ClickHouseClient, tenant: TenantId) -> Result<u64> {
    client
        .inner()
        .query("SELECT count() FROM customer_analytics FINAL WHERE tenant_id = ?")
        .bind(tenant.to_string())
        .fetch_one()
        .await
        .map_err(read_err)
}

/// Count generated reports for a tenant.
pub async fn count_generated_reports(client: &ClickHouseClient, tenant: TenantId) -> Result<u64> {
    client
        .inner()
        .query("SELECT count() FROM generated_reports WHERE tenant_id = ?")
        .bind(tenant.to_string())
        .fetch_one()
        .await
        .map_err(read_err)
}

/// Delete every row of a tenant (test cleanup).
pub async fn delete_tenant(client: &ClickHouseClient, tenant: TenantId) -> Result<()> {
    for table in ANALYTIC_TABLES {
        client
            .inner()
            .query(&format!("ALTER TABLE {table} DELETE WHERE tenant_id = ?"))
            .bind(tenant.to_string())
            .execute()
            .await
            .map_err(write_err)?;
    }
    Ok(())
}

/// Truncate all analytic tables (test cleanup).
pub async fn truncate_all(client: &ClickHouseClient) -> Result<()> {
    for table in ANALYTIC_TABLES {
        client
            .inner()
            .query(&format!("TRUNCATE TABLE IF EXISTS {table}"))
            .execute()
            .await
            .map_err(write_err)?;
    }
    Ok(())
}
