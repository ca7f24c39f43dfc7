//! Execution of parameterized templates on behalf of KPIs, widgets and
//! reports.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use engine_core::error::QueryErrorCode;
use engine_core::{Error, QueryParam, QueryParams, QueryTemplate, Result};
use telemetry::metrics;

use crate::context::AnalyticsContext;

/// Placeholder always bound to the calling tenant.
pub const TENANT_ID: &str = "tenant_id";

/// Rejects templates that never reference `{{tenant_id}}`.
///
/// The fact tables are shared between tenants, so such a query would read
/// every tenant's rows.
pub fn require_tenant_scope(template: &QueryTemplate) -> Result<()> {
    if template.placeholders().iter().any(|p| p == TENANT_ID) {
        return Ok(());
    }
    Err(Error::query(
        QueryErrorCode::MalformedTemplate,
        format!("query must filter on {{{{{TENANT_ID}}}}}"),
    ))
}

/// Binds `params` plus the tenant id and runs the template.
///
/// Fails with QUERY_001 before anything is executed when the template is not
/// scoped to a tenant.
pub async fn run_template(
    ctx: &AnalyticsContext,
    template: &QueryTemplate,
    mut params: QueryParams,
) -> Result<Vec<Value>> {
    if let Err(e) = require_tenant_scope(template) {
        metrics().query_failures.inc();
        warn!(tenant_id = %ctx.tenant(), error = %e, "Rejected unscoped query");
        return Err(e);
    }
    params.insert(TENANT_ID, QueryParam::Text(ctx.tenant().to_string()));
    let bound = template.bind(&params)?;

    let start = Instant::now();
    let result = ctx.executor().execute(ctx.tenant(), &bound).await;
    metrics().query_latency_ms.observe_since(start);

    match result {
        Ok(rows) => {
            metrics().queries_executed.inc();
            debug!(
                tenant_id = %ctx.tenant(),
                params = bound.params.len(),
                rows = rows.len(),
                "Query executed"
            );
            Ok(rows)
        }
        Err(e) => {
            metrics().query_failures.inc();
            warn!(tenant_id = %ctx.tenant(), error = %e, "Query execution failed");
            Err(e)
        }
    }
}

/// Numeric `value` column of the first row, 0 when absent.
pub fn scalar_value(rows: &[Value]) -> f64 {
    let Some(value) = rows.first().and_then(|row| row.get("value")) else {
        return 0.0;
    };
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
