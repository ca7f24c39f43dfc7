//! Dashboard composition.
//!
//! Widgets render independently: a failing query turns into a failure
//! payload for that widget only, and the rest of the dashboard still
//! renders.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use engine_core::error::{InputErrorCode, NotFoundCode};
use engine_core::{
    DashboardId, DataSource, DateRange, DateRangeKeyword, Error, QueryParams, QueryTemplate,
    RenderedDashboard, RenderedWidget, ReportTemplateId, Result, Widget, WidgetData,
};
use telemetry::metrics;

use crate::context::AnalyticsContext;
use crate::query::run_template;

/// Range used by widgets that name none.
pub const DEFAULT_WIDGET_RANGE: DateRangeKeyword = DateRangeKeyword::Last30Days;

/// Visible widgets in render order.
pub fn render_order(mut widgets: Vec<Widget>) -> Vec<Widget> {
    widgets.retain(|w| w.is_visible);
    widgets.sort_by_key(Widget::sort_key);
    widgets
}

fn widget_range(ctx: &AnalyticsContext, keyword: Option<DateRangeKeyword>) -> DateRange {
    keyword
        .unwrap_or(DEFAULT_WIDGET_RANGE)
        .resolve(ctx.clock().today())
}

async fn run_report_template(
    ctx: &AnalyticsContext,
    template_id: Option<ReportTemplateId>,
    keyword: Option<DateRangeKeyword>,
) -> Result<Vec<Value>> {
    let Some(template_id) = template_id else {
        return Err(Error::invalid_input(
            InputErrorCode::InvalidParameter,
            "No report template specified",
        ));
    };
    let template = ctx.report_template(template_id).await?;
    let range = widget_range(ctx, keyword.or(template.default_date_range));
    run_template(ctx, &template.query_template, QueryParams::for_range(range)).await
}

async fn run_custom_query(
    ctx: &AnalyticsContext,
    query: &str,
    keyword: Option<DateRangeKeyword>,
) -> Result<Vec<Value>> {
    let template = QueryTemplate::parse(query)?;
    let range = widget_range(ctx, keyword);
    run_template(ctx, &template, QueryParams::for_range(range)).await
}

/// Computes a widget payload without consulting its cache.
pub async fn compute_widget(ctx: &AnalyticsContext, widget: &Widget) -> WidgetData {
    let result = match &widget.data_source {
        DataSource::Static { payload } => return WidgetData::literal(payload.clone()),
        DataSource::ReportTemplate { template_id } => {
            run_report_template(ctx, *template_id, widget.date_range).await
        }
        DataSource::CustomQuery { query } => run_custom_query(ctx, query, widget.date_range).await,
    };

    match result {
        Ok(rows) => WidgetData::rows(rows),
        Err(e) => {
            metrics().widget_failures.inc();
            warn!(
                tenant_id = %ctx.tenant(),
                widget_id = widget.id,
                source = widget.data_source.kind(),
                error = %e,
                "Widget render failed"
            );
            WidgetData::failure(e.to_string())
        }
    }
}

async fn render_widget(ctx: &AnalyticsContext, widget: Widget) -> RenderedWidget {
    let now = ctx.clock().now();
    if let Some(cached) = widget.cache.fresh_payload(now) {
        metrics().widget_cache_hits.inc();
        debug!(tenant_id = %ctx.tenant(), widget_id = widget.id, "Widget cache hit");
        let data = cached.clone();
        return RenderedWidget {
            widget,
            data,
            from_cache: true,
        };
    }

    let data = compute_widget(ctx, &widget).await;

    let mut widget = widget;
    if widget.cache.enabled {
        match ctx
            .store()
            .update_widget_cache(ctx.tenant(), widget.id, &data, now)
            .await
        {
            Ok(()) => {
                metrics().store_writes.inc();
                widget.cache.cached_data = Some(data.clone());
                widget.cache.cached_at = Some(now);
            }
            Err(e) => {
                metrics().store_write_errors.inc();
                warn!(
                    tenant_id = %ctx.tenant(),
                    widget_id = widget.id,
                    error = %e,
                    "Failed to write widget cache"
                );
            }
        }
    }

    RenderedWidget {
        widget,
        data,
        from_cache: false,
    }
}

/// Renders a dashboard and every visible widget in order.
#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn render(ctx: &AnalyticsContext, dashboard_id: DashboardId) -> Result<RenderedDashboard> {
    let start = Instant::now();
    let dashboard = ctx
        .store()
        .get_dashboard(ctx.tenant(), dashboard_id)
        .await?
        .filter(|d| d.tenant_id == ctx.tenant())
        .ok_or_else(|| {
            Error::not_found(
                NotFoundCode::Dashboard,
                format!("dashboard {dashboard_id} not found"),
            )
        })?;

    let widgets = ctx.store().list_widgets(ctx.tenant(), dashboard_id).await?;
    let widgets = render_order(
        widgets
            .into_iter()
            .filter(|w| w.dashboard_id == dashboard_id)
            .collect(),
    );

    let mut rendered = Vec::with_capacity(widgets.len());
    for widget in widgets {
        rendered.push(render_widget(ctx, widget).await);
    }

    metrics().widgets_rendered.inc_by(rendered.len() as u64);
    metrics().dashboard_latency_ms.observe_since(start);
    info!(
        dashboard_id,
        widgets = rendered.len(),
        failed = rendered.iter().filter(|w| !w.data.success).count(),
        cached = rendered.iter().filter(|w| w.from_cache).count(),
        "Dashboard rendered"
    );

    Ok(RenderedDashboard {
        dashboard,
        widgets: rendered,
    })
}
