//! Sales funnel.
//!
//! Only completed orders are backed by facts. Traffic and cart stages need
//! a clickstream source that the fact store does not carry, so they are
//! reported as [`FunnelStage::Unavailable`] rather than as zeros.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use engine_core::{DateRange, Result};

use crate::context::AnalyticsContext;

/// A funnel measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FunnelStage<T> {
    Measured(T),
    /// No data source for this stage.
    Unavailable,
}

impl<T: Copy> FunnelStage<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Measured(v) => Some(*v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Measured(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesFunnel {
    pub period: DateRange,
    pub website_visitors: FunnelStage<u64>,
    pub product_views: FunnelStage<u64>,
    pub add_to_cart: FunnelStage<u64>,
    pub checkout_started: FunnelStage<u64>,
    pub orders_completed: FunnelStage<u64>,
    pub visitor_to_order_rate: FunnelStage<f64>,
    pub cart_to_order_rate: FunnelStage<f64>,
}

/// Conversion percentage between two stages, when both are measured.
pub fn conversion_rate(from: FunnelStage<u64>, to: FunnelStage<u64>) -> FunnelStage<f64> {
    match (from.value(), to.value()) {
        (Some(from), Some(to)) if from > 0 => {
            FunnelStage::Measured((to as f64 / from as f64 * 10_000.0).round() / 100.0)
        }
        _ => FunnelStage::Unavailable,
    }
}

#[instrument(skip(ctx), fields(tenant_id = %ctx.tenant()))]
pub async fn sales_funnel(ctx: &AnalyticsContext, period: DateRange) -> Result<SalesFunnel> {
    let orders = ctx
        .facts()
        .count_completed_events(ctx.tenant(), period)
        .await?;
    debug!(period = %period, orders, "Sales funnel computed");

    let orders_completed = FunnelStage::Measured(orders);
    let website_visitors = FunnelStage::Unavailable;
    let add_to_cart = FunnelStage::Unavailable;

    Ok(SalesFunnel {
        period,
        website_visitors,
        product_views: FunnelStage::Unavailable,
        add_to_cart,
        checkout_started: FunnelStage::Unavailable,
        orders_completed,
        visitor_to_order_rate: conversion_rate(website_visitors, orders_completed),
        cart_to_order_rate: conversion_rate(add_to_cart, orders_completed),
    })
}
