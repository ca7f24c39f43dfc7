//! Analytics components: customer scoring and segmentation, cohorts,
//! revenue forecasts, KPIs, dashboards and reports.

pub mod churn;
pub mod cohort;
pub mod context;
pub mod customers;
pub mod dashboard;
pub mod engine;
pub mod forecast;
pub mod funnel;
pub mod kpi;
pub mod query;
pub mod reports;
pub mod rfm;
pub mod segment;
pub mod settings;

pub use context::{AnalyticsContext, DefinitionCache, Services};
pub use engine::{AnalyticsEngine, CustomerAnalytics};
pub use forecast::SeasonalIndex;
pub use funnel::{FunnelStage, SalesFunnel};
pub use kpi::KpiRefreshSummary;
pub use settings::AnalyticsSettings;
