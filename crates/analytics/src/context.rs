//! Per-call execution context.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use engine_core::error::NotFoundCode;
use engine_core::{
    AnalyticsStore, Clock, Error, FactReader, KpiDefinition, KpiId, QueryExecutor, ReportTemplate,
    ReportTemplateId, Result, TenantId,
};

use crate::settings::{AnalyticsSettings, CacheSettings};

/// Short-lived in-process cache of static definitions.
///
/// Keys always include the tenant, so an entry loaded for one tenant is
/// never visible to another.
#[derive(Clone)]
pub struct DefinitionCache {
    kpis: Cache<(TenantId, KpiId), Arc<KpiDefinition>>,
    templates: Cache<(TenantId, ReportTemplateId), Arc<ReportTemplate>>,
}

impl DefinitionCache {
    pub fn new(settings: &CacheSettings) -> Self {
        let ttl = Duration::from_secs(settings.definition_ttl_secs);
        Self {
            kpis: Cache::builder()
                .max_capacity(settings.definition_max_capacity)
                .time_to_live(ttl)
                .build(),
            templates: Cache::builder()
                .max_capacity(settings.definition_max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drops a cached KPI definition after it was changed.
    pub async fn invalidate_kpi(&self, tenant: TenantId, kpi: KpiId) {
        self.kpis.invalidate(&(tenant, kpi)).await;
    }

    pub async fn invalidate_template(&self, tenant: TenantId, template: ReportTemplateId) {
        self.templates.invalidate(&(tenant, template)).await;
    }
}

/// Shared service handles.
#[derive(Clone)]
pub struct Services {
    pub facts: Arc<dyn FactReader>,
    pub store: Arc<dyn AnalyticsStore>,
    pub executor: Arc<dyn QueryExecutor>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<AnalyticsSettings>,
    pub definitions: DefinitionCache,
}

impl Services {
    pub fn new(
        facts: Arc<dyn FactReader>,
        store: Arc<dyn AnalyticsStore>,
        executor: Arc<dyn QueryExecutor>,
        clock: Arc<dyn Clock>,
        settings: AnalyticsSettings,
    ) -> Self {
        let definitions = DefinitionCache::new(&settings.cache);
        Self {
            facts,
            store,
            executor,
            clock,
            settings: Arc::new(settings),
            definitions,
        }
    }
}

/// Everything a single engine call needs: the tenant it is scoped to and
/// the handles it may use. Cheap to build, never shared across tenants.
#[derive(Clone)]
pub struct AnalyticsContext {
    tenant: TenantId,
    services: Services,
}

impl AnalyticsContext {
    pub fn new(tenant: TenantId, services: Services) -> Self {
        Self { tenant, services }
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn facts(&self) -> &dyn FactReader {
        self.services.facts.as_ref()
    }

    pub fn store(&self) -> &dyn AnalyticsStore {
        self.services.store.as_ref()
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.services.executor.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.services.clock.as_ref()
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.services.settings
    }

    /// KPI definition for this tenant, through the definition cache.
    pub async fn kpi_definition(&self, kpi: KpiId) -> Result<Arc<KpiDefinition>> {
        let key = (self.tenant, kpi);
        if let Some(cached) = self.services.definitions.kpis.get(&key).await {
            debug!(tenant_id = %self.tenant, kpi_id = kpi, "KPI definition cache hit");
            return Ok(cached);
        }

        let definition = self
            .store()
            .get_kpi_definition(self.tenant, kpi)
            .await?
            .filter(|d| d.tenant_id == self.tenant)
            .ok_or_else(|| Error::not_found(NotFoundCode::Kpi, format!("KPI {kpi} not found")))?;

        let definition = Arc::new(definition);
        self.services
            .definitions
            .kpis
            .insert(key, definition.clone())
            .await;
        Ok(definition)
    }

    /// Report template for this tenant, through the definition cache.
    pub async fn report_template(&self, template: ReportTemplateId) -> Result<Arc<ReportTemplate>> {
        let key = (self.tenant, template);
        if let Some(cached) = self.services.definitions.templates.get(&key).await {
            debug!(tenant_id = %self.tenant, template_id = template, "Report template cache hit");
            return Ok(cached);
        }

        let loaded = self
            .store()
            .get_report_template(self.tenant, template)
            .await?
            .filter(|t| t.tenant_id == self.tenant)
            .ok_or_else(|| {
                Error::not_found(
                    NotFoundCode::ReportTemplate,
                    format!("report template {template} not found"),
                )
            })?;

        let loaded = Arc::new(loaded);
        self.services
            .definitions
            .templates
            .insert(key, loaded.clone())
            .await;
        Ok(loaded)
    }
}
