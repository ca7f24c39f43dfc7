//! Common test setup functions.

use std::sync::Arc;

use analytics::{AnalyticsEngine, AnalyticsSettings};
use engine_core::{FixedClock, TenantId};

use crate::fixtures;
use crate::mocks::{MemoryFactReader, MemoryStore, ScriptedExecutor};

/// Engine wired to in-memory fakes and a clock pinned to
/// [`fixtures::today`].
///
/// The fakes implement the same traits as the ClickHouse-backed types, so
/// every engine code path runs except the database round-trip.
pub struct TestContext {
    pub tenant: TenantId,
    pub facts: MemoryFactReader,
    pub store: MemoryStore,
    pub executor: ScriptedExecutor,
    pub clock: Arc<FixedClock>,
    pub engine: AnalyticsEngine,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(AnalyticsSettings::default())
    }

    pub fn with_settings(settings: AnalyticsSettings) -> Self {
        let facts = MemoryFactReader::new();
        let store = MemoryStore::new();
        let executor = ScriptedExecutor::new();
        let clock = Arc::new(FixedClock::at_date(fixtures::today()));

        let engine = AnalyticsEngine::new(
            Arc::new(facts.clone()),
            Arc::new(store.clone()),
            Arc::new(executor.clone()),
            clock.clone(),
            settings,
        );

        Self {
            tenant: TenantId::random(),
            facts,
            store,
            executor,
            clock,
            engine,
        }
    }

    /// Context seeded with [`fixtures::three_customer_facts`].
    pub fn with_three_customers() -> Self {
        let ctx = Self::new();
        ctx.facts
            .add_events(ctx.tenant, fixtures::three_customer_facts());
        ctx
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
