// ============================================================================
// Persistence Context Registry
// ============================================================================
//
// One ContextBundle per unit name. The lookup-or-insert step runs under a
// single mutex so two callers can never create two bundles (and therefore
// two factories) for the same name. One-time construction then happens
// outside that mutex, serialized per bundle by its OnceLock, so slow units
// do not block lookups of other units.
//
// ============================================================================

pub mod bundle;
pub mod lifecycle;
pub mod sink;
pub mod strategy;

pub use bundle::{BundleState, ContextBundle, InitStage, InitStatus};
pub use sink::{FailureSink, LogSink};
pub use strategy::ConnectionStrategy;

use crate::context::{ConfiguredProvider, PersistenceProvider};
use crate::core::{Result, RiderError};
use lazy_static::lazy_static;
use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<Registry> = Arc::new(Registry::new(
        ConfiguredProvider::from_env().unwrap_or_else(|err| {
            warn!("Could not load persistence units from environment: {}", err);
            ConfiguredProvider::default()
        })
    ));
}

pub struct Registry {
    provider: Arc<dyn PersistenceProvider>,
    sink: Arc<dyn FailureSink>,
    bundles: Mutex<HashMap<String, Arc<ContextBundle>>>,
}

impl Registry {
    pub fn new(provider: impl PersistenceProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
            sink: Arc::new(LogSink),
            bundles: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default `LogSink`
    pub fn with_sink(mut self, sink: impl FailureSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Process-wide registry over the units named by `MEMORIDER_UNITS`
    ///
    /// Prefer an explicitly constructed `Registry` owned by the test harness;
    /// this exists for injection points that have nothing to hold one.
    pub fn global() -> &'static Arc<Registry> {
        &GLOBAL_REGISTRY
    }

    // Inserts are atomic, so the map is consistent even after a poisoning panic.
    fn bundles(&self) -> MutexGuard<'_, HashMap<String, Arc<ContextBundle>>> {
        self.bundles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the bundle for `unit_name`, building it on first use, and reset it
    ///
    /// Never fails: a unit that cannot be built is reported to the failure
    /// sink and returned partially initialized, see [`ContextBundle::status`].
    pub fn instance(&self, unit_name: &str) -> Arc<ContextBundle> {
        let bundle = {
            let mut bundles = self.bundles();
            Arc::clone(
                bundles
                    .entry(unit_name.to_string())
                    .or_insert_with(|| Arc::new(ContextBundle::new(unit_name))),
            )
        };

        bundle.initialize_or_reset(self.provider.as_ref(), self.sink.as_ref());
        bundle
    }

    /// [`Registry::instance`] on tokio's blocking pool
    pub async fn instance_async(self: &Arc<Self>, unit_name: &str) -> Result<Arc<ContextBundle>> {
        let registry = Arc::clone(self);
        let unit_name = unit_name.to_string();
        tokio::task::spawn_blocking(move || registry.instance(&unit_name))
            .await
            .map_err(|e| RiderError::ExecutionError(format!("Registry task failed: {}", e)))
    }

    /// Look up a bundle without creating or resetting it
    pub fn get(&self, unit_name: &str) -> Option<Arc<ContextBundle>> {
        self.bundles().get(unit_name).cloned()
    }

    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bundles().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.bundles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("units", &self.unit_names())
            .finish()
    }
}
