//! Injection point for the default unit's context

use crate::context::PersistenceContext;
use crate::registry::Registry;
use std::sync::Arc;

/// Unit whose context is handed to injected consumers
pub const DEFAULT_INJECTION_UNIT: &str = "cdipu";

#[derive(Debug, Clone)]
pub struct ContextProducer {
    registry: Arc<Registry>,
}

impl ContextProducer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Producer over [`Registry::global`]
    pub fn global() -> Self {
        Self::new(Arc::clone(Registry::global()))
    }

    pub fn produce(&self) -> Option<Arc<PersistenceContext>> {
        self.registry.instance(DEFAULT_INJECTION_UNIT).context()
    }
}
