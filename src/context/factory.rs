use super::{PersistenceContext, SecondLevelCache};
use crate::connection::{Connection, UnitConfig};
use crate::core::{Result, RiderError};
use crate::storage::InMemoryStore;
use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

/// Produces persistence contexts for one unit
///
/// Owns the unit's store and its second-level cache. Every context gets its
/// own connection to the shared store.
pub struct ContextFactory {
    id: Uuid,
    config: UnitConfig,
    store: Arc<InMemoryStore>,
    cache: Arc<SecondLevelCache>,
    created_at: DateTime<Utc>,
    contexts_created: AtomicUsize,
    open: AtomicBool,
}

impl ContextFactory {
    pub fn new(config: UnitConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| RiderError::Config("cache_capacity must be > 0".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            store: Arc::new(InMemoryStore::new()),
            cache: Arc::new(SecondLevelCache::new(capacity)),
            created_at: Utc::now(),
            contexts_created: AtomicUsize::new(0),
            open: AtomicBool::new(true),
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unit_name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cache(&self) -> &SecondLevelCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Refuse further contexts. Existing contexts keep working.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn create_context(&self) -> Result<PersistenceContext> {
        if !self.is_open() {
            return Err(RiderError::ExecutionError(format!(
                "Factory of unit '{}' is closed",
                self.config.name
            )));
        }
        let connection = Arc::new(Connection::open(Arc::clone(&self.store)));
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(PersistenceContext::new(
            &self.config.name,
            self.config.flavor,
            connection,
            Arc::clone(&self.cache),
        ))
    }
}

impl std::fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFactory")
            .field("id", &self.id)
            .field("unit", &self.config.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}
