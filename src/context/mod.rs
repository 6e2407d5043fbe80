// ============================================================================
// Persistence contexts
// ============================================================================
//
// A context is an identity map of tracked entities over one raw connection.
// Reads go tracked -> second-level cache -> store; writes go straight to the
// connection (inside its transaction when one is open) and invalidate the
// cache entry.
//
// ============================================================================

pub mod cache;
pub mod factory;
pub mod provider;

pub use cache::{CacheStats, SecondLevelCache};
pub use factory::ContextFactory;
pub use provider::{ConfiguredProvider, DefaultProvider, PersistenceProvider};

use crate::connection::{ConnectionHandle, ContextFlavor};
use crate::core::{EntityKey, Record, Result, RiderError};
use crate::transaction::TransactionController;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub struct PersistenceContext {
    id: Uuid,
    unit_name: String,
    flavor: ContextFlavor,
    connection: ConnectionHandle,
    cache: Arc<SecondLevelCache>,
    transaction: Arc<TransactionController>,
    tracked: Mutex<HashMap<EntityKey, Record>>,
}

/// Session capability of a session-backed context
pub struct Session<'a> {
    context: &'a PersistenceContext,
}

impl Session<'_> {
    /// The raw connection, no transaction required
    pub fn connection(&self) -> ConnectionHandle {
        Arc::clone(&self.context.connection)
    }
}

impl PersistenceContext {
    pub(crate) fn new(
        unit_name: &str,
        flavor: ContextFlavor,
        connection: ConnectionHandle,
        cache: Arc<SecondLevelCache>,
    ) -> Self {
        let transaction = Arc::new(TransactionController::new(Arc::clone(&connection)));
        Self {
            id: Uuid::new_v4(),
            unit_name: unit_name.to_string(),
            flavor,
            connection,
            cache,
            transaction,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    // The identity map is updated with single inserts/removes, so it stays
    // usable after a panic elsewhere.
    fn tracked(&self) -> MutexGuard<'_, HashMap<EntityKey, Record>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn flavor(&self) -> ContextFlavor {
        self.flavor
    }

    /// The transaction controller bound to this context's connection
    pub fn transaction(&self) -> Arc<TransactionController> {
        Arc::clone(&self.transaction)
    }

    /// Capability probe: `Some` only for session-backed contexts
    pub fn session(&self) -> Option<Session<'_>> {
        match self.flavor {
            ContextFlavor::Session => Some(Session { context: self }),
            ContextFlavor::Generic => None,
        }
    }

    /// Unwrap the raw connection
    ///
    /// Generic contexts only release it inside an active transaction.
    pub fn unwrap_connection(&self) -> Result<ConnectionHandle> {
        if self.flavor == ContextFlavor::Generic && !self.connection.is_in_transaction() {
            return Err(RiderError::ConnectionUnavailable(format!(
                "context of unit '{}' releases its connection only inside a transaction",
                self.unit_name
            )));
        }
        Ok(Arc::clone(&self.connection))
    }

    /// Insert a new entity and start tracking it
    pub fn persist(&self, key: EntityKey, record: Record) -> Result<()> {
        self.connection.insert(&key.table, &key.id, record.clone())?;
        self.tracked().insert(key, record);
        Ok(())
    }

    /// Look up an entity, tracking it when found
    pub fn find(&self, key: &EntityKey) -> Result<Option<Record>> {
        if let Some(record) = self.tracked().get(key) {
            return Ok(Some(record.clone()));
        }

        let record = match self.cache.get(key) {
            Some(record) => Some(record),
            None => {
                let loaded = self.connection.find(&key.table, &key.id)?;
                // Only committed state goes into the shared cache
                if let Some(record) = &loaded {
                    if !self.connection.is_in_transaction() {
                        self.cache.put(key.clone(), record.clone());
                    }
                }
                loaded
            }
        };

        if let Some(record) = &record {
            self.tracked().insert(key.clone(), record.clone());
        }
        Ok(record)
    }

    /// Insert or replace an entity and track the new state
    pub fn merge(&self, key: EntityKey, record: Record) -> Result<Record> {
        self.connection.upsert(&key.table, &key.id, record.clone())?;
        self.cache.evict(&key);
        self.tracked().insert(key, record.clone());
        Ok(record)
    }

    /// Delete an entity, returning whether it existed
    pub fn remove(&self, key: &EntityKey) -> Result<bool> {
        let removed = self.connection.delete(&key.table, &key.id)?;
        self.cache.evict(key);
        self.tracked().remove(key);
        Ok(removed)
    }

    /// Stop tracking one entity without touching the store
    pub fn detach(&self, key: &EntityKey) -> bool {
        self.tracked().remove(key).is_some()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.tracked().contains_key(key)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked().len()
    }

    pub fn tracked_keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self.tracked().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Detach every tracked entity, returning how many were tracked
    pub fn clear(&self) -> usize {
        let mut tracked = self.tracked();
        let count = tracked.len();
        tracked.clear();
        count
    }
}

impl std::fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("id", &self.id)
            .field("unit", &self.unit_name)
            .field("flavor", &self.flavor)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}
