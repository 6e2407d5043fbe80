pub mod config;

use crate::core::{Record, Result, RiderError};
use crate::storage::{InMemoryStore, apply_change, read_record};
use crate::transaction::{Change, Transaction, TransactionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use config::{ContextFlavor, UnitConfig, UnitsConfig};

/// Shared raw connection handle
pub type ConnectionHandle = Arc<Connection>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Raw connection to a unit's store
///
/// Works below the persistence context: writes made here are not tracked by
/// any context, which makes it the tool for fixture seeding.
/// All methods take `&self` so one handle can be shared between the context,
/// its transaction controller and test code.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Shared store of the unit
    store: Arc<InMemoryStore>,
    inner: Mutex<ConnectionInner>,
}

struct ConnectionInner {
    state: ConnectionState,
    transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    pub(crate) fn open(store: Arc<InMemoryStore>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            store,
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Active,
                transaction: None,
            }),
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if connection is active
    pub fn is_active(&self) -> bool {
        self.state() != ConnectionState::Closed
    }

    /// Check if connection is in a transaction
    pub fn is_in_transaction(&self) -> bool {
        self.state() == ConnectionState::InTransaction
    }

    pub fn current_transaction(&self) -> Option<TransactionId> {
        self.inner_recovered()
            .transaction
            .as_ref()
            .map(Transaction::id)
    }

    fn state(&self) -> ConnectionState {
        self.inner_recovered().state
    }

    // State probes read through a poisoned lock; operations report it as LockError
    fn inner_recovered(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a new transaction
    ///
    /// ```ignore
    /// conn.begin()?;
    /// conn.insert("users", "1", json!({"name": "Alice"}))?;
    /// conn.commit()?;
    /// ```
    pub fn begin(&self) -> Result<TransactionId> {
        let mut inner = self.inner.lock()?;
        match inner.state {
            ConnectionState::Closed => return Err(RiderError::ConnectionClosed(self.id)),
            ConnectionState::InTransaction => return Err(RiderError::TransactionActive),
            ConnectionState::Active => {}
        }

        let txn = Transaction::new(TransactionId::new(), self.store.snapshot()?);
        let id = txn.id();
        inner.transaction = Some(txn);
        inner.state = ConnectionState::InTransaction;
        Ok(id)
    }

    /// Commit the current transaction
    ///
    /// The recorded changes are replayed atomically. If replay fails (e.g. a
    /// concurrent insert of the same key), the transaction is aborted and
    /// the store is left untouched.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let mut txn = inner
            .transaction
            .take()
            .ok_or(RiderError::NoActiveTransaction)?;
        inner.state = ConnectionState::Active;

        let changes = txn.commit()?;
        self.store.apply_all(&changes)?;
        Ok(())
    }

    /// Rollback the current transaction
    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let mut txn = inner
            .transaction
            .take()
            .ok_or(RiderError::NoActiveTransaction)?;
        inner.state = ConnectionState::Active;
        txn.rollback()
    }

    /// Close the connection, rolling back any open transaction
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if let Some(mut txn) = inner.transaction.take() {
            txn.rollback()?;
        }
        inner.state = ConnectionState::Closed;
        Ok(())
    }

    /// Run one write, inside the open transaction if there is one
    pub fn execute(&self, change: Change) -> Result<usize> {
        let mut inner = self.inner.lock()?;
        if inner.state == ConnectionState::Closed {
            return Err(RiderError::ConnectionClosed(self.id));
        }

        match inner.transaction.as_mut() {
            Some(txn) => {
                let affected = apply_change(txn.view_mut(), &change)?;
                txn.record(change);
                Ok(affected)
            }
            None => self.store.apply(&change),
        }
    }

    pub fn insert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        self.execute(Change::Insert {
            table: table.to_string(),
            id: id.to_string(),
            record,
        })
        .map(|_| ())
    }

    pub fn upsert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        self.execute(Change::Upsert {
            table: table.to_string(),
            id: id.to_string(),
            record,
        })
        .map(|_| ())
    }

    /// Returns whether a record was removed
    pub fn delete(&self, table: &str, id: &str) -> Result<bool> {
        self.execute(Change::Delete {
            table: table.to_string(),
            id: id.to_string(),
        })
        .map(|affected| affected > 0)
    }

    pub fn truncate(&self, table: &str) -> Result<usize> {
        self.execute(Change::Truncate {
            table: table.to_string(),
        })
    }

    /// Read a record, seeing this connection's uncommitted writes
    pub fn find(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let inner = self.inner.lock()?;
        if inner.state == ConnectionState::Closed {
            return Err(RiderError::ConnectionClosed(self.id));
        }

        match inner.transaction.as_ref() {
            Some(txn) => Ok(read_record(txn.view(), table, id)),
            None => self.store.get(table, id),
        }
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        let inner = self.inner.lock()?;
        if inner.state == ConnectionState::Closed {
            return Err(RiderError::ConnectionClosed(self.id));
        }

        match inner.transaction.as_ref() {
            Some(txn) => Ok(txn.view().get(table).map(|t| t.len()).unwrap_or(0)),
            None => self.store.count(table),
        }
    }

    /// Sorted table names, including tables created by the open transaction
    pub fn table_names(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock()?;
        if inner.state == ConnectionState::Closed {
            return Err(RiderError::ConnectionClosed(self.id));
        }

        match inner.transaction.as_ref() {
            Some(txn) => {
                let mut names: Vec<String> = txn.view().keys().cloned().collect();
                names.sort();
                Ok(names)
            }
            None => self.store.table_names(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Ensure connection is closed and transaction rolled back
        let _ = self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("in_transaction", &self.is_in_transaction())
            .finish()
    }
}
