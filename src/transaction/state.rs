// ============================================================================
// Transaction State Management
// ============================================================================
//
// A transaction moves through Active -> Committed/Aborted.
// It reads from a private copy of the store taken at BEGIN (persistent maps,
// so the copy is O(1)) and records its writes for replay at COMMIT.
//
// ============================================================================

use super::Change;
use crate::core::{Result, RiderError};
use crate::storage::Tables;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// An open unit of work on one connection
///
/// Owned by a single connection; the connection's own lock serializes access.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// Private view: the store as of BEGIN plus this transaction's writes
    view: Tables,
    changes: Vec<Change>,
}

impl Transaction {
    pub fn new(id: TransactionId, view: Tables) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            view,
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn view(&self) -> &Tables {
        &self.view
    }

    pub(crate) fn view_mut(&mut self) -> &mut Tables {
        &mut self.view
    }

    /// Record a write that has already been applied to the private view
    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Mark committed and hand back the changes to replay
    pub fn commit(&mut self) -> Result<Vec<Change>> {
        if !self.state.is_active() {
            return Err(RiderError::ExecutionError(format!(
                "Cannot commit transaction {} in state {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.changes))
    }

    pub fn rollback(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(RiderError::ExecutionError(format!(
                "Cannot rollback transaction {} in state {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Aborted;
        self.changes.clear();
        Ok(())
    }
}
