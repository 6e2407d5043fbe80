// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Per-connection transactions over the in-memory store.
//
// - State Pattern: transaction lifecycle (Active, Committed, Aborted)
// - Command Pattern: writes recorded as Changes and replayed on commit
// - Copy-on-Write: each transaction reads a private snapshot
//
// ============================================================================

pub mod change;
pub mod controller;
pub mod state;

pub use change::Change;
pub use controller::TransactionController;
pub use state::{Transaction, TransactionId, TransactionState};
