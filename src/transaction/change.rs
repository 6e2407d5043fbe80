// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Writes made inside a transaction are recorded as Changes. COMMIT replays
// them against the shared store in one step; ROLLBACK drops them.
//
// ============================================================================

use crate::core::Record;

/// A single recorded write
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert a record that must not exist yet
    Insert {
        table: String,
        id: String,
        record: Record,
    },

    /// Insert or replace a record
    Upsert {
        table: String,
        id: String,
        record: Record,
    },

    /// Delete a record if present
    Delete { table: String, id: String },

    /// Remove every record of a table
    Truncate { table: String },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::Insert { table, .. } => table,
            Change::Upsert { table, .. } => table,
            Change::Delete { table, .. } => table,
            Change::Truncate { table } => table,
        }
    }

    /// Check whether the change removes data
    pub fn is_destructive(&self) -> bool {
        matches!(self, Change::Delete { .. } | Change::Truncate { .. })
    }
}
