use crate::core::{Record, Result, RiderError};
use crate::transaction::Change;
use im::OrdMap;
use std::sync::RwLock;

/// Records of one table, ordered by id
pub type Table = OrdMap<String, Record>;

/// All tables of a store. Cloning is O(1) (structural sharing).
pub type Tables = im::HashMap<String, Table>;

/// Shared in-memory backing store of one persistence unit
///
/// Tables are created on first write.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    /// Consistent copy of every table
    pub fn snapshot(&self) -> Result<Tables> {
        Ok(self.tables.read()?.clone())
    }

    /// Apply one auto-committed change, returning the affected record count
    pub fn apply(&self, change: &Change) -> Result<usize> {
        let mut tables = self.tables.write()?;
        apply_change(&mut tables, change)
    }

    /// Apply a batch atomically: either every change lands or none does
    pub fn apply_all(&self, changes: &[Change]) -> Result<usize> {
        let mut tables = self.tables.write()?;
        let mut next = tables.clone();
        let mut affected = 0;
        for change in changes {
            affected += apply_change(&mut next, change)?;
        }
        *tables = next;
        Ok(affected)
    }

    pub fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let tables = self.tables.read()?;
        Ok(read_record(&tables, table, id))
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(tables.get(table).map(|t| t.len()).unwrap_or(0))
    }

    /// List table names, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        let tables = self.tables.read()?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn total_records(&self) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(tables.values().map(|t| t.len()).sum())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn read_record(tables: &Tables, table: &str, id: &str) -> Option<Record> {
    tables.get(table).and_then(|t| t.get(id)).cloned()
}

/// Apply a change to a set of tables, returning the affected record count
pub fn apply_change(tables: &mut Tables, change: &Change) -> Result<usize> {
    match change {
        Change::Insert { table, id, record } => {
            let rows = tables.entry(table.clone()).or_insert_with(OrdMap::new);
            if rows.contains_key(id) {
                return Err(RiderError::ConstraintViolation(format!(
                    "Duplicate key '{}' in table '{}'",
                    id, table
                )));
            }
            rows.insert(id.clone(), record.clone());
            Ok(1)
        }
        Change::Upsert { table, id, record } => {
            let rows = tables.entry(table.clone()).or_insert_with(OrdMap::new);
            rows.insert(id.clone(), record.clone());
            Ok(1)
        }
        Change::Delete { table, id } => Ok(tables
            .get_mut(table)
            .and_then(|rows| rows.remove(id))
            .map(|_| 1)
            .unwrap_or(0)),
        Change::Truncate { table } => Ok(tables
            .get_mut(table)
            .map(|rows| {
                let removed = rows.len();
                rows.clear();
                removed
            })
            .unwrap_or(0)),
    }
}
