use super::TransactionId;
use crate::connection::ConnectionHandle;
use crate::core::Result;
use tracing::{Level, event};

/// Demarcates transactions on the connection behind one persistence context
#[derive(Debug)]
pub struct TransactionController {
    connection: ConnectionHandle,
}

impl TransactionController {
    pub(crate) fn new(connection: ConnectionHandle) -> Self {
        Self { connection }
    }

    pub fn begin(&self) -> Result<TransactionId> {
        let id = self.connection.begin()?;
        event!(Level::TRACE, connection = self.connection.id(), txn = %id, "transaction begun");
        Ok(id)
    }

    pub fn commit(&self) -> Result<()> {
        self.connection.commit()?;
        event!(Level::TRACE, connection = self.connection.id(), "transaction committed");
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        self.connection.rollback()?;
        event!(Level::TRACE, connection = self.connection.id(), "transaction rolled back");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.connection.is_in_transaction()
    }

    pub fn current(&self) -> Option<TransactionId> {
        self.connection.current_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::storage::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn controller() -> (TransactionController, ConnectionHandle) {
        let connection = Arc::new(Connection::open(Arc::new(InMemoryStore::new())));
        (TransactionController::new(Arc::clone(&connection)), connection)
    }

    #[test]
    fn test_begin_commit() {
        let (tx, conn) = controller();

        let id = tx.begin().unwrap();
        assert!(tx.is_active());
        assert_eq!(tx.current(), Some(id));

        conn.insert("users", "1", json!({"name": "Alice"})).unwrap();
        tx.commit().unwrap();

        assert!(!tx.is_active());
        assert_eq!(conn.count("users").unwrap(), 1);
    }

    #[test]
    fn test_begin_rollback() {
        let (tx, conn) = controller();

        tx.begin().unwrap();
        conn.insert("users", "1", json!({"name": "Alice"})).unwrap();
        tx.rollback().unwrap();

        assert!(!tx.is_active());
        assert_eq!(conn.count("users").unwrap(), 0);
    }
}
