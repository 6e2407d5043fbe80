use crate::connection::ConnectionHandle;
use crate::context::PersistenceContext;
use crate::core::{Result, RiderError};
use crate::transaction::TransactionController;

/// How the raw connection is pulled out of a freshly built context
///
/// Chosen once per bundle by probing the context for the session capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Session-backed context: unwrap directly
    DirectUnwrap,
    /// Begin, unwrap, commit. Leaves no open transaction and no data change.
    TransactionalUnwrap,
}

impl ConnectionStrategy {
    pub fn probe(context: &PersistenceContext) -> Self {
        if context.session().is_some() {
            ConnectionStrategy::DirectUnwrap
        } else {
            ConnectionStrategy::TransactionalUnwrap
        }
    }

    pub fn extract(
        self,
        context: &PersistenceContext,
        transaction: &TransactionController,
    ) -> Result<ConnectionHandle> {
        match self {
            ConnectionStrategy::DirectUnwrap => context
                .session()
                .map(|session| session.connection())
                .ok_or_else(|| {
                    RiderError::ConnectionUnavailable(format!(
                        "context of unit '{}' is not session-backed",
                        context.unit_name()
                    ))
                }),
            ConnectionStrategy::TransactionalUnwrap => {
                transaction.begin()?;
                match context.unwrap_connection() {
                    Ok(connection) => {
                        transaction.commit()?;
                        Ok(connection)
                    }
                    Err(err) => {
                        let _ = transaction.rollback();
                        Err(err)
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for ConnectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStrategy::DirectUnwrap => write!(f, "direct"),
            ConnectionStrategy::TransactionalUnwrap => write!(f, "transactional"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ContextFlavor, UnitConfig};
    use crate::context::ContextFactory;
    use std::sync::Arc;

    fn context(flavor: ContextFlavor) -> PersistenceContext {
        ContextFactory::new(UnitConfig::new("unitA").flavor(flavor))
            .unwrap()
            .create_context()
            .unwrap()
    }

    #[test]
    fn test_probe_selects_by_capability() {
        assert_eq!(
            ConnectionStrategy::probe(&context(ContextFlavor::Session)),
            ConnectionStrategy::DirectUnwrap
        );
        assert_eq!(
            ConnectionStrategy::probe(&context(ContextFlavor::Generic)),
            ConnectionStrategy::TransactionalUnwrap
        );
    }

    #[test]
    fn test_transactional_unwrap_leaves_no_open_transaction() {
        let ctx = context(ContextFlavor::Generic);
        let tx = ctx.transaction();

        let connection = ConnectionStrategy::TransactionalUnwrap
            .extract(&ctx, &tx)
            .unwrap();

        assert!(!tx.is_active());
        assert!(!connection.is_in_transaction());
        assert!(connection.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_direct_unwrap_returns_context_connection() {
        let ctx = context(ContextFlavor::Session);
        let tx = ctx.transaction();

        let connection = ConnectionStrategy::DirectUnwrap.extract(&ctx, &tx).unwrap();
        assert!(Arc::ptr_eq(&connection, &ctx.session().unwrap().connection()));
        assert!(!tx.is_active());
    }

    #[test]
    fn test_direct_unwrap_on_generic_context_fails() {
        let ctx = context(ContextFlavor::Generic);
        let tx = ctx.transaction();
        assert!(matches!(
            ConnectionStrategy::DirectUnwrap.extract(&ctx, &tx),
            Err(RiderError::ConnectionUnavailable(_))
        ));
    }
}
