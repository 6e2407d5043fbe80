use super::{ConnectionStrategy, FailureSink};
use crate::connection::ConnectionHandle;
use crate::context::{ContextFactory, PersistenceContext, PersistenceProvider};
use crate::core::{Result, RiderError};
use crate::transaction::TransactionController;
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{Level, event, info_span};

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// Construction step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Factory,
    Context,
    Connection,
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStage::Factory => write!(f, "factory"),
            InitStage::Context => write!(f, "context"),
            InitStage::Connection => write!(f, "connection"),
        }
    }
}

/// Outcome of the one-time construction of a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum InitStatus {
    Ready {
        initialized_at: DateTime<Utc>,
    },
    /// Construction stopped at `stage`; parts built before it are kept
    Failed {
        stage: InitStage,
        message: String,
        failed_at: DateTime<Utc>,
    },
}

impl InitStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitStatus::Ready { .. })
    }
}

impl std::fmt::Display for InitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStatus::Ready { initialized_at } => {
                write!(f, "READY since {}", initialized_at.to_rfc3339())
            }
            InitStatus::Failed { stage, message, .. } => {
                write!(f, "FAILED at {} stage: {}", stage, message)
            }
        }
    }
}

/// Lifecycle of a bundle
///
/// ```text
/// Uninitialized ──> Initializing ──> Ready ─┐
///                                     ▲     │ reset
///                                     └─────┘
/// ```
///
/// `Ready` is reached even when construction failed; see [`InitStatus`].
/// A panicking provider sends the bundle back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Default)]
struct BundleParts {
    factory: Option<Arc<ContextFactory>>,
    context: Option<Arc<PersistenceContext>>,
    transaction: Option<Arc<TransactionController>>,
    connection: Option<ConnectionHandle>,
    strategy: Option<ConnectionStrategy>,
}

struct Initialized {
    parts: BundleParts,
    status: InitStatus,
}

/// Everything the registry keeps for one unit name
///
/// Construction runs once, guarded by a `OnceLock`: concurrent callers for
/// the same unit block until it finishes and then all see the same parts.
pub struct ContextBundle {
    unit_name: String,
    state: AtomicU8,
    inner: OnceLock<Initialized>,
}

impl ContextBundle {
    pub(crate) fn new(unit_name: &str) -> Self {
        Self {
            unit_name: unit_name.to_string(),
            state: AtomicU8::new(UNINITIALIZED),
            inner: OnceLock::new(),
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn state(&self) -> BundleState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => BundleState::Uninitialized,
            INITIALIZING => BundleState::Initializing,
            _ => BundleState::Ready,
        }
    }

    /// `None` until construction has run
    pub fn status(&self) -> Option<&InitStatus> {
        self.inner.get().map(|init| &init.status)
    }

    pub fn is_ready(&self) -> bool {
        self.status().is_some_and(InitStatus::is_ready)
    }

    /// Turn a failed or missing construction into an error
    pub fn ensure_ready(&self) -> Result<()> {
        match self.status() {
            Some(InitStatus::Ready { .. }) => Ok(()),
            Some(InitStatus::Failed { stage, message, .. }) => Err(RiderError::UnitUnavailable {
                unit: self.unit_name.clone(),
                stage: stage.to_string(),
                message: message.clone(),
            }),
            None => Err(RiderError::UnitUnavailable {
                unit: self.unit_name.clone(),
                stage: "registry".to_string(),
                message: "bundle has not been initialized".to_string(),
            }),
        }
    }

    fn parts(&self) -> Option<&BundleParts> {
        self.inner.get().map(|init| &init.parts)
    }

    pub fn factory(&self) -> Option<Arc<ContextFactory>> {
        self.parts().and_then(|p| p.factory.clone())
    }

    pub fn context(&self) -> Option<Arc<PersistenceContext>> {
        self.parts().and_then(|p| p.context.clone())
    }

    pub(crate) fn context_ref(&self) -> Option<&PersistenceContext> {
        self.parts().and_then(|p| p.context.as_deref())
    }

    pub fn transaction_controller(&self) -> Option<Arc<TransactionController>> {
        self.parts().and_then(|p| p.transaction.clone())
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.parts().and_then(|p| p.connection.clone())
    }

    pub fn strategy(&self) -> Option<ConnectionStrategy> {
        self.parts().and_then(|p| p.strategy)
    }

    /// Build the bundle on first call, then reset it
    pub(crate) fn initialize_or_reset(
        &self,
        provider: &dyn PersistenceProvider,
        sink: &dyn FailureSink,
    ) {
        self.inner.get_or_init(|| {
            self.state.store(INITIALIZING, Ordering::Release);
            let _unwind = UnwindGuard { state: &self.state };
            let span = info_span!("persistence_unit_init", unit = %self.unit_name);
            let _enter = span.enter();
            construct(&self.unit_name, provider, sink)
        });
        self.state.store(READY, Ordering::Release);

        self.reset();
    }

    /// Detach all tracked entities and empty the shared cache
    pub fn reset(&self) {
        let Some(parts) = self.parts() else {
            return;
        };

        let detached = parts.context.as_ref().map(|ctx| ctx.clear()).unwrap_or(0);
        let evicted = parts
            .factory
            .as_ref()
            .map(|factory| factory.cache().evict_all())
            .unwrap_or(0);

        event!(
            Level::DEBUG,
            unit = %self.unit_name,
            detached,
            evicted,
            "persistence unit reset"
        );
    }
}

/// Puts the state back to `Uninitialized` if the provider panics, so the
/// next caller retries construction
struct UnwindGuard<'a> {
    state: &'a AtomicU8,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.state.store(UNINITIALIZED, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for ContextBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBundle")
            .field("unit", &self.unit_name)
            .field("state", &self.state())
            .field("status", &self.status())
            .finish()
    }
}

fn construct(
    unit_name: &str,
    provider: &dyn PersistenceProvider,
    sink: &dyn FailureSink,
) -> Initialized {
    let mut parts = BundleParts::default();
    let status = match build(unit_name, provider, &mut parts) {
        Ok(()) => InitStatus::Ready {
            initialized_at: Utc::now(),
        },
        Err((stage, err)) => {
            sink.construction_failed(unit_name, stage, &err);
            InitStatus::Failed {
                stage,
                message: err.to_string(),
                failed_at: Utc::now(),
            }
        }
    };
    Initialized { parts, status }
}

/// Fill `parts` step by step; on error, everything built so far stays
fn build(
    unit_name: &str,
    provider: &dyn PersistenceProvider,
    parts: &mut BundleParts,
) -> std::result::Result<(), (InitStage, RiderError)> {
    if unit_name.trim().is_empty() {
        return Err((
            InitStage::Factory,
            RiderError::InvalidUnitName(unit_name.to_string()),
        ));
    }

    debug!("creating factory for unit {}", unit_name);
    let factory = provider
        .create_factory(unit_name)
        .map(Arc::new)
        .map_err(|e| (InitStage::Factory, e))?;
    parts.factory = Some(Arc::clone(&factory));

    let context = factory
        .create_context()
        .map(Arc::new)
        .map_err(|e| (InitStage::Context, e))?;
    parts.context = Some(Arc::clone(&context));

    let transaction = context.transaction();
    parts.transaction = Some(Arc::clone(&transaction));

    let strategy = ConnectionStrategy::probe(&context);
    parts.strategy = Some(strategy);

    let connection = strategy
        .extract(&context, &transaction)
        .map_err(|e| (InitStage::Connection, e))?;
    parts.connection = Some(connection);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ContextFlavor, UnitConfig};
    use crate::context::DefaultProvider;
    use crate::core::EntityKey;
    use crate::registry::LogSink;
    use serde_json::json;

    #[test]
    fn test_new_bundle_is_uninitialized() {
        let bundle = ContextBundle::new("unitA");
        assert_eq!(bundle.state(), BundleState::Uninitialized);
        assert!(bundle.status().is_none());
        assert!(bundle.context().is_none());
        assert!(bundle.connection().is_none());
        assert!(bundle.ensure_ready().is_err());
    }

    #[test]
    fn test_initialize_builds_every_part() {
        let bundle = ContextBundle::new("unitA");
        bundle.initialize_or_reset(&DefaultProvider::default(), &LogSink);

        assert_eq!(bundle.state(), BundleState::Ready);
        assert!(bundle.is_ready());
        assert!(bundle.factory().is_some());
        assert!(bundle.context().is_some());
        assert!(bundle.transaction_controller().is_some());
        assert!(bundle.connection().is_some());
        assert_eq!(
            bundle.strategy(),
            Some(ConnectionStrategy::TransactionalUnwrap)
        );
    }

    #[test]
    fn test_session_flavor_uses_direct_unwrap() {
        let bundle = ContextBundle::new("unitA");
        bundle.initialize_or_reset(&DefaultProvider::new(ContextFlavor::Session), &LogSink);
        assert_eq!(bundle.strategy(), Some(ConnectionStrategy::DirectUnwrap));
    }

    #[test]
    fn test_blank_unit_name_fails_at_factory_stage() {
        let bundle = ContextBundle::new(" ");
        bundle.initialize_or_reset(&DefaultProvider::default(), &LogSink);

        assert_eq!(bundle.state(), BundleState::Ready);
        assert!(matches!(
            bundle.status(),
            Some(InitStatus::Failed { stage: InitStage::Factory, .. })
        ));
        assert!(bundle.factory().is_none());
    }

    #[test]
    fn test_context_failure_keeps_factory() {
        let provider = |name: &str| -> Result<ContextFactory> {
            let factory = ContextFactory::new(UnitConfig::new(name))?;
            factory.close();
            Ok(factory)
        };
        let bundle = ContextBundle::new("unitA");
        bundle.initialize_or_reset(&provider, &LogSink);

        assert!(matches!(
            bundle.status(),
            Some(InitStatus::Failed { stage: InitStage::Context, .. })
        ));
        assert!(bundle.factory().is_some());
        assert!(bundle.context().is_none());
        assert!(bundle.transaction_controller().is_none());
        assert!(bundle.connection().is_none());

        // Reset on a partial bundle only touches what exists
        bundle.reset();
    }

    #[test]
    fn test_reset_clears_context_and_cache() {
        let bundle = ContextBundle::new("unitA");
        bundle.initialize_or_reset(&DefaultProvider::default(), &LogSink);

        let context = bundle.context().unwrap();
        let key = EntityKey::new("users", "1");
        context.persist(key.clone(), json!({"name": "Alice"})).unwrap();
        context.clear();
        context.find(&key).unwrap();
        assert_eq!(context.tracked_count(), 1);
        assert_eq!(bundle.factory().unwrap().cache().len(), 1);

        bundle.reset();
        assert_eq!(context.tracked_count(), 0);
        assert!(bundle.factory().unwrap().cache().is_empty());
    }

    #[test]
    fn test_ensure_ready_reports_failure() {
        let failing = |_: &str| -> Result<ContextFactory> {
            Err(RiderError::Config("no driver".into()))
        };
        let bundle = ContextBundle::new("unitA");
        bundle.initialize_or_reset(&failing, &LogSink);

        match bundle.ensure_ready() {
            Err(RiderError::UnitUnavailable { unit, stage, message }) => {
                assert_eq!(unit, "unitA");
                assert_eq!(stage, "factory");
                assert!(message.contains("no driver"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
