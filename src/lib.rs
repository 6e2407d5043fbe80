// ============================================================================
// memorider Library
// ============================================================================

pub mod core;
pub mod storage;
pub mod transaction;
pub mod connection;
pub mod context;
pub mod registry;
pub mod dataset;
pub mod producer;
pub mod prelude;

// Re-export main types for convenience
pub use crate::core::{EntityKey, Record, Result, RiderError};
pub use crate::connection::{
    Connection, ConnectionHandle,
    config::{ContextFlavor, UnitConfig, UnitsConfig},
};
pub use crate::context::{
    CacheStats, ConfiguredProvider, ContextFactory, DefaultProvider, PersistenceContext,
    PersistenceProvider, SecondLevelCache,
};
pub use crate::registry::{
    BundleState, ConnectionStrategy, ContextBundle, FailureSink, InitStage, InitStatus, LogSink,
    Registry,
};
pub use crate::transaction::{TransactionController, TransactionId, TransactionState};
pub use crate::dataset::{DataSet, DataSetModel, SeedStrategy};
pub use crate::producer::{ContextProducer, DEFAULT_INJECTION_UNIT};
