//! Everything a test harness usually needs.
//!
//! ```
//! use memorider::prelude::*;
//!
//! let registry = Registry::new(DefaultProvider::default());
//! let bundle = registry.instance("unitA");
//! bundle.around(|| {
//!     let context = bundle.context().expect("unit initialized");
//!     context.persist(EntityKey::new("users", "1"), serde_json::json!({"name": "Alice"}))
//! })?;
//! # Ok::<(), RiderError>(())
//! ```

pub use crate::connection::{ConnectionHandle, ContextFlavor, UnitConfig, UnitsConfig};
pub use crate::context::{ConfiguredProvider, DefaultProvider, PersistenceContext, PersistenceProvider};
pub use crate::core::{EntityKey, Record, Result, RiderError};
pub use crate::registry::{ContextBundle, FailureSink, InitStatus, Registry};
pub use crate::transaction::TransactionController;
