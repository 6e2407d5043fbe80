pub mod error;
pub mod types;

pub use error::{Result, RiderError};
pub use types::{EntityKey, Record};
