use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiderError {
    #[error("Invalid unit name: '{0}'")]
    InvalidUnitName(String),

    #[error("Persistence unit '{0}' not found")]
    UnitNotFound(String),

    #[error("Persistence unit '{unit}' unavailable: {stage} failed: {message}")]
    UnitUnavailable {
        unit: String,
        stage: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction already active")]
    TransactionActive,

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Connection {0} is closed")]
    ConnectionClosed(u64),

    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, RiderError>;

impl<T> From<std::sync::PoisonError<T>> for RiderError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for RiderError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for RiderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
