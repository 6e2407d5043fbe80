use super::InitStage;
use crate::core::RiderError;
use log::error;

/// Receives construction failures of persistence units
///
/// Called exactly once per failed construction attempt.
pub trait FailureSink: Send + Sync {
    fn construction_failed(&self, unit_name: &str, stage: InitStage, error: &RiderError);
}

impl<S: FailureSink + ?Sized> FailureSink for std::sync::Arc<S> {
    fn construction_failed(&self, unit_name: &str, stage: InitStage, error: &RiderError) {
        (**self).construction_failed(unit_name, stage, error)
    }
}

/// Default sink: reports through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn construction_failed(&self, unit_name: &str, stage: InitStage, err: &RiderError) {
        error!(
            "Could not initialize persistence unit {} ({} stage): {}",
            unit_name, stage, err
        );
    }
}
