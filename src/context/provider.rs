use super::ContextFactory;
use crate::connection::{ContextFlavor, UnitConfig, UnitsConfig};
use crate::core::{Result, RiderError};

/// Builds the factory for a unit name
///
/// Called at most once per unit by the registry. Any
/// `Fn(&str) -> Result<ContextFactory>` closure is a provider.
pub trait PersistenceProvider: Send + Sync {
    fn create_factory(&self, unit_name: &str) -> Result<ContextFactory>;
}

impl<F> PersistenceProvider for F
where
    F: Fn(&str) -> Result<ContextFactory> + Send + Sync,
{
    fn create_factory(&self, unit_name: &str) -> Result<ContextFactory> {
        self(unit_name)
    }
}

/// Provider over a fixed set of named unit definitions
#[derive(Debug, Clone, Default)]
pub struct ConfiguredProvider {
    units: UnitsConfig,
}

impl ConfiguredProvider {
    pub fn new(units: UnitsConfig) -> Self {
        Self { units }
    }

    /// Units from the file named by `MEMORIDER_UNITS`, or none when unset
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(UnitsConfig::from_env()?.unwrap_or_default()))
    }

    pub fn units(&self) -> &UnitsConfig {
        &self.units
    }
}

impl PersistenceProvider for ConfiguredProvider {
    fn create_factory(&self, unit_name: &str) -> Result<ContextFactory> {
        let config = self
            .units
            .get(unit_name)
            .ok_or_else(|| RiderError::UnitNotFound(unit_name.to_string()))?;
        ContextFactory::new(config.clone())
    }
}

/// Provider accepting any unit name with default settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProvider {
    flavor: ContextFlavor,
}

impl DefaultProvider {
    pub fn new(flavor: ContextFlavor) -> Self {
        Self { flavor }
    }
}

impl PersistenceProvider for DefaultProvider {
    fn create_factory(&self, unit_name: &str) -> Result<ContextFactory> {
        ContextFactory::new(UnitConfig::new(unit_name).flavor(self.flavor))
    }
}
