use crate::core::{Result, RiderError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Environment variable naming the JSON file with unit definitions
pub const UNITS_ENV_VAR: &str = "MEMORIDER_UNITS";

const URL_SCHEME: &str = "memorider://";

/// How a context exposes its raw connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFlavor {
    /// Session-backed: the connection can be unwrapped at any time
    Session,
    /// The connection can only be unwrapped inside an active transaction
    #[default]
    Generic,
}

impl std::str::FromStr for ContextFlavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(ContextFlavor::Session),
            "generic" => Ok(ContextFlavor::Generic),
            other => Err(format!("Unknown context flavor '{}'", other)),
        }
    }
}

impl std::fmt::Display for ContextFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextFlavor::Session => write!(f, "session"),
            ContextFlavor::Generic => write!(f, "generic"),
        }
    }
}

/// Persistence unit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unit name
    pub name: String,

    /// Logical database name
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub flavor: ContextFlavor,

    /// Maximum number of entries in the second-level cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Free-form provider properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_database() -> String {
    "memorider".to_string()
}

fn default_cache_capacity() -> usize {
    1024
}

impl UnitConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            database: default_database(),
            flavor: ContextFlavor::default(),
            cache_capacity: default_cache_capacity(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn flavor(mut self, flavor: ContextFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set second-level cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Parse from a unit URL
    ///
    /// Format: "memorider://database?flavor=session&cache_capacity=64"
    ///
    /// Unknown query keys become properties.
    pub fn from_url(name: &str, url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| RiderError::Config(format!("URL must start with '{}'", URL_SCHEME)))?;

        let (database, query) = match rest.split_once('?') {
            Some((database, query)) => (database, Some(query)),
            None => (rest, None),
        };
        if database.is_empty() || database.contains('/') {
            return Err(RiderError::Config(format!("Invalid database in URL '{}'", url)));
        }

        let mut config = Self::new(name).database(database);
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| RiderError::Config(format!("Invalid URL parameter '{}'", pair)))?;
            match key {
                "flavor" => config.flavor = value.parse().map_err(RiderError::Config)?,
                "cache_capacity" => {
                    config.cache_capacity = value
                        .parse()
                        .map_err(|_| RiderError::Config(format!("Invalid cache_capacity '{}'", value)))?
                }
                _ => {
                    config.properties.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(config)
    }

    /// Convert to unit URL (properties are not included)
    pub fn to_url(&self) -> String {
        format!(
            "{}{}?flavor={}&cache_capacity={}",
            URL_SCHEME, self.database, self.flavor, self.cache_capacity
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RiderError::InvalidUnitName(self.name.clone()));
        }

        if self.database.is_empty() {
            return Err(RiderError::Config("Database cannot be empty".to_string()));
        }

        if self.cache_capacity == 0 {
            return Err(RiderError::Config("cache_capacity must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Set of persistence unit definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitsConfig {
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl UnitsConfig {
    pub fn new(units: Vec<UnitConfig>) -> Result<Self> {
        let config = Self { units };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Load from the file named by `MEMORIDER_UNITS`, if set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var_os(UNITS_ENV_VAR) {
            Some(path) => Self::from_file(path).map(Some),
            None => Ok(None),
        }
    }

    pub fn get(&self, name: &str) -> Option<&UnitConfig> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|unit| unit.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for unit in &self.units {
            unit.validate()?;
            if !seen.insert(unit.name.as_str()) {
                return Err(RiderError::Config(format!(
                    "Duplicate persistence unit '{}'",
                    unit.name
                )));
            }
        }
        Ok(())
    }
}
