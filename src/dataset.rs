//! Declarative dataset configuration
//!
//! Plain configuration consumed by dataset seeding; nothing here touches a
//! store.

use serde::{Deserialize, Serialize};

/// How a dataset is written into its tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeedStrategy {
    /// Delete all rows of the dataset's tables, then insert
    #[default]
    CleanInsert,
    /// Truncate the dataset's tables, then insert
    TruncateInsert,
    Insert,
    /// Insert missing rows, update existing ones
    Refresh,
    Update,
}

impl std::fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SeedStrategy::CleanInsert => "CLEAN_INSERT",
            SeedStrategy::TruncateInsert => "TRUNCATE_INSERT",
            SeedStrategy::Insert => "INSERT",
            SeedStrategy::Refresh => "REFRESH",
            SeedStrategy::Update => "UPDATE",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SeedStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLEAN_INSERT" => Ok(SeedStrategy::CleanInsert),
            "TRUNCATE_INSERT" => Ok(SeedStrategy::TruncateInsert),
            "INSERT" => Ok(SeedStrategy::Insert),
            "REFRESH" => Ok(SeedStrategy::Refresh),
            "UPDATE" => Ok(SeedStrategy::Update),
            other => Err(format!("Unknown seed strategy '{}'", other)),
        }
    }
}

/// Declarative source of a dataset definition, e.g. a test's JSON descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSet {
    pub value: String,
    pub strategy: SeedStrategy,
    pub use_sequence_filtering: bool,
    pub disable_constraints: bool,
    pub table_ordering: Vec<String>,
    pub execute_statements_before: Vec<String>,
    pub execute_statements_after: Vec<String>,
}

impl Default for DataSet {
    fn default() -> Self {
        Self {
            value: String::new(),
            strategy: SeedStrategy::default(),
            use_sequence_filtering: true,
            disable_constraints: false,
            table_ordering: Vec::new(),
            execute_statements_before: Vec::new(),
            execute_statements_after: Vec::new(),
        }
    }
}

/// Dataset configuration built with chained setters
///
/// ```
/// use memorider::dataset::{DataSetModel, SeedStrategy};
///
/// let model = DataSetModel::default()
///     .name("users.json")
///     .seed_strategy(SeedStrategy::Refresh)
///     .table_ordering(["users", "orders"]);
///
/// assert_eq!(model.get_name(), Some("users.json"));
/// assert_eq!(model.get_table_ordering(), ["users", "orders"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetModel {
    name: Option<String>,
    seed_strategy: SeedStrategy,
    use_sequence_filtering: bool,
    disable_constraints: bool,
    table_ordering: Vec<String>,
    execute_statements_before: Vec<String>,
    execute_statements_after: Vec<String>,
}

impl Default for DataSetModel {
    fn default() -> Self {
        Self {
            name: None,
            seed_strategy: SeedStrategy::CleanInsert,
            use_sequence_filtering: true,
            disable_constraints: false,
            table_ordering: Vec::new(),
            execute_statements_before: Vec::new(),
            execute_statements_after: Vec::new(),
        }
    }
}

fn to_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl DataSetModel {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn seed_strategy(mut self, seed_strategy: SeedStrategy) -> Self {
        self.seed_strategy = seed_strategy;
        self
    }

    pub fn use_sequence_filtering(mut self, use_sequence_filtering: bool) -> Self {
        self.use_sequence_filtering = use_sequence_filtering;
        self
    }

    pub fn disable_constraints(mut self, disable_constraints: bool) -> Self {
        self.disable_constraints = disable_constraints;
        self
    }

    pub fn table_ordering<I, S>(mut self, table_ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_ordering = to_strings(table_ordering);
        self
    }

    pub fn execute_statements_before<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_statements_before = to_strings(statements);
        self
    }

    pub fn execute_statements_after<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_statements_after = to_strings(statements);
        self
    }

    /// Copy every setting from a declarative dataset
    pub fn from(self, data_set: DataSet) -> Self {
        self.name(data_set.value)
            .seed_strategy(data_set.strategy)
            .use_sequence_filtering(data_set.use_sequence_filtering)
            .table_ordering(data_set.table_ordering)
            .disable_constraints(data_set.disable_constraints)
            .execute_statements_before(data_set.execute_statements_before)
            .execute_statements_after(data_set.execute_statements_after)
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get_seed_strategy(&self) -> SeedStrategy {
        self.seed_strategy
    }

    pub fn is_use_sequence_filtering(&self) -> bool {
        self.use_sequence_filtering
    }

    pub fn is_disable_constraints(&self) -> bool {
        self.disable_constraints
    }

    pub fn get_table_ordering(&self) -> &[String] {
        &self.table_ordering
    }

    pub fn get_execute_statements_before(&self) -> &[String] {
        &self.execute_statements_before
    }

    pub fn get_execute_statements_after(&self) -> &[String] {
        &self.execute_statements_after
    }
}

impl From<DataSet> for DataSetModel {
    fn from(data_set: DataSet) -> Self {
        DataSetModel::default().from(data_set)
    }
}
