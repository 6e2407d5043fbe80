use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity payloads are plain JSON documents.
pub type Record = serde_json::Value;

/// Identity of one entity instance: the table it lives in plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub table: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)
    }
}
