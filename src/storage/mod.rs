pub mod memory;

pub use memory::{InMemoryStore, Table, Tables, apply_change, read_record};
