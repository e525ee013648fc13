//! Foreign data: the external catalog and the optional relational
//! backend.
//!
//! A catalog exposes named datasets as list-of-record values. Schemas
//! are consulted during type resolution, rows during evaluation; rows
//! are immutable for the life of the session.

use std::collections::HashMap;

use crate::eval::code::{Raised, RelCode};
use crate::eval::value::Value;
use crate::eval::EvalContext;
use crate::types::ty::Type;

/// One external table: a record schema and its materialised rows.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// Element type; always a record type.
    pub schema: Type,
    pub rows: Vec<Value>,
}

impl DataSet {
    pub fn new(schema: Type, rows: Vec<Value>) -> Self {
        DataSet { schema, rows }
    }
}

/// Source of foreign datasets, wired into a session at construction.
pub trait ExternalCatalog {
    fn datasets(&self) -> HashMap<String, DataSet>;
}

/// A catalog over a fixed in-memory map; enough for tests and
/// embedding.
#[derive(Default)]
pub struct MapCatalog {
    datasets: HashMap<String, DataSet>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, name: impl Into<String>, dataset: DataSet) -> Self {
        self.datasets.insert(name.into(), dataset);
        self
    }
}

impl ExternalCatalog for MapCatalog {
    fn datasets(&self) -> HashMap<String, DataSet> {
        self.datasets.clone()
    }
}

/// Optional relational backend. Given a relational subtree it may
/// return materialised rows; `None` declines, falling back to the
/// evaluator's built-in operators.
pub trait RelBuilder {
    fn materialize(
        &self,
        rel: &RelCode,
        ctx: &EvalContext,
        frame: &mut Vec<Value>,
    ) -> Option<Result<Vec<Value>, Raised>>;
}
