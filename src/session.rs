//! Session: the per-evaluation context.
//!
//! A session owns the type system, the current environment, the
//! warnings sink, configuration properties, and the in-flight flag.
//! Sessions share no state; any number may coexist in one process.

use std::rc::Rc;

use crate::catalog::{ExternalCatalog, RelBuilder};
use crate::env::Environment;
use crate::eval::value::Value;
use crate::resolve::error::CompileWarning;
use crate::types::ty::TypeScheme;
use crate::types::TypeSystem;

/// Session-scoped configuration properties. Unknown names are rejected
/// at set-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Enables the relationalizer.
    Hybrid,
}

impl Prop {
    pub fn by_name(name: &str) -> Option<Prop> {
        match name.to_ascii_lowercase().as_str() {
            "hybrid" => Some(Prop::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnknownProp(pub String);

impl std::fmt::Display for UnknownProp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unknown property: {}", self.0)
    }
}

impl std::error::Error for UnknownProp {}

pub struct Session {
    pub type_system: TypeSystem,
    pub env: Environment,
    pub warnings: Vec<CompileWarning>,
    pub rel_builder: Option<Rc<dyn RelBuilder>>,
    hybrid: bool,
    in_flight: bool,
}

impl Session {
    pub fn new() -> Self {
        Session {
            type_system: TypeSystem::new(),
            env: Environment::empty(),
            warnings: Vec::new(),
            rel_builder: None,
            hybrid: false,
            in_flight: false,
        }
    }

    /// Bind every dataset of a catalog as a list-of-rows value.
    pub fn with_catalog(mut self, catalog: &dyn ExternalCatalog) -> Self {
        for (name, dataset) in catalog.datasets() {
            let list_ty = self.type_system.list_type(dataset.schema.clone());
            let scheme = TypeScheme::monomorphic(list_ty);
            self.env = self
                .env
                .bind(name, scheme, Some(Value::list(dataset.rows)));
        }
        self
    }

    pub fn with_rel_builder(mut self, builder: Rc<dyn RelBuilder>) -> Self {
        self.rel_builder = Some(builder);
        self
    }

    pub fn set_prop(&mut self, name: &str, value: bool) -> Result<(), UnknownProp> {
        match Prop::by_name(name) {
            Some(Prop::Hybrid) => {
                self.hybrid = value;
                Ok(())
            }
            None => Err(UnknownProp(name.to_string())),
        }
    }

    pub fn hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn enter_eval(&mut self) {
        self.in_flight = true;
    }

    pub(crate) fn leave_eval(&mut self) {
        self.in_flight = false;
    }

    /// Take the warnings accumulated by the last statement.
    pub fn take_warnings(&mut self) -> Vec<CompileWarning> {
        std::mem::take(&mut self.warnings)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_property_is_rejected() {
        let mut session = Session::new();
        assert!(session.set_prop("hybrid", true).is_ok());
        assert!(session.hybrid());
        assert!(session.set_prop("turbo", true).is_err());
    }
}
