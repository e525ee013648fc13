//! Bindings and environments.
//!
//! An environment is a persistent, layered map from names to bindings,
//! shared between compile time (no values) and run time (values
//! present). Two shapes exist: a flat `MapEnvironment` and a
//! `SubEnvironment` holding a parent plus one extra binding. `bind` is
//! the hot path - each `let` pushes one layer - and flattening happens
//! only when a caller asks for all values.
//!
//! Rebinding the name at the top of the chain replaces that layer;
//! rebinding a name buried under a newer one does not shorten the
//! chain. Looking past the newer name would be nice, but is expensive,
//! so we do not do it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::eval::value::Value;
use crate::types::ty::{PrimitiveType, Type, TypeKind, TypeScheme};

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub scheme: TypeScheme,
    /// Absent in compile-time environments.
    pub value: Option<Value>,
}

impl Binding {
    pub fn new(name: impl Into<String>, scheme: TypeScheme, value: Option<Value>) -> Self {
        Binding {
            name: name.into(),
            scheme,
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Environment {
    Map(Rc<MapEnvironment>),
    Sub(Rc<SubEnvironment>),
}

#[derive(Debug)]
pub struct MapEnvironment {
    map: HashMap<String, Binding>,
}

#[derive(Debug)]
pub struct SubEnvironment {
    parent: Environment,
    binding: Binding,
}

impl Environment {
    /// The base environment: `true` and `false` are pre-bound.
    pub fn empty() -> Environment {
        let bool_ty = Type::new(TypeKind::Prim(PrimitiveType::Bool));
        let mut map = HashMap::new();
        map.insert(
            "true".to_string(),
            Binding::new(
                "true",
                TypeScheme::monomorphic(bool_ty.clone()),
                Some(Value::Bool(true)),
            ),
        );
        map.insert(
            "false".to_string(),
            Binding::new(
                "false",
                TypeScheme::monomorphic(bool_ty),
                Some(Value::Bool(false)),
            ),
        );
        Environment::Map(Rc::new(MapEnvironment { map }))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Environment::Map(_))
    }

    pub fn is_sub(&self) -> bool {
        matches!(self, Environment::Sub(_))
    }

    /// Add one binding. If the outermost layer binds the same name it
    /// is replaced, keeping the chain short; deeper duplicates are left
    /// alone.
    pub fn bind(&self, name: impl Into<String>, scheme: TypeScheme, value: Option<Value>) -> Environment {
        let binding = Binding::new(name, scheme, value);
        match self {
            Environment::Sub(sub) if sub.binding.name == binding.name => {
                Environment::Sub(Rc::new(SubEnvironment {
                    parent: sub.parent.clone(),
                    binding,
                }))
            }
            _ => Environment::Sub(Rc::new(SubEnvironment {
                parent: self.clone(),
                binding,
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        match self {
            Environment::Map(map) => map.map.get(name),
            Environment::Sub(sub) => {
                if sub.binding.name == name {
                    Some(&sub.binding)
                } else {
                    sub.parent.lookup(name)
                }
            }
        }
    }

    /// Visit every layer, innermost first. Shadowed bindings are
    /// visited too; duplicate suppression is the caller's business.
    pub fn visit(&self, f: &mut impl FnMut(&Binding)) {
        match self {
            Environment::Map(map) => map.map.values().for_each(|b| f(b)),
            Environment::Sub(sub) => {
                f(&sub.binding);
                sub.parent.visit(f);
            }
        }
    }

    /// Distinct bindings by name, innermost winning.
    pub fn value_map(&self) -> HashMap<String, Binding> {
        let mut out: HashMap<String, Binding> = HashMap::new();
        self.visit(&mut |b| {
            out.entry(b.name.clone()).or_insert_with(|| b.clone());
        });
        out
    }

    /// Flatten into a `MapEnvironment`, then add all given bindings.
    pub fn bind_all(&self, bindings: impl IntoIterator<Item = Binding>) -> Environment {
        let mut map = self.value_map();
        for b in bindings {
            map.insert(b.name.clone(), b);
        }
        Environment::Map(Rc::new(MapEnvironment { map }))
    }

    /// Number of layers in the chain (bindings, counting shadowed
    /// ones).
    pub fn chain_length(&self) -> usize {
        let mut n = 0;
        self.visit(&mut |_| n += 1);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_scheme() -> TypeScheme {
        TypeScheme::monomorphic(Type::new(TypeKind::Prim(PrimitiveType::Int)))
    }

    fn str_scheme() -> TypeScheme {
        TypeScheme::monomorphic(Type::new(TypeKind::Prim(PrimitiveType::String)))
    }

    #[test]
    fn lookup_returns_innermost() {
        let env = Environment::empty()
            .bind("x", int_scheme(), Some(Value::Int(1)))
            .bind("x", str_scheme(), Some(Value::String("s".into())));
        let b = env.lookup("x").unwrap();
        assert!(matches!(b.value, Some(Value::String(_))));
    }

    #[test]
    fn empty_has_true_and_false() {
        let env = Environment::empty();
        assert!(env.lookup("true").is_some());
        assert!(env.lookup("false").is_some());
        assert_eq!(env.chain_length(), 2);
    }

    #[test]
    fn rebinding_top_layer_does_not_grow_chain() {
        let env = Environment::empty()
            .bind("a", int_scheme(), Some(Value::Int(0)))
            .bind("b", int_scheme(), Some(Value::Int(1)))
            .bind("c", int_scheme(), Some(Value::Int(2)));
        assert!(env.is_sub());
        assert_eq!(env.chain_length(), 5);

        // Overwrite "true": 5 values, 6 bindings.
        let e1 = env.bind("true", str_scheme(), Some(Value::String("yes".into())));
        assert_eq!(e1.value_map().len(), 5);
        assert_eq!(e1.chain_length(), 6);

        // Overwrite "true" again: still 5 values and 6 bindings.
        let e2 = e1.bind("true", str_scheme(), Some(Value::String("no".into())));
        assert_eq!(e2.value_map().len(), 5);
        assert_eq!(e2.chain_length(), 6);

        // Add "foo": both counts grow.
        let e3 = e2.bind("foo", str_scheme(), Some(Value::String("baz".into())));
        assert_eq!(e3.value_map().len(), 6);
        assert_eq!(e3.chain_length(), 7);

        // Add "true" again: it sits below "foo", so the chain grows.
        // We do not look past "foo" for the older "true"; that would be
        // nice, but is expensive, so we do not do it.
        let e4 = e3.bind("true", str_scheme(), Some(Value::String("yes".into())));
        assert_eq!(e4.value_map().len(), 6);
        assert_eq!(e4.chain_length(), 8);
    }

    #[test]
    fn bind_all_flattens_to_map() {
        let env = Environment::empty()
            .bind("a", int_scheme(), Some(Value::Int(0)))
            .bind("b", int_scheme(), Some(Value::Int(1)))
            .bind("c", int_scheme(), Some(Value::Int(2)));
        let flat = env.bind_all(env.value_map().into_values());
        assert!(flat.is_map());
        assert_eq!(flat.chain_length(), 5);
        assert!(flat.lookup("b").is_some());
    }
}
