//! Type substitutions.
//!
//! A substitution maps type variables to types. With the mutable
//! variable store doing the heavy lifting during unification,
//! substitutions here serve scheme instantiation and datatype
//! constructor expansion, where a fixed set of quantified variables is
//! replaced all at once.

use std::collections::HashMap;

use super::ty::{Type, TypeKind, TypeVar};

#[derive(Debug, Clone, Default)]
pub struct Substitution(pub HashMap<TypeVar, Type>);

impl Substitution {
    pub fn empty() -> Self {
        Substitution(HashMap::new())
    }

    pub fn singleton(var: TypeVar, ty: Type) -> Self {
        let mut map = HashMap::new();
        map.insert(var, ty);
        Substitution(map)
    }

    pub fn insert(&mut self, var: TypeVar, ty: Type) {
        self.0.insert(var, ty);
    }

    pub fn get(&self, var: &TypeVar) -> Option<&Type> {
        self.0.get(var)
    }

    /// Replace every mapped variable occurring in `ty`.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.0.is_empty() {
            return ty.clone();
        }
        match &**ty {
            TypeKind::Prim(_) => ty.clone(),
            TypeKind::Var(v) => match self.0.get(v) {
                Some(t) => t.clone(),
                None => ty.clone(),
            },
            TypeKind::Fn(a, b) => Type::new(TypeKind::Fn(self.apply(a), self.apply(b))),
            TypeKind::Tuple(items) => {
                Type::new(TypeKind::Tuple(items.iter().map(|t| self.apply(t)).collect()))
            }
            TypeKind::Record(fields) => Type::new(TypeKind::Record(
                fields
                    .iter()
                    .map(|(l, t)| (l.clone(), self.apply(t)))
                    .collect(),
            )),
            TypeKind::List(t) => Type::new(TypeKind::List(self.apply(t))),
            TypeKind::Data { name, args } => Type::new(TypeKind::Data {
                name: name.clone(),
                args: args.iter().map(|t| self.apply(t)).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ty::PrimitiveType;

    fn int() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Int))
    }

    fn var(id: usize) -> Type {
        Type::new(TypeKind::Var(TypeVar::new(id)))
    }

    #[test]
    fn apply_replaces_mapped_vars() {
        let subst = Substitution::singleton(TypeVar::new(0), int());
        let ty = Type::new(TypeKind::Fn(var(0), var(1)));
        assert_eq!(subst.apply(&ty).moniker(), "int -> 'a");
    }

    #[test]
    fn apply_empty_is_identity() {
        let ty = Type::new(TypeKind::Tuple(vec![var(0), int()]));
        assert_eq!(Substitution::empty().apply(&ty), ty);
    }

    #[test]
    fn apply_descends_into_records_and_lists() {
        let subst = Substitution::singleton(TypeVar::new(2), int());
        let ty = Type::new(TypeKind::Record(vec![(
            "xs".to_string(),
            Type::new(TypeKind::List(var(2))),
        )]));
        assert_eq!(subst.apply(&ty).moniker(), "{xs:int list}");
    }
}
