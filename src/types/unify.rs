//! Unification over a mutable type-variable store.
//!
//! The store is a union-find: each variable owns a slot that is either
//! unbound, linked to another variable, or bound to a type. Lookups
//! follow chains with path compression. Variables carry restrictions:
//!
//! - `eq` - may only be bound to equality-admitting types (no function
//!   types anywhere inside); binding propagates the flag to nested
//!   variables
//! - `num` - may only be bound to `int` or `real`
//! - `ord` - may only be bound to `int`, `real`, `string` or `char`
//!
//! Unbound `num`/`ord` variables default to `int` when a binding is
//! generalised. Every variable belongs to exactly one store, the one
//! owned by the session's `TypeSystem`.

use lachs::Span;

use super::error::TypeError;
use super::ty::{PrimitiveType, Type, TypeKind, TypeVar};

#[derive(Debug, Clone)]
enum SlotState {
    Unbound,
    Link(usize),
    Bound(Type),
}

#[derive(Debug, Clone)]
struct Slot {
    eq: bool,
    num: bool,
    ord: bool,
    state: SlotState,
}

#[derive(Debug, Default)]
pub struct VarStore {
    slots: Vec<Slot>,
}

impl VarStore {
    pub fn new() -> Self {
        VarStore { slots: Vec::new() }
    }

    pub fn fresh(&mut self, eq: bool) -> TypeVar {
        self.fresh_restricted(eq, false, false)
    }

    /// A variable restricted to `int` or `real`, used by overloaded
    /// arithmetic schemes.
    pub fn fresh_numeric(&mut self) -> TypeVar {
        self.fresh_restricted(false, true, false)
    }

    /// A variable restricted to `int`, `real`, `string` or `char`,
    /// used by overloaded comparison schemes.
    pub fn fresh_ordered(&mut self) -> TypeVar {
        self.fresh_restricted(false, false, true)
    }

    fn fresh_restricted(&mut self, eq: bool, num: bool, ord: bool) -> TypeVar {
        let id = self.slots.len();
        self.slots.push(Slot {
            eq,
            num,
            ord,
            state: SlotState::Unbound,
        });
        TypeVar::new(id)
    }

    pub fn is_eq(&mut self, var: TypeVar) -> bool {
        let r = self.root(var.id);
        r < self.slots.len() && self.slots[r].eq
    }

    pub fn is_numeric(&mut self, var: TypeVar) -> bool {
        let r = self.root(var.id);
        r < self.slots.len() && self.slots[r].num
    }

    /// Representative slot index, compressing link chains on the way.
    /// Ids beyond the table are datatype template variables and are
    /// their own representatives.
    fn root(&mut self, id: usize) -> usize {
        if id >= self.slots.len() {
            return id;
        }
        match self.slots[id].state {
            SlotState::Link(next) => {
                let r = self.root(next);
                self.slots[id].state = SlotState::Link(r);
                r
            }
            _ => id,
        }
    }

    /// Resolve the head of a type: follow a variable to its binding or
    /// to its representative. Children are left untouched.
    fn walk(&mut self, ty: &Type) -> Type {
        if let TypeKind::Var(v) = &**ty {
            let r = self.root(v.id);
            if r >= self.slots.len() {
                return Type::new(TypeKind::Var(TypeVar::new(r)));
            }
            match self.slots[r].state.clone() {
                SlotState::Bound(t) => {
                    let w = self.walk(&t);
                    self.slots[r].state = SlotState::Bound(w.clone());
                    w
                }
                _ => Type::new(TypeKind::Var(TypeVar::new(r))),
            }
        } else {
            ty.clone()
        }
    }

    /// Deep resolution: every bound variable in `ty` is replaced by its
    /// binding; unbound variables appear as their representatives.
    pub fn resolve(&mut self, ty: &Type) -> Type {
        let head = self.walk(ty);
        match &*head {
            TypeKind::Prim(_) | TypeKind::Var(_) => head.clone(),
            TypeKind::Fn(a, b) => Type::new(TypeKind::Fn(self.resolve(a), self.resolve(b))),
            TypeKind::Tuple(items) => Type::new(TypeKind::Tuple(
                items.iter().map(|t| self.resolve(t)).collect::<Vec<_>>(),
            )),
            TypeKind::Record(fields) => Type::new(TypeKind::Record(
                fields
                    .iter()
                    .map(|(l, t)| (l.clone(), self.resolve(t)))
                    .collect::<Vec<_>>(),
            )),
            TypeKind::List(t) => Type::new(TypeKind::List(self.resolve(t))),
            TypeKind::Data { name, args } => Type::new(TypeKind::Data {
                name: name.clone(),
                args: args.iter().map(|t| self.resolve(t)).collect::<Vec<_>>(),
            }),
        }
    }

    pub fn unify(&mut self, t1: &Type, t2: &Type, span: &Span) -> Result<(), TypeError> {
        let a = self.walk(t1);
        let b = self.walk(t2);
        match (&*a, &*b) {
            (TypeKind::Var(x), TypeKind::Var(y)) if x.id == y.id => Ok(()),
            (TypeKind::Var(x), TypeKind::Var(y)) => self.union(*x, *y, span),
            (TypeKind::Var(x), _) => self.bind(*x, &b, span),
            (_, TypeKind::Var(y)) => self.bind(*y, &a, span),
            (TypeKind::Prim(p), TypeKind::Prim(q)) if p == q => Ok(()),
            (TypeKind::Fn(a1, b1), TypeKind::Fn(a2, b2)) => {
                self.unify(a1, a2, span)?;
                self.unify(b1, b2, span)
            }
            (TypeKind::Tuple(xs), TypeKind::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys) {
                    self.unify(x, y, span)?;
                }
                Ok(())
            }
            (TypeKind::Record(xs), TypeKind::Record(ys))
                if xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|((l1, _), (l2, _))| l1 == l2) =>
            {
                for ((_, x), (_, y)) in xs.iter().zip(ys) {
                    self.unify(x, y, span)?;
                }
                Ok(())
            }
            (TypeKind::List(x), TypeKind::List(y)) => self.unify(x, y, span),
            (
                TypeKind::Data { name: n1, args: a1 },
                TypeKind::Data { name: n2, args: a2 },
            ) if n1 == n2 && a1.len() == a2.len() => {
                for (x, y) in a1.iter().zip(a2) {
                    self.unify(x, y, span)?;
                }
                Ok(())
            }
            _ => {
                let expected = self.resolve(&a);
                let found = self.resolve(&b);
                Err(TypeError::mismatch(expected, found, span.clone()))
            }
        }
    }

    /// Link two unbound representatives, merging restrictions.
    fn union(&mut self, x: TypeVar, y: TypeVar, span: &Span) -> Result<(), TypeError> {
        let rx = self.root(x.id);
        let ry = self.root(y.id);
        if rx == ry {
            return Ok(());
        }
        let (eq, num, ord) = (
            self.slots[rx].eq || self.slots[ry].eq,
            self.slots[rx].num || self.slots[ry].num,
            self.slots[rx].ord || self.slots[ry].ord,
        );
        self.slots[ry].eq = eq;
        self.slots[ry].num = num;
        self.slots[ry].ord = ord;
        self.slots[rx].state = SlotState::Link(ry);
        let _ = span;
        Ok(())
    }

    /// Bind an unbound representative to a non-variable type.
    fn bind(&mut self, var: TypeVar, ty: &Type, span: &Span) -> Result<(), TypeError> {
        let r = self.root(var.id);
        if self.occurs(r, ty) {
            let resolved = self.resolve(ty);
            return Err(TypeError::occurs_check(TypeVar::new(r), resolved, span.clone()));
        }
        if self.slots[r].num && !self.numeric_type(ty) {
            let found = self.resolve(ty);
            return Err(TypeError::mismatch(
                Type::new(TypeKind::Prim(PrimitiveType::Int)),
                found,
                span.clone(),
            )
            .with_context("operand of an overloaded numeric operator"));
        }
        if self.slots[r].ord && !self.ordered_type(ty) {
            let found = self.resolve(ty);
            return Err(TypeError::mismatch(
                Type::new(TypeKind::Prim(PrimitiveType::Int)),
                found,
                span.clone(),
            )
            .with_context("operand of an overloaded comparison operator"));
        }
        if self.slots[r].eq {
            self.require_equality(ty, span)?;
        }
        self.slots[r].state = SlotState::Bound(ty.clone());
        Ok(())
    }

    fn numeric_type(&mut self, ty: &Type) -> bool {
        matches!(
            &*self.walk(ty),
            TypeKind::Prim(PrimitiveType::Int) | TypeKind::Prim(PrimitiveType::Real)
        )
    }

    fn ordered_type(&mut self, ty: &Type) -> bool {
        matches!(
            &*self.walk(ty),
            TypeKind::Prim(PrimitiveType::Int)
                | TypeKind::Prim(PrimitiveType::Real)
                | TypeKind::Prim(PrimitiveType::String)
                | TypeKind::Prim(PrimitiveType::Char)
        )
    }

    /// Check that `ty` admits equality, flagging every nested variable
    /// as equality-restricted.
    fn require_equality(&mut self, ty: &Type, span: &Span) -> Result<(), TypeError> {
        let head = self.walk(ty);
        match &*head {
            TypeKind::Prim(_) => Ok(()),
            TypeKind::Var(v) => {
                let r = self.root(v.id);
                self.slots[r].eq = true;
                Ok(())
            }
            TypeKind::Fn(_, _) => {
                let resolved = self.resolve(&head);
                Err(TypeError::equality_required(resolved, span.clone()))
            }
            TypeKind::Tuple(items) => {
                for t in items {
                    self.require_equality(t, span)?;
                }
                Ok(())
            }
            TypeKind::Record(fields) => {
                for (_, t) in fields {
                    self.require_equality(t, span)?;
                }
                Ok(())
            }
            TypeKind::List(t) => self.require_equality(t, span),
            TypeKind::Data { args, .. } => {
                for t in args {
                    self.require_equality(t, span)?;
                }
                Ok(())
            }
        }
    }

    fn occurs(&mut self, root: usize, ty: &Type) -> bool {
        let head = self.walk(ty);
        match &*head {
            TypeKind::Prim(_) => false,
            TypeKind::Var(v) => self.root(v.id) == root,
            TypeKind::Fn(a, b) => self.occurs(root, a) || self.occurs(root, b),
            TypeKind::Tuple(items) => items.iter().any(|t| self.occurs(root, t)),
            TypeKind::Record(fields) => fields.iter().any(|(_, t)| self.occurs(root, t)),
            TypeKind::List(t) => self.occurs(root, t),
            TypeKind::Data { args, .. } => args.iter().any(|t| self.occurs(root, t)),
        }
    }

    /// Bind every unbound numeric or ordered variable in `ty` to
    /// `int`. Called before generalisation so leftover overloads
    /// default.
    pub fn default_numeric(&mut self, ty: &Type) {
        let resolved = self.resolve(ty);
        for v in resolved.vars_in_order() {
            let r = self.root(v.id);
            if r >= self.slots.len() {
                continue;
            }
            if (self.slots[r].num || self.slots[r].ord)
                && matches!(self.slots[r].state, SlotState::Unbound)
            {
                self.slots[r].state =
                    SlotState::Bound(Type::new(TypeKind::Prim(PrimitiveType::Int)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Int))
    }

    fn string() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::String))
    }

    fn var(v: TypeVar) -> Type {
        Type::new(TypeKind::Var(v))
    }

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn unify_identical_prims() {
        let mut store = VarStore::new();
        assert!(store.unify(&int(), &int(), &span()).is_ok());
    }

    #[test]
    fn unify_var_with_concrete() {
        let mut store = VarStore::new();
        let v = store.fresh(false);
        store.unify(&var(v), &int(), &span()).unwrap();
        assert_eq!(store.resolve(&var(v)), int());
    }

    #[test]
    fn unify_two_vars_share_binding() {
        let mut store = VarStore::new();
        let v1 = store.fresh(false);
        let v2 = store.fresh(false);
        store.unify(&var(v1), &var(v2), &span()).unwrap();
        store.unify(&var(v2), &string(), &span()).unwrap();
        assert_eq!(store.resolve(&var(v1)), string());
    }

    #[test]
    fn unify_functions_threads_bindings() {
        let mut store = VarStore::new();
        let a = store.fresh(false);
        let b = store.fresh(false);
        let t1 = Type::new(TypeKind::Fn(var(a), var(b)));
        let t2 = Type::new(TypeKind::Fn(int(), string()));
        store.unify(&t1, &t2, &span()).unwrap();
        assert_eq!(store.resolve(&var(a)), int());
        assert_eq!(store.resolve(&var(b)), string());
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let mut store = VarStore::new();
        let v = store.fresh(false);
        let t = Type::new(TypeKind::Fn(var(v), int()));
        let result = store.unify(&var(v), &t, &span());
        assert!(matches!(result, Err(TypeError::OccursCheck { .. })));
    }

    #[test]
    fn mismatch_on_shape() {
        let mut store = VarStore::new();
        let f = Type::new(TypeKind::Fn(int(), int()));
        let result = store.unify(&int(), &f, &span());
        assert!(matches!(result, Err(TypeError::Mismatch { .. })));
    }

    #[test]
    fn eq_var_rejects_function_type() {
        let mut store = VarStore::new();
        let v = store.fresh(true);
        let f = Type::new(TypeKind::Fn(int(), int()));
        let result = store.unify(&var(v), &f, &span());
        assert!(matches!(result, Err(TypeError::EqualityRequired { .. })));
    }

    #[test]
    fn eq_var_propagates_to_nested_vars() {
        let mut store = VarStore::new();
        let e = store.fresh(true);
        let a = store.fresh(false);
        let pair = Type::new(TypeKind::Tuple(vec![var(a), int()]));
        store.unify(&var(e), &pair, &span()).unwrap();
        assert!(store.is_eq(a));
    }

    #[test]
    fn numeric_var_accepts_int_and_real_only() {
        let mut store = VarStore::new();
        let n = store.fresh_numeric();
        assert!(store.unify(&var(n), &string(), &span()).is_err());
        let m = store.fresh_numeric();
        assert!(store
            .unify(&var(m), &Type::new(TypeKind::Prim(PrimitiveType::Real)), &span())
            .is_ok());
    }

    #[test]
    fn numeric_default_is_int() {
        let mut store = VarStore::new();
        let n = store.fresh_numeric();
        store.default_numeric(&var(n));
        assert_eq!(store.resolve(&var(n)), int());
    }

    #[test]
    fn record_labels_must_agree() {
        let mut store = VarStore::new();
        let r1 = Type::new(TypeKind::Record(vec![("a".to_string(), int())]));
        let r2 = Type::new(TypeKind::Record(vec![("b".to_string(), int())]));
        assert!(store.unify(&r1, &r2, &span()).is_err());
    }
}
