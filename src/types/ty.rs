//! # Core Type System Definitions
//!
//! Types, type variables, and type schemes for the Hindley-Milner
//! inference system.
//!
//! ## Overview
//!
//! - **Type** - An interned, immutable type: primitives, variables,
//!   functions, tuples, records, lists, and data-type instances
//! - **TypeVar** - A unification variable, identified by an integer id
//!   owned by the session's variable store
//! - **TypeScheme** - A polymorphic type with quantified variables
//!   (e.g. `forall 'a. 'a -> 'a`), used only by value bindings
//!
//! ## Monikers
//!
//! Every type has a *moniker*: its canonical textual form, e.g.
//! `int * int -> bool` or `{deptno:int, name:string}`. Monikers drive
//! interning (reference equality implies structural equality), error
//! messages, and the `: <type>` column of REPL output. Type variables
//! are lettered `'a`, `'b`, ... in order of first occurrence;
//! equality-admitting variables are doubled (`''a`).

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A type variable, identified by a store-scoped integer id.
///
/// Restrictions (equality, numeric) live in the unification store, not
/// here; a `TypeVar` is only an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar {
    pub id: usize,
}

impl TypeVar {
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    Real,
    String,
    Char,
    Bool,
    Unit,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Int => "int",
            PrimitiveType::Real => "real",
            PrimitiveType::String => "string",
            PrimitiveType::Char => "char",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Unit => "unit",
        }
    }
}

/// Structure of a type. Obtain instances through the `TypeSystem` so
/// that composite types are interned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Prim(PrimitiveType),
    Var(TypeVar),
    Fn(Type, Type),
    /// n >= 2 components.
    Tuple(Vec<Type>),
    /// Fields sorted by label.
    Record(Vec<(String, Type)>),
    List(Type),
    /// An instance of a declared data type, `(T1, ..., Tk) name`.
    Data { name: String, args: Vec<Type> },
}

/// A reference-counted, interned type. Cheap to clone; two types from
/// the same `TypeSystem` are structurally equal iff their `Rc`s are
/// pointer-equal, but `PartialEq` also falls back to structure so types
/// from different systems still compare correctly in tests.
#[derive(Debug, Clone, Eq)]
pub struct Type(pub Rc<TypeKind>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Deref for Type {
    type Target = TypeKind;

    fn deref(&self) -> &TypeKind {
        &self.0
    }
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type(Rc::new(kind))
    }

    /// Free type variables, in no particular order.
    pub fn free_type_vars(&self) -> HashSet<TypeVar> {
        self.vars_in_order().into_iter().collect()
    }

    /// Variables in first-occurrence order (used for moniker lettering
    /// and for quantifier ordering in schemes).
    pub fn vars_in_order(&self) -> Vec<TypeVar> {
        let mut order = Vec::new();
        self.collect_vars(&mut order);
        order
    }

    fn collect_vars(&self, order: &mut Vec<TypeVar>) {
        match &*self.0 {
            TypeKind::Prim(_) => {}
            TypeKind::Var(v) => {
                if !order.contains(v) {
                    order.push(*v);
                }
            }
            TypeKind::Fn(a, b) => {
                a.collect_vars(order);
                b.collect_vars(order);
            }
            TypeKind::Tuple(items) => items.iter().for_each(|t| t.collect_vars(order)),
            TypeKind::Record(fields) => fields.iter().for_each(|(_, t)| t.collect_vars(order)),
            TypeKind::List(t) => t.collect_vars(order),
            TypeKind::Data { args, .. } => args.iter().for_each(|t| t.collect_vars(order)),
        }
    }

    /// Whether a function type occurs anywhere in this type. Such types
    /// never admit equality.
    pub fn contains_fn(&self) -> bool {
        match &*self.0 {
            TypeKind::Prim(_) | TypeKind::Var(_) => false,
            TypeKind::Fn(_, _) => true,
            TypeKind::Tuple(items) => items.iter().any(|t| t.contains_fn()),
            TypeKind::Record(fields) => fields.iter().any(|(_, t)| t.contains_fn()),
            TypeKind::List(t) => t.contains_fn(),
            TypeKind::Data { args, .. } => args.iter().any(|t| t.contains_fn()),
        }
    }

    pub fn is_prim(&self, p: PrimitiveType) -> bool {
        matches!(&*self.0, TypeKind::Prim(q) if *q == p)
    }

    /// The canonical textual form of this type.
    pub fn moniker(&self) -> String {
        let vars = self.vars_in_order();
        let mut buf = String::new();
        self.unparse(&vars, 0, &mut buf);
        buf
    }

    // prec levels: 0 = top (fn), 1 = tuple component, 2 = application arg
    fn unparse(&self, vars: &[TypeVar], prec: u8, buf: &mut String) {
        match &*self.0 {
            TypeKind::Prim(p) => buf.push_str(p.name()),
            TypeKind::Var(v) => {
                let idx = vars.iter().position(|w| w == v).unwrap_or(v.id);
                buf.push('\'');
                buf.push_str(&var_name(idx));
            }
            TypeKind::Fn(a, b) => {
                let parens = prec > 0;
                if parens {
                    buf.push('(');
                }
                a.unparse(vars, 1, buf);
                buf.push_str(" -> ");
                b.unparse(vars, 0, buf);
                if parens {
                    buf.push(')');
                }
            }
            TypeKind::Tuple(items) => {
                let parens = prec > 1;
                if parens {
                    buf.push('(');
                }
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(" * ");
                    }
                    t.unparse(vars, 2, buf);
                }
                if parens {
                    buf.push(')');
                }
            }
            TypeKind::Record(fields) => {
                buf.push('{');
                for (i, (label, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    buf.push_str(label);
                    buf.push(':');
                    t.unparse(vars, 0, buf);
                }
                buf.push('}');
            }
            TypeKind::List(t) => {
                t.unparse(vars, 2, buf);
                buf.push_str(" list");
            }
            TypeKind::Data { name, args } => {
                match args.len() {
                    0 => {}
                    1 => {
                        args[0].unparse(vars, 2, buf);
                        buf.push(' ');
                    }
                    _ => {
                        buf.push('(');
                        for (i, t) in args.iter().enumerate() {
                            if i > 0 {
                                buf.push_str(", ");
                            }
                            t.unparse(vars, 0, buf);
                        }
                        buf.push_str(") ");
                    }
                }
                buf.push_str(name);
            }
        }
    }
}

/// `'a`, `'b`, ..., `'z`, `'a1`, `'b1`, ...
fn var_name(idx: usize) -> String {
    let letter = (b'a' + (idx % 26) as u8) as char;
    let round = idx / 26;
    if round == 0 {
        letter.to_string()
    } else {
        format!("{letter}{round}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.moniker())
    }
}

/// A quantified variable of a scheme, remembering whether it admits
/// equality so instantiation can restore the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeVar {
    pub var: TypeVar,
    pub eq: bool,
}

/// Polymorphic type scheme: `forall vars. ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScheme {
    pub vars: Vec<SchemeVar>,
    pub ty: Type,
}

impl TypeScheme {
    /// A scheme quantifying nothing.
    pub fn monomorphic(ty: Type) -> Self {
        TypeScheme {
            vars: Vec::new(),
            ty,
        }
    }

    pub fn polymorphic(vars: Vec<SchemeVar>, ty: Type) -> Self {
        TypeScheme { vars, ty }
    }

    /// Free variables: those of the body minus the quantified ones.
    pub fn free_type_vars(&self) -> HashSet<TypeVar> {
        let mut free = self.ty.free_type_vars();
        for sv in &self.vars {
            free.remove(&sv.var);
        }
        free
    }
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ty.moniker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Int))
    }

    fn var(id: usize) -> Type {
        Type::new(TypeKind::Var(TypeVar::new(id)))
    }

    #[test]
    fn moniker_primitives() {
        assert_eq!(int().moniker(), "int");
        assert_eq!(
            Type::new(TypeKind::Prim(PrimitiveType::Unit)).moniker(),
            "unit"
        );
    }

    #[test]
    fn moniker_fn_parenthesizes_argument() {
        let f = Type::new(TypeKind::Fn(int(), int()));
        let g = Type::new(TypeKind::Fn(f.clone(), int()));
        assert_eq!(f.moniker(), "int -> int");
        assert_eq!(g.moniker(), "(int -> int) -> int");
    }

    #[test]
    fn moniker_tuple_and_list() {
        let t = Type::new(TypeKind::Tuple(vec![int(), int()]));
        assert_eq!(t.moniker(), "int * int");
        let l = Type::new(TypeKind::List(t));
        assert_eq!(l.moniker(), "(int * int) list");
    }

    #[test]
    fn moniker_record_sorted_labels() {
        let r = Type::new(TypeKind::Record(vec![
            ("a".to_string(), int()),
            ("b".to_string(), int()),
        ]));
        assert_eq!(r.moniker(), "{a:int, b:int}");
    }

    #[test]
    fn moniker_vars_lettered_by_occurrence() {
        let f = Type::new(TypeKind::Fn(var(7), var(3)));
        assert_eq!(f.moniker(), "'a -> 'b");
        let g = Type::new(TypeKind::Fn(var(3), var(3)));
        assert_eq!(g.moniker(), "'a -> 'a");
    }

    #[test]
    fn free_vars_of_scheme_excludes_quantified() {
        let body = Type::new(TypeKind::Fn(var(0), var(1)));
        let scheme = TypeScheme::polymorphic(
            vec![SchemeVar {
                var: TypeVar::new(0),
                eq: false,
            }],
            body,
        );
        let free = scheme.free_type_vars();
        assert!(free.contains(&TypeVar::new(1)));
        assert!(!free.contains(&TypeVar::new(0)));
    }

    #[test]
    fn contains_fn_looks_through_structure() {
        let f = Type::new(TypeKind::Fn(int(), int()));
        let t = Type::new(TypeKind::Tuple(vec![int(), Type::new(TypeKind::List(f))]));
        assert!(t.contains_fn());
        assert!(!int().contains_fn());
    }
}
