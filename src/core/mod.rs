//! Core IR - the canonical typed form after name resolution.
//!
//! Core differs from the surface AST in that:
//! - every expression carries its resolved type
//! - every binder carries a unique ordinal, so shadowing is resolved
//! - records hold their full, alphabetically ordered label set
//! - list patterns are cons/nil, infix operators are builtin
//!   applications, `fun`/multi-clause sugar is gone
//! - patterns appear only under match nodes or as irrefutable binders
//!   of `fn` and `let`
//!
//! Positions are erased except where evaluation can fail (application,
//! match, raise, handle).

pub mod visit;

use lachs::Span;

use crate::ast::Literal;
use crate::eval::builtins::Builtin;
use crate::types::ty::{Type, TypeScheme};

/// A resolved identifier: name plus disambiguating ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct Id {
    pub name: String,
    pub ord: usize,
    pub ty: Type,
}

/// Key identifying a binder irrespective of its type.
pub type IdKey = (String, usize);

impl Id {
    pub fn key(&self) -> IdKey {
        (self.name.clone(), self.ord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agg {
    Count,
    Sum,
    Min,
    Max,
}

impl Agg {
    pub fn name(&self) -> &'static str {
        match self {
            Agg::Count => "count",
            Agg::Sum => "sum",
            Agg::Min => "min",
            Agg::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Literal {
        value: Literal,
        ty: Type,
    },
    Id(Id),
    /// A reference to a builtin function or operator.
    Builtin {
        builtin: Builtin,
        ty: Type,
    },
    /// A binding made by an earlier statement of the session.
    Global {
        name: String,
        ty: Type,
    },
    Tuple {
        items: Vec<Exp>,
        ty: Type,
    },
    Record {
        fields: Vec<(String, Exp)>,
        ty: Type,
    },
    List {
        items: Vec<Exp>,
        ty: Type,
    },
    /// A data or exception constructor, possibly applied.
    Ctor {
        name: String,
        ordinal: usize,
        datatype: String,
        arg: Option<Box<Exp>>,
        ty: Type,
    },
    Apply {
        func: Box<Exp>,
        arg: Box<Exp>,
        ty: Type,
        pos: Span,
    },
    Fn {
        param: Pat,
        body: Box<Exp>,
        ty: Type,
    },
    If {
        cond: Box<Exp>,
        then_branch: Box<Exp>,
        else_branch: Box<Exp>,
        ty: Type,
    },
    Let {
        decl: Box<Decl>,
        body: Box<Exp>,
        ty: Type,
    },
    /// The compiled-match node: canonical arms over one scrutinee.
    /// Coverage has been checked; a non-exhaustive match falls through
    /// to a `Match` raise at runtime.
    Match {
        scrutinee: Box<Exp>,
        arms: Vec<(Pat, Exp)>,
        ty: Type,
        pos: Span,
    },
    Raise {
        exp: Box<Exp>,
        ty: Type,
        pos: Span,
    },
    Handle {
        body: Box<Exp>,
        arms: Vec<(Pat, Exp)>,
        ty: Type,
        pos: Span,
    },
    /// A stepped comprehension, the canonical form of `from`.
    From {
        steps: Vec<FromStep>,
        /// Element type of the result list.
        elem: Type,
        ty: Type,
        pos: Span,
    },
    /// Relational-algebra form produced by the relationalizer.
    Rel {
        rel: Rel,
        ty: Type,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromStep {
    Scan { pat: Pat, exp: Exp },
    Where(Exp),
    Yield(Exp),
    /// Regroup the row: key and aggregate binders replace the scan
    /// variables for the steps downstream.
    Group {
        keys: Vec<(Id, Exp)>,
        aggs: Vec<(Id, Agg, Exp)>,
    },
}

/// Relational algebra over row collections. Row-valued functions are
/// ordinary `Fn` expressions so the downstream compiler needs no new
/// machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum Rel {
    Scan {
        input: Box<Exp>,
        elem: Type,
    },
    Filter {
        input: Box<Rel>,
        pred: Box<Exp>,
    },
    Project {
        input: Box<Rel>,
        proj: Box<Exp>,
        elem: Type,
    },
    Join {
        left: Box<Rel>,
        right: Box<Rel>,
        cond: Option<Box<Exp>>,
        elem: Type,
    },
    Union {
        left: Box<Rel>,
        right: Box<Rel>,
    },
    GroupBy {
        input: Box<Rel>,
        key: Box<Exp>,
        aggs: Vec<(String, Agg, Exp)>,
        elem: Type,
    },
    Aggregate {
        input: Box<Rel>,
        aggs: Vec<(String, Agg, Exp)>,
        elem: Type,
    },
}

impl Rel {
    /// Element type of the rows this node produces.
    pub fn elem_type(&self) -> Type {
        match self {
            Rel::Scan { elem, .. } => elem.clone(),
            Rel::Filter { input, .. } => input.elem_type(),
            Rel::Project { elem, .. } => elem.clone(),
            Rel::Join { elem, .. } => elem.clone(),
            Rel::Union { left, .. } => left.elem_type(),
            Rel::GroupBy { elem, .. } => elem.clone(),
            Rel::Aggregate { elem, .. } => elem.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pat {
    Wildcard(Type),
    Id(Id),
    Literal {
        value: Literal,
        ty: Type,
    },
    Ctor {
        name: String,
        ordinal: usize,
        datatype: String,
        arg: Option<Box<Pat>>,
        ty: Type,
    },
    Tuple {
        items: Vec<Pat>,
        ty: Type,
    },
    /// Full label set, alphabetically ordered.
    Record {
        fields: Vec<(String, Pat)>,
        ty: Type,
    },
    Cons {
        head: Box<Pat>,
        tail: Box<Pat>,
        ty: Type,
    },
    Nil(Type),
    Layered {
        id: Id,
        pat: Box<Pat>,
        ty: Type,
    },
}

impl Pat {
    pub fn ty(&self) -> Type {
        match self {
            Pat::Wildcard(ty) => ty.clone(),
            Pat::Id(id) => id.ty.clone(),
            Pat::Literal { ty, .. } => ty.clone(),
            Pat::Ctor { ty, .. } => ty.clone(),
            Pat::Tuple { ty, .. } => ty.clone(),
            Pat::Record { ty, .. } => ty.clone(),
            Pat::Cons { ty, .. } => ty.clone(),
            Pat::Nil(ty) => ty.clone(),
            Pat::Layered { ty, .. } => ty.clone(),
        }
    }

    /// A pattern that can never fail to match.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pat::Wildcard(_) | Pat::Id(_) => true,
            Pat::Tuple { items, .. } => items.iter().all(Pat::is_irrefutable),
            Pat::Record { fields, .. } => fields.iter().all(|(_, p)| p.is_irrefutable()),
            Pat::Layered { pat, .. } => pat.is_irrefutable(),
            _ => false,
        }
    }

    /// Binders introduced by this pattern, left to right.
    pub fn binders(&self) -> Vec<&Id> {
        let mut out = Vec::new();
        self.collect_binders(&mut out);
        out
    }

    fn collect_binders<'a>(&'a self, out: &mut Vec<&'a Id>) {
        match self {
            Pat::Wildcard(_) | Pat::Literal { .. } | Pat::Nil(_) => {}
            Pat::Id(id) => out.push(id),
            Pat::Ctor { arg, .. } => {
                if let Some(p) = arg {
                    p.collect_binders(out);
                }
            }
            Pat::Tuple { items, .. } => items.iter().for_each(|p| p.collect_binders(out)),
            Pat::Record { fields, .. } => fields.iter().for_each(|(_, p)| p.collect_binders(out)),
            Pat::Cons { head, tail, .. } => {
                head.collect_binders(out);
                tail.collect_binders(out);
            }
            Pat::Layered { id, pat, .. } => {
                out.push(id);
                pat.collect_binders(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// `val pat = exp`; a refutable pattern raises `Bind` at runtime.
    NonRecVal { pat: Pat, exp: Exp },
    /// `val rec`: every right-hand side is a lambda.
    RecVal { binds: Vec<(Id, Exp)> },
}

impl Exp {
    pub fn ty(&self) -> Type {
        match self {
            Exp::Literal { ty, .. } => ty.clone(),
            Exp::Id(id) => id.ty.clone(),
            Exp::Builtin { ty, .. } => ty.clone(),
            Exp::Global { ty, .. } => ty.clone(),
            Exp::Tuple { ty, .. } => ty.clone(),
            Exp::Record { ty, .. } => ty.clone(),
            Exp::List { ty, .. } => ty.clone(),
            Exp::Ctor { ty, .. } => ty.clone(),
            Exp::Apply { ty, .. } => ty.clone(),
            Exp::Fn { ty, .. } => ty.clone(),
            Exp::If { ty, .. } => ty.clone(),
            Exp::Let { ty, .. } => ty.clone(),
            Exp::Match { ty, .. } => ty.clone(),
            Exp::Raise { ty, .. } => ty.clone(),
            Exp::Handle { ty, .. } => ty.clone(),
            Exp::From { ty, .. } => ty.clone(),
            Exp::Rel { ty, .. } => ty.clone(),
        }
    }

    /// Atoms are trivially duplicable by the inliner.
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Exp::Literal { .. } | Exp::Id(_) | Exp::Builtin { .. } | Exp::Global { .. }
        )
    }
}

/// A value binding surfaced by executing a statement, before values
/// exist: name and scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclBinding {
    pub name: String,
    pub scheme: TypeScheme,
}
