//! Pattern nodes of the surface AST.
//!
//! Patterns appear in `val` bindings, `fn`/`case`/`handle` arms and the
//! scan clauses of `from` expressions. An identifier pattern may turn out
//! to name a data constructor; that distinction is drawn during type
//! resolution, which rewrites such identifiers into constructor patterns.

use lachs::Span;

use super::expression::Literal;
use super::ty::Ty;

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern<T> {
    Wildcard(WildcardPat<T>),
    Ident(IdentPat<T>),
    Literal(LiteralPat<T>),
    /// An applied constructor, `SOME p` or `E p`.
    Ctor(CtorPat<T>),
    Tuple(TuplePat<T>),
    Record(RecordPat<T>),
    List(ListPat<T>),
    /// `p :: p`, sugar for the list cons constructor.
    Cons(ConsPat<T>),
    /// `id as pat`.
    Layered(LayeredPat<T>),
    Annotated(AnnotatedPat<T>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildcardPat<T> {
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentPat<T> {
    pub name: String,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralPat<T> {
    pub value: Literal,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtorPat<T> {
    pub name: String,
    pub arg: Option<Box<Pattern<T>>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuplePat<T> {
    pub items: Vec<Pattern<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordPat<T> {
    /// `(label, None)` is the `{x}` shorthand binding `x` to the field.
    pub fields: Vec<(String, Option<Pattern<T>>)>,
    /// Whether the pattern ends with `...`.
    pub ellipsis: bool,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPat<T> {
    pub items: Vec<Pattern<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsPat<T> {
    pub head: Box<Pattern<T>>,
    pub tail: Box<Pattern<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayeredPat<T> {
    pub name: String,
    pub pat: Box<Pattern<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPat<T> {
    pub pat: Box<Pattern<T>>,
    pub ty: Ty,
    pub position: Span,
    pub info: T,
}

impl<T> Pattern<T> {
    pub fn position(&self) -> Span {
        match self {
            Pattern::Wildcard(p) => p.position.clone(),
            Pattern::Ident(p) => p.position.clone(),
            Pattern::Literal(p) => p.position.clone(),
            Pattern::Ctor(p) => p.position.clone(),
            Pattern::Tuple(p) => p.position.clone(),
            Pattern::Record(p) => p.position.clone(),
            Pattern::List(p) => p.position.clone(),
            Pattern::Cons(p) => p.position.clone(),
            Pattern::Layered(p) => p.position.clone(),
            Pattern::Annotated(p) => p.position.clone(),
        }
    }

    /// Names bound by this pattern, left to right.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Pattern::Wildcard(_) | Pattern::Literal(_) => {}
            Pattern::Ident(p) => names.push(&p.name),
            Pattern::Ctor(p) => {
                if let Some(arg) = &p.arg {
                    arg.collect_names(names);
                }
            }
            Pattern::Tuple(p) => p.items.iter().for_each(|i| i.collect_names(names)),
            Pattern::Record(p) => {
                for (label, pat) in &p.fields {
                    match pat {
                        Some(pat) => pat.collect_names(names),
                        None => names.push(label),
                    }
                }
            }
            Pattern::List(p) => p.items.iter().for_each(|i| i.collect_names(names)),
            Pattern::Cons(p) => {
                p.head.collect_names(names);
                p.tail.collect_names(names);
            }
            Pattern::Layered(p) => {
                names.push(&p.name);
                p.pat.collect_names(names);
            }
            Pattern::Annotated(p) => p.pat.collect_names(names),
        }
    }
}
