//! Surface type expressions, as written in annotations and declarations.
//!
//! These are resolved against the session's `TypeSystem` during type
//! resolution; only there do `int`, `list` and user datatype names gain
//! meaning.

use lachs::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    /// `'a` or `''a`; the name keeps its leading quotes.
    Var(String, Span),
    /// `int`, `bool`, `(ty, ty) pair`, `ty list` and other applications
    /// of a named type constructor.
    Named {
        args: Vec<Ty>,
        name: String,
        position: Span,
    },
    Tuple(Vec<Ty>, Span),
    Record(Vec<(String, Ty)>, Span),
    Fn(Box<Ty>, Box<Ty>, Span),
}

impl Ty {
    pub fn position(&self) -> Span {
        match self {
            Ty::Var(_, pos) => pos.clone(),
            Ty::Named { position, .. } => position.clone(),
            Ty::Tuple(_, pos) => pos.clone(),
            Ty::Record(_, pos) => pos.clone(),
            Ty::Fn(_, _, pos) => pos.clone(),
        }
    }
}
