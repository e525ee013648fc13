//! Expression nodes of the surface AST.
//!
//! Every node is position-tagged and parameterised over an `info` slot:
//! `()` straight out of the parser, the resolved [`crate::types::Type`]
//! after type resolution. The shapes follow the concrete syntax closely;
//! canonicalisation (record label sorting, `fun` sugar, pattern
//! elaboration) happens in later phases.

use lachs::Span;

use super::pattern::Pattern;
use super::statement::Decl;
use super::ty::Ty;

/// Literal constants shared between expressions and patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(String),
    Char(char),
}

/// Infix operators, in increasing precedence groups (see the grammar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Orelse,
    Andalso,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Cons,
    Append,
    Plus,
    Minus,
    Caret,
    Times,
    Divide,
    Div,
    Mod,
    Compose,
}

impl BinOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Orelse => 1,
            BinOp::Andalso => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 4,
            BinOp::Cons | BinOp::Append => 5,
            BinOp::Plus | BinOp::Minus | BinOp::Caret => 6,
            BinOp::Times | BinOp::Divide | BinOp::Div | BinOp::Mod => 7,
            BinOp::Compose => 3,
        }
    }

    pub fn right_associative(&self) -> bool {
        matches!(self, BinOp::Cons | BinOp::Append)
    }

    /// Source text of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            BinOp::Orelse => "orelse",
            BinOp::Andalso => "andalso",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Cons => "::",
            BinOp::Append => "@",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Caret => "^",
            BinOp::Times => "*",
            BinOp::Divide => "/",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Compose => "o",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<T> {
    Literal(LiteralExpr<T>),
    Ident(Ident<T>),
    /// `#label`, a function from a record to one of its fields.
    Selector(Selector<T>),
    Tuple(TupleExpr<T>),
    Record(RecordExpr<T>),
    List(ListExpr<T>),
    Apply(Apply<T>),
    Infix(InfixExpr<T>),
    /// Numeric negation `~ e` of a non-literal operand.
    Negate(Negate<T>),
    If(IfExpr<T>),
    Let(LetExpr<T>),
    Fn(FnExpr<T>),
    Case(CaseExpr<T>),
    Raise(RaiseExpr<T>),
    Handle(HandleExpr<T>),
    From(FromExpr<T>),
    Annotated(AnnotatedExpr<T>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr<T> {
    pub value: Literal,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident<T> {
    pub value: String,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector<T> {
    pub label: String,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleExpr<T> {
    pub items: Vec<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordExpr<T> {
    /// Fields in source order; later phases sort labels alphabetically.
    pub fields: Vec<(String, Expr<T>)>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListExpr<T> {
    pub items: Vec<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Apply<T> {
    pub func: Box<Expr<T>>,
    pub arg: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfixExpr<T> {
    pub op: BinOp,
    pub left: Box<Expr<T>>,
    pub right: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Negate<T> {
    pub operand: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr<T> {
    pub condition: Box<Expr<T>>,
    pub then_branch: Box<Expr<T>>,
    pub else_branch: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetExpr<T> {
    pub decls: Vec<Decl<T>>,
    pub body: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

/// One `pat => exp` arm of a `fn`, `case` or `handle`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm<T> {
    pub pat: Pattern<T>,
    pub exp: Expr<T>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnExpr<T> {
    pub arms: Vec<MatchArm<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr<T> {
    pub scrutinee: Box<Expr<T>>,
    pub arms: Vec<MatchArm<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaiseExpr<T> {
    pub exp: Box<Expr<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandleExpr<T> {
    pub exp: Box<Expr<T>>,
    pub arms: Vec<MatchArm<T>>,
    pub position: Span,
    pub info: T,
}

/// A `from` comprehension: one or more scans followed by pipeline steps.
#[derive(Debug, Clone, PartialEq)]
pub struct FromExpr<T> {
    pub sources: Vec<(Pattern<T>, Expr<T>)>,
    pub steps: Vec<FromStep<T>>,
    pub position: Span,
    pub info: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromStep<T> {
    Where(Expr<T>),
    Yield(Expr<T>),
    Group {
        key: Expr<T>,
        /// `compute <agg> of <exp>` items; the aggregate name labels the field.
        aggregates: Vec<(String, Expr<T>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedExpr<T> {
    pub exp: Box<Expr<T>>,
    pub ty: Ty,
    pub position: Span,
    pub info: T,
}

/// Split a `group` key into labelled fields: a record literal
/// contributes its fields, an identifier or selector application
/// contributes one field named after itself. `None` means no label can
/// be derived.
pub fn group_key_fields<T>(key: &Expr<T>) -> Option<Vec<(String, &Expr<T>)>> {
    match key {
        Expr::Record(r) => Some(r.fields.iter().map(|(l, e)| (l.clone(), e)).collect()),
        Expr::Ident(id) => Some(vec![(id.value.clone(), key)]),
        Expr::Apply(app) => match &*app.func {
            Expr::Selector(sel) => Some(vec![(sel.label.clone(), key)]),
            _ => None,
        },
        _ => None,
    }
}

impl<T> Expr<T> {
    pub fn position(&self) -> Span {
        match self {
            Expr::Literal(e) => e.position.clone(),
            Expr::Ident(e) => e.position.clone(),
            Expr::Selector(e) => e.position.clone(),
            Expr::Tuple(e) => e.position.clone(),
            Expr::Record(e) => e.position.clone(),
            Expr::List(e) => e.position.clone(),
            Expr::Apply(e) => e.position.clone(),
            Expr::Infix(e) => e.position.clone(),
            Expr::Negate(e) => e.position.clone(),
            Expr::If(e) => e.position.clone(),
            Expr::Let(e) => e.position.clone(),
            Expr::Fn(e) => e.position.clone(),
            Expr::Case(e) => e.position.clone(),
            Expr::Raise(e) => e.position.clone(),
            Expr::Handle(e) => e.position.clone(),
            Expr::From(e) => e.position.clone(),
            Expr::Annotated(e) => e.position.clone(),
        }
    }

    pub fn info(&self) -> &T {
        match self {
            Expr::Literal(e) => &e.info,
            Expr::Ident(e) => &e.info,
            Expr::Selector(e) => &e.info,
            Expr::Tuple(e) => &e.info,
            Expr::Record(e) => &e.info,
            Expr::List(e) => &e.info,
            Expr::Apply(e) => &e.info,
            Expr::Infix(e) => &e.info,
            Expr::Negate(e) => &e.info,
            Expr::If(e) => &e.info,
            Expr::Let(e) => &e.info,
            Expr::Fn(e) => &e.info,
            Expr::Case(e) => &e.info,
            Expr::Raise(e) => &e.info,
            Expr::Handle(e) => &e.info,
            Expr::From(e) => &e.info,
            Expr::Annotated(e) => &e.info,
        }
    }
}
