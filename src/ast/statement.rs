//! Declarations and top-level statements of the surface AST.

use lachs::Span;

use super::expression::Expr;
use super::pattern::Pattern;
use super::ty::Ty;

/// A top-level REPL statement: a declaration or a bare expression
/// (which the shell binds to `it`).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement<T> {
    Decl(Decl<T>),
    Expression(Expr<T>),
}

impl<T> Statement<T> {
    pub fn position(&self) -> Span {
        match self {
            Statement::Decl(d) => d.position(),
            Statement::Expression(e) => e.position(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl<T> {
    Val(ValDecl<T>),
    Fun(FunDecl<T>),
    Datatype(DatatypeDecl),
    Exception(ExceptionDecl),
    TypeAlias(TypeAliasDecl),
}

/// `val [rec] pat = exp [and pat = exp ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ValDecl<T> {
    pub rec: bool,
    pub binds: Vec<ValBind<T>>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValBind<T> {
    pub pat: Pattern<T>,
    pub exp: Expr<T>,
    pub position: Span,
}

/// `fun f p1 ... pn = exp | f q1 ... qn = exp ...`; sugar for a
/// `val rec` over nested `fn`s, expanded during type resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl<T> {
    pub name: String,
    pub clauses: Vec<FunClause<T>>,
    pub position: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunClause<T> {
    pub params: Vec<Pattern<T>>,
    pub body: Expr<T>,
    pub position: Span,
}

/// `datatype ('a, 'b) name = Con1 of ty | Con2 | ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DatatypeDecl {
    /// Type parameter names, with their leading quotes.
    pub params: Vec<String>,
    pub name: String,
    pub ctors: Vec<(String, Option<Ty>)>,
    pub position: Span,
}

/// `exception Name [of ty]`
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionDecl {
    pub name: String,
    pub param: Option<Ty>,
    pub position: Span,
}

/// `type ('a, 'b) name = ty`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub params: Vec<String>,
    pub name: String,
    pub ty: Ty,
    pub position: Span,
}

impl<T> Decl<T> {
    pub fn position(&self) -> Span {
        match self {
            Decl::Val(d) => d.position.clone(),
            Decl::Fun(d) => d.position.clone(),
            Decl::Datatype(d) => d.position.clone(),
            Decl::Exception(d) => d.position.clone(),
            Decl::TypeAlias(d) => d.position.clone(),
        }
    }
}
