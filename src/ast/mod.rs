//! Surface AST.
//!
//! The parser produces `Statement<()>`; the type resolver rewrites it to
//! `Statement<Type>` with every expression carrying its resolved type in
//! the `info` slot.

pub mod expression;
pub mod pattern;
pub mod statement;
pub mod ty;

pub use expression::{BinOp, Expr, Literal, MatchArm};
pub use pattern::Pattern;
pub use statement::{Decl, Statement};
pub use ty::Ty;
