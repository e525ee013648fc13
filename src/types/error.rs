//! Type errors produced during inference.
//!
//! Hard errors abort the statement; they carry the position of the
//! offending surface node and render as
//! `type error: <detail> at stdIn:<line>:<col>`.

use std::fmt;

use lachs::Span;

use crate::pos::position_label;

use super::ty::{Type, TypeVar};

#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    UnboundIdentifier {
        name: String,
        span: Span,
    },
    Mismatch {
        expected: Type,
        found: Type,
        span: Span,
        context: Option<String>,
    },
    OccursCheck {
        var: TypeVar,
        ty: Type,
        span: Span,
    },
    EqualityRequired {
        ty: Type,
        span: Span,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
}

impl TypeError {
    pub fn unbound(name: impl Into<String>, span: Span) -> Self {
        TypeError::UnboundIdentifier {
            name: name.into(),
            span,
        }
    }

    pub fn mismatch(expected: Type, found: Type, span: Span) -> Self {
        TypeError::Mismatch {
            expected,
            found,
            span,
            context: None,
        }
    }

    /// Attach a context note (only affects `Mismatch`).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let TypeError::Mismatch { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }

    pub fn occurs_check(var: TypeVar, ty: Type, span: Span) -> Self {
        TypeError::OccursCheck { var, ty, span }
    }

    pub fn equality_required(ty: Type, span: Span) -> Self {
        TypeError::EqualityRequired { ty, span }
    }

    pub fn arity_mismatch(name: impl Into<String>, expected: usize, found: usize, span: Span) -> Self {
        TypeError::ArityMismatch {
            name: name.into(),
            expected,
            found,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            TypeError::UnboundIdentifier { span, .. } => span,
            TypeError::Mismatch { span, .. } => span,
            TypeError::OccursCheck { span, .. } => span,
            TypeError::EqualityRequired { span, .. } => span,
            TypeError::ArityMismatch { span, .. } => span,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeError::UnboundIdentifier { name, span } => {
                write!(
                    f,
                    "type error: unbound identifier: {} at {}",
                    name,
                    position_label(span)
                )
            }
            TypeError::Mismatch {
                expected,
                found,
                span,
                context,
            } => {
                write!(
                    f,
                    "type error: type mismatch: expected {}, found {} at {}",
                    expected.moniker(),
                    found.moniker(),
                    position_label(span)
                )?;
                if let Some(ctx) = context {
                    write!(f, "\n  note: {ctx}")?;
                }
                Ok(())
            }
            TypeError::OccursCheck { var, ty, span } => {
                write!(
                    f,
                    "type error: cannot construct infinite type: 't{} = {} at {}",
                    var.id,
                    ty.moniker(),
                    position_label(span)
                )
            }
            TypeError::EqualityRequired { ty, span } => {
                write!(
                    f,
                    "type error: equality type required, found {} at {}",
                    ty.moniker(),
                    position_label(span)
                )
            }
            TypeError::ArityMismatch {
                name,
                expected,
                found,
                span,
            } => {
                write!(
                    f,
                    "type error: {} expects {} type argument(s), found {} at {}",
                    name,
                    expected,
                    found,
                    position_label(span)
                )
            }
        }
    }
}

impl std::error::Error for TypeError {}
