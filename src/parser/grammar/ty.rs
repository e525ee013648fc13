//! Type expression productions.
//!
//! `->` is right associative and loosest; `*` builds tuples; type
//! constructor application is postfix (`int list`, `(int, bool) pair`).

use crate::ast::Ty;
use crate::lexer::Token;
use crate::parser::{ParseError, ParseResult, ParseState};

use super::expression::expect_keyword;
use super::{ident, span_union};

pub fn ty(state: &mut ParseState) -> ParseResult<Ty> {
    let left = tuple_ty(state)?;
    if matches!(state.peek(), Some(Token::Arrow(_))) {
        state.advance();
        let right = ty(state)?;
        let position = span_union(&left.position(), &right.position());
        return Ok(Ty::Fn(Box::new(left), Box::new(right), position));
    }
    Ok(left)
}

fn tuple_ty(state: &mut ParseState) -> ParseResult<Ty> {
    let first = app_ty(state)?;
    let mut items = vec![first];
    while matches!(state.peek(), Some(Token::Star(_))) {
        state.advance();
        items.push(app_ty(state)?);
    }
    if items.len() == 1 {
        Ok(items.into_iter().next().expect("one item"))
    } else {
        let position = span_union(
            &items.first().expect("non-empty").position(),
            &items.last().expect("non-empty").position(),
        );
        Ok(Ty::Tuple(items, position))
    }
}

fn app_ty(state: &mut ParseState) -> ParseResult<Ty> {
    let mut base = atom_ty(state)?;
    while matches!(state.peek(), Some(Token::Ident(_))) {
        let (name, position) = ident(state)?;
        let position = span_union(&base.position(), &position);
        base = Ty::Named {
            args: vec![base],
            name,
            position,
        };
    }
    Ok(base)
}

fn atom_ty(state: &mut ParseState) -> ParseResult<Ty> {
    match state.peek() {
        Some(Token::TyVar(_)) => match state.advance() {
            Some(Token::TyVar(inner)) => Ok(Ty::Var(inner.value, inner.position)),
            _ => unreachable!("peeked a type variable"),
        },
        Some(Token::EqTyVar(_)) => match state.advance() {
            Some(Token::EqTyVar(inner)) => Ok(Ty::Var(inner.value, inner.position)),
            _ => unreachable!("peeked a type variable"),
        },
        Some(Token::Ident(_)) => {
            let (name, position) = ident(state)?;
            Ok(Ty::Named {
                args: Vec::new(),
                name,
                position,
            })
        }
        Some(Token::LBrace(_)) => {
            let start = state.advance().expect("peeked '{'").pos();
            let mut fields = Vec::new();
            if !matches!(state.peek(), Some(Token::RBrace(_))) {
                loop {
                    let (label, _) = ident(state)?;
                    expect_keyword(state, |t| matches!(t, Token::Colon(_)), "':'")?;
                    fields.push((label, ty(state)?));
                    if matches!(state.peek(), Some(Token::Comma(_))) {
                        state.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = expect_keyword(state, |t| matches!(t, Token::RBrace(_)), "'}'")?;
            Ok(Ty::Record(fields, span_union(&start, &end)))
        }
        Some(Token::LParen(_)) => {
            let start = state.advance().expect("peeked '('").pos();
            let first = ty(state)?;
            let mut args = vec![first];
            while matches!(state.peek(), Some(Token::Comma(_))) {
                state.advance();
                args.push(ty(state)?);
            }
            let end = expect_keyword(state, |t| matches!(t, Token::RParen(_)), "')'")?;
            if args.len() == 1 {
                return Ok(args.into_iter().next().expect("one type"));
            }
            // A parenthesised argument list must feed a constructor.
            let (name, name_pos) = ident(state).map_err(|_| {
                ParseError::new("expected a type constructor after '(ty, ...)'")
                    .at(span_union(&start, &end))
            })?;
            Ok(Ty::Named {
                args,
                name,
                position: span_union(&start, &name_pos),
            })
        }
        _ => Err(state.error_here("expected type").expected("type")),
    }
}
