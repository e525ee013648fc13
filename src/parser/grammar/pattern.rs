//! Pattern productions.

use crate::ast::expression::Literal;
use crate::ast::pattern::{
    AnnotatedPat, ConsPat, CtorPat, IdentPat, LayeredPat, ListPat, LiteralPat, Pattern, RecordPat,
    TuplePat, WildcardPat,
};
use crate::lexer::Token;
use crate::parser::{ParseError, ParseResult, ParseState};

use super::expression::expect_keyword;
use super::{ident, span_union, ty, unescape_string};

pub fn pattern(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    let pat = as_pat(state)?;
    if matches!(state.peek(), Some(Token::Colon(_))) {
        state.advance();
        let annotation = ty::ty(state)?;
        let position = span_union(&pat.position(), &annotation.position());
        return Ok(Pattern::Annotated(AnnotatedPat {
            pat: Box::new(pat),
            ty: annotation,
            position,
            info: (),
        }));
    }
    Ok(pat)
}

/// `x as pat` layers a binding over a pattern.
fn as_pat(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    if matches!(state.peek(), Some(Token::Ident(_)))
        && matches!(state.peek_at(1), Some(Token::As(_)))
    {
        let (name, start) = ident(state)?;
        state.advance(); // 'as'
        let pat = as_pat(state)?;
        let position = span_union(&start, &pat.position());
        return Ok(Pattern::Layered(LayeredPat {
            name,
            pat: Box::new(pat),
            position,
            info: (),
        }));
    }
    cons_pat(state)
}

/// `p :: ps`, right associative.
fn cons_pat(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    let head = app_pat(state)?;
    if matches!(state.peek(), Some(Token::Cons(_))) {
        state.advance();
        let tail = cons_pat(state)?;
        let position = span_union(&head.position(), &tail.position());
        return Ok(Pattern::Cons(ConsPat {
            head: Box::new(head),
            tail: Box::new(tail),
            position,
            info: (),
        }));
    }
    Ok(head)
}

fn starts_atom_pat(token: &Token) -> bool {
    matches!(
        token,
        Token::Underscore(_)
            | Token::Ident(_)
            | Token::Integer(_)
            | Token::Real(_)
            | Token::StringLiteral(_)
            | Token::CharLiteral(_)
            | Token::Tilde(_)
            | Token::LParen(_)
            | Token::LBrace(_)
            | Token::LBracket(_)
    )
}

/// An identifier followed by an atomic pattern is an applied
/// constructor; whether the name really is a constructor is the type
/// resolver's business.
fn app_pat(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    if matches!(state.peek(), Some(Token::Ident(_)))
        && state.peek_at(1).map(starts_atom_pat).unwrap_or(false)
    {
        let (name, start) = ident(state)?;
        if name != "true" && name != "false" {
            let arg = atom_pat(state)?;
            let position = span_union(&start, &arg.position());
            return Ok(Pattern::Ctor(CtorPat {
                name,
                arg: Some(Box::new(arg)),
                position,
                info: (),
            }));
        }
        // booleans take no argument; re-parse as a literal below
        return Ok(Pattern::Literal(LiteralPat {
            value: Literal::Bool(name == "true"),
            position: start,
            info: (),
        }));
    }
    atom_pat(state)
}

/// Atomic patterns, the only form allowed as curried `fun`
/// parameters.
pub(crate) fn atom_pat(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    match state.peek() {
        Some(Token::Underscore(_)) => {
            let position = state.advance().expect("peeked '_'").pos();
            Ok(Pattern::Wildcard(WildcardPat { position, info: () }))
        }
        Some(Token::Ident(_)) => {
            let (name, position) = ident(state)?;
            if name == "true" || name == "false" {
                return Ok(Pattern::Literal(LiteralPat {
                    value: Literal::Bool(name == "true"),
                    position,
                    info: (),
                }));
            }
            Ok(Pattern::Ident(IdentPat {
                name,
                position,
                info: (),
            }))
        }
        Some(Token::Integer(_)) | Some(Token::Real(_)) | Some(Token::Tilde(_)) => {
            numeric_literal_pat(state)
        }
        Some(Token::StringLiteral(_)) => match state.advance() {
            Some(Token::StringLiteral(inner)) => Ok(Pattern::Literal(LiteralPat {
                value: Literal::String(unescape_string(&inner.value)),
                position: inner.position,
                info: (),
            })),
            _ => unreachable!("peeked a string literal"),
        },
        Some(Token::CharLiteral(_)) => match state.advance() {
            Some(Token::CharLiteral(inner)) => {
                let body = unescape_string(&inner.value[1..]);
                let c = body.chars().next().unwrap_or(' ');
                Ok(Pattern::Literal(LiteralPat {
                    value: Literal::Char(c),
                    position: inner.position,
                    info: (),
                }))
            }
            _ => unreachable!("peeked a character literal"),
        },
        Some(Token::LParen(_)) => {
            let start = state.advance().expect("peeked '('").pos();
            if let Some(Token::RParen(_)) = state.peek() {
                let end = state.advance().expect("peeked ')'").pos();
                return Ok(Pattern::Literal(LiteralPat {
                    value: Literal::Unit,
                    position: span_union(&start, &end),
                    info: (),
                }));
            }
            let first = pattern(state)?;
            let mut items = vec![first];
            while matches!(state.peek(), Some(Token::Comma(_))) {
                state.advance();
                items.push(pattern(state)?);
            }
            let end = expect_keyword(state, |t| matches!(t, Token::RParen(_)), "')'")?;
            if items.len() == 1 {
                Ok(items.into_iter().next().expect("one item"))
            } else {
                Ok(Pattern::Tuple(TuplePat {
                    items,
                    position: span_union(&start, &end),
                    info: (),
                }))
            }
        }
        Some(Token::LBrace(_)) => {
            let start = state.advance().expect("peeked '{'").pos();
            let mut fields = Vec::new();
            let mut ellipsis = false;
            if !matches!(state.peek(), Some(Token::RBrace(_))) {
                loop {
                    if matches!(state.peek(), Some(Token::Ellipsis(_))) {
                        state.advance();
                        ellipsis = true;
                        break;
                    }
                    let (label, _) = ident(state)?;
                    let pat = if matches!(state.peek(), Some(Token::Equals(_))) {
                        state.advance();
                        Some(pattern(state)?)
                    } else {
                        None
                    };
                    fields.push((label, pat));
                    if matches!(state.peek(), Some(Token::Comma(_))) {
                        state.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = expect_keyword(state, |t| matches!(t, Token::RBrace(_)), "'}'")?;
            Ok(Pattern::Record(RecordPat {
                fields,
                ellipsis,
                position: span_union(&start, &end),
                info: (),
            }))
        }
        Some(Token::LBracket(_)) => {
            let start = state.advance().expect("peeked '['").pos();
            let mut items = Vec::new();
            if !matches!(state.peek(), Some(Token::RBracket(_))) {
                loop {
                    items.push(pattern(state)?);
                    if matches!(state.peek(), Some(Token::Comma(_))) {
                        state.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = expect_keyword(state, |t| matches!(t, Token::RBracket(_)), "']'")?;
            Ok(Pattern::List(ListPat {
                items,
                position: span_union(&start, &end),
                info: (),
            }))
        }
        _ => Err(state.error_here("expected pattern").expected("pattern")),
    }
}

fn numeric_literal_pat(state: &mut ParseState) -> ParseResult<Pattern<()>> {
    let negative = if matches!(state.peek(), Some(Token::Tilde(_))) {
        state.advance();
        true
    } else {
        false
    };
    match state.advance() {
        Some(Token::Integer(inner)) => {
            let magnitude: i64 = inner
                .value
                .parse()
                .map_err(|_| ParseError::new("integer literal out of range").at(inner.position.clone()))?;
            Ok(Pattern::Literal(LiteralPat {
                value: Literal::Int(if negative { -magnitude } else { magnitude }),
                position: inner.position,
                info: (),
            }))
        }
        Some(Token::Real(inner)) => {
            let magnitude: f64 = inner
                .value
                .parse()
                .map_err(|_| ParseError::new("real literal out of range").at(inner.position.clone()))?;
            Ok(Pattern::Literal(LiteralPat {
                value: Literal::Real(if negative { -magnitude } else { magnitude }),
                position: inner.position,
                info: (),
            }))
        }
        Some(tok) => Err(ParseError::new("expected numeric literal")
            .at(tok.pos())
            .found(tok.describe())),
        None => Err(ParseError::new("expected numeric literal")
            .found("end of input".to_string())),
    }
}
