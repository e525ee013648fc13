//! Grammar productions, recursive descent over `ParseState`.

pub mod expression;
pub mod pattern;
pub mod statement;
pub mod ty;

use lachs::Span;

use crate::lexer::Token;
use crate::parser::{ParseResult, ParseState};

/// Span covering `a` through `b`.
pub(crate) fn span_union(a: &Span, b: &Span) -> Span {
    Span {
        start: a.start,
        end: b.end,
        source: a.source.clone(),
    }
}

/// Consume an identifier token.
pub(crate) fn ident(state: &mut ParseState) -> ParseResult<(String, Span)> {
    match state.peek() {
        Some(Token::Ident(_)) => match state.advance() {
            Some(Token::Ident(inner)) => Ok((inner.value, inner.position)),
            _ => unreachable!("peeked an identifier"),
        },
        _ => Err(state.error_here("expected identifier").expected("identifier")),
    }
}

/// Interpret the escapes of a quoted string literal's body.
pub(crate) fn unescape_string(raw: &str) -> String {
    let body = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
