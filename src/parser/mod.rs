//! Parser: token-stream state, errors, and the public entry points.
//!
//! The grammar is recursive descent over a backtracking `ParseState`;
//! each parsing function takes `&mut ParseState` and returns a
//! `ParseResult`. Entry points mirror the external contract:
//! [`literal_eof`], [`decl_eof`], [`statement_eof`], [`expression_eof`],
//! plus [`program`] for a `;`-separated statement sequence.

pub mod grammar;

use lachs::Span;

use crate::ast::expression::LiteralExpr;
use crate::ast::statement::{Decl, Statement};
use crate::ast::Expr;
use crate::lexer::{tokenize, Token};
use crate::pos::position_label;

/// Structured parse error with source context.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Box<Span>>,
    pub expected: Vec<String>,
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            span: None,
            expected: vec![],
            found: None,
        }
    }

    pub fn expected(mut self, what: impl Into<String>) -> Self {
        self.expected.push(what.into());
        self
    }

    pub fn found(mut self, what: impl Into<String>) -> Self {
        self.found = Some(what.into());
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(Box::new(span));
        self
    }

    /// Merge expected tokens from another error, for alternatives.
    pub fn merge_expected(mut self, other: &ParseError) -> Self {
        for exp in &other.expected {
            if !self.expected.contains(exp) {
                self.expected.push(exp.clone());
            }
        }
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = if !self.expected.is_empty() {
            let expected_str = if self.expected.len() == 1 {
                self.expected[0].clone()
            } else {
                let (last, rest) = self.expected.split_last().expect("non-empty");
                format!("{} or {}", rest.join(", "), last)
            };
            match &self.found {
                Some(found) => format!("expected {expected_str}, found {found}"),
                None => format!("expected {expected_str}"),
            }
        } else {
            self.message.clone()
        };
        match &self.span {
            Some(span) => write!(f, "parse error: {} at {}", msg, position_label(span)),
            None => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Token stream position, backtracking, and furthest-error tracking.
pub struct ParseState {
    tokens: Vec<Token>,
    index: usize,
    furthest_error: Option<(usize, ParseError)>,
}

impl ParseState {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            furthest_error: None,
        }
    }

    pub fn advance(&mut self) -> Option<Token> {
        if self.has_next() {
            let token = self.tokens[self.index].clone();
            self.index += 1;
            Some(token)
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    pub fn has_next(&self) -> bool {
        self.index < self.tokens.len()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn restore(&mut self, position: usize) {
        self.index = position;
    }

    /// Record an error, keeping the one at the furthest position; ties
    /// merge their expected sets.
    pub fn record_error(&mut self, error: ParseError) {
        match &self.furthest_error {
            Some((pos, _)) if *pos > self.index => {}
            Some((pos, existing)) if *pos == self.index => {
                let merged = existing.clone().merge_expected(&error);
                self.furthest_error = Some((self.index, merged));
            }
            _ => {
                self.furthest_error = Some((self.index, error));
            }
        }
    }

    pub fn take_furthest_error(&mut self) -> Option<ParseError> {
        self.furthest_error.take().map(|(_, e)| e)
    }

    /// An error at the current token, with its description attached.
    pub fn error_here(&self, message: impl Into<String>) -> ParseError {
        let msg = message.into();
        match self.peek() {
            Some(tok) => ParseError::new(&msg).at(tok.pos()).found(tok.describe()),
            None => ParseError::new(msg).found("end of input".to_string()),
        }
    }

    /// The span of the most recently consumed token.
    pub fn last_span(&self) -> Span {
        if self.index == 0 {
            Span::default()
        } else {
            self.tokens[self.index - 1].pos()
        }
    }
}

/// Generic parser interface; plain functions qualify.
pub trait Parser<T>: Sized {
    fn parse(&self, state: &mut ParseState) -> ParseResult<T>;
}

impl<T, F: Fn(&mut ParseState) -> ParseResult<T>> Parser<T> for F {
    fn parse(&self, state: &mut ParseState) -> ParseResult<T> {
        self(state)
    }
}

fn state_of(input: &str) -> ParseResult<ParseState> {
    let tokens = tokenize(input).map_err(ParseError::new)?;
    Ok(ParseState::new(tokens))
}

fn expect_eof(state: &mut ParseState) -> ParseResult<()> {
    // A trailing `;` is tolerated at end of input.
    if matches!(state.peek(), Some(Token::Semi(_))) {
        state.advance();
    }
    if state.has_next() {
        Err(state.error_here("unexpected input after statement"))
    } else {
        Ok(())
    }
}

/// Parse a single literal to end of input.
pub fn literal_eof(input: &str) -> ParseResult<LiteralExpr<()>> {
    let mut state = state_of(input)?;
    let literal = grammar::expression::literal(&mut state)?;
    expect_eof(&mut state)?;
    Ok(literal)
}

/// Parse a single declaration to end of input.
pub fn decl_eof(input: &str) -> ParseResult<Decl<()>> {
    let mut state = state_of(input)?;
    let decl = grammar::statement::decl(&mut state)?;
    expect_eof(&mut state)?;
    Ok(decl)
}

/// Parse a statement (declaration or expression) to end of input.
pub fn statement_eof(input: &str) -> ParseResult<Statement<()>> {
    let mut state = state_of(input)?;
    let stmt = grammar::statement::statement(&mut state)?;
    expect_eof(&mut state)?;
    Ok(stmt)
}

/// Parse an expression to end of input.
pub fn expression_eof(input: &str) -> ParseResult<Expr<()>> {
    let mut state = state_of(input)?;
    let exp = grammar::expression::expression(&mut state)?;
    expect_eof(&mut state)?;
    Ok(exp)
}

/// Parse a `;`-terminated statement sequence; empty input is an empty
/// program.
pub fn program(input: &str) -> ParseResult<Vec<Statement<()>>> {
    let mut state = state_of(input)?;
    let mut statements = Vec::new();
    while state.has_next() {
        let stmt = grammar::statement::statement(&mut state)?;
        statements.push(stmt);
        match state.advance() {
            Some(Token::Semi(_)) => {}
            Some(tok) => {
                return Err(ParseError::new("expected ';' after statement")
                    .at(tok.pos())
                    .found(tok.describe()));
            }
            None => break,
        }
    }
    Ok(statements)
}
