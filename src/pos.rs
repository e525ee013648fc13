//! Source position helpers.
//!
//! Spans come from the lexer; REPL input is attributed to the pseudo
//! file `stdIn`. All phase errors render positions through
//! [`position_label`] so messages share the `file:line:col` shape.

use lachs::Span;

pub const STDIN_FILE: &str = "stdIn";

/// `stdIn:<line>:<col>` for the start of the span.
pub fn position_label(span: &Span) -> String {
    format!("{}:{}:{}", STDIN_FILE, span.start.0, span.start.1)
}

/// A span pointing nowhere, for synthesised nodes.
pub fn zero() -> Span {
    Span::default()
}
