//! Expression productions.
//!
//! `if`, `let`, `fn`, `case`, `raise` and `from` start only at open
//! positions; inside an operand they need parentheses, matching the
//! unparser's placement. Infix operators parse by precedence climbing;
//! `~` directly before a numeric literal folds into a negative
//! literal, so `~2` is a literal as the parser contract requires.

use crate::ast::expression::{
    Apply, CaseExpr, Expr, FnExpr, FromExpr, FromStep, HandleExpr, Ident, IfExpr, InfixExpr,
    LetExpr, ListExpr, Literal, LiteralExpr, MatchArm, Negate, RaiseExpr, RecordExpr, Selector,
    TupleExpr,
};
use crate::ast::expression::AnnotatedExpr;
use crate::ast::BinOp;
use crate::lexer::Token;
use crate::parser::{ParseResult, ParseState};

use super::{ident, pattern, span_union, statement, ty, unescape_string};

pub fn expression(state: &mut ParseState) -> ParseResult<Expr<()>> {
    match state.peek() {
        Some(Token::Raise(_)) => {
            let start = state.advance().expect("peeked raise").pos();
            let exp = expression(state)?;
            let position = span_union(&start, &exp.position());
            Ok(Expr::Raise(RaiseExpr {
                exp: Box::new(exp),
                position,
                info: (),
            }))
        }
        Some(Token::If(_)) => if_exp(state),
        Some(Token::FnKw(_)) => fn_exp(state),
        Some(Token::Case(_)) => case_exp(state),
        Some(Token::From(_)) => from_exp(state),
        _ => {
            let exp = infix_exp(state, 1)?;
            suffixed(state, exp)
        }
    }
}

/// `handle` and `: ty` suffixes of an infix chain.
fn suffixed(state: &mut ParseState, exp: Expr<()>) -> ParseResult<Expr<()>> {
    match state.peek() {
        Some(Token::Handle(_)) => {
            state.advance();
            let arms = match_arms(state)?;
            let position = exp.position();
            Ok(Expr::Handle(HandleExpr {
                exp: Box::new(exp),
                arms,
                position,
                info: (),
            }))
        }
        Some(Token::Colon(_)) => {
            state.advance();
            let annotation = ty::ty(state)?;
            let position = span_union(&exp.position(), &annotation.position());
            Ok(Expr::Annotated(AnnotatedExpr {
                exp: Box::new(exp),
                ty: annotation,
                position,
                info: (),
            }))
        }
        _ => Ok(exp),
    }
}

fn binop_of(token: &Token) -> Option<BinOp> {
    Some(match token {
        Token::Orelse(_) => BinOp::Orelse,
        Token::Andalso(_) => BinOp::Andalso,
        Token::Equals(_) => BinOp::Eq,
        Token::NotEquals(_) => BinOp::Ne,
        Token::Lt(_) => BinOp::Lt,
        Token::Gt(_) => BinOp::Gt,
        Token::LtEq(_) => BinOp::Le,
        Token::GtEq(_) => BinOp::Ge,
        Token::Cons(_) => BinOp::Cons,
        Token::At(_) => BinOp::Append,
        Token::Plus(_) => BinOp::Plus,
        Token::Minus(_) => BinOp::Minus,
        Token::Caret(_) => BinOp::Caret,
        Token::Star(_) => BinOp::Times,
        Token::Slash(_) => BinOp::Divide,
        Token::Div(_) => BinOp::Div,
        Token::Mod(_) => BinOp::Mod,
        Token::Compose(_) => BinOp::Compose,
        _ => return None,
    })
}

/// Precedence climbing over the operator table.
fn infix_exp(state: &mut ParseState, min_prec: u8) -> ParseResult<Expr<()>> {
    let mut lhs = app_exp(state)?;
    loop {
        let Some(op) = state.peek().and_then(binop_of) else {
            break;
        };
        let prec = op.precedence();
        if prec < min_prec {
            break;
        }
        state.advance();
        let next_min = if op.right_associative() { prec } else { prec + 1 };
        let rhs = infix_exp(state, next_min)?;
        let position = span_union(&lhs.position(), &rhs.position());
        lhs = Expr::Infix(InfixExpr {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
            position,
            info: (),
        });
    }
    Ok(lhs)
}

fn starts_atom(token: &Token) -> bool {
    matches!(
        token,
        Token::Integer(_)
            | Token::Real(_)
            | Token::StringLiteral(_)
            | Token::CharLiteral(_)
            | Token::Ident(_)
            | Token::Hash(_)
            | Token::LParen(_)
            | Token::LBrace(_)
            | Token::LBracket(_)
            | Token::Tilde(_)
            | Token::Let(_)
    )
}

/// Left-associative application: `f x y` is `(f x) y`.
fn app_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let mut lhs = atom(state)?;
    while state.peek().map(starts_atom).unwrap_or(false) {
        let arg = atom(state)?;
        let position = span_union(&lhs.position(), &arg.position());
        lhs = Expr::Apply(Apply {
            func: Box::new(lhs),
            arg: Box::new(arg),
            position,
            info: (),
        });
    }
    Ok(lhs)
}

/// Literal entry point; also folds `~` into numeric literals.
pub fn literal(state: &mut ParseState) -> ParseResult<LiteralExpr<()>> {
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
                .map_err(|_| crate::parser::ParseError::new("integer literal out of range").at(inner.position.clone()))?;
            Ok(LiteralExpr {
                value: Literal::Int(if negative { -magnitude } else { magnitude }),
                position: inner.position,
                info: (),
            })
        }
        Some(Token::Real(inner)) => {
            let magnitude: f64 = inner
                .value
                .parse()
                .map_err(|_| crate::parser::ParseError::new("real literal out of range").at(inner.position.clone()))?;
            Ok(LiteralExpr {
                value: Literal::Real(if negative { -magnitude } else { magnitude }),
                position: inner.position,
                info: (),
            })
        }
        Some(tok) if negative => Err(crate::parser::ParseError::new(
            "expected numeric literal after '~'",
        )
        .at(tok.pos())
        .found(tok.describe())),
        Some(Token::StringLiteral(inner)) => Ok(LiteralExpr {
            value: Literal::String(unescape_string(&inner.value)),
            position: inner.position,
            info: (),
        }),
        Some(Token::CharLiteral(inner)) => {
            let body = unescape_string(&inner.value[1..]);
            let c = body.chars().next().unwrap_or(' ');
            Ok(LiteralExpr {
                value: Literal::Char(c),
                position: inner.position,
                info: (),
            })
        }
        Some(Token::Ident(inner)) if inner.value == "true" || inner.value == "false" => {
            Ok(LiteralExpr {
                value: Literal::Bool(inner.value == "true"),
                position: inner.position,
                info: (),
            })
        }
        Some(Token::LParen(inner)) => match state.advance() {
            Some(Token::RParen(close)) => Ok(LiteralExpr {
                value: Literal::Unit,
                position: span_union(&inner.position, &close.position),
                info: (),
            }),
            _ => Err(crate::parser::ParseError::new("expected ')' for unit literal")
                .at(inner.position)),
        },
        Some(tok) => Err(crate::parser::ParseError::new("expected literal")
            .at(tok.pos())
            .found(tok.describe())),
        None => Err(crate::parser::ParseError::new("expected literal")
            .found("end of input".to_string())),
    }
}

fn atom(state: &mut ParseState) -> ParseResult<Expr<()>> {
    match state.peek() {
        Some(Token::Integer(_)) | Some(Token::Real(_)) | Some(Token::StringLiteral(_))
        | Some(Token::CharLiteral(_)) => Ok(Expr::Literal(literal(state)?)),
        // `let ... end` brackets itself, so it is atomic.
        Some(Token::Let(_)) => let_exp(state),
        Some(Token::Tilde(_)) => {
            // Directly before a numeric literal this is a sign; in
            // front of anything else it is negation.
            if matches!(
                state.peek_at(1),
                Some(Token::Integer(_)) | Some(Token::Real(_))
            ) {
                return Ok(Expr::Literal(literal(state)?));
            }
            let start = state.advance().expect("peeked '~'").pos();
            let operand = atom(state)?;
            let position = span_union(&start, &operand.position());
            Ok(Expr::Negate(Negate {
                operand: Box::new(operand),
                position,
                info: (),
            }))
        }
        Some(Token::Ident(_)) => {
            let (name, position) = ident(state)?;
            if name == "true" || name == "false" {
                return Ok(Expr::Literal(LiteralExpr {
                    value: Literal::Bool(name == "true"),
                    position,
                    info: (),
                }));
            }
            Ok(Expr::Ident(Ident {
                value: name,
                position,
                info: (),
            }))
        }
        Some(Token::Hash(_)) => {
            let start = state.advance().expect("peeked '#'").pos();
            let (label, end) = ident(state)?;
            Ok(Expr::Selector(Selector {
                label,
                position: span_union(&start, &end),
                info: (),
            }))
        }
        Some(Token::LParen(_)) => {
            let start = state.advance().expect("peeked '('").pos();
            if let Some(Token::RParen(_)) = state.peek() {
                let end = state.advance().expect("peeked ')'").pos();
                return Ok(Expr::Literal(LiteralExpr {
                    value: Literal::Unit,
                    position: span_union(&start, &end),
                    info: (),
                }));
            }
            let first = expression(state)?;
            let mut items = vec![first];
            while matches!(state.peek(), Some(Token::Comma(_))) {
                state.advance();
                items.push(expression(state)?);
            }
            let end = expect_rparen(state)?;
            if items.len() == 1 {
                Ok(items.into_iter().next().expect("one item"))
            } else {
                Ok(Expr::Tuple(TupleExpr {
                    items,
                    position: span_union(&start, &end),
                    info: (),
                }))
            }
        }
        Some(Token::LBrace(_)) => {
            let start = state.advance().expect("peeked '{'").pos();
            let mut fields = Vec::new();
            if !matches!(state.peek(), Some(Token::RBrace(_))) {
                loop {
                    let (label, _) = ident(state)?;
                    expect_equals(state)?;
                    let field = expression(state)?;
                    fields.push((label, field));
                    if matches!(state.peek(), Some(Token::Comma(_))) {
                        state.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = expect_rbrace(state)?;
            Ok(Expr::Record(RecordExpr {
                fields,
                position: span_union(&start, &end),
                info: (),
            }))
        }
        Some(Token::LBracket(_)) => {
            let start = state.advance().expect("peeked '['").pos();
            let mut items = Vec::new();
            if !matches!(state.peek(), Some(Token::RBracket(_))) {
                loop {
                    items.push(expression(state)?);
                    if matches!(state.peek(), Some(Token::Comma(_))) {
                        state.advance();
                    } else {
                        break;
                    }
                }
            }
            let end = match state.advance() {
                Some(Token::RBracket(inner)) => inner.position,
                Some(tok) => {
                    return Err(crate::parser::ParseError::new("expected ']'")
                        .at(tok.pos())
                        .found(tok.describe()))
                }
                None => {
                    return Err(crate::parser::ParseError::new("expected ']'")
                        .found("end of input".to_string()))
                }
            };
            Ok(Expr::List(ListExpr {
                items,
                position: span_union(&start, &end),
                info: (),
            }))
        }
        _ => Err(state.error_here("expected expression").expected("expression")),
    }
}

fn expect_rparen(state: &mut ParseState) -> ParseResult<lachs::Span> {
    match state.advance() {
        Some(Token::RParen(inner)) => Ok(inner.position),
        Some(tok) => Err(crate::parser::ParseError::new("expected ')'")
            .at(tok.pos())
            .found(tok.describe())),
        None => Err(crate::parser::ParseError::new("expected ')'")
            .found("end of input".to_string())),
    }
}

fn expect_rbrace(state: &mut ParseState) -> ParseResult<lachs::Span> {
    match state.advance() {
        Some(Token::RBrace(inner)) => Ok(inner.position),
        Some(tok) => Err(crate::parser::ParseError::new("expected '}'")
            .at(tok.pos())
            .found(tok.describe())),
        None => Err(crate::parser::ParseError::new("expected '}'")
            .found("end of input".to_string())),
    }
}

fn expect_equals(state: &mut ParseState) -> ParseResult<()> {
    match state.advance() {
        Some(Token::Equals(_)) => Ok(()),
        Some(tok) => Err(crate::parser::ParseError::new("expected '='")
            .at(tok.pos())
            .found(tok.describe())),
        None => Err(crate::parser::ParseError::new("expected '='")
            .found("end of input".to_string())),
    }
}

fn if_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let start = state.advance().expect("peeked 'if'").pos();
    let condition = expression(state)?;
    expect_keyword(state, |t| matches!(t, Token::Then(_)), "'then'")?;
    let then_branch = expression(state)?;
    expect_keyword(state, |t| matches!(t, Token::Else(_)), "'else'")?;
    let else_branch = expression(state)?;
    let position = span_union(&start, &else_branch.position());
    Ok(Expr::If(IfExpr {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch),
        position,
        info: (),
    }))
}

fn let_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let start = state.advance().expect("peeked 'let'").pos();
    let mut decls = Vec::new();
    loop {
        match state.peek() {
            Some(Token::Val(_)) | Some(Token::Fun(_)) | Some(Token::Exception(_)) => {
                decls.push(statement::decl(state)?);
            }
            Some(Token::Datatype(_)) | Some(Token::Type(_)) => {
                return Err(state
                    .error_here("type declarations are only allowed at the top level"));
            }
            _ => break,
        }
    }
    if decls.is_empty() {
        return Err(state.error_here("expected declaration after 'let'"));
    }
    expect_keyword(state, |t| matches!(t, Token::In(_)), "'in'")?;
    let body = expression(state)?;
    let end = expect_keyword(state, |t| matches!(t, Token::End(_)), "'end'")?;
    Ok(Expr::Let(LetExpr {
        decls,
        body: Box::new(body),
        position: span_union(&start, &end),
        info: (),
    }))
}

fn fn_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let start = state.advance().expect("peeked 'fn'").pos();
    let arms = match_arms(state)?;
    let position = match arms.last() {
        Some(arm) => span_union(&start, &arm.exp.position()),
        None => start,
    };
    Ok(Expr::Fn(FnExpr {
        arms,
        position,
        info: (),
    }))
}

fn case_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let start = state.advance().expect("peeked 'case'").pos();
    let scrutinee = expression(state)?;
    expect_keyword(state, |t| matches!(t, Token::Of(_)), "'of'")?;
    let arms = match_arms(state)?;
    let position = match arms.last() {
        Some(arm) => span_union(&start, &arm.exp.position()),
        None => start,
    };
    Ok(Expr::Case(CaseExpr {
        scrutinee: Box::new(scrutinee),
        arms,
        position,
        info: (),
    }))
}

pub fn match_arms(state: &mut ParseState) -> ParseResult<Vec<MatchArm<()>>> {
    let mut arms = Vec::new();
    loop {
        let pat = pattern::pattern(state)?;
        expect_keyword(state, |t| matches!(t, Token::DoubleArrow(_)), "'=>'")?;
        let exp = expression(state)?;
        let position = span_union(&pat.position(), &exp.position());
        arms.push(MatchArm { pat, exp, position });
        if matches!(state.peek(), Some(Token::Bar(_))) {
            state.advance();
        } else {
            break;
        }
    }
    Ok(arms)
}

fn from_exp(state: &mut ParseState) -> ParseResult<Expr<()>> {
    let start = state.advance().expect("peeked 'from'").pos();
    let mut sources = Vec::new();
    loop {
        let pat = pattern::pattern(state)?;
        expect_keyword(state, |t| matches!(t, Token::In(_)), "'in'")?;
        let exp = expression(state)?;
        sources.push((pat, exp));
        if matches!(state.peek(), Some(Token::Comma(_))) {
            state.advance();
        } else {
            break;
        }
    }
    let mut steps = Vec::new();
    let mut end = state.last_span();
    loop {
        match state.peek() {
            Some(Token::Where(_)) => {
                state.advance();
                let cond = expression(state)?;
                end = cond.position();
                steps.push(FromStep::Where(cond));
            }
            Some(Token::Group(_)) => {
                state.advance();
                let key = expression(state)?;
                end = key.position();
                let mut aggregates = Vec::new();
                if matches!(state.peek(), Some(Token::Compute(_))) {
                    state.advance();
                    loop {
                        let (agg, _) = ident(state)?;
                        expect_keyword(state, |t| matches!(t, Token::Of(_)), "'of'")?;
                        let arg = expression(state)?;
                        end = arg.position();
                        aggregates.push((agg, arg));
                        if matches!(state.peek(), Some(Token::Comma(_))) {
                            state.advance();
                        } else {
                            break;
                        }
                    }
                }
                steps.push(FromStep::Group { key, aggregates });
            }
            Some(Token::Yield(_)) => {
                state.advance();
                let exp = expression(state)?;
                end = exp.position();
                steps.push(FromStep::Yield(exp));
                break;
            }
            _ => break,
        }
    }
    Ok(Expr::From(FromExpr {
        sources,
        steps,
        position: span_union(&start, &end),
        info: (),
    }))
}

pub(crate) fn expect_keyword(
    state: &mut ParseState,
    pred: impl Fn(&Token) -> bool,
    desc: &str,
) -> ParseResult<lachs::Span> {
    match state.advance() {
        Some(tok) if pred(&tok) => Ok(tok.pos()),
        Some(tok) => Err(crate::parser::ParseError::new(format!("expected {desc}"))
            .at(tok.pos())
            .found(tok.describe())
            .expected(desc.to_string())),
        None => Err(crate::parser::ParseError::new(format!("expected {desc}"))
            .found("end of input".to_string())),
    }
}
