//! Declaration and statement productions.

use crate::ast::statement::{
    DatatypeDecl, Decl, ExceptionDecl, FunClause, FunDecl, Statement, TypeAliasDecl, ValBind,
    ValDecl,
};
use crate::lexer::Token;
use crate::parser::{ParseError, ParseResult, ParseState};

use super::expression::{expect_keyword, expression};
use super::{ident, pattern, span_union, ty};

pub fn statement(state: &mut ParseState) -> ParseResult<Statement<()>> {
    match state.peek() {
        Some(Token::Val(_))
        | Some(Token::Fun(_))
        | Some(Token::Datatype(_))
        | Some(Token::Exception(_))
        | Some(Token::Type(_)) => Ok(Statement::Decl(decl(state)?)),
        _ => Ok(Statement::Expression(expression(state)?)),
    }
}

pub fn decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    match state.peek() {
        Some(Token::Val(_)) => val_decl(state),
        Some(Token::Fun(_)) => fun_decl(state),
        Some(Token::Datatype(_)) => datatype_decl(state),
        Some(Token::Exception(_)) => exception_decl(state),
        Some(Token::Type(_)) => alias_decl(state),
        _ => Err(state.error_here("expected declaration").expected("declaration")),
    }
}

fn val_decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    let start = state.advance().expect("peeked 'val'").pos();
    let rec = if matches!(state.peek(), Some(Token::Rec(_))) {
        state.advance();
        true
    } else {
        false
    };
    let mut binds = Vec::new();
    loop {
        let pat = pattern::pattern(state)?;
        expect_keyword(state, |t| matches!(t, Token::Equals(_)), "'='")?;
        let exp = expression(state)?;
        let position = span_union(&pat.position(), &exp.position());
        binds.push(ValBind { pat, exp, position });
        if matches!(state.peek(), Some(Token::And(_))) {
            state.advance();
        } else {
            break;
        }
    }
    let position = span_union(
        &start,
        &binds.last().expect("at least one binding").position,
    );
    Ok(Decl::Val(ValDecl {
        rec,
        binds,
        position,
    }))
}

fn fun_decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    let start = state.advance().expect("peeked 'fun'").pos();
    let mut name: Option<String> = None;
    let mut clauses = Vec::new();
    loop {
        let (clause_name, name_pos) = ident(state)?;
        match &name {
            None => name = Some(clause_name),
            Some(existing) if *existing == clause_name => {}
            Some(existing) => {
                return Err(ParseError::new(format!(
                    "clauses of '{existing}' may not switch to '{clause_name}'"
                ))
                .at(name_pos));
            }
        }
        let mut params = Vec::new();
        while !matches!(state.peek(), Some(Token::Equals(_))) {
            params.push(pattern::atom_pat(state)?);
        }
        if params.is_empty() {
            return Err(state.error_here("a function needs at least one parameter"));
        }
        expect_keyword(state, |t| matches!(t, Token::Equals(_)), "'='")?;
        let body = expression(state)?;
        let position = span_union(&name_pos, &body.position());
        clauses.push(FunClause {
            params,
            body,
            position,
        });
        if matches!(state.peek(), Some(Token::Bar(_))) {
            state.advance();
        } else {
            break;
        }
    }
    let arity = clauses[0].params.len();
    if clauses.iter().any(|c| c.params.len() != arity) {
        return Err(state.error_here("clauses differ in number of parameters"));
    }
    let position = span_union(&start, &clauses.last().expect("a clause").position);
    Ok(Decl::Fun(FunDecl {
        name: name.expect("at least one clause"),
        clauses,
        position,
    }))
}

/// `datatype ('a, 'b) name = Con of ty | ...`
fn datatype_decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    let start = state.advance().expect("peeked 'datatype'").pos();
    let params = ty_params(state)?;
    let (name, _) = ident(state)?;
    expect_keyword(state, |t| matches!(t, Token::Equals(_)), "'='")?;
    let mut ctors = Vec::new();
    loop {
        let (ctor, _) = ident(state)?;
        let payload = if matches!(state.peek(), Some(Token::Of(_))) {
            state.advance();
            Some(ty::ty(state)?)
        } else {
            None
        };
        ctors.push((ctor, payload));
        if matches!(state.peek(), Some(Token::Bar(_))) {
            state.advance();
        } else {
            break;
        }
    }
    let position = span_union(&start, &state.last_span());
    Ok(Decl::Datatype(DatatypeDecl {
        params,
        name,
        ctors,
        position,
    }))
}

fn exception_decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    let start = state.advance().expect("peeked 'exception'").pos();
    let (name, _) = ident(state)?;
    let param = if matches!(state.peek(), Some(Token::Of(_))) {
        state.advance();
        Some(ty::ty(state)?)
    } else {
        None
    };
    let position = span_union(&start, &state.last_span());
    Ok(Decl::Exception(ExceptionDecl {
        name,
        param,
        position,
    }))
}

fn alias_decl(state: &mut ParseState) -> ParseResult<Decl<()>> {
    let start = state.advance().expect("peeked 'type'").pos();
    let params = ty_params(state)?;
    let (name, _) = ident(state)?;
    expect_keyword(state, |t| matches!(t, Token::Equals(_)), "'='")?;
    let aliased = ty::ty(state)?;
    let position = span_union(&start, &aliased.position());
    Ok(Decl::TypeAlias(TypeAliasDecl {
        params,
        name,
        ty: aliased,
        position,
    }))
}

/// Optional type parameters: `'a` or `('a, 'b)`.
fn ty_params(state: &mut ParseState) -> ParseResult<Vec<String>> {
    match state.peek() {
        Some(Token::TyVar(_)) | Some(Token::EqTyVar(_)) => {
            let name = match state.advance() {
                Some(Token::TyVar(inner)) => inner.value,
                Some(Token::EqTyVar(inner)) => inner.value,
                _ => unreachable!("peeked a type variable"),
            };
            Ok(vec![name])
        }
        Some(Token::LParen(_))
            if matches!(
                state.peek_at(1),
                Some(Token::TyVar(_)) | Some(Token::EqTyVar(_))
            ) =>
        {
            state.advance();
            let mut params = Vec::new();
            loop {
                match state.advance() {
                    Some(Token::TyVar(inner)) => params.push(inner.value),
                    Some(Token::EqTyVar(inner)) => params.push(inner.value),
                    Some(tok) => {
                        return Err(ParseError::new("expected type variable")
                            .at(tok.pos())
                            .found(tok.describe()));
                    }
                    None => {
                        return Err(ParseError::new("expected type variable")
                            .found("end of input".to_string()));
                    }
                }
                match state.advance() {
                    Some(Token::Comma(_)) => {}
                    Some(Token::RParen(_)) => break,
                    Some(tok) => {
                        return Err(ParseError::new("expected ',' or ')'")
                            .at(tok.pos())
                            .found(tok.describe()));
                    }
                    None => {
                        return Err(ParseError::new("expected ',' or ')'")
                            .found("end of input".to_string()));
                    }
                }
            }
            Ok(params)
        }
        _ => Ok(Vec::new()),
    }
}
