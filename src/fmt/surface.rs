//! Unparser for the surface AST.
//!
//! Prints the minimal-parenthesis form: parentheses appear only where
//! re-parsing would otherwise change the tree, so unparsing then
//! re-parsing is the identity modulo whitespace and redundant
//! left-associative parentheses.

use std::fmt::Write;

use crate::ast::expression::{Expr, FromStep, Literal, MatchArm};
use crate::ast::pattern::Pattern;
use crate::ast::statement::{Decl, Statement};
use crate::ast::Ty;

/// Precedence context: 0 accepts anything; higher contexts require
/// tighter expressions, with application at 9 and atoms at 10.
const OPEN: u8 = 0;
const APP: u8 = 9;
const ATOM: u8 = 10;

pub fn statement_to_string<T>(stmt: &Statement<T>) -> String {
    match stmt {
        Statement::Expression(e) => exp_to_string(e),
        Statement::Decl(d) => decl_to_string(d),
    }
}

pub fn exp_to_string<T>(exp: &Expr<T>) -> String {
    let mut buf = String::new();
    unparse(exp, OPEN, &mut buf);
    buf
}

pub fn decl_to_string<T>(decl: &Decl<T>) -> String {
    let mut buf = String::new();
    unparse_decl(decl, &mut buf);
    buf
}

pub fn pattern_to_string<T>(pat: &Pattern<T>) -> String {
    let mut buf = String::new();
    unparse_pat(pat, OPEN, &mut buf);
    buf
}

pub fn ty_to_string(ty: &Ty) -> String {
    let mut buf = String::new();
    unparse_ty(ty, 0, &mut buf);
    buf
}

fn literal_to_string(lit: &Literal) -> String {
    match lit {
        Literal::Unit => "()".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => {
            if *i < 0 {
                format!("~{}", i.unsigned_abs())
            } else {
                i.to_string()
            }
        }
        Literal::Real(x) => {
            let s = if *x == x.trunc() && x.is_finite() {
                format!("{x:.1}")
            } else {
                format!("{x}")
            };
            s.replace('-', "~")
        }
        Literal::String(s) => format!("{s:?}"),
        Literal::Char(c) => format!("#\"{c}\""),
    }
}

fn paren(needed: bool, inner: String, buf: &mut String) {
    if needed {
        buf.push('(');
        buf.push_str(&inner);
        buf.push(')');
    } else {
        buf.push_str(&inner);
    }
}

fn unparse<T>(exp: &Expr<T>, prec: u8, buf: &mut String) {
    match exp {
        Expr::Literal(lit) => buf.push_str(&literal_to_string(&lit.value)),
        Expr::Ident(id) => buf.push_str(&id.value),
        Expr::Selector(sel) => {
            let _ = write!(buf, "#{}", sel.label);
        }
        Expr::Tuple(t) => {
            buf.push('(');
            for (i, item) in t.items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                unparse(item, OPEN, buf);
            }
            buf.push(')');
        }
        Expr::Record(r) => {
            buf.push('{');
            for (i, (label, field)) in r.fields.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                let _ = write!(buf, "{label} = ");
                unparse(field, OPEN, buf);
            }
            buf.push('}');
        }
        Expr::List(l) => {
            buf.push('[');
            for (i, item) in l.items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                unparse(item, OPEN, buf);
            }
            buf.push(']');
        }
        Expr::Apply(app) => {
            let mut inner = String::new();
            unparse(&app.func, APP, &mut inner);
            inner.push(' ');
            unparse(&app.arg, ATOM, &mut inner);
            paren(prec > APP, inner, buf);
        }
        Expr::Infix(infix) => {
            let op_prec = infix.op.precedence();
            let (left_prec, right_prec) = if infix.op.right_associative() {
                (op_prec + 1, op_prec)
            } else {
                (op_prec, op_prec + 1)
            };
            let mut inner = String::new();
            unparse(&infix.left, left_prec, &mut inner);
            let _ = write!(inner, " {} ", infix.op.name());
            unparse(&infix.right, right_prec, &mut inner);
            paren(prec > op_prec, inner, buf);
        }
        Expr::Negate(neg) => {
            let mut inner = String::from("~");
            unparse(&neg.operand, ATOM, &mut inner);
            paren(prec > APP, inner, buf);
        }
        Expr::If(ife) => {
            let mut inner = String::from("if ");
            unparse(&ife.condition, OPEN, &mut inner);
            inner.push_str(" then ");
            unparse(&ife.then_branch, OPEN, &mut inner);
            inner.push_str(" else ");
            unparse(&ife.else_branch, OPEN, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Expr::Let(le) => {
            // `let ... end` brackets itself; no outer parens needed.
            buf.push_str("let ");
            for (i, d) in le.decls.iter().enumerate() {
                if i > 0 {
                    buf.push(' ');
                }
                unparse_decl(d, buf);
            }
            buf.push_str(" in ");
            unparse(&le.body, OPEN, buf);
            buf.push_str(" end");
        }
        Expr::Fn(f) => {
            let mut inner = String::from("fn ");
            unparse_arms(&f.arms, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Expr::Case(c) => {
            let mut inner = String::from("case ");
            unparse(&c.scrutinee, OPEN, &mut inner);
            inner.push_str(" of ");
            unparse_arms(&c.arms, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Expr::Raise(r) => {
            let mut inner = String::from("raise ");
            unparse(&r.exp, APP, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Expr::Handle(h) => {
            let mut inner = String::new();
            unparse(&h.exp, APP, &mut inner);
            inner.push_str(" handle ");
            unparse_arms(&h.arms, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Expr::From(f) => {
            let mut inner = String::from("from ");
            for (i, (pat, exp)) in f.sources.iter().enumerate() {
                if i > 0 {
                    inner.push_str(", ");
                }
                unparse_pat(pat, OPEN, &mut inner);
                inner.push_str(" in ");
                unparse(exp, OPEN, &mut inner);
            }
            for step in &f.steps {
                match step {
                    FromStep::Where(e) => {
                        inner.push_str(" where ");
                        unparse(e, OPEN, &mut inner);
                    }
                    FromStep::Yield(e) => {
                        inner.push_str(" yield ");
                        unparse(e, OPEN, &mut inner);
                    }
                    FromStep::Group { key, aggregates } => {
                        inner.push_str(" group ");
                        unparse(key, OPEN, &mut inner);
                        for (i, (name, arg)) in aggregates.iter().enumerate() {
                            inner.push_str(if i == 0 { " compute " } else { ", " });
                            let _ = write!(inner, "{name} of ");
                            unparse(arg, OPEN, &mut inner);
                        }
                    }
                }
            }
            paren(prec > OPEN, inner, buf);
        }
        Expr::Annotated(a) => {
            let mut inner = String::new();
            unparse(&a.exp, APP, &mut inner);
            inner.push_str(" : ");
            unparse_ty(&a.ty, 0, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
    }
}

fn unparse_arms<T>(arms: &[MatchArm<T>], buf: &mut String) {
    for (i, arm) in arms.iter().enumerate() {
        if i > 0 {
            buf.push_str(" | ");
        }
        unparse_pat(&arm.pat, OPEN, buf);
        buf.push_str(" => ");
        unparse(&arm.exp, OPEN, buf);
    }
}

fn unparse_decl<T>(decl: &Decl<T>, buf: &mut String) {
    match decl {
        Decl::Val(val) => {
            buf.push_str("val ");
            if val.rec {
                buf.push_str("rec ");
            }
            for (i, bind) in val.binds.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" and ");
                }
                unparse_pat(&bind.pat, OPEN, buf);
                buf.push_str(" = ");
                unparse(&bind.exp, OPEN, buf);
            }
        }
        Decl::Fun(fun) => {
            buf.push_str("fun ");
            for (i, clause) in fun.clauses.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" | ");
                }
                buf.push_str(&fun.name);
                for pat in &clause.params {
                    buf.push(' ');
                    unparse_pat(pat, ATOM, buf);
                }
                buf.push_str(" = ");
                unparse(&clause.body, OPEN, buf);
            }
        }
        Decl::Datatype(d) => {
            buf.push_str("datatype ");
            unparse_ty_params(&d.params, buf);
            buf.push_str(&d.name);
            buf.push_str(" = ");
            for (i, (ctor, payload)) in d.ctors.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" | ");
                }
                buf.push_str(ctor);
                if let Some(ty) = payload {
                    buf.push_str(" of ");
                    unparse_ty(ty, 1, buf);
                }
            }
        }
        Decl::Exception(d) => {
            buf.push_str("exception ");
            buf.push_str(&d.name);
            if let Some(ty) = &d.param {
                buf.push_str(" of ");
                unparse_ty(ty, 1, buf);
            }
        }
        Decl::TypeAlias(d) => {
            buf.push_str("type ");
            unparse_ty_params(&d.params, buf);
            buf.push_str(&d.name);
            buf.push_str(" = ");
            unparse_ty(&d.ty, 0, buf);
        }
    }
}

fn unparse_ty_params(params: &[String], buf: &mut String) {
    match params.len() {
        0 => {}
        1 => {
            buf.push_str(&params[0]);
            buf.push(' ');
        }
        _ => {
            buf.push('(');
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                buf.push_str(p);
            }
            buf.push_str(") ");
        }
    }
}

fn unparse_pat<T>(pat: &Pattern<T>, prec: u8, buf: &mut String) {
    match pat {
        Pattern::Wildcard(_) => buf.push('_'),
        Pattern::Ident(id) => buf.push_str(&id.name),
        Pattern::Literal(lit) => buf.push_str(&literal_to_string(&lit.value)),
        Pattern::Ctor(c) => match &c.arg {
            None => buf.push_str(&c.name),
            Some(arg) => {
                let mut inner = String::new();
                inner.push_str(&c.name);
                inner.push(' ');
                unparse_pat(arg, ATOM, &mut inner);
                paren(prec > APP, inner, buf);
            }
        },
        Pattern::Tuple(t) => {
            buf.push('(');
            for (i, item) in t.items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                unparse_pat(item, OPEN, buf);
            }
            buf.push(')');
        }
        Pattern::Record(r) => {
            buf.push('{');
            let mut first = true;
            for (label, field) in &r.fields {
                if !first {
                    buf.push_str(", ");
                }
                first = false;
                buf.push_str(label);
                if let Some(p) = field {
                    buf.push_str(" = ");
                    unparse_pat(p, OPEN, buf);
                }
            }
            if r.ellipsis {
                if !first {
                    buf.push_str(", ");
                }
                buf.push_str("...");
            }
            buf.push('}');
        }
        Pattern::List(l) => {
            buf.push('[');
            for (i, item) in l.items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                unparse_pat(item, OPEN, buf);
            }
            buf.push(']');
        }
        Pattern::Cons(c) => {
            let mut inner = String::new();
            unparse_pat(&c.head, 6, &mut inner);
            inner.push_str(" :: ");
            unparse_pat(&c.tail, 5, &mut inner);
            paren(prec > 5, inner, buf);
        }
        Pattern::Layered(l) => {
            let mut inner = String::new();
            inner.push_str(&l.name);
            inner.push_str(" as ");
            unparse_pat(&l.pat, OPEN, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
        Pattern::Annotated(a) => {
            let mut inner = String::new();
            unparse_pat(&a.pat, APP, &mut inner);
            inner.push_str(" : ");
            unparse_ty(&a.ty, 0, &mut inner);
            paren(prec > OPEN, inner, buf);
        }
    }
}

// ty precedence: 0 = open (fn arrows), 1 = tuple component, 2 = atom
fn unparse_ty(ty: &Ty, prec: u8, buf: &mut String) {
    match ty {
        Ty::Var(name, _) => buf.push_str(name),
        Ty::Named {
            args,
            name,
            position: _,
        } => {
            match args.len() {
                0 => {}
                1 => {
                    unparse_ty(&args[0], 2, buf);
                    buf.push(' ');
                }
                _ => {
                    buf.push('(');
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            buf.push_str(", ");
                        }
                        unparse_ty(a, 0, buf);
                    }
                    buf.push_str(") ");
                }
            }
            buf.push_str(name);
        }
        Ty::Tuple(items, _) => {
            let mut inner = String::new();
            for (i, t) in items.iter().enumerate() {
                if i > 0 {
                    inner.push_str(" * ");
                }
                unparse_ty(t, 2, &mut inner);
            }
            paren(prec > 1, inner, buf);
        }
        Ty::Record(fields, _) => {
            buf.push('{');
            for (i, (label, t)) in fields.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                let _ = write!(buf, "{label}: ");
                unparse_ty(t, 0, buf);
            }
            buf.push('}');
        }
        Ty::Fn(a, b, _) => {
            let mut inner = String::new();
            unparse_ty(a, 1, &mut inner);
            inner.push_str(" -> ");
            unparse_ty(b, 0, &mut inner);
            paren(prec > 0, inner, buf);
        }
    }
}
