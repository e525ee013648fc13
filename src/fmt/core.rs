//! Printer for Core, used in optimiser tests to compare shapes
//! before and after rewriting.

use std::fmt::Write;

use crate::core::{Decl, Exp, FromStep, Pat, Rel};

pub fn decl_to_string(decl: &Decl) -> String {
    let mut buf = String::new();
    write_decl(decl, &mut buf);
    buf
}

pub fn exp_to_string(exp: &Exp) -> String {
    let mut buf = String::new();
    write_exp(exp, &mut buf);
    buf
}

fn write_decl(decl: &Decl, buf: &mut String) {
    match decl {
        Decl::NonRecVal { pat, exp } => {
            buf.push_str("val ");
            write_pat(pat, buf);
            buf.push_str(" = ");
            write_exp(exp, buf);
        }
        Decl::RecVal { binds } => {
            buf.push_str("val rec ");
            for (i, (id, exp)) in binds.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" and ");
                }
                let _ = write!(buf, "{}#{} = ", id.name, id.ord);
                write_exp(exp, buf);
            }
        }
    }
}

fn write_exp(exp: &Exp, buf: &mut String) {
    match exp {
        Exp::Literal { value, .. } => {
            let _ = write!(buf, "{value:?}");
        }
        Exp::Id(id) => {
            let _ = write!(buf, "{}#{}", id.name, id.ord);
        }
        Exp::Builtin { builtin, .. } => buf.push_str(builtin.name()),
        Exp::Global { name, .. } => buf.push_str(name),
        Exp::Tuple { items, .. } => {
            buf.push('(');
            for (i, e) in items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_exp(e, buf);
            }
            buf.push(')');
        }
        Exp::Record { fields, .. } => {
            buf.push('{');
            for (i, (l, e)) in fields.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                let _ = write!(buf, "{l} = ");
                write_exp(e, buf);
            }
            buf.push('}');
        }
        Exp::List { items, .. } => {
            buf.push('[');
            for (i, e) in items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_exp(e, buf);
            }
            buf.push(']');
        }
        Exp::Ctor { name, arg, .. } => {
            buf.push_str(name);
            if let Some(arg) = arg {
                buf.push(' ');
                buf.push('(');
                write_exp(arg, buf);
                buf.push(')');
            }
        }
        Exp::Apply { func, arg, .. } => {
            buf.push_str("apply(");
            write_exp(func, buf);
            buf.push_str(", ");
            write_exp(arg, buf);
            buf.push(')');
        }
        Exp::Fn { param, body, .. } => {
            buf.push_str("fn ");
            write_pat(param, buf);
            buf.push_str(" => ");
            write_exp(body, buf);
        }
        Exp::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            buf.push_str("if ");
            write_exp(cond, buf);
            buf.push_str(" then ");
            write_exp(then_branch, buf);
            buf.push_str(" else ");
            write_exp(else_branch, buf);
        }
        Exp::Let { decl, body, .. } => {
            buf.push_str("let ");
            write_decl(decl, buf);
            buf.push_str(" in ");
            write_exp(body, buf);
            buf.push_str(" end");
        }
        Exp::Match {
            scrutinee, arms, ..
        } => {
            buf.push_str("case ");
            write_exp(scrutinee, buf);
            buf.push_str(" of ");
            for (i, (pat, body)) in arms.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" | ");
                }
                write_pat(pat, buf);
                buf.push_str(" => ");
                write_exp(body, buf);
            }
        }
        Exp::Raise { exp, .. } => {
            buf.push_str("raise ");
            write_exp(exp, buf);
        }
        Exp::Handle { body, arms, .. } => {
            write_exp(body, buf);
            buf.push_str(" handle ");
            for (i, (pat, arm)) in arms.iter().enumerate() {
                if i > 0 {
                    buf.push_str(" | ");
                }
                write_pat(pat, buf);
                buf.push_str(" => ");
                write_exp(arm, buf);
            }
        }
        Exp::From { steps, .. } => {
            buf.push_str("from");
            for step in steps {
                match step {
                    FromStep::Scan { pat, exp } => {
                        buf.push(' ');
                        write_pat(pat, buf);
                        buf.push_str(" in ");
                        write_exp(exp, buf);
                    }
                    FromStep::Where(e) => {
                        buf.push_str(" where ");
                        write_exp(e, buf);
                    }
                    FromStep::Yield(e) => {
                        buf.push_str(" yield ");
                        write_exp(e, buf);
                    }
                    FromStep::Group { keys, aggs } => {
                        buf.push_str(" group");
                        for (id, e) in keys {
                            let _ = write!(buf, " {} = ", id.name);
                            write_exp(e, buf);
                        }
                        for (id, agg, e) in aggs {
                            let _ = write!(buf, " {} = {} of ", id.name, agg.name());
                            write_exp(e, buf);
                        }
                    }
                }
            }
        }
        Exp::Rel { rel, .. } => write_rel(rel, buf),
    }
}

fn write_rel(rel: &Rel, buf: &mut String) {
    match rel {
        Rel::Scan { input, .. } => {
            buf.push_str("scan(");
            write_exp(input, buf);
            buf.push(')');
        }
        Rel::Filter { input, pred } => {
            buf.push_str("filter(");
            write_rel(input, buf);
            buf.push_str(", ");
            write_exp(pred, buf);
            buf.push(')');
        }
        Rel::Project { input, proj, .. } => {
            buf.push_str("project(");
            write_rel(input, buf);
            buf.push_str(", ");
            write_exp(proj, buf);
            buf.push(')');
        }
        Rel::Join {
            left, right, cond, ..
        } => {
            buf.push_str("join(");
            write_rel(left, buf);
            buf.push_str(", ");
            write_rel(right, buf);
            if let Some(c) = cond {
                buf.push_str(", ");
                write_exp(c, buf);
            }
            buf.push(')');
        }
        Rel::Union { left, right } => {
            buf.push_str("union(");
            write_rel(left, buf);
            buf.push_str(", ");
            write_rel(right, buf);
            buf.push(')');
        }
        Rel::GroupBy {
            input, key, aggs, ..
        } => {
            buf.push_str("groupBy(");
            write_rel(input, buf);
            buf.push_str(", ");
            write_exp(key, buf);
            for (l, agg, e) in aggs {
                let _ = write!(buf, ", {l} = {} of ", agg.name());
                write_exp(e, buf);
            }
            buf.push(')');
        }
        Rel::Aggregate { input, aggs, .. } => {
            buf.push_str("aggregate(");
            write_rel(input, buf);
            for (l, agg, e) in aggs {
                let _ = write!(buf, ", {l} = {} of ", agg.name());
                write_exp(e, buf);
            }
            buf.push(')');
        }
    }
}

fn write_pat(pat: &Pat, buf: &mut String) {
    match pat {
        Pat::Wildcard(_) => buf.push('_'),
        Pat::Id(id) => {
            let _ = write!(buf, "{}#{}", id.name, id.ord);
        }
        Pat::Literal { value, .. } => {
            let _ = write!(buf, "{value:?}");
        }
        Pat::Ctor { name, arg, .. } => {
            buf.push_str(name);
            if let Some(arg) = arg {
                buf.push_str(" (");
                write_pat(arg, buf);
                buf.push(')');
            }
        }
        Pat::Tuple { items, .. } => {
            buf.push('(');
            for (i, p) in items.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_pat(p, buf);
            }
            buf.push(')');
        }
        Pat::Record { fields, .. } => {
            buf.push('{');
            for (i, (l, p)) in fields.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                let _ = write!(buf, "{l} = ");
                write_pat(p, buf);
            }
            buf.push('}');
        }
        Pat::Cons { head, tail, .. } => {
            write_pat(head, buf);
            buf.push_str(" :: ");
            write_pat(tail, buf);
        }
        Pat::Nil(_) => buf.push_str("nil"),
        Pat::Layered { id, pat, .. } => {
            let _ = write!(buf, "{}#{} as ", id.name, id.ord);
            write_pat(pat, buf);
        }
    }
}
