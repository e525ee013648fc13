//! Traversal machinery for Core.
//!
//! Instead of double-dispatch visitors, rewriting passes implement
//! [`Rewriter`] and override `rewrite_exp`; `rewrite_children` supplies
//! the uniform recursion. Read-only passes use [`walk_exp`].

use super::{Decl, Exp, FromStep, Rel};

pub trait Rewriter {
    /// Per-node hook; the default just recurses.
    fn rewrite_exp(&mut self, exp: Exp) -> Exp {
        self.rewrite_children(exp)
    }

    fn rewrite_decl(&mut self, decl: Decl) -> Decl {
        match decl {
            Decl::NonRecVal { pat, exp } => Decl::NonRecVal {
                pat,
                exp: self.rewrite_exp(exp),
            },
            Decl::RecVal { binds } => Decl::RecVal {
                binds: binds
                    .into_iter()
                    .map(|(id, exp)| (id, self.rewrite_exp(exp)))
                    .collect(),
            },
        }
    }

    /// Uniform recursion over every child expression.
    fn rewrite_children(&mut self, exp: Exp) -> Exp {
        match exp {
            Exp::Literal { .. }
            | Exp::Id(_)
            | Exp::Builtin { .. }
            | Exp::Global { .. } => exp,
            Exp::Tuple { items, ty } => Exp::Tuple {
                items: items.into_iter().map(|e| self.rewrite_exp(e)).collect(),
                ty,
            },
            Exp::Record { fields, ty } => Exp::Record {
                fields: fields
                    .into_iter()
                    .map(|(l, e)| (l, self.rewrite_exp(e)))
                    .collect(),
                ty,
            },
            Exp::List { items, ty } => Exp::List {
                items: items.into_iter().map(|e| self.rewrite_exp(e)).collect(),
                ty,
            },
            Exp::Ctor {
                name,
                ordinal,
                datatype,
                arg,
                ty,
            } => Exp::Ctor {
                name,
                ordinal,
                datatype,
                arg: arg.map(|e| Box::new(self.rewrite_exp(*e))),
                ty,
            },
            Exp::Apply { func, arg, ty, pos } => Exp::Apply {
                func: Box::new(self.rewrite_exp(*func)),
                arg: Box::new(self.rewrite_exp(*arg)),
                ty,
                pos,
            },
            Exp::Fn { param, body, ty } => Exp::Fn {
                param,
                body: Box::new(self.rewrite_exp(*body)),
                ty,
            },
            Exp::If {
                cond,
                then_branch,
                else_branch,
                ty,
            } => Exp::If {
                cond: Box::new(self.rewrite_exp(*cond)),
                then_branch: Box::new(self.rewrite_exp(*then_branch)),
                else_branch: Box::new(self.rewrite_exp(*else_branch)),
                ty,
            },
            Exp::Let { decl, body, ty } => Exp::Let {
                decl: Box::new(self.rewrite_decl(*decl)),
                body: Box::new(self.rewrite_exp(*body)),
                ty,
            },
            Exp::Match {
                scrutinee,
                arms,
                ty,
                pos,
            } => Exp::Match {
                scrutinee: Box::new(self.rewrite_exp(*scrutinee)),
                arms: arms
                    .into_iter()
                    .map(|(p, e)| (p, self.rewrite_exp(e)))
                    .collect(),
                ty,
                pos,
            },
            Exp::Raise { exp, ty, pos } => Exp::Raise {
                exp: Box::new(self.rewrite_exp(*exp)),
                ty,
                pos,
            },
            Exp::Handle {
                body,
                arms,
                ty,
                pos,
            } => Exp::Handle {
                body: Box::new(self.rewrite_exp(*body)),
                arms: arms
                    .into_iter()
                    .map(|(p, e)| (p, self.rewrite_exp(e)))
                    .collect(),
                ty,
                pos,
            },
            Exp::From {
                steps,
                elem,
                ty,
                pos,
            } => Exp::From {
                steps: steps.into_iter().map(|s| self.rewrite_step(s)).collect(),
                elem,
                ty,
                pos,
            },
            Exp::Rel { rel, ty } => Exp::Rel {
                rel: self.rewrite_rel(rel),
                ty,
            },
        }
    }

    fn rewrite_step(&mut self, step: FromStep) -> FromStep {
        match step {
            FromStep::Scan { pat, exp } => FromStep::Scan {
                pat,
                exp: self.rewrite_exp(exp),
            },
            FromStep::Where(exp) => FromStep::Where(self.rewrite_exp(exp)),
            FromStep::Yield(exp) => FromStep::Yield(self.rewrite_exp(exp)),
            FromStep::Group { keys, aggs } => FromStep::Group {
                keys: keys
                    .into_iter()
                    .map(|(l, e)| (l, self.rewrite_exp(e)))
                    .collect(),
                aggs: aggs
                    .into_iter()
                    .map(|(l, a, e)| (l, a, self.rewrite_exp(e)))
                    .collect(),
            },
        }
    }

    fn rewrite_rel(&mut self, rel: Rel) -> Rel {
        match rel {
            Rel::Scan { input, elem } => Rel::Scan {
                input: Box::new(self.rewrite_exp(*input)),
                elem,
            },
            Rel::Filter { input, pred } => Rel::Filter {
                input: Box::new(self.rewrite_rel(*input)),
                pred: Box::new(self.rewrite_exp(*pred)),
            },
            Rel::Project { input, proj, elem } => Rel::Project {
                input: Box::new(self.rewrite_rel(*input)),
                proj: Box::new(self.rewrite_exp(*proj)),
                elem,
            },
            Rel::Join {
                left,
                right,
                cond,
                elem,
            } => Rel::Join {
                left: Box::new(self.rewrite_rel(*left)),
                right: Box::new(self.rewrite_rel(*right)),
                cond: cond.map(|c| Box::new(self.rewrite_exp(*c))),
                elem,
            },
            Rel::Union { left, right } => Rel::Union {
                left: Box::new(self.rewrite_rel(*left)),
                right: Box::new(self.rewrite_rel(*right)),
            },
            Rel::GroupBy {
                input,
                key,
                aggs,
                elem,
            } => Rel::GroupBy {
                input: Box::new(self.rewrite_rel(*input)),
                key: Box::new(self.rewrite_exp(*key)),
                aggs: aggs
                    .into_iter()
                    .map(|(l, a, e)| (l, a, self.rewrite_exp(e)))
                    .collect(),
                elem,
            },
            Rel::Aggregate { input, aggs, elem } => Rel::Aggregate {
                input: Box::new(self.rewrite_rel(*input)),
                aggs: aggs
                    .into_iter()
                    .map(|(l, a, e)| (l, a, self.rewrite_exp(e)))
                    .collect(),
                elem,
            },
        }
    }
}

/// Pre-order walk over every expression, including those nested in
/// declarations, steps and relational nodes.
pub fn walk_exp<'a>(exp: &'a Exp, f: &mut impl FnMut(&'a Exp)) {
    f(exp);
    match exp {
        Exp::Literal { .. } | Exp::Id(_) | Exp::Builtin { .. } | Exp::Global { .. } => {}
        Exp::Tuple { items, .. } | Exp::List { items, .. } => {
            items.iter().for_each(|e| walk_exp(e, f));
        }
        Exp::Record { fields, .. } => fields.iter().for_each(|(_, e)| walk_exp(e, f)),
        Exp::Ctor { arg, .. } => {
            if let Some(e) = arg {
                walk_exp(e, f);
            }
        }
        Exp::Apply { func, arg, .. } => {
            walk_exp(func, f);
            walk_exp(arg, f);
        }
        Exp::Fn { body, .. } => walk_exp(body, f),
        Exp::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            walk_exp(cond, f);
            walk_exp(then_branch, f);
            walk_exp(else_branch, f);
        }
        Exp::Let { decl, body, .. } => {
            walk_decl(decl, f);
            walk_exp(body, f);
        }
        Exp::Match {
            scrutinee, arms, ..
        } => {
            walk_exp(scrutinee, f);
            arms.iter().for_each(|(_, e)| walk_exp(e, f));
        }
        Exp::Raise { exp, .. } => walk_exp(exp, f),
        Exp::Handle { body, arms, .. } => {
            walk_exp(body, f);
            arms.iter().for_each(|(_, e)| walk_exp(e, f));
        }
        Exp::From { steps, .. } => {
            for step in steps {
                match step {
                    FromStep::Scan { exp, .. } => walk_exp(exp, f),
                    FromStep::Where(e) | FromStep::Yield(e) => walk_exp(e, f),
                    FromStep::Group { keys, aggs } => {
                        keys.iter().for_each(|(_, e)| walk_exp(e, f));
                        aggs.iter().for_each(|(_, _, e)| walk_exp(e, f));
                    }
                }
            }
        }
        Exp::Rel { rel, .. } => walk_rel(rel, f),
    }
}

pub fn walk_decl<'a>(decl: &'a Decl, f: &mut impl FnMut(&'a Exp)) {
    match decl {
        Decl::NonRecVal { exp, .. } => walk_exp(exp, f),
        Decl::RecVal { binds } => binds.iter().for_each(|(_, e)| walk_exp(e, f)),
    }
}

fn walk_rel<'a>(rel: &'a Rel, f: &mut impl FnMut(&'a Exp)) {
    match rel {
        Rel::Scan { input, .. } => walk_exp(input, f),
        Rel::Filter { input, pred } => {
            walk_rel(input, f);
            walk_exp(pred, f);
        }
        Rel::Project { input, proj, .. } => {
            walk_rel(input, f);
            walk_exp(proj, f);
        }
        Rel::Join {
            left, right, cond, ..
        } => {
            walk_rel(left, f);
            walk_rel(right, f);
            if let Some(c) = cond {
                walk_exp(c, f);
            }
        }
        Rel::Union { left, right } => {
            walk_rel(left, f);
            walk_rel(right, f);
        }
        Rel::GroupBy {
            input, key, aggs, ..
        } => {
            walk_rel(input, f);
            walk_exp(key, f);
            aggs.iter().for_each(|(_, _, e)| walk_exp(e, f));
        }
        Rel::Aggregate { input, aggs, .. } => {
            walk_rel(input, f);
            aggs.iter().for_each(|(_, _, e)| walk_exp(e, f));
        }
    }
}
