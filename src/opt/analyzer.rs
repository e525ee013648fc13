//! Occurrence and usage analysis over Core.
//!
//! For every binder the analysis records how often it is referenced,
//! whether any reference sits under a lambda relative to the binding
//! site, whether every reference is in call position, and a size
//! estimate of its right-hand side. The inliner consumes this to pick
//! its substitutions.

use std::collections::{HashMap, HashSet};

use crate::core::visit::walk_exp;
use crate::core::{Decl, Exp, FromStep, IdKey, Pat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Never referenced.
    Dead,
    /// Exactly one reference, not under a lambda.
    Once,
    /// Exactly one reference, under a lambda.
    OnceSafe,
    /// Several references, at least one under a lambda.
    Multi,
    /// Several references, none under a lambda.
    MultiSafe,
}

#[derive(Debug, Clone)]
pub struct UsageInfo {
    pub usage: Usage,
    /// Node count of the right-hand side, when the binder has one.
    pub size: usize,
    /// Whether every reference is the function of an application.
    pub all_calls: bool,
    /// Recursive binders are never inlined across their own edge.
    pub recursive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub map: HashMap<IdKey, UsageInfo>,
}

impl Analysis {
    pub fn get(&self, key: &IdKey) -> Option<&UsageInfo> {
        self.map.get(key)
    }
}

#[derive(Default)]
struct Walker {
    depth: usize,
    births: HashMap<IdKey, usize>,
    counts: HashMap<IdKey, Count>,
    sizes: HashMap<IdKey, usize>,
    recursive: HashSet<IdKey>,
}

#[derive(Default, Clone)]
struct Count {
    uses: usize,
    under_lambda: bool,
    non_call: bool,
}

pub fn analyze(decl: &Decl) -> Analysis {
    let mut walker = Walker::default();
    walker.decl(decl);
    let mut map = HashMap::new();
    for (key, birth) in &walker.births {
        let _ = birth;
        let count = walker.counts.get(key).cloned().unwrap_or_default();
        let usage = match count.uses {
            0 => Usage::Dead,
            1 if count.under_lambda => Usage::OnceSafe,
            1 => Usage::Once,
            _ if count.under_lambda => Usage::Multi,
            _ => Usage::MultiSafe,
        };
        map.insert(
            key.clone(),
            UsageInfo {
                usage,
                size: walker.sizes.get(key).copied().unwrap_or(0),
                all_calls: !count.non_call,
                recursive: walker.recursive.contains(key),
            },
        );
    }
    Analysis { map }
}

/// Node count of an expression, the inliner's size estimate.
pub fn size_of(exp: &Exp) -> usize {
    let mut n = 0;
    walk_exp(exp, &mut |_| n += 1);
    n
}

impl Walker {
    fn birth_pat(&mut self, pat: &Pat) {
        for id in pat.binders() {
            self.births.insert(id.key(), self.depth);
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::NonRecVal { pat, exp } => {
                self.birth_pat(pat);
                if let Pat::Id(id) = pat {
                    self.sizes.insert(id.key(), size_of(exp));
                }
                self.exp(exp);
            }
            Decl::RecVal { binds } => {
                for (id, exp) in binds {
                    self.births.insert(id.key(), self.depth);
                    self.sizes.insert(id.key(), size_of(exp));
                    self.recursive.insert(id.key());
                }
                for (_, exp) in binds {
                    self.exp(exp);
                }
            }
        }
    }

    fn reference(&mut self, key: IdKey, call_position: bool) {
        let birth = self.births.get(&key).copied();
        let entry = self.counts.entry(key).or_default();
        entry.uses += 1;
        if let Some(birth) = birth {
            if self.depth > birth {
                entry.under_lambda = true;
            }
        }
        if !call_position {
            entry.non_call = true;
        }
    }

    fn exp(&mut self, exp: &Exp) {
        match exp {
            Exp::Id(id) => self.reference(id.key(), false),
            Exp::Apply { func, arg, .. } => {
                match &**func {
                    Exp::Id(id) => self.reference(id.key(), true),
                    other => self.exp(other),
                }
                self.exp(arg);
            }
            Exp::Fn { param, body, .. } => {
                self.depth += 1;
                self.birth_pat(param);
                self.exp(body);
                self.depth -= 1;
            }
            Exp::Let { decl, body, .. } => {
                self.decl(decl);
                self.exp(body);
            }
            Exp::Match {
                scrutinee, arms, ..
            } => {
                self.exp(scrutinee);
                for (pat, body) in arms {
                    self.birth_pat(pat);
                    self.exp(body);
                }
            }
            Exp::Handle { body, arms, .. } => {
                self.exp(body);
                for (pat, arm) in arms {
                    self.birth_pat(pat);
                    self.exp(arm);
                }
            }
            Exp::From { steps, .. } => {
                for step in steps {
                    match step {
                        FromStep::Scan { pat, exp } => {
                            self.exp(exp);
                            self.birth_pat(pat);
                        }
                        FromStep::Where(e) | FromStep::Yield(e) => self.exp(e),
                        FromStep::Group { keys, aggs } => {
                            for (id, e) in keys {
                                self.exp(e);
                                self.births.insert(id.key(), self.depth);
                            }
                            for (id, _, e) in aggs {
                                self.exp(e);
                                self.births.insert(id.key(), self.depth);
                            }
                        }
                    }
                }
            }
            Exp::Tuple { items, .. } | Exp::List { items, .. } => {
                items.iter().for_each(|e| self.exp(e));
            }
            Exp::Record { fields, .. } => fields.iter().for_each(|(_, e)| self.exp(e)),
            Exp::Ctor { arg, .. } => {
                if let Some(e) = arg {
                    self.exp(e);
                }
            }
            Exp::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.exp(cond);
                self.exp(then_branch);
                self.exp(else_branch);
            }
            Exp::Raise { exp, .. } => self.exp(exp),
            Exp::Rel { rel, .. } => {
                // Row functions inside relational nodes are lambdas.
                self.depth += 1;
                let mut uses: Vec<&Exp> = Vec::new();
                collect_rel_exps(rel, &mut uses);
                for e in uses {
                    self.exp(e);
                }
                self.depth -= 1;
            }
            Exp::Literal { .. } | Exp::Builtin { .. } | Exp::Global { .. } => {}
        }
    }
}

fn collect_rel_exps<'a>(rel: &'a crate::core::Rel, out: &mut Vec<&'a Exp>) {
    use crate::core::Rel;
    match rel {
        Rel::Scan { input, .. } => out.push(input),
        Rel::Filter { input, pred } => {
            collect_rel_exps(input, out);
            out.push(pred);
        }
        Rel::Project { input, proj, .. } => {
            collect_rel_exps(input, out);
            out.push(proj);
        }
        Rel::Join {
            left, right, cond, ..
        } => {
            collect_rel_exps(left, out);
            collect_rel_exps(right, out);
            if let Some(c) = cond {
                out.push(c);
            }
        }
        Rel::Union { left, right } => {
            collect_rel_exps(left, out);
            collect_rel_exps(right, out);
        }
        Rel::GroupBy {
            input, key, aggs, ..
        } => {
            collect_rel_exps(input, out);
            out.push(key);
            aggs.iter().for_each(|(_, _, e)| out.push(e));
        }
        Rel::Aggregate { input, aggs, .. } => {
            collect_rel_exps(input, out);
            aggs.iter().for_each(|(_, _, e)| out.push(e));
        }
    }
}

/// Binder keys of the outermost declaration, the statement's own
/// output bindings; these are exempt from dead-binding reasoning.
pub fn top_binders(decl: &Decl) -> HashSet<IdKey> {
    let mut out = HashSet::new();
    match decl {
        Decl::NonRecVal { pat, .. } => {
            for id in pat.binders() {
                out.insert(id.key());
            }
        }
        Decl::RecVal { binds } => {
            for (id, _) in binds {
                out.insert(id.key());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::types::ty::{PrimitiveType, Type, TypeKind};

    fn int_ty() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Int))
    }

    fn int_lit(i: i64) -> Exp {
        Exp::Literal {
            value: Literal::Int(i),
            ty: int_ty(),
        }
    }

    fn id(name: &str, ord: usize) -> crate::core::Id {
        crate::core::Id {
            name: name.to_string(),
            ord,
            ty: int_ty(),
        }
    }

    fn let_exp(bind: crate::core::Id, rhs: Exp, body: Exp) -> Exp {
        Exp::Let {
            decl: Box::new(Decl::NonRecVal {
                pat: Pat::Id(bind),
                exp: rhs,
            }),
            body: Box::new(body),
            ty: int_ty(),
        }
    }

    #[test]
    fn dead_binding_is_dead() {
        let x = id("x", 0);
        let top = id("it", 1);
        let exp = let_exp(x.clone(), int_lit(1), int_lit(2));
        let decl = Decl::NonRecVal {
            pat: Pat::Id(top),
            exp,
        };
        let analysis = analyze(&decl);
        assert_eq!(analysis.get(&x.key()).unwrap().usage, Usage::Dead);
    }

    #[test]
    fn single_use_is_once() {
        let x = id("x", 0);
        let top = id("it", 1);
        let exp = let_exp(x.clone(), int_lit(1), Exp::Id(x.clone()));
        let decl = Decl::NonRecVal {
            pat: Pat::Id(top),
            exp,
        };
        let analysis = analyze(&decl);
        assert_eq!(analysis.get(&x.key()).unwrap().usage, Usage::Once);
    }

    #[test]
    fn use_under_lambda_is_once_safe() {
        let x = id("x", 0);
        let top = id("it", 1);
        let body = Exp::Fn {
            param: Pat::Wildcard(int_ty()),
            body: Box::new(Exp::Id(x.clone())),
            ty: int_ty(),
        };
        let exp = let_exp(x.clone(), int_lit(1), body);
        let decl = Decl::NonRecVal {
            pat: Pat::Id(top),
            exp,
        };
        let analysis = analyze(&decl);
        assert_eq!(analysis.get(&x.key()).unwrap().usage, Usage::OnceSafe);
    }

    #[test]
    fn two_uses_are_multi_safe() {
        let x = id("x", 0);
        let top = id("it", 1);
        let body = Exp::Tuple {
            items: vec![Exp::Id(x.clone()), Exp::Id(x.clone())],
            ty: int_ty(),
        };
        let exp = let_exp(x.clone(), int_lit(1), body);
        let decl = Decl::NonRecVal {
            pat: Pat::Id(top),
            exp,
        };
        let analysis = analyze(&decl);
        assert_eq!(analysis.get(&x.key()).unwrap().usage, Usage::MultiSafe);
    }

    #[test]
    fn recursive_binders_are_marked() {
        let f = id("f", 0);
        let body = Exp::Fn {
            param: Pat::Wildcard(int_ty()),
            body: Box::new(Exp::Id(f.clone())),
            ty: int_ty(),
        };
        let decl = Decl::RecVal {
            binds: vec![(f.clone(), body)],
        };
        let analysis = analyze(&decl);
        assert!(analysis.get(&f.key()).unwrap().recursive);
    }
}
