//! Substitution-based inlining, guided by the usage analysis.
//!
//! Dead bindings are dropped; a binding used exactly once outside a
//! lambda is always substituted; bindings that are safe but duplicated
//! or that sit under a lambda are substituted only when their
//! right-hand side is small: an atom, a constructor of atoms, or a
//! lambda referenced only in call position. Recursive bindings never
//! inline across their own edge. Substitution alpha-renames any binder
//! it copies, so capture is impossible.

use std::collections::HashMap;

use crate::core::visit::Rewriter;
use crate::core::{Decl, Exp, FromStep, Id, IdKey, Pat};

use super::analyzer::{Analysis, Usage};

/// Right-hand sides up to this node count are duplicable.
const SMALL_SIZE: usize = 8;

pub struct Inliner<'a> {
    analysis: &'a Analysis,
    subst: HashMap<IdKey, Exp>,
    /// Ordinal source for alpha-renaming; well above resolver output.
    next_ord: usize,
}

impl<'a> Inliner<'a> {
    pub fn of(analysis: &'a Analysis) -> Self {
        Inliner {
            analysis,
            subst: HashMap::new(),
            next_ord: 1 << 20,
        }
    }

    fn should_inline(&self, id: &Id, exp: &Exp) -> bool {
        let Some(info) = self.analysis.get(&id.key()) else {
            return false;
        };
        if info.recursive {
            return false;
        }
        match info.usage {
            Usage::Dead => true, // dropped, not substituted
            Usage::Once => true,
            Usage::OnceSafe | Usage::MultiSafe => self.is_small(exp, info.all_calls),
            Usage::Multi => false,
        }
    }

    fn is_small(&self, exp: &Exp, all_calls: bool) -> bool {
        if exp.is_atom() {
            return true;
        }
        match exp {
            Exp::Ctor { arg, .. } => arg.as_deref().map(Exp::is_atom).unwrap_or(true),
            Exp::Tuple { items, .. } => items.iter().all(Exp::is_atom),
            Exp::Fn { .. } => {
                all_calls || super::analyzer::size_of(exp) <= SMALL_SIZE
            }
            _ => super::analyzer::size_of(exp) <= SMALL_SIZE && !may_have_effects(exp),
        }
    }

    /// Copy an expression for substitution, renaming every binder it
    /// introduces so duplicated copies stay unique.
    fn freshen(&mut self, exp: &Exp) -> Exp {
        if exp.is_atom() {
            return exp.clone();
        }
        let mut renames: HashMap<IdKey, Id> = HashMap::new();
        let mut pass = Freshen {
            renames: &mut renames,
            next_ord: &mut self.next_ord,
        };
        pass.rewrite_exp(exp.clone())
    }
}

/// An expression whose evaluation could raise or diverge must not be
/// duplicated or reordered.
fn may_have_effects(exp: &Exp) -> bool {
    match exp {
        Exp::Literal { .. }
        | Exp::Id(_)
        | Exp::Builtin { .. }
        | Exp::Global { .. }
        | Exp::Fn { .. } => false,
        Exp::Tuple { items, .. } | Exp::List { items, .. } => {
            items.iter().any(may_have_effects)
        }
        Exp::Record { fields, .. } => fields.iter().any(|(_, e)| may_have_effects(e)),
        Exp::Ctor { arg, .. } => arg.as_deref().map(may_have_effects).unwrap_or(false),
        Exp::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            may_have_effects(cond) || may_have_effects(then_branch) || may_have_effects(else_branch)
        }
        _ => true,
    }
}

impl Rewriter for Inliner<'_> {
    fn rewrite_exp(&mut self, exp: Exp) -> Exp {
        match exp {
            Exp::Id(id) => match self.subst.get(&id.key()) {
                Some(replacement) => {
                    let replacement = replacement.clone();
                    self.freshen(&replacement)
                }
                None => Exp::Id(id),
            },
            Exp::Let { decl, body, ty } => match *decl {
                Decl::NonRecVal {
                    pat: Pat::Id(id),
                    exp: rhs,
                } => {
                    let rhs = self.rewrite_exp(rhs);
                    let usage = self
                        .analysis
                        .get(&id.key())
                        .map(|info| info.usage)
                        .unwrap_or(Usage::Multi);
                    if usage == Usage::Dead {
                        return self.rewrite_exp(*body);
                    }
                    if self.should_inline(&id, &rhs) {
                        self.subst.insert(id.key(), rhs);
                        return self.rewrite_exp(*body);
                    }
                    Exp::Let {
                        decl: Box::new(Decl::NonRecVal {
                            pat: Pat::Id(id),
                            exp: rhs,
                        }),
                        body: Box::new(self.rewrite_exp(*body)),
                        ty,
                    }
                }
                other => Exp::Let {
                    decl: Box::new(self.rewrite_decl(other)),
                    body: Box::new(self.rewrite_exp(*body)),
                    ty,
                },
            },
            other => self.rewrite_children(other),
        }
    }
}

/// Alpha-renaming pass used when a substitution copies binders.
struct Freshen<'a> {
    renames: &'a mut HashMap<IdKey, Id>,
    next_ord: &'a mut usize,
}

impl Freshen<'_> {
    fn fresh(&mut self, id: &Id) -> Id {
        let ord = *self.next_ord;
        *self.next_ord += 1;
        let fresh = Id {
            name: id.name.clone(),
            ord,
            ty: id.ty.clone(),
        };
        self.renames.insert(id.key(), fresh.clone());
        fresh
    }

    fn rename_pat(&mut self, pat: Pat) -> Pat {
        match pat {
            Pat::Id(id) => Pat::Id(self.fresh(&id)),
            Pat::Layered { id, pat, ty } => Pat::Layered {
                id: self.fresh(&id),
                pat: Box::new(self.rename_pat(*pat)),
                ty,
            },
            Pat::Tuple { items, ty } => Pat::Tuple {
                items: items.into_iter().map(|p| self.rename_pat(p)).collect(),
                ty,
            },
            Pat::Record { fields, ty } => Pat::Record {
                fields: fields
                    .into_iter()
                    .map(|(l, p)| (l, self.rename_pat(p)))
                    .collect(),
                ty,
            },
            Pat::Ctor {
                name,
                ordinal,
                datatype,
                arg,
                ty,
            } => Pat::Ctor {
                name,
                ordinal,
                datatype,
                arg: arg.map(|p| Box::new(self.rename_pat(*p))),
                ty,
            },
            Pat::Cons { head, tail, ty } => Pat::Cons {
                head: Box::new(self.rename_pat(*head)),
                tail: Box::new(self.rename_pat(*tail)),
                ty,
            },
            other => other,
        }
    }
}

impl Rewriter for Freshen<'_> {
    fn rewrite_exp(&mut self, exp: Exp) -> Exp {
        match exp {
            Exp::Id(id) => match self.renames.get(&id.key()) {
                Some(fresh) => Exp::Id(fresh.clone()),
                None => Exp::Id(id),
            },
            Exp::Fn { param, body, ty } => {
                let param = self.rename_pat(param);
                Exp::Fn {
                    param,
                    body: Box::new(self.rewrite_exp(*body)),
                    ty,
                }
            }
            Exp::Match {
                scrutinee,
                arms,
                ty,
                pos,
            } => Exp::Match {
                scrutinee: Box::new(self.rewrite_exp(*scrutinee)),
                arms: arms
                    .into_iter()
                    .map(|(p, e)| {
                        let p = self.rename_pat(p);
                        (p, self.rewrite_exp(e))
                    })
                    .collect(),
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
                    .map(|(p, e)| {
                        let p = self.rename_pat(p);
                        (p, self.rewrite_exp(e))
                    })
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
                steps: steps
                    .into_iter()
                    .map(|step| match step {
                        FromStep::Scan { pat, exp } => {
                            let exp = self.rewrite_exp(exp);
                            FromStep::Scan {
                                pat: self.rename_pat(pat),
                                exp,
                            }
                        }
                        FromStep::Where(e) => FromStep::Where(self.rewrite_exp(e)),
                        FromStep::Yield(e) => FromStep::Yield(self.rewrite_exp(e)),
                        FromStep::Group { keys, aggs } => FromStep::Group {
                            keys: keys
                                .into_iter()
                                .map(|(id, e)| {
                                    let e = self.rewrite_exp(e);
                                    (self.fresh(&id), e)
                                })
                                .collect(),
                            aggs: aggs
                                .into_iter()
                                .map(|(id, a, e)| {
                                    let e = self.rewrite_exp(e);
                                    (self.fresh(&id), a, e)
                                })
                                .collect(),
                        },
                    })
                    .collect(),
                elem,
                ty,
                pos,
            },
            other => self.rewrite_children(other),
        }
    }

    fn rewrite_decl(&mut self, decl: Decl) -> Decl {
        match decl {
            Decl::NonRecVal { pat, exp } => {
                let exp = self.rewrite_exp(exp);
                Decl::NonRecVal {
                    pat: self.rename_pat(pat),
                    exp,
                }
            }
            Decl::RecVal { binds } => {
                // Rename the group first; the bodies reference each
                // other.
                let ids: Vec<Id> = binds.iter().map(|(id, _)| self.fresh(id)).collect();
                Decl::RecVal {
                    binds: ids
                        .into_iter()
                        .zip(binds)
                        .map(|(id, (_, exp))| (id, self.rewrite_exp(exp)))
                        .collect(),
                }
            }
        }
    }
}

/// The inlined form of a declaration under a given analysis.
pub fn inline(analysis: &Analysis, decl: Decl) -> Decl {
    let mut inliner = Inliner::of(analysis);
    inliner.rewrite_decl(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::opt::analyzer::analyze;
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

    fn mk_id(name: &str, ord: usize) -> Id {
        Id {
            name: name.to_string(),
            ord,
            ty: int_ty(),
        }
    }

    fn let_exp(bind: Id, rhs: Exp, body: Exp) -> Exp {
        Exp::Let {
            decl: Box::new(Decl::NonRecVal {
                pat: Pat::Id(bind),
                exp: rhs,
            }),
            body: Box::new(body),
            ty: int_ty(),
        }
    }

    fn top(exp: Exp) -> Decl {
        Decl::NonRecVal {
            pat: Pat::Id(mk_id("it", 999)),
            exp,
        }
    }

    #[test]
    fn dead_binding_is_dropped() {
        let x = mk_id("x", 0);
        let decl = top(let_exp(x, int_lit(1), int_lit(2)));
        let analysis = analyze(&decl);
        let inlined = inline(&analysis, decl);
        match inlined {
            Decl::NonRecVal { exp, .. } => assert_eq!(
                exp,
                Exp::Literal {
                    value: Literal::Int(2),
                    ty: int_ty()
                }
            ),
            _ => panic!("expected a value declaration"),
        }
    }

    #[test]
    fn once_used_binding_is_substituted() {
        let x = mk_id("x", 0);
        let decl = top(let_exp(x.clone(), int_lit(1), Exp::Id(x)));
        let analysis = analyze(&decl);
        let inlined = inline(&analysis, decl);
        match inlined {
            Decl::NonRecVal { exp, .. } => assert_eq!(
                exp,
                Exp::Literal {
                    value: Literal::Int(1),
                    ty: int_ty()
                }
            ),
            _ => panic!("expected a value declaration"),
        }
    }

    #[test]
    fn multi_used_atom_is_substituted() {
        let x = mk_id("x", 0);
        let body = Exp::Tuple {
            items: vec![Exp::Id(x.clone()), Exp::Id(x.clone())],
            ty: int_ty(),
        };
        let decl = top(let_exp(x, int_lit(7), body));
        let analysis = analyze(&decl);
        let inlined = inline(&analysis, decl);
        match inlined {
            Decl::NonRecVal { exp, .. } => match exp {
                Exp::Tuple { items, .. } => {
                    assert!(items.iter().all(|e| matches!(
                        e,
                        Exp::Literal {
                            value: Literal::Int(7),
                            ..
                        }
                    )));
                }
                _ => panic!("expected a tuple"),
            },
            _ => panic!("expected a value declaration"),
        }
    }

    #[test]
    fn recursive_binding_survives() {
        let f = mk_id("f", 0);
        let lam = Exp::Fn {
            param: Pat::Wildcard(int_ty()),
            body: Box::new(Exp::Apply {
                func: Box::new(Exp::Id(f.clone())),
                arg: Box::new(int_lit(0)),
                ty: int_ty(),
                pos: lachs::Span::default(),
            }),
            ty: int_ty(),
        };
        let decl = Decl::RecVal {
            binds: vec![(f, lam)],
        };
        let analysis = analyze(&decl);
        let inlined = inline(&analysis, decl.clone());
        assert_eq!(inlined, decl);
    }

    #[test]
    fn inlining_converges_to_fixed_point() {
        let x = mk_id("x", 0);
        let y = mk_id("y", 1);
        let body = let_exp(y.clone(), Exp::Id(x.clone()), Exp::Id(y));
        let decl = top(let_exp(x, int_lit(3), body));
        let analysis = analyze(&decl);
        let once = inline(&analysis, decl);
        let analysis2 = analyze(&once);
        let twice = inline(&analysis2, once.clone());
        assert_eq!(once, twice);
    }
}
