//! Relationalizer: rewrite comprehensions into relational algebra.
//!
//! A `from` pipeline qualifies when every scan binds a plain variable
//! over a collection of record-typed rows and every embedded
//! expression is pure. Scans become `Scan` (joined pairwise),
//! `where` becomes `Filter`, `group` becomes `GroupBy`, the trailing
//! `yield` becomes `Project`, and appending two relational expressions
//! becomes `Union`. Anything that does not qualify is left alone for
//! the tree-walk evaluator.

use crate::core::visit::Rewriter;
use crate::core::{Exp, FromStep, Id, Pat, Rel};
use crate::eval::builtins::Builtin;
use crate::types::ty::{Type, TypeKind};
use crate::types::TypeSystem;

pub struct Relationalizer<'a> {
    ts: &'a mut TypeSystem,
    next_ord: usize,
}

impl<'a> Relationalizer<'a> {
    pub fn of(ts: &'a mut TypeSystem) -> Self {
        Relationalizer {
            ts,
            next_ord: 1 << 24,
        }
    }

    fn fresh_id(&mut self, name: impl Into<String>, ty: Type) -> Id {
        let ord = self.next_ord;
        self.next_ord += 1;
        Id {
            name: name.into(),
            ord,
            ty,
        }
    }

    /// The function from the current row to `body`, destructuring the
    /// row back into the scan variables.
    fn row_fn(&mut self, binders: &[Id], body: Exp) -> Exp {
        let param = if binders.len() == 1 {
            Pat::Id(binders[0].clone())
        } else {
            let mut fields: Vec<(String, Pat)> = binders
                .iter()
                .map(|id| (id.name.clone(), Pat::Id(id.clone())))
                .collect();
            fields.sort_by(|(a, _), (b, _)| a.cmp(b));
            let ty = self.row_type(binders);
            Pat::Record { fields, ty }
        };
        let fn_ty = self.ts.fn_type(param.ty(), body.ty());
        Exp::Fn {
            param,
            body: Box::new(body),
            ty: fn_ty,
        }
    }

    fn row_type(&mut self, binders: &[Id]) -> Type {
        if binders.len() == 1 {
            binders[0].ty.clone()
        } else {
            let fields: Vec<(String, Type)> = binders
                .iter()
                .map(|id| (id.name.clone(), id.ty.clone()))
                .collect();
            self.ts.record_type(fields)
        }
    }

    /// Relabel a single-variable relation into a one-field record per
    /// row, so joins always merge records.
    fn labelled(&mut self, rel: Rel, binder: &Id) -> Rel {
        let elem = self
            .ts
            .record_type(vec![(binder.name.clone(), binder.ty.clone())]);
        let body = Exp::Record {
            fields: vec![(binder.name.clone(), Exp::Id(binder.clone()))],
            ty: elem.clone(),
        };
        let proj = self.row_fn(std::slice::from_ref(binder), body);
        Rel::Project {
            input: Box::new(rel),
            proj: Box::new(proj),
            elem,
        }
    }

    fn try_rewrite_from(
        &mut self,
        steps: &[FromStep],
        elem: &Type,
        ty: &Type,
    ) -> Option<Exp> {
        // Validity: plain-variable scans over record rows, pure
        // predicates everywhere.
        let mut scans: Vec<(Id, Exp)> = Vec::new();
        for step in steps {
            match step {
                FromStep::Scan { pat, exp } => {
                    let Pat::Id(id) = pat else { return None };
                    if !matches!(&*self.ts.resolve(&id.ty), TypeKind::Record(_)) {
                        return None;
                    }
                    if !is_pure(exp) {
                        return None;
                    }
                    scans.push((id.clone(), exp.clone()));
                }
                FromStep::Where(e) | FromStep::Yield(e) => {
                    if !is_pure(e) {
                        return None;
                    }
                }
                FromStep::Group { keys, aggs } => {
                    if keys.iter().any(|(_, e)| !is_pure(e))
                        || aggs.iter().any(|(_, _, e)| !is_pure(e))
                    {
                        return None;
                    }
                }
            }
        }
        if scans.is_empty() {
            return None;
        }

        let mut binders: Vec<Id> = Vec::new();
        let mut rel: Option<Rel> = None;
        for step in steps {
            match step {
                FromStep::Scan { pat, exp } => {
                    let Pat::Id(id) = pat else { return None };
                    let scan = Rel::Scan {
                        input: Box::new(exp.clone()),
                        elem: id.ty.clone(),
                    };
                    rel = Some(match rel.take() {
                        None => scan,
                        Some(left) => {
                            // Widen both sides to labelled rows, then
                            // cross join; predicates arrive as later
                            // filters.
                            let left = if binders.len() == 1 {
                                self.labelled(left, &binders[0])
                            } else {
                                left
                            };
                            let right = self.labelled(scan, id);
                            let mut all = binders.clone();
                            all.push(id.clone());
                            let elem = self.row_type(&all);
                            Rel::Join {
                                left: Box::new(left),
                                right: Box::new(right),
                                cond: None,
                                elem,
                            }
                        }
                    });
                    binders.push(id.clone());
                }
                FromStep::Where(pred) => {
                    let input = rel.take()?;
                    let pred = self.row_fn(&binders, pred.clone());
                    rel = Some(Rel::Filter {
                        input: Box::new(input),
                        pred: Box::new(pred),
                    });
                }
                FromStep::Group { keys, aggs } => {
                    let input = rel.take()?;
                    let key_fields: Vec<(String, Exp)> = keys
                        .iter()
                        .map(|(id, e)| (id.name.clone(), e.clone()))
                        .collect();
                    let mut sorted = key_fields;
                    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
                    let key_ty = self.ts.record_type(
                        sorted
                            .iter()
                            .map(|(l, e)| (l.clone(), e.ty()))
                            .collect(),
                    );
                    let key_body = Exp::Record {
                        fields: sorted,
                        ty: key_ty,
                    };
                    let key = self.row_fn(&binders, key_body);
                    let agg_items = aggs
                        .iter()
                        .map(|(id, agg, e)| {
                            (id.name.clone(), *agg, self.row_fn(&binders, e.clone()))
                        })
                        .collect();
                    let mut new_binders: Vec<Id> =
                        keys.iter().map(|(id, _)| id.clone()).collect();
                    new_binders.extend(aggs.iter().map(|(id, _, _)| id.clone()));
                    let group_elem = self.row_type(&new_binders);
                    rel = Some(Rel::GroupBy {
                        input: Box::new(input),
                        key: Box::new(key),
                        aggs: agg_items,
                        elem: group_elem,
                    });
                    binders = new_binders;
                }
                FromStep::Yield(exp) => {
                    let input = rel.take()?;
                    let proj = self.row_fn(&binders, exp.clone());
                    rel = Some(Rel::Project {
                        input: Box::new(input),
                        proj: Box::new(proj),
                        elem: elem.clone(),
                    });
                }
            }
        }

        rel.map(|rel| Exp::Rel {
            rel,
            ty: ty.clone(),
        })
    }
}

impl Rewriter for Relationalizer<'_> {
    fn rewrite_exp(&mut self, exp: Exp) -> Exp {
        let exp = self.rewrite_children(exp);
        match exp {
            Exp::From {
                steps,
                elem,
                ty,
                pos,
            } => match self.try_rewrite_from(&steps, &elem, &ty) {
                Some(rel) => rel,
                None => Exp::From {
                    steps,
                    elem,
                    ty,
                    pos,
                },
            },
            // Appending two relational pipelines is a union.
            Exp::Apply {
                func,
                arg,
                ty,
                pos,
            } => {
                if let (
                    Exp::Builtin {
                        builtin: Builtin::Append,
                        ..
                    },
                    Exp::Tuple { items, .. },
                ) = (&*func, &*arg)
                {
                    if items.len() == 2
                        && matches!(items[0], Exp::Rel { .. })
                        && matches!(items[1], Exp::Rel { .. })
                    {
                        let mut items = match *arg {
                            Exp::Tuple { items, .. } => items,
                            _ => unreachable!("matched a tuple above"),
                        };
                        let right = items.pop().expect("two items");
                        let left = items.pop().expect("two items");
                        let (left, right) = match (left, right) {
                            (Exp::Rel { rel: l, .. }, Exp::Rel { rel: r, .. }) => (l, r),
                            _ => unreachable!("matched relational operands above"),
                        };
                        return Exp::Rel {
                            rel: Rel::Union {
                                left: Box::new(left),
                                right: Box::new(right),
                            },
                            ty,
                        };
                    }
                }
                Exp::Apply {
                    func,
                    arg,
                    ty,
                    pos,
                }
            }
            other => other,
        }
    }
}

/// Conservative purity: no raises, no calls into unknown functions, no
/// partial builtins.
pub fn is_pure(exp: &Exp) -> bool {
    match exp {
        Exp::Literal { .. } | Exp::Id(_) | Exp::Builtin { .. } | Exp::Global { .. } => true,
        Exp::Tuple { items, .. } | Exp::List { items, .. } => items.iter().all(is_pure),
        Exp::Record { fields, .. } => fields.iter().all(|(_, e)| is_pure(e)),
        Exp::Ctor { arg, .. } => arg.as_deref().map(is_pure).unwrap_or(true),
        Exp::Fn { body, .. } => is_pure(body),
        Exp::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => is_pure(cond) && is_pure(then_branch) && is_pure(else_branch),
        Exp::Apply { func, arg, .. } => {
            let callee_ok = match &**func {
                Exp::Builtin { builtin, .. } => !matches!(
                    builtin,
                    Builtin::Hd | Builtin::Tl | Builtin::Div | Builtin::Mod
                ),
                Exp::Fn { body, .. } => is_pure(body),
                _ => false,
            };
            callee_ok && is_pure(arg)
        }
        Exp::Match {
            scrutinee, arms, ..
        } => {
            // Only a single irrefutable arm cannot raise.
            is_pure(scrutinee)
                && arms.len() == 1
                && arms[0].0.is_irrefutable()
                && arms.iter().all(|(_, e)| is_pure(e))
        }
        _ => false,
    }
}
