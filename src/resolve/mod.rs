//! Resolver: lower the typed surface AST into Core.
//!
//! Every binder gets a unique ordinal, so shadowing disappears;
//! operators become builtin applications; `andalso`/`orelse` become
//! `if`; record expressions and patterns are canonicalised to
//! alphabetical label order; refutable `fn`/`case` patterns are routed
//! through the match compiler, which also delivers the coverage
//! verdict; `from` pipelines are normalised to end in a `yield`.

pub mod error;
pub mod matches;

use lachs::Span;

use crate::ast::expression::{self as aexp, group_key_fields, Expr, FromStep as AstFromStep};
use crate::ast::pattern::Pattern;
use crate::ast::statement::{Decl as AstDecl, Statement, ValDecl};
use crate::ast::{BinOp, Literal};
use crate::core::{Agg, Decl, Exp, FromStep, Id, Pat};
use crate::env::Environment;
use crate::eval::builtins::Builtin;
use crate::types::infer::rec_bind_name;
use crate::types::ty::{Type, TypeKind};
use crate::types::TypeSystem;

use error::{CompileError, CompileWarning};

pub struct Resolver<'a> {
    ts: &'a mut TypeSystem,
    env: &'a Environment,
    locals: Vec<(String, Id)>,
    next_ord: usize,
    pub warnings: Vec<CompileWarning>,
}

impl<'a> Resolver<'a> {
    pub fn of(ts: &'a mut TypeSystem, env: &'a Environment) -> Self {
        Resolver {
            ts,
            env,
            locals: Vec::new(),
            next_ord: 0,
            warnings: Vec::new(),
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

    fn resolve_ty(&mut self, ty: &Type) -> Type {
        self.ts.resolve(ty)
    }

    /// Lower a whole statement to a value declaration; a bare
    /// expression becomes `val it = <exp>`.
    pub fn to_core_decl(&mut self, stmt: Statement<Type>) -> Result<Decl, CompileError> {
        match stmt {
            Statement::Expression(exp) => {
                let exp = self.exp_to_core(exp)?;
                let id = self.fresh_id("it", exp.ty());
                Ok(Decl::NonRecVal {
                    pat: Pat::Id(id),
                    exp,
                })
            }
            Statement::Decl(decl) => self.decl_to_core(decl),
        }
    }

    /// Lower a declaration, leaving its binders in scope.
    fn decl_to_core(&mut self, decl: AstDecl<Type>) -> Result<Decl, CompileError> {
        match decl {
            AstDecl::Val(val) if val.rec => self.rec_val_to_core(val),
            AstDecl::Val(val) => self.nonrec_val_to_core(val),
            AstDecl::Fun(_) => {
                // `fun` was expanded to `val rec` during type
                // resolution; reaching here is a pipeline bug.
                unreachable!("fun declarations are desugared before resolution")
            }
            AstDecl::Datatype(_) | AstDecl::Exception(_) | AstDecl::TypeAlias(_) => {
                // Registered in the type system during inference; no
                // runtime component.
                Ok(Decl::RecVal { binds: Vec::new() })
            }
        }
    }

    fn nonrec_val_to_core(&mut self, val: ValDecl<Type>) -> Result<Decl, CompileError> {
        let mut pats = Vec::with_capacity(val.binds.len());
        let mut exps = Vec::with_capacity(val.binds.len());
        for bind in val.binds {
            exps.push(self.exp_to_core(bind.exp)?);
            pats.push(bind.pat);
        }
        // `and`-joined bindings see the outer scope, so convert every
        // right-hand side before any pattern binder lands.
        let core_pats: Vec<Pat> = pats.into_iter().map(|p| self.pat_to_core(p)).collect();
        for pat in &core_pats {
            self.push_binders(pat);
        }
        if core_pats.len() == 1 {
            let pat = core_pats.into_iter().next().expect("one binding");
            let exp = exps.into_iter().next().expect("one binding");
            Ok(Decl::NonRecVal { pat, exp })
        } else {
            let pat_tys: Vec<Type> = core_pats.iter().map(|p| p.ty()).collect();
            let exp_tys: Vec<Type> = exps.iter().map(|e| e.ty()).collect();
            let pat = Pat::Tuple {
                items: core_pats,
                ty: self.ts.tuple_type(pat_tys),
            };
            let exp = Exp::Tuple {
                items: exps,
                ty: self.ts.tuple_type(exp_tys),
            };
            Ok(Decl::NonRecVal { pat, exp })
        }
    }

    fn rec_val_to_core(&mut self, val: ValDecl<Type>) -> Result<Decl, CompileError> {
        // Binders first: the right-hand sides see each other.
        let mut ids = Vec::with_capacity(val.binds.len());
        for bind in &val.binds {
            let name = rec_bind_name(&bind.pat)
                .ok_or_else(|| CompileError::IllegalRecursion {
                    span: bind.position.clone(),
                })?;
            if !matches!(bind.exp, Expr::Fn(_)) {
                return Err(CompileError::IllegalRecursion {
                    span: bind.position.clone(),
                });
            }
            let ty = self.resolve_ty(bind.exp.info());
            let id = self.fresh_id(name.clone(), ty);
            self.locals.push((name, id.clone()));
            ids.push(id);
        }
        let mut binds = Vec::with_capacity(val.binds.len());
        for (bind, id) in val.binds.into_iter().zip(ids) {
            let exp = self.exp_to_core(bind.exp)?;
            binds.push((id, exp));
        }
        Ok(Decl::RecVal { binds })
    }

    fn push_binders(&mut self, pat: &Pat) {
        for id in pat.binders() {
            self.locals.push((id.name.clone(), id.clone()));
        }
    }

    // --- expressions ---

    pub fn exp_to_core(&mut self, exp: Expr<Type>) -> Result<Exp, CompileError> {
        match exp {
            Expr::Literal(lit) => {
                let ty = self.resolve_ty(&lit.info);
                Ok(Exp::Literal {
                    value: lit.value,
                    ty,
                })
            }
            Expr::Ident(id) => Ok(self.ident_to_core(&id.value, &id.info)),
            Expr::Selector(sel) => {
                let ty = self.resolve_ty(&sel.info);
                self.selector_fn(&sel.label, &ty)
            }
            Expr::Tuple(t) => {
                let ty = self.resolve_ty(&t.info);
                let items = t
                    .items
                    .into_iter()
                    .map(|i| self.exp_to_core(i))
                    .collect::<Result<_, _>>()?;
                Ok(Exp::Tuple { items, ty })
            }
            Expr::Record(r) => {
                let ty = self.resolve_ty(&r.info);
                let mut fields: Vec<(String, Exp)> = r
                    .fields
                    .into_iter()
                    .map(|(l, e)| Ok((l, self.exp_to_core(e)?)))
                    .collect::<Result<_, CompileError>>()?;
                fields.sort_by(|(a, _), (b, _)| a.cmp(b));
                Ok(Exp::Record { fields, ty })
            }
            Expr::List(l) => {
                let ty = self.resolve_ty(&l.info);
                let items = l
                    .items
                    .into_iter()
                    .map(|i| self.exp_to_core(i))
                    .collect::<Result<_, _>>()?;
                Ok(Exp::List { items, ty })
            }
            Expr::Apply(app) => {
                let ty = self.resolve_ty(&app.info);
                let func = self.exp_to_core(*app.func)?;
                let arg = self.exp_to_core(*app.arg)?;
                // Constructor application folds into the constructor
                // node itself.
                if let Exp::Ctor {
                    name,
                    ordinal,
                    datatype,
                    arg: None,
                    ..
                } = &func
                {
                    return Ok(Exp::Ctor {
                        name: name.clone(),
                        ordinal: *ordinal,
                        datatype: datatype.clone(),
                        arg: Some(Box::new(arg)),
                        ty,
                    });
                }
                Ok(Exp::Apply {
                    func: Box::new(func),
                    arg: Box::new(arg),
                    ty,
                    pos: app.position,
                })
            }
            Expr::Infix(infix) => self.infix_to_core(infix),
            Expr::Negate(neg) => {
                let ty = self.resolve_ty(&neg.info);
                let operand = self.exp_to_core(*neg.operand)?;
                let fn_ty = self.ts.fn_type(ty.clone(), ty.clone());
                Ok(Exp::Apply {
                    func: Box::new(Exp::Builtin {
                        builtin: Builtin::Negate,
                        ty: fn_ty,
                    }),
                    arg: Box::new(operand),
                    ty,
                    pos: neg.position,
                })
            }
            Expr::If(ife) => {
                let ty = self.resolve_ty(&ife.info);
                Ok(Exp::If {
                    cond: Box::new(self.exp_to_core(*ife.condition)?),
                    then_branch: Box::new(self.exp_to_core(*ife.then_branch)?),
                    else_branch: Box::new(self.exp_to_core(*ife.else_branch)?),
                    ty,
                })
            }
            Expr::Let(le) => {
                let ty = self.resolve_ty(&le.info);
                let mark = self.locals.len();
                let mut decls = Vec::new();
                for d in le.decls {
                    let core = self.decl_to_core(d)?;
                    // Declarations with no runtime component vanish.
                    let empty = matches!(&core, Decl::RecVal { binds } if binds.is_empty());
                    if !empty {
                        decls.push(core);
                    }
                }
                let mut body = self.exp_to_core(*le.body)?;
                for decl in decls.into_iter().rev() {
                    body = Exp::Let {
                        decl: Box::new(decl),
                        body: Box::new(body),
                        ty: ty.clone(),
                    };
                }
                self.locals.truncate(mark);
                Ok(body)
            }
            Expr::Fn(fne) => {
                let ty = self.resolve_ty(&fne.info);
                let (param_ty, result_ty) = match &*ty {
                    TypeKind::Fn(a, b) => (a.clone(), b.clone()),
                    _ => unreachable!("fn expression has a function type"),
                };
                let pos = fne.position.clone();
                let (arms, arm_spans) = self.arms_to_core(fne.arms)?;
                if arms.len() == 1 && arms[0].0.is_irrefutable() {
                    let (pat, body) = arms.into_iter().next().expect("one arm");
                    return Ok(Exp::Fn {
                        param: pat,
                        body: Box::new(body),
                        ty,
                    });
                }
                self.check_coverage(&arms, &arm_spans, &pos, true)?;
                let param = self.fresh_id("v$", param_ty);
                let body = Exp::Match {
                    scrutinee: Box::new(Exp::Id(param.clone())),
                    arms,
                    ty: result_ty,
                    pos,
                };
                Ok(Exp::Fn {
                    param: Pat::Id(param),
                    body: Box::new(body),
                    ty,
                })
            }
            Expr::Case(case) => {
                let ty = self.resolve_ty(&case.info);
                let scrutinee = self.exp_to_core(*case.scrutinee)?;
                let pos = case.position.clone();
                let (arms, arm_spans) = self.arms_to_core(case.arms)?;
                self.check_coverage(&arms, &arm_spans, &pos, true)?;
                Ok(Exp::Match {
                    scrutinee: Box::new(scrutinee),
                    arms,
                    ty,
                    pos,
                })
            }
            Expr::Raise(raise) => {
                let ty = self.resolve_ty(&raise.info);
                Ok(Exp::Raise {
                    exp: Box::new(self.exp_to_core(*raise.exp)?),
                    ty,
                    pos: raise.position,
                })
            }
            Expr::Handle(handle) => {
                let ty = self.resolve_ty(&handle.info);
                let body = self.exp_to_core(*handle.exp)?;
                // A handler is allowed to be partial; no coverage
                // verdict here.
                let (arms, _) = self.arms_to_core(handle.arms)?;
                Ok(Exp::Handle {
                    body: Box::new(body),
                    arms,
                    ty,
                    pos: handle.position,
                })
            }
            Expr::From(from) => self.from_to_core(from),
            Expr::Annotated(ann) => self.exp_to_core(*ann.exp),
        }
    }

    fn ident_to_core(&mut self, name: &str, info: &Type) -> Exp {
        let ty = self.resolve_ty(info);
        if let Some((_, id)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            let mut id = id.clone();
            id.ty = ty;
            return Exp::Id(id);
        }
        if let Some(def) = self.ts.lookup_ctor(name) {
            return Exp::Ctor {
                name: def.name.clone(),
                ordinal: def.ordinal,
                datatype: def.datatype.clone(),
                arg: None,
                ty,
            };
        }
        if self.env.lookup(name).is_some() {
            return Exp::Global {
                name: name.to_string(),
                ty,
            };
        }
        if let Some(builtin) = Builtin::by_name(name) {
            return Exp::Builtin { builtin, ty };
        }
        // Type resolution vouched for this name; treat it as global.
        Exp::Global {
            name: name.to_string(),
            ty,
        }
    }

    /// `#label` becomes `fn {label = v$, ...} => v$`, expanded against
    /// the record's full label set.
    fn selector_fn(&mut self, label: &str, fn_ty: &Type) -> Result<Exp, CompileError> {
        let (record_ty, result_ty) = match &**fn_ty {
            TypeKind::Fn(a, b) => (a.clone(), b.clone()),
            _ => unreachable!("selector has a function type"),
        };
        let labels: Vec<String> = match &*record_ty {
            TypeKind::Record(fields) => fields.iter().map(|(l, _)| l.clone()).collect(),
            _ => unreachable!("selector argument is a record"),
        };
        let field_tys: Vec<Type> = match &*record_ty {
            TypeKind::Record(fields) => fields.iter().map(|(_, t)| t.clone()).collect(),
            _ => unreachable!(),
        };
        let bound = self.fresh_id(format!("{label}$"), result_ty.clone());
        let fields: Vec<(String, Pat)> = labels
            .into_iter()
            .zip(field_tys)
            .map(|(l, t)| {
                if l == label {
                    (l, Pat::Id(bound.clone()))
                } else {
                    (l, Pat::Wildcard(t))
                }
            })
            .collect();
        Ok(Exp::Fn {
            param: Pat::Record {
                fields,
                ty: record_ty,
            },
            body: Box::new(Exp::Id(bound)),
            ty: fn_ty.clone(),
        })
    }

    fn infix_to_core(&mut self, infix: aexp::InfixExpr<Type>) -> Result<Exp, CompileError> {
        let ty = self.resolve_ty(&infix.info);
        let left = self.exp_to_core(*infix.left)?;
        let right = self.exp_to_core(*infix.right)?;
        match infix.op {
            BinOp::Andalso => Ok(Exp::If {
                cond: Box::new(left),
                then_branch: Box::new(right),
                else_branch: Box::new(Exp::Literal {
                    value: Literal::Bool(false),
                    ty: ty.clone(),
                }),
                ty,
            }),
            BinOp::Orelse => Ok(Exp::If {
                cond: Box::new(left),
                then_branch: Box::new(Exp::Literal {
                    value: Literal::Bool(true),
                    ty: ty.clone(),
                }),
                else_branch: Box::new(right),
                ty,
            }),
            op => {
                let builtin = Builtin::of_binop(op).expect("strict operator");
                let operand_ty = self.ts.tuple_type(vec![left.ty(), right.ty()]);
                let fn_ty = self.ts.fn_type(operand_ty.clone(), ty.clone());
                Ok(Exp::Apply {
                    func: Box::new(Exp::Builtin {
                        builtin,
                        ty: fn_ty,
                    }),
                    arg: Box::new(Exp::Tuple {
                        items: vec![left, right],
                        ty: operand_ty,
                    }),
                    ty,
                    pos: infix.position,
                })
            }
        }
    }

    fn arms_to_core(
        &mut self,
        arms: Vec<aexp::MatchArm<Type>>,
    ) -> Result<(Vec<(Pat, Exp)>, Vec<Span>), CompileError> {
        let mut out = Vec::with_capacity(arms.len());
        let mut spans = Vec::with_capacity(arms.len());
        for arm in arms {
            let mark = self.locals.len();
            let pat = self.pat_to_core(arm.pat);
            self.push_binders(&pat);
            let body = self.exp_to_core(arm.exp)?;
            self.locals.truncate(mark);
            spans.push(arm.position);
            out.push((pat, body));
        }
        Ok((out, spans))
    }

    /// Coverage verdict for a compiled match: redundancy is an error at
    /// the redundant arm, non-exhaustiveness a warning at the match.
    fn check_coverage(
        &mut self,
        arms: &[(Pat, Exp)],
        arm_spans: &[Span],
        pos: &Span,
        warn_nonexhaustive: bool,
    ) -> Result<(), CompileError> {
        let pats: Vec<Pat> = arms.iter().map(|(p, _)| p.clone()).collect();
        let (_, coverage) = matches::compile(&pats, self.ts);
        if let Some(&arm) = coverage.redundant_arms.first() {
            if coverage.exhaustive {
                return Err(CompileError::MatchRedundant {
                    span: arm_spans[arm].clone(),
                });
            }
            return Err(CompileError::MatchNonExhaustiveAndRedundant { span: pos.clone() });
        }
        if !coverage.exhaustive && warn_nonexhaustive {
            self.warnings
                .push(CompileWarning::MatchNonExhaustive { span: pos.clone() });
        }
        Ok(())
    }

    fn from_to_core(&mut self, from: aexp::FromExpr<Type>) -> Result<Exp, CompileError> {
        let ty = self.resolve_ty(&from.info);
        let elem = match &*ty {
            TypeKind::List(elem) => elem.clone(),
            _ => unreachable!("from has a list type"),
        };
        let pos = from.position.clone();
        let mark = self.locals.len();
        let mut steps: Vec<FromStep> = Vec::new();
        let mut row_binders: Vec<Id> = Vec::new();

        for (pat, exp) in from.sources {
            let exp = self.exp_to_core(exp)?;
            let pat = self.pat_to_core(pat);
            self.push_binders(&pat);
            row_binders.extend(pat.binders().into_iter().cloned());
            steps.push(FromStep::Scan { pat, exp });
        }

        let mut has_yield = false;
        for step in from.steps {
            match step {
                AstFromStep::Where(cond) => {
                    steps.push(FromStep::Where(self.exp_to_core(cond)?));
                }
                AstFromStep::Yield(exp) => {
                    steps.push(FromStep::Yield(self.exp_to_core(exp)?));
                    has_yield = true;
                }
                AstFromStep::Group { key, aggregates } => {
                    let fields =
                        group_key_fields(&key).expect("labels were derived during inference");
                    let mut keys = Vec::with_capacity(fields.len());
                    for (label, exp) in fields {
                        let exp = self.exp_to_core(exp.clone())?;
                        let id = self.fresh_id(label, exp.ty());
                        keys.push((id, exp));
                    }
                    let mut aggs = Vec::with_capacity(aggregates.len());
                    for (name, arg) in aggregates {
                        let agg = match name.as_str() {
                            "count" => Agg::Count,
                            "sum" => Agg::Sum,
                            "min" => Agg::Min,
                            "max" => Agg::Max,
                            other => unreachable!("unknown aggregate {other} passed typing"),
                        };
                        let arg = self.exp_to_core(arg)?;
                        let result_ty = match agg {
                            Agg::Count => self.ts.int(),
                            _ => arg.ty(),
                        };
                        let id = self.fresh_id(agg.name(), result_ty);
                        aggs.push((id, agg, arg));
                    }
                    // Group rebinds the row.
                    self.locals.truncate(mark);
                    row_binders.clear();
                    for (id, _) in &keys {
                        self.locals.push((id.name.clone(), id.clone()));
                        row_binders.push(id.clone());
                    }
                    for (id, _, _) in &aggs {
                        self.locals.push((id.name.clone(), id.clone()));
                        row_binders.push(id.clone());
                    }
                    steps.push(FromStep::Group { keys, aggs });
                }
            }
        }

        if !has_yield {
            let exp = if row_binders.len() == 1 {
                Exp::Id(row_binders[0].clone())
            } else {
                let mut fields: Vec<(String, Exp)> = row_binders
                    .iter()
                    .map(|id| (id.name.clone(), Exp::Id(id.clone())))
                    .collect();
                fields.sort_by(|(a, _), (b, _)| a.cmp(b));
                Exp::Record {
                    fields,
                    ty: elem.clone(),
                }
            };
            steps.push(FromStep::Yield(exp));
        }

        self.locals.truncate(mark);
        Ok(Exp::From {
            steps,
            elem,
            ty,
            pos,
        })
    }

    // --- patterns ---

    pub fn pat_to_core(&mut self, pat: Pattern<Type>) -> Pat {
        match pat {
            Pattern::Wildcard(w) => Pat::Wildcard(self.resolve_ty(&w.info)),
            Pattern::Ident(id) => {
                let ty = self.resolve_ty(&id.info);
                Pat::Id(self.fresh_id(id.name, ty))
            }
            Pattern::Literal(lit) => Pat::Literal {
                value: lit.value,
                ty: self.resolve_ty(&lit.info),
            },
            Pattern::Ctor(ctor) => {
                let ty = self.resolve_ty(&ctor.info);
                let def = self
                    .ts
                    .lookup_ctor(&ctor.name)
                    .expect("constructor resolved during typing")
                    .clone();
                Pat::Ctor {
                    name: ctor.name,
                    ordinal: def.ordinal,
                    datatype: def.datatype,
                    arg: ctor.arg.map(|p| Box::new(self.pat_to_core(*p))),
                    ty,
                }
            }
            Pattern::Tuple(t) => {
                let ty = self.resolve_ty(&t.info);
                Pat::Tuple {
                    items: t.items.into_iter().map(|p| self.pat_to_core(p)).collect(),
                    ty,
                }
            }
            Pattern::Record(r) => self.record_pat_to_core(r),
            Pattern::List(l) => {
                // [p1, ..., pn] is p1 :: ... :: pn :: nil.
                let list_ty = self.resolve_ty(&l.info);
                let mut pat = Pat::Nil(list_ty.clone());
                for item in l.items.into_iter().rev() {
                    let head = self.pat_to_core(item);
                    pat = Pat::Cons {
                        head: Box::new(head),
                        tail: Box::new(pat),
                        ty: list_ty.clone(),
                    };
                }
                pat
            }
            Pattern::Cons(c) => {
                let ty = self.resolve_ty(&c.info);
                Pat::Cons {
                    head: Box::new(self.pat_to_core(*c.head)),
                    tail: Box::new(self.pat_to_core(*c.tail)),
                    ty,
                }
            }
            Pattern::Layered(l) => {
                let ty = self.resolve_ty(&l.info);
                let id = self.fresh_id(l.name, ty.clone());
                Pat::Layered {
                    id,
                    pat: Box::new(self.pat_to_core(*l.pat)),
                    ty,
                }
            }
            Pattern::Annotated(a) => self.pat_to_core(*a.pat),
        }
    }

    /// Record patterns expand to the record's full, sorted label set;
    /// labels not mentioned (under `...`) become wildcards.
    fn record_pat_to_core(&mut self, r: crate::ast::pattern::RecordPat<Type>) -> Pat {
        let ty = self.resolve_ty(&r.info);
        let all_fields: Vec<(String, Type)> = match &*ty {
            TypeKind::Record(fields) => fields.clone(),
            _ => unreachable!("record pattern has a record type"),
        };
        let mut given: Vec<(String, Option<Pattern<Type>>)> = r.fields;
        let mut fields = Vec::with_capacity(all_fields.len());
        for (label, field_ty) in all_fields {
            let position = given.iter().position(|(l, _)| *l == label);
            let pat = match position {
                Some(i) => {
                    let (_, pat) = given.remove(i);
                    match pat {
                        Some(p) => self.pat_to_core(p),
                        // `{x, ...}` shorthand binds the label itself.
                        None => Pat::Id(self.fresh_id(label.clone(), field_ty)),
                    }
                }
                None => Pat::Wildcard(field_ty),
            };
            fields.push((label, pat));
        }
        Pat::Record { fields, ty }
    }
}

/// Syntactic legality of recursion, checked before type resolution:
/// every `val rec` binding must bind a plain (possibly annotated)
/// variable to a lambda.
pub fn check_recursion(stmt: &Statement<()>) -> Result<(), CompileError> {
    match stmt {
        Statement::Expression(e) => check_recursion_exp(e),
        Statement::Decl(d) => check_recursion_decl(d),
    }
}

fn check_recursion_decl(decl: &AstDecl<()>) -> Result<(), CompileError> {
    match decl {
        AstDecl::Val(val) => {
            for bind in &val.binds {
                if val.rec {
                    let ok = rec_bind_name(&bind.pat).is_some()
                        && matches!(bind.exp, Expr::Fn(_));
                    if !ok {
                        return Err(CompileError::IllegalRecursion {
                            span: bind.position.clone(),
                        });
                    }
                }
                check_recursion_exp(&bind.exp)?;
            }
            Ok(())
        }
        AstDecl::Fun(fun) => {
            for clause in &fun.clauses {
                check_recursion_exp(&clause.body)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_recursion_exp(exp: &Expr<()>) -> Result<(), CompileError> {
    match exp {
        Expr::Literal(_) | Expr::Ident(_) | Expr::Selector(_) => Ok(()),
        Expr::Tuple(t) => t.items.iter().try_for_each(check_recursion_exp),
        Expr::Record(r) => r
            .fields
            .iter()
            .try_for_each(|(_, e)| check_recursion_exp(e)),
        Expr::List(l) => l.items.iter().try_for_each(check_recursion_exp),
        Expr::Apply(a) => {
            check_recursion_exp(&a.func)?;
            check_recursion_exp(&a.arg)
        }
        Expr::Infix(i) => {
            check_recursion_exp(&i.left)?;
            check_recursion_exp(&i.right)
        }
        Expr::Negate(n) => check_recursion_exp(&n.operand),
        Expr::If(i) => {
            check_recursion_exp(&i.condition)?;
            check_recursion_exp(&i.then_branch)?;
            check_recursion_exp(&i.else_branch)
        }
        Expr::Let(l) => {
            for d in &l.decls {
                check_recursion_decl(d)?;
            }
            check_recursion_exp(&l.body)
        }
        Expr::Fn(f) => f.arms.iter().try_for_each(|a| check_recursion_exp(&a.exp)),
        Expr::Case(c) => {
            check_recursion_exp(&c.scrutinee)?;
            c.arms.iter().try_for_each(|a| check_recursion_exp(&a.exp))
        }
        Expr::Raise(r) => check_recursion_exp(&r.exp),
        Expr::Handle(h) => {
            check_recursion_exp(&h.exp)?;
            h.arms.iter().try_for_each(|a| check_recursion_exp(&a.exp))
        }
        Expr::From(f) => {
            for (_, e) in &f.sources {
                check_recursion_exp(e)?;
            }
            for step in &f.steps {
                match step {
                    AstFromStep::Where(e) | AstFromStep::Yield(e) => check_recursion_exp(e)?,
                    AstFromStep::Group { key, aggregates } => {
                        check_recursion_exp(key)?;
                        for (_, e) in aggregates {
                            check_recursion_exp(e)?;
                        }
                    }
                }
            }
            Ok(())
        }
        Expr::Annotated(a) => check_recursion_exp(&a.exp),
    }
}
