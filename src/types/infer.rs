//! TypeResolver: Hindley-Milner inference over the surface AST.
//!
//! A single bidirectional pass rewrites `Statement<()>` into
//! `Statement<Type>`; the `info` slot of every node is the type map.
//! Let-bound values generalise under the Mini-ML value restriction:
//! only syntactic values quantify their free variables. Record field
//! selection and `...` record patterns produce deferred field
//! constraints, solved once the whole statement has been walked.

use std::collections::{HashMap, HashSet};

use lachs::Span;

use crate::ast::expression::{
    self as aexp, Apply, BinOp, CaseExpr, Expr, FnExpr, FromExpr, FromStep, HandleExpr, IfExpr,
    InfixExpr, LetExpr, Literal, LiteralExpr, MatchArm, Negate, RaiseExpr, RecordExpr, TupleExpr,
};
use crate::ast::pattern::{
    AnnotatedPat, ConsPat, CtorPat, IdentPat, LayeredPat, ListPat, LiteralPat, Pattern, RecordPat,
    TuplePat, WildcardPat,
};
use crate::ast::statement::{Decl, FunDecl, Statement, ValBind, ValDecl};
use crate::env::Environment;
use crate::eval::builtins::Builtin;

use super::error::TypeError;
use super::ty::{Type, TypeKind, TypeScheme, TypeVar};
use super::TypeSystem;

/// The bundle produced by a successful type resolution.
pub struct Resolved {
    pub node: Statement<Type>,
    pub env: Environment,
}

impl Resolved {
    /// Type of the statement when it is a bare expression.
    pub fn exp_type(&self) -> Option<Type> {
        match &self.node {
            Statement::Expression(e) => Some(e.info().clone()),
            Statement::Decl(_) => None,
        }
    }
}

pub fn deduce_type(
    env: &Environment,
    statement: Statement<()>,
    ts: &mut TypeSystem,
) -> Result<Resolved, TypeError> {
    let mut resolver = TypeResolver::new(ts, env);
    let node = resolver.infer_statement(statement)?;
    resolver.solve_constraints()?;
    Ok(Resolved {
        node,
        env: env.clone(),
    })
}

/// A deferred obligation: `record` has a field `label` of type
/// `result`. Solved once enough of `record` is known.
struct FieldConstraint {
    record: Type,
    label: String,
    result: Type,
    span: Span,
    solved: bool,
}

pub struct TypeResolver<'a> {
    ts: &'a mut TypeSystem,
    env: &'a Environment,
    /// Scope stack of local bindings.
    locals: Vec<(String, TypeScheme)>,
    /// Surface type variables of the current statement.
    tyvars: HashMap<String, Type>,
    constraints: Vec<FieldConstraint>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(ts: &'a mut TypeSystem, env: &'a Environment) -> Self {
        TypeResolver {
            ts,
            env,
            locals: Vec::new(),
            tyvars: HashMap::new(),
            constraints: Vec::new(),
        }
    }

    pub fn infer_statement(&mut self, stmt: Statement<()>) -> Result<Statement<Type>, TypeError> {
        match stmt {
            Statement::Expression(e) => Ok(Statement::Expression(self.infer_expr(e)?)),
            Statement::Decl(d) => Ok(Statement::Decl(self.infer_decl(d)?)),
        }
    }

    // --- declarations ---

    pub fn infer_decl(&mut self, decl: Decl<()>) -> Result<Decl<Type>, TypeError> {
        match decl {
            Decl::Val(val) => {
                if val.rec {
                    self.infer_rec_val(val)
                } else {
                    self.infer_nonrec_val(val)
                }
            }
            Decl::Fun(fun) => {
                let val = desugar_fun(fun);
                self.infer_rec_val(val)
            }
            Decl::Datatype(d) => {
                let schemes = self.ts.declare_datatype(&d)?;
                for (name, scheme) in schemes {
                    self.locals.push((name, scheme));
                }
                Ok(Decl::Datatype(d))
            }
            Decl::Exception(d) => {
                let scheme = self.ts.declare_exception(&d.name, d.param.as_ref())?;
                self.locals.push((d.name.clone(), scheme));
                Ok(Decl::Exception(d))
            }
            Decl::TypeAlias(d) => {
                self.ts.declare_alias(&d);
                Ok(Decl::TypeAlias(d))
            }
        }
    }

    fn infer_nonrec_val(&mut self, decl: ValDecl<()>) -> Result<Decl<Type>, TypeError> {
        let mut typed_binds = Vec::new();
        let mut new_locals = Vec::new();
        for bind in decl.binds {
            let exp = self.infer_expr(bind.exp)?;
            let ty = exp.info().clone();
            let mut bound = Vec::new();
            let pat = self.infer_pattern(bind.pat, &ty, &mut bound)?;
            let generalise = self.is_syntactic_value(&exp);
            for (name, bty) in bound {
                let scheme = if generalise {
                    self.generalize(&bty)
                } else {
                    self.ts.monomorphic(&bty)
                };
                new_locals.push((name, scheme));
            }
            typed_binds.push(ValBind {
                pat,
                exp,
                position: bind.position,
            });
        }
        // `and`-joined bindings become visible simultaneously.
        self.locals.extend(new_locals);
        Ok(Decl::Val(ValDecl {
            rec: false,
            binds: typed_binds,
            position: decl.position,
        }))
    }

    fn infer_rec_val(&mut self, decl: ValDecl<()>) -> Result<Decl<Type>, TypeError> {
        let mark = self.locals.len();
        let mut names = Vec::new();
        for bind in &decl.binds {
            let name = rec_bind_name(&bind.pat).ok_or_else(|| {
                TypeError::unbound("<recursive binding>", bind.position.clone())
            })?;
            let var = self.ts.fresh_var(false);
            self.locals
                .push((name.clone(), TypeScheme::monomorphic(var.clone())));
            names.push((name, var));
        }
        let mut typed_binds = Vec::new();
        for (bind, (_, var)) in decl.binds.into_iter().zip(&names) {
            let exp = self.infer_expr(bind.exp)?;
            self.ts
                .unify(var, &exp.info().clone(), &bind.position)?;
            let pat_ty = exp.info().clone();
            let mut bound = Vec::new();
            let pat = self.infer_pattern(bind.pat, &pat_ty, &mut bound)?;
            typed_binds.push(ValBind {
                pat,
                exp,
                position: bind.position,
            });
        }
        // Replace the monomorphic assumptions with generalised schemes.
        self.locals.truncate(mark);
        for (name, var) in names {
            let scheme = self.generalize(&var);
            self.locals.push((name, scheme));
        }
        Ok(Decl::Val(ValDecl {
            rec: true,
            binds: typed_binds,
            position: decl.position,
        }))
    }

    // --- expressions ---

    pub fn infer_expr(&mut self, exp: Expr<()>) -> Result<Expr<Type>, TypeError> {
        match exp {
            Expr::Literal(lit) => {
                let ty = self.literal_type(&lit.value);
                Ok(Expr::Literal(LiteralExpr {
                    value: lit.value,
                    position: lit.position,
                    info: ty,
                }))
            }
            Expr::Ident(id) => self.infer_ident(id),
            Expr::Selector(sel) => {
                let record = self.ts.fresh_var(false);
                let result = self.ts.fresh_var(false);
                self.constraints.push(FieldConstraint {
                    record: record.clone(),
                    label: sel.label.clone(),
                    result: result.clone(),
                    span: sel.position.clone(),
                    solved: false,
                });
                let ty = self.ts.fn_type(record, result);
                Ok(Expr::Selector(aexp::Selector {
                    label: sel.label,
                    position: sel.position,
                    info: ty,
                }))
            }
            Expr::Tuple(t) => {
                let mut items = Vec::with_capacity(t.items.len());
                for item in t.items {
                    items.push(self.infer_expr(item)?);
                }
                let tys: Vec<Type> = items.iter().map(|i| i.info().clone()).collect();
                let ty = self.ts.tuple_type(tys);
                Ok(Expr::Tuple(TupleExpr {
                    items,
                    position: t.position,
                    info: ty,
                }))
            }
            Expr::Record(r) => {
                let mut fields = Vec::with_capacity(r.fields.len());
                let mut labels = HashSet::new();
                for (label, field) in r.fields {
                    if !labels.insert(label.clone()) {
                        return Err(TypeError::mismatch(
                            self.ts.unit(),
                            self.ts.unit(),
                            r.position.clone(),
                        )
                        .with_context(format!("duplicate record label {label}")));
                    }
                    fields.push((label, self.infer_expr(field)?));
                }
                let tys: Vec<(String, Type)> = fields
                    .iter()
                    .map(|(l, e)| (l.clone(), e.info().clone()))
                    .collect();
                let ty = self.ts.record_type(tys);
                Ok(Expr::Record(RecordExpr {
                    fields,
                    position: r.position,
                    info: ty,
                }))
            }
            Expr::List(l) => {
                let elem = self.ts.fresh_var(false);
                let mut items = Vec::with_capacity(l.items.len());
                for item in l.items {
                    let item = self.infer_expr(item)?;
                    self.ts.unify(&elem, &item.info().clone(), &item.position())?;
                    items.push(item);
                }
                let ty = self.ts.list_type(elem);
                Ok(Expr::List(aexp::ListExpr {
                    items,
                    position: l.position,
                    info: ty,
                }))
            }
            Expr::Apply(app) => {
                let func = self.infer_expr(*app.func)?;
                let arg = self.infer_expr(*app.arg)?;
                let result = self.ts.fresh_var(false);
                let expected = self.ts.fn_type(arg.info().clone(), result.clone());
                self.ts
                    .unify(&func.info().clone(), &expected, &app.position)?;
                Ok(Expr::Apply(Apply {
                    func: Box::new(func),
                    arg: Box::new(arg),
                    position: app.position,
                    info: result,
                }))
            }
            Expr::Infix(infix) => self.infer_infix(infix),
            Expr::Negate(neg) => {
                let operand = self.infer_expr(*neg.operand)?;
                let n = self.ts.fresh_numeric_var();
                self.ts
                    .unify(&n, &operand.info().clone(), &neg.position)?;
                Ok(Expr::Negate(Negate {
                    operand: Box::new(operand),
                    position: neg.position,
                    info: n,
                }))
            }
            Expr::If(ife) => {
                let cond = self.infer_expr(*ife.condition)?;
                let bool_ty = self.ts.bool();
                self.ts
                    .unify(&cond.info().clone(), &bool_ty, &cond.position())?;
                let then_branch = self.infer_expr(*ife.then_branch)?;
                let else_branch = self.infer_expr(*ife.else_branch)?;
                self.ts.unify(
                    &then_branch.info().clone(),
                    &else_branch.info().clone(),
                    &ife.position,
                )?;
                let ty = then_branch.info().clone();
                Ok(Expr::If(IfExpr {
                    condition: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                    position: ife.position,
                    info: ty,
                }))
            }
            Expr::Let(le) => {
                let mark = self.locals.len();
                let mut decls = Vec::with_capacity(le.decls.len());
                for d in le.decls {
                    decls.push(self.infer_decl(d)?);
                }
                let body = self.infer_expr(*le.body)?;
                self.locals.truncate(mark);
                let ty = body.info().clone();
                Ok(Expr::Let(LetExpr {
                    decls,
                    body: Box::new(body),
                    position: le.position,
                    info: ty,
                }))
            }
            Expr::Fn(fne) => {
                let param = self.ts.fresh_var(false);
                let result = self.ts.fresh_var(false);
                let mut arms = Vec::with_capacity(fne.arms.len());
                for arm in fne.arms {
                    arms.push(self.infer_arm(arm, &param, &result)?);
                }
                let ty = self.ts.fn_type(param, result);
                Ok(Expr::Fn(FnExpr {
                    arms,
                    position: fne.position,
                    info: ty,
                }))
            }
            Expr::Case(case) => {
                let scrutinee = self.infer_expr(*case.scrutinee)?;
                let scrutinee_ty = scrutinee.info().clone();
                let result = self.ts.fresh_var(false);
                let mut arms = Vec::with_capacity(case.arms.len());
                for arm in case.arms {
                    arms.push(self.infer_arm(arm, &scrutinee_ty, &result)?);
                }
                Ok(Expr::Case(CaseExpr {
                    scrutinee: Box::new(scrutinee),
                    arms,
                    position: case.position,
                    info: result,
                }))
            }
            Expr::Raise(raise) => {
                let exp = self.infer_expr(*raise.exp)?;
                let exn = self.ts.exn_type();
                self.ts.unify(&exp.info().clone(), &exn, &raise.position)?;
                let ty = self.ts.fresh_var(false);
                Ok(Expr::Raise(RaiseExpr {
                    exp: Box::new(exp),
                    position: raise.position,
                    info: ty,
                }))
            }
            Expr::Handle(handle) => {
                let body = self.infer_expr(*handle.exp)?;
                let result = body.info().clone();
                let exn = self.ts.exn_type();
                let mut arms = Vec::with_capacity(handle.arms.len());
                for arm in handle.arms {
                    arms.push(self.infer_arm(arm, &exn, &result)?);
                }
                Ok(Expr::Handle(HandleExpr {
                    exp: Box::new(body),
                    arms,
                    position: handle.position,
                    info: result,
                }))
            }
            Expr::From(from) => self.infer_from(from),
            Expr::Annotated(ann) => {
                let exp = self.infer_expr(*ann.exp)?;
                let mut tyvars = std::mem::take(&mut self.tyvars);
                let annotated = self.ts.resolve_ty(&ann.ty, &mut tyvars);
                self.tyvars = tyvars;
                let annotated = annotated?;
                self.ts
                    .unify(&annotated, &exp.info().clone(), &ann.position)?;
                Ok(Expr::Annotated(aexp::AnnotatedExpr {
                    exp: Box::new(exp),
                    ty: ann.ty,
                    position: ann.position,
                    info: annotated,
                }))
            }
        }
    }

    fn infer_ident(&mut self, id: aexp::Ident<()>) -> Result<Expr<Type>, TypeError> {
        // `nil` is the empty list in expression position.
        if id.value == "nil" {
            let elem = self.ts.fresh_var(false);
            let ty = self.ts.list_type(elem);
            return Ok(Expr::List(aexp::ListExpr {
                items: Vec::new(),
                position: id.position,
                info: ty,
            }));
        }
        let ty = self.lookup(&id.value, &id.position)?;
        Ok(Expr::Ident(aexp::Ident {
            value: id.value,
            position: id.position,
            info: ty,
        }))
    }

    fn infer_infix(&mut self, infix: InfixExpr<()>) -> Result<Expr<Type>, TypeError> {
        let left = self.infer_expr(*infix.left)?;
        let right = self.infer_expr(*infix.right)?;
        let ty = match infix.op {
            BinOp::Andalso | BinOp::Orelse => {
                let bool_ty = self.ts.bool();
                self.ts
                    .unify(&left.info().clone(), &bool_ty, &left.position())?;
                self.ts
                    .unify(&right.info().clone(), &bool_ty, &right.position())?;
                bool_ty
            }
            op => {
                let builtin = Builtin::of_binop(op)
                    .expect("every non-lazy operator has a builtin");
                let op_ty = builtin.instantiate_type(self.ts);
                let result = self.ts.fresh_var(false);
                let operands = self
                    .ts
                    .tuple_type(vec![left.info().clone(), right.info().clone()]);
                let expected = self.ts.fn_type(operands, result.clone());
                self.ts.unify(&op_ty, &expected, &infix.position)?;
                result
            }
        };
        Ok(Expr::Infix(InfixExpr {
            op: infix.op,
            left: Box::new(left),
            right: Box::new(right),
            position: infix.position,
            info: ty,
        }))
    }

    fn infer_arm(
        &mut self,
        arm: MatchArm<()>,
        scrutinee_ty: &Type,
        result_ty: &Type,
    ) -> Result<MatchArm<Type>, TypeError> {
        let mark = self.locals.len();
        let mut bound = Vec::new();
        let pat = self.infer_pattern(arm.pat, scrutinee_ty, &mut bound)?;
        for (name, ty) in bound {
            self.locals.push((name, TypeScheme::monomorphic(ty)));
        }
        let exp = self.infer_expr(arm.exp)?;
        self.ts
            .unify(result_ty, &exp.info().clone(), &exp.position())?;
        self.locals.truncate(mark);
        Ok(MatchArm {
            pat,
            exp,
            position: arm.position,
        })
    }

    fn infer_from(&mut self, from: FromExpr<()>) -> Result<Expr<Type>, TypeError> {
        let mark = self.locals.len();
        let mut from_names: Vec<String> = Vec::new();
        let mut sources = Vec::with_capacity(from.sources.len());
        for (pat, exp) in from.sources {
            let exp = self.infer_expr(exp)?;
            let elem = self.ts.fresh_var(false);
            let expected = self.ts.list_type(elem.clone());
            self.ts
                .unify(&exp.info().clone(), &expected, &exp.position())?;
            let mut bound = Vec::new();
            let pat = self.infer_pattern(pat, &elem, &mut bound)?;
            for (name, ty) in bound {
                from_names.push(name.clone());
                self.locals.push((name, TypeScheme::monomorphic(ty)));
            }
            sources.push((pat, exp));
        }

        let mut yield_ty: Option<Type> = None;
        let mut steps = Vec::with_capacity(from.steps.len());
        for step in from.steps {
            match step {
                FromStep::Where(cond) => {
                    let cond = self.infer_expr(cond)?;
                    let bool_ty = self.ts.bool();
                    self.ts
                        .unify(&cond.info().clone(), &bool_ty, &cond.position())?;
                    steps.push(FromStep::Where(cond));
                }
                FromStep::Yield(exp) => {
                    let exp = self.infer_expr(exp)?;
                    yield_ty = Some(exp.info().clone());
                    steps.push(FromStep::Yield(exp));
                }
                FromStep::Group { key, aggregates } => {
                    let key = self.infer_expr(key)?;
                    let fields = aexp::group_key_fields(&key).ok_or_else(|| {
                        TypeError::mismatch(self.ts.unit(), key.info().clone(), key.position())
                            .with_context("cannot derive a label for this group key")
                    })?;
                    let key_fields: Vec<(String, Type)> = fields
                        .iter()
                        .map(|(l, e)| (l.clone(), e.info().clone()))
                        .collect();
                    let mut aggs = Vec::with_capacity(aggregates.len());
                    let mut agg_fields = Vec::new();
                    for (agg_name, arg) in aggregates {
                        let arg = self.infer_expr(arg)?;
                        let result = match agg_name.as_str() {
                            "count" => self.ts.int(),
                            "sum" => {
                                let n = self.ts.fresh_numeric_var();
                                self.ts.unify(&n, &arg.info().clone(), &arg.position())?;
                                n
                            }
                            "min" | "max" => {
                                let n = self.ts.fresh_ordered_var();
                                self.ts.unify(&n, &arg.info().clone(), &arg.position())?;
                                n
                            }
                            other => {
                                return Err(TypeError::unbound(other, arg.position()));
                            }
                        };
                        agg_fields.push((agg_name.clone(), result));
                        aggs.push((agg_name, arg));
                    }
                    // The group rebinds the row: keys and aggregates
                    // replace the scan variables.
                    self.locals.truncate(mark);
                    from_names.clear();
                    for (name, ty) in key_fields.iter().chain(&agg_fields) {
                        from_names.push(name.clone());
                        self.locals
                            .push((name.clone(), TypeScheme::monomorphic(ty.clone())));
                    }
                    steps.push(FromStep::Group {
                        key,
                        aggregates: aggs,
                    });
                }
            }
        }

        let elem = match yield_ty {
            Some(ty) => ty,
            None => {
                if from_names.len() == 1 {
                    let (_, scheme) = self
                        .locals
                        .iter()
                        .rev()
                        .find(|(n, _)| *n == from_names[0])
                        .expect("from binder is in scope")
                        .clone();
                    scheme.ty
                } else {
                    let fields: Vec<(String, Type)> = from_names
                        .iter()
                        .map(|name| {
                            let scheme = self
                                .locals
                                .iter()
                                .rev()
                                .find(|(n, _)| n == name)
                                .expect("from binder is in scope")
                                .1
                                .clone();
                            (name.clone(), scheme.ty)
                        })
                        .collect();
                    self.ts.record_type(fields)
                }
            }
        };
        self.locals.truncate(mark);
        let ty = self.ts.list_type(elem);
        Ok(Expr::From(FromExpr {
            sources,
            steps,
            position: from.position,
            info: ty,
        }))
    }

    // --- patterns ---

    pub fn infer_pattern(
        &mut self,
        pat: Pattern<()>,
        expected: &Type,
        bound: &mut Vec<(String, Type)>,
    ) -> Result<Pattern<Type>, TypeError> {
        match pat {
            Pattern::Wildcard(w) => Ok(Pattern::Wildcard(WildcardPat {
                position: w.position,
                info: expected.clone(),
            })),
            Pattern::Ident(id) => {
                if id.name == "nil" {
                    let elem = self.ts.fresh_var(false);
                    let list = self.ts.list_type(elem);
                    self.ts.unify(expected, &list, &id.position)?;
                    return Ok(Pattern::List(ListPat {
                        items: Vec::new(),
                        position: id.position,
                        info: list,
                    }));
                }
                if self.ts.is_ctor(&id.name) {
                    let (result, arg) = self
                        .ts
                        .instantiate_ctor(&id.name)
                        .expect("constructor just looked up");
                    if arg.is_some() {
                        return Err(TypeError::arity_mismatch(
                            id.name.clone(),
                            1,
                            0,
                            id.position.clone(),
                        ));
                    }
                    self.ts.unify(expected, &result, &id.position)?;
                    return Ok(Pattern::Ctor(CtorPat {
                        name: id.name,
                        arg: None,
                        position: id.position,
                        info: result,
                    }));
                }
                bound.push((id.name.clone(), expected.clone()));
                Ok(Pattern::Ident(IdentPat {
                    name: id.name,
                    position: id.position,
                    info: expected.clone(),
                }))
            }
            Pattern::Literal(lit) => {
                let ty = self.literal_type(&lit.value);
                self.ts.unify(expected, &ty, &lit.position)?;
                Ok(Pattern::Literal(LiteralPat {
                    value: lit.value,
                    position: lit.position,
                    info: ty,
                }))
            }
            Pattern::Ctor(ctor) => {
                let (result, arg_ty) = self
                    .ts
                    .instantiate_ctor(&ctor.name)
                    .ok_or_else(|| TypeError::unbound(ctor.name.clone(), ctor.position.clone()))?;
                self.ts.unify(expected, &result, &ctor.position)?;
                let arg = match (ctor.arg, arg_ty) {
                    (Some(pat), Some(ty)) => {
                        Some(Box::new(self.infer_pattern(*pat, &ty, bound)?))
                    }
                    (None, None) => None,
                    (given, _) => {
                        let found = usize::from(given.is_some());
                        return Err(TypeError::arity_mismatch(
                            ctor.name.clone(),
                            1 - found,
                            found,
                            ctor.position.clone(),
                        ));
                    }
                };
                Ok(Pattern::Ctor(CtorPat {
                    name: ctor.name,
                    arg,
                    position: ctor.position,
                    info: result,
                }))
            }
            Pattern::Tuple(t) => {
                let vars: Vec<Type> = t.items.iter().map(|_| self.ts.fresh_var(false)).collect();
                let tuple = self.ts.tuple_type(vars.clone());
                self.ts.unify(expected, &tuple, &t.position)?;
                let mut items = Vec::with_capacity(t.items.len());
                for (item, ty) in t.items.into_iter().zip(vars) {
                    items.push(self.infer_pattern(item, &ty, bound)?);
                }
                Ok(Pattern::Tuple(TuplePat {
                    items,
                    position: t.position,
                    info: tuple,
                }))
            }
            Pattern::Record(r) => self.infer_record_pattern(r, expected, bound),
            Pattern::List(l) => {
                let elem = self.ts.fresh_var(false);
                let list = self.ts.list_type(elem.clone());
                self.ts.unify(expected, &list, &l.position)?;
                let mut items = Vec::with_capacity(l.items.len());
                for item in l.items {
                    items.push(self.infer_pattern(item, &elem, bound)?);
                }
                Ok(Pattern::List(ListPat {
                    items,
                    position: l.position,
                    info: list,
                }))
            }
            Pattern::Cons(c) => {
                let elem = self.ts.fresh_var(false);
                let list = self.ts.list_type(elem.clone());
                self.ts.unify(expected, &list, &c.position)?;
                let head = self.infer_pattern(*c.head, &elem, bound)?;
                let tail = self.infer_pattern(*c.tail, &list, bound)?;
                Ok(Pattern::Cons(ConsPat {
                    head: Box::new(head),
                    tail: Box::new(tail),
                    position: c.position,
                    info: list,
                }))
            }
            Pattern::Layered(l) => {
                bound.push((l.name.clone(), expected.clone()));
                let pat = self.infer_pattern(*l.pat, expected, bound)?;
                Ok(Pattern::Layered(LayeredPat {
                    name: l.name,
                    pat: Box::new(pat),
                    position: l.position,
                    info: expected.clone(),
                }))
            }
            Pattern::Annotated(a) => {
                let mut tyvars = std::mem::take(&mut self.tyvars);
                let annotated = self.ts.resolve_ty(&a.ty, &mut tyvars);
                self.tyvars = tyvars;
                let annotated = annotated?;
                self.ts.unify(expected, &annotated, &a.position)?;
                let pat = self.infer_pattern(*a.pat, &annotated, bound)?;
                Ok(Pattern::Annotated(AnnotatedPat {
                    pat: Box::new(pat),
                    ty: a.ty,
                    position: a.position,
                    info: annotated,
                }))
            }
        }
    }

    fn infer_record_pattern(
        &mut self,
        r: RecordPat<()>,
        expected: &Type,
        bound: &mut Vec<(String, Type)>,
    ) -> Result<Pattern<Type>, TypeError> {
        if r.ellipsis {
            // Partial pattern: each listed field becomes a deferred
            // constraint against the scrutinee's record type.
            let mut fields = Vec::with_capacity(r.fields.len());
            for (label, pat) in r.fields {
                let field_ty = self.ts.fresh_var(false);
                self.constraints.push(FieldConstraint {
                    record: expected.clone(),
                    label: label.clone(),
                    result: field_ty.clone(),
                    span: r.position.clone(),
                    solved: false,
                });
                let pat = match pat {
                    Some(p) => Some(self.infer_pattern(p, &field_ty, bound)?),
                    None => {
                        bound.push((label.clone(), field_ty.clone()));
                        None
                    }
                };
                fields.push((label, pat));
            }
            Ok(Pattern::Record(RecordPat {
                fields,
                ellipsis: true,
                position: r.position,
                info: expected.clone(),
            }))
        } else {
            let field_tys: Vec<(String, Type)> = r
                .fields
                .iter()
                .map(|(l, _)| (l.clone(), self.ts.fresh_var(false)))
                .collect();
            let record = self.ts.record_type(field_tys.clone());
            self.ts.unify(expected, &record, &r.position)?;
            let mut fields = Vec::with_capacity(r.fields.len());
            for (label, pat) in r.fields {
                let field_ty = field_tys
                    .iter()
                    .find(|(l, _)| *l == label)
                    .expect("label listed above")
                    .1
                    .clone();
                let pat = match pat {
                    Some(p) => Some(self.infer_pattern(p, &field_ty, bound)?),
                    None => {
                        bound.push((label.clone(), field_ty.clone()));
                        None
                    }
                };
                fields.push((label, pat));
            }
            Ok(Pattern::Record(RecordPat {
                fields,
                ellipsis: false,
                position: r.position,
                info: record,
            }))
        }
    }

    // --- helpers ---

    fn literal_type(&mut self, literal: &Literal) -> Type {
        match literal {
            Literal::Unit => self.ts.unit(),
            Literal::Bool(_) => self.ts.bool(),
            Literal::Int(_) => self.ts.int(),
            Literal::Real(_) => self.ts.real(),
            Literal::String(_) => self.ts.string(),
            Literal::Char(_) => self.ts.char(),
        }
    }

    fn lookup(&mut self, name: &str, span: &Span) -> Result<Type, TypeError> {
        if let Some((_, scheme)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            let scheme = scheme.clone();
            return Ok(self.ts.instantiate(&scheme));
        }
        if self.ts.is_ctor(name) {
            let (result, arg) = self
                .ts
                .instantiate_ctor(name)
                .expect("constructor just looked up");
            return Ok(match arg {
                Some(arg) => self.ts.fn_type(arg, result),
                None => result,
            });
        }
        if let Some(binding) = self.env.lookup(name) {
            let scheme = binding.scheme.clone();
            return Ok(self.ts.instantiate(&scheme));
        }
        if let Some(builtin) = Builtin::by_name(name) {
            return Ok(builtin.instantiate_type(self.ts));
        }
        Err(TypeError::unbound(name, span.clone()))
    }

    /// Generalise against the free variables of the local scope.
    fn generalize(&mut self, ty: &Type) -> TypeScheme {
        let env_free = self.env_free_vars();
        self.ts.generalize(&env_free, ty)
    }

    fn env_free_vars(&mut self) -> HashSet<TypeVar> {
        let schemes: Vec<TypeScheme> = self.locals.iter().map(|(_, s)| s.clone()).collect();
        let mut out = HashSet::new();
        for scheme in schemes {
            let resolved = self.ts.resolve(&scheme.ty);
            let mut free = resolved.free_type_vars();
            for sv in &scheme.vars {
                free.remove(&sv.var);
            }
            out.extend(free);
        }
        out
    }

    fn is_syntactic_value(&self, exp: &Expr<Type>) -> bool {
        match exp {
            Expr::Literal(_) | Expr::Ident(_) | Expr::Selector(_) | Expr::Fn(_) => true,
            Expr::Tuple(t) => t.items.iter().all(|i| self.is_syntactic_value(i)),
            Expr::Record(r) => r.fields.iter().all(|(_, e)| self.is_syntactic_value(e)),
            Expr::List(l) => l.items.iter().all(|i| self.is_syntactic_value(i)),
            Expr::Apply(app) => match &*app.func {
                Expr::Ident(id) => {
                    self.ts.is_ctor(&id.value) && self.is_syntactic_value(&app.arg)
                }
                _ => false,
            },
            Expr::Annotated(a) => self.is_syntactic_value(&a.exp),
            _ => false,
        }
    }

    /// Solve deferred field constraints, iterating while record types
    /// become known.
    pub fn solve_constraints(&mut self) -> Result<(), TypeError> {
        loop {
            let mut progress = false;
            let mut pending = std::mem::take(&mut self.constraints);
            for c in pending.iter_mut() {
                if c.solved {
                    continue;
                }
                let head = self.ts.resolve(&c.record);
                match &*head {
                    TypeKind::Record(fields) => {
                        let field = fields.iter().find(|(l, _)| *l == c.label);
                        match field {
                            Some((_, ty)) => {
                                self.ts.unify(ty, &c.result, &c.span)?;
                                c.solved = true;
                                progress = true;
                            }
                            None => {
                                return Err(TypeError::mismatch(
                                    head.clone(),
                                    self.ts.resolve(&c.result),
                                    c.span.clone(),
                                )
                                .with_context(format!("no field {} in record", c.label)));
                            }
                        }
                    }
                    TypeKind::Var(_) => {}
                    _ => {
                        return Err(TypeError::mismatch(
                            head.clone(),
                            self.ts.resolve(&c.result),
                            c.span.clone(),
                        )
                        .with_context(format!("#{} needs a record type", c.label)));
                    }
                }
            }
            let unsolved = pending.iter().any(|c| !c.solved);
            self.constraints = pending;
            if !unsolved {
                return Ok(());
            }
            if !progress {
                let c = self
                    .constraints
                    .iter()
                    .find(|c| !c.solved)
                    .expect("an unsolved constraint remains");
                return Err(TypeError::mismatch(
                    self.ts.resolve(&c.record),
                    self.ts.resolve(&c.result),
                    c.span.clone(),
                )
                .with_context(format!(
                    "cannot determine the record type carrying field {}",
                    c.label
                )));
            }
        }
    }
}

/// The name a `val rec` binding introduces, when legal.
pub fn rec_bind_name<T>(pat: &Pattern<T>) -> Option<String> {
    match pat {
        Pattern::Ident(id) => Some(id.name.clone()),
        Pattern::Annotated(a) => rec_bind_name(&a.pat),
        _ => None,
    }
}

/// Expand `fun` sugar into `val rec` over nested `fn`s; multi-clause
/// functions case over a tuple of fresh parameters.
pub fn desugar_fun(decl: FunDecl<()>) -> ValDecl<()> {
    let position = decl.position.clone();
    let arity = decl.clauses[0].params.len();
    let exp = if decl.clauses.len() == 1 && arity >= 1 {
        let clause = decl.clauses.into_iter().next().expect("one clause");
        let mut body = clause.body;
        for pat in clause.params.into_iter().rev() {
            body = Expr::Fn(FnExpr {
                arms: vec![MatchArm {
                    pat,
                    exp: body,
                    position: position.clone(),
                }],
                position: position.clone(),
                info: (),
            });
        }
        body
    } else {
        // fn v$0 => ... fn v$n-1 => case (v$0, ..., v$n-1) of ...
        let param_names: Vec<String> = (0..arity).map(|i| format!("v${i}")).collect();
        let scrutinee = if arity == 1 {
            Expr::Ident(aexp::Ident {
                value: param_names[0].clone(),
                position: position.clone(),
                info: (),
            })
        } else {
            Expr::Tuple(TupleExpr {
                items: param_names
                    .iter()
                    .map(|n| {
                        Expr::Ident(aexp::Ident {
                            value: n.clone(),
                            position: position.clone(),
                            info: (),
                        })
                    })
                    .collect(),
                position: position.clone(),
                info: (),
            })
        };
        let arms = decl
            .clauses
            .into_iter()
            .map(|clause| {
                let pat = if arity == 1 {
                    clause.params.into_iter().next().expect("one parameter")
                } else {
                    Pattern::Tuple(TuplePat {
                        items: clause.params,
                        position: clause.position.clone(),
                        info: (),
                    })
                };
                MatchArm {
                    pat,
                    exp: clause.body,
                    position: clause.position,
                }
            })
            .collect();
        let mut body = Expr::Case(CaseExpr {
            scrutinee: Box::new(scrutinee),
            arms,
            position: position.clone(),
            info: (),
        });
        for name in param_names.into_iter().rev() {
            body = Expr::Fn(FnExpr {
                arms: vec![MatchArm {
                    pat: Pattern::Ident(IdentPat {
                        name,
                        position: position.clone(),
                        info: (),
                    }),
                    exp: body,
                    position: position.clone(),
                }],
                position: position.clone(),
                info: (),
            });
        }
        body
    };
    ValDecl {
        rec: true,
        binds: vec![ValBind {
            pat: Pattern::Ident(IdentPat {
                name: decl.name,
                position: position.clone(),
                info: (),
            }),
            exp,
            position: position.clone(),
        }],
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn infer(input: &str) -> Result<Resolved, TypeError> {
        let mut ts = TypeSystem::new();
        let env = Environment::empty();
        let stmt = parser::statement_eof(input).expect("parses");
        deduce_type(&env, stmt, &mut ts)
    }

    fn moniker_of(input: &str) -> String {
        let mut ts = TypeSystem::new();
        let env = Environment::empty();
        let stmt = parser::statement_eof(input).expect("parses");
        let mut resolver = TypeResolver::new(&mut ts, &env);
        let node = resolver.infer_statement(stmt).expect("types");
        resolver.solve_constraints().expect("constraints solve");
        match node {
            Statement::Expression(e) => {
                let ty = ts.resolve(e.info());
                let free = std::collections::HashSet::new();
                ts.generalize(&free, &ty).ty.moniker()
            }
            Statement::Decl(_) => panic!("expected an expression"),
        }
    }

    #[test]
    fn literals_have_primitive_types() {
        assert_eq!(moniker_of("1"), "int");
        assert_eq!(moniker_of("10.25"), "real");
        assert_eq!(moniker_of("\"a\""), "string");
        assert_eq!(moniker_of("true"), "bool");
        assert_eq!(moniker_of("()"), "unit");
    }

    #[test]
    fn arithmetic_defaults_to_int() {
        assert_eq!(moniker_of("2 + 3"), "int");
        assert_eq!(moniker_of("2.0 + 3.0"), "real");
    }

    #[test]
    fn identity_fn_generalises() {
        assert_eq!(moniker_of("fn x => x"), "'a -> 'a");
    }

    #[test]
    fn let_polymorphism() {
        assert_eq!(
            moniker_of("let val id = fn x => x in (id 1, id \"a\") end"),
            "int * string"
        );
    }

    #[test]
    fn value_restriction_blocks_generalisation() {
        // The RHS is an application, not a value, so its type variable
        // is not quantified and both uses must agree.
        let result = infer(
            "let val f = (fn x => x) (fn y => y) in (f 1, f \"a\") end",
        );
        assert!(result.is_err());
    }

    #[test]
    fn if_branches_must_agree() {
        assert!(infer("if true then 1 else \"a\"").is_err());
        assert_eq!(moniker_of("if true then 1 else 2"), "int");
    }

    #[test]
    fn application_mismatch_is_an_error() {
        assert!(infer("1 2").is_err());
        assert!(infer("2 + \"a\"").is_err());
    }

    #[test]
    fn occurs_check_fires() {
        let result = infer("fn x => x x");
        assert!(matches!(result, Err(TypeError::OccursCheck { .. })));
    }

    #[test]
    fn case_arms_unify_with_scrutinee() {
        assert_eq!(moniker_of("case 1 of 0 => \"z\" | _ => \"n\""), "string");
        assert!(infer("case 1 of \"a\" => 1 | _ => 2").is_err());
    }

    #[test]
    fn selector_resolves_through_application() {
        assert_eq!(moniker_of("#b {a = 1, b = \"x\"}"), "string");
    }

    #[test]
    fn unresolvable_selector_is_an_error() {
        assert!(infer("fn r => #a r").is_err());
    }

    #[test]
    fn equality_rejects_functions() {
        let result = infer("(fn x => x) = (fn y => y)");
        assert!(matches!(result, Err(TypeError::EqualityRequired { .. })));
    }

    #[test]
    fn cons_and_lists() {
        assert_eq!(moniker_of("1 :: [2, 3]"), "int list");
        assert_eq!(moniker_of("[] @ [1]"), "int list");
        assert!(infer("1 :: [true]").is_err());
    }

    #[test]
    fn from_defaults_to_scan_variable() {
        assert_eq!(moniker_of("from x in [1, 2, 3] where x > 1"), "int list");
    }

    #[test]
    fn from_yield_projects() {
        assert_eq!(
            moniker_of("from x in [1, 2] yield {double = x + x}"),
            "{double:int} list"
        );
    }

    #[test]
    fn raise_types_as_anything() {
        assert_eq!(
            moniker_of("let exception Oops in if true then 1 else raise Oops end"),
            "int"
        );
    }
}
