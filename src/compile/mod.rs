//! Compiler: lower optimised Core to evaluable `Code`, and the
//! statement driver tying the phases together.
//!
//! Variables compile to stable frame slots assigned here from the
//! resolver's identity tags; a nested function captures the slots of
//! its free variables, transitively. Self-recursive calls in tail
//! position compile to `SelfCall`, which the applying loop turns into
//! iteration. Decision trees from the match compiler lower to nested
//! switches whose default raises `Match` (or `Bind` for `val`
//! patterns).

use std::fmt;
use std::rc::Rc;

use crate::ast::statement::{Decl as AstDecl, Statement};
use crate::ast::Literal;
use crate::core::{Decl, Exp, FromStep, Id, IdKey, Pat, Rel};
use crate::env::{Binding, Environment};
use crate::eval::code::{
    Access, Code, FailKind, FnCode, FromCode, FromStepCode, RelCode, Switch,
};
use crate::eval::value::Value;
use crate::eval::{EvalContext, EvalError};
use crate::pos;
use crate::resolve::error::{CompileError, CompileWarning};
use crate::resolve::{check_recursion, matches, Resolver};
use crate::types::error::TypeError;
use crate::types::infer::deduce_type;
use crate::types::ty::TypeScheme;
use crate::types::TypeSystem;
use crate::{fmt::surface, opt};

/// A failure anywhere between validation and code generation.
#[derive(Debug, Clone)]
pub enum StatementError {
    Type(TypeError),
    Compile(CompileError),
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatementError::Type(e) => write!(f, "{e}"),
            StatementError::Compile(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StatementError {}

impl From<TypeError> for StatementError {
    fn from(e: TypeError) -> Self {
        StatementError::Type(e)
    }
}

impl From<CompileError> for StatementError {
    fn from(e: CompileError) -> Self {
        StatementError::Compile(e)
    }
}

/// A statement ready to run: either evaluable code with the bindings
/// it will produce, or a pure type declaration whose bindings are
/// already known.
pub enum CompiledStatement {
    Decl {
        /// The optimised Core, kept for plans and tests.
        core: Decl,
        code: Code,
        nslots: usize,
        /// Binder names, their schemes, in pattern order.
        names: Vec<String>,
        schemes: Vec<TypeScheme>,
    },
    TypeDecl {
        /// The declaration echo, e.g. `datatype 'a t = A | B of int`.
        text: String,
        bindings: Vec<Binding>,
    },
}

impl CompiledStatement {
    /// Run the statement; bindings come back in declaration order.
    pub fn eval(&self, ctx: &EvalContext) -> Result<Vec<Binding>, EvalError> {
        match self {
            CompiledStatement::TypeDecl { bindings, .. } => Ok(bindings.clone()),
            CompiledStatement::Decl {
                code,
                nslots,
                names,
                schemes,
                ..
            } => {
                let mut frame = vec![Value::Unit; *nslots];
                let result = code
                    .eval(ctx, &mut frame)
                    .map_err(EvalError::from_raised)?;
                let values: Vec<Value> = match names.len() {
                    0 => Vec::new(),
                    1 => vec![result],
                    _ => match result {
                        Value::Tuple(items) => items.iter().cloned().collect(),
                        other => vec![other],
                    },
                };
                Ok(names
                    .iter()
                    .zip(schemes)
                    .zip(values)
                    .map(|((name, scheme), value)| {
                        Binding::new(name.clone(), scheme.clone(), Some(value))
                    })
                    .collect())
            }
        }
    }

    /// The plan of the compiled code, for tests.
    pub fn plan(&self) -> String {
        match self {
            CompiledStatement::Decl { code, .. } => code.describe(),
            CompiledStatement::TypeDecl { text, .. } => text.clone(),
        }
    }

    pub fn core_string(&self) -> Option<String> {
        match self {
            CompiledStatement::Decl { core, .. } => {
                Some(crate::fmt::core::decl_to_string(core))
            }
            CompiledStatement::TypeDecl { .. } => None,
        }
    }
}

/// Drive one statement through validation, resolution, optimisation
/// and code generation. Warnings land in `warnings`.
pub fn prepare_statement(
    ts: &mut TypeSystem,
    env: &Environment,
    statement: Statement<()>,
    hybrid: bool,
    warnings: &mut Vec<CompileWarning>,
) -> Result<CompiledStatement, StatementError> {
    let stmt_pos = statement.position();
    check_recursion(&statement)?;

    if let Statement::Decl(decl) = &statement {
        match decl {
            AstDecl::Datatype(_) | AstDecl::Exception(_) | AstDecl::TypeAlias(_) => {
                return prepare_type_decl(ts, env, statement);
            }
            _ => {}
        }
    }

    let resolved = deduce_type(env, statement, ts)?;
    let mut resolver = Resolver::of(ts, env);
    let core = resolver.to_core_decl(resolved.node)?;
    warnings.append(&mut resolver.warnings);

    let core = opt::optimize(ts, core, hybrid, &stmt_pos, warnings);

    // Schemes for the statement's own binders.
    let (names, schemes) = statement_bindings(ts, &core);

    let mut compiler = Compiler::new(ts);
    let (code, nslots) = compiler.compile_statement(&core);

    Ok(CompiledStatement::Decl {
        core,
        code,
        nslots,
        names,
        schemes,
    })
}

fn prepare_type_decl(
    ts: &mut TypeSystem,
    env: &Environment,
    statement: Statement<()>,
) -> Result<CompiledStatement, StatementError> {
    let text = match &statement {
        Statement::Decl(d) => surface::decl_to_string(d),
        Statement::Expression(_) => unreachable!("callers route only declarations here"),
    };
    let resolved = deduce_type(env, statement, ts)?;
    let mut bindings = Vec::new();
    if let Statement::Decl(decl) = &resolved.node {
        match decl {
            AstDecl::Datatype(d) => {
                for (ctor, _) in &d.ctors {
                    bindings.push(ctor_binding(ts, ctor));
                }
            }
            AstDecl::Exception(d) => {
                bindings.push(ctor_binding(ts, &d.name));
            }
            _ => {}
        }
    }
    Ok(CompiledStatement::TypeDecl { text, bindings })
}

fn ctor_binding(ts: &mut TypeSystem, name: &str) -> Binding {
    let scheme = ts
        .ctor_scheme_by_name(name)
        .expect("constructor registered by the declaration");
    let def = ts.lookup_ctor(name).expect("constructor registered");
    let value = if def.arg.is_some() {
        Value::ctor_fn(name, def.ordinal, def.datatype.clone())
    } else {
        Value::ctor(name, def.ordinal, def.datatype.clone(), None)
    };
    Binding::new(name, scheme, Some(value))
}

/// Names and schemes of a statement's output bindings, applying the
/// value restriction at the top level.
fn statement_bindings(ts: &mut TypeSystem, decl: &Decl) -> (Vec<String>, Vec<TypeScheme>) {
    let empty = std::collections::HashSet::new();
    match decl {
        Decl::NonRecVal { pat, exp } => {
            let generalise = core_is_value(exp);
            let mut names = Vec::new();
            let mut schemes = Vec::new();
            for id in pat.binders() {
                names.push(id.name.clone());
                let scheme = if generalise {
                    ts.generalize(&empty, &id.ty)
                } else {
                    ts.monomorphic(&id.ty)
                };
                schemes.push(scheme);
            }
            (names, schemes)
        }
        Decl::RecVal { binds } => {
            let mut names = Vec::new();
            let mut schemes = Vec::new();
            for (id, _) in binds {
                names.push(id.name.clone());
                schemes.push(ts.generalize(&empty, &id.ty));
            }
            (names, schemes)
        }
    }
}

/// Syntactic values at the Core level, for top-level generalisation.
fn core_is_value(exp: &Exp) -> bool {
    match exp {
        Exp::Literal { .. }
        | Exp::Id(_)
        | Exp::Builtin { .. }
        | Exp::Global { .. }
        | Exp::Fn { .. } => true,
        Exp::Tuple { items, .. } | Exp::List { items, .. } => items.iter().all(core_is_value),
        Exp::Record { fields, .. } => fields.iter().all(|(_, e)| core_is_value(e)),
        Exp::Ctor { arg, .. } => arg.as_deref().map(core_is_value).unwrap_or(true),
        _ => false,
    }
}

// --- code generation ---

#[derive(Default)]
struct FrameCtx {
    slots: Vec<IdKey>,
    captures: Vec<(usize, usize)>,
}

impl FrameCtx {
    fn position(&self, key: &IdKey) -> Option<usize> {
        self.slots.iter().position(|k| k == key)
    }

    fn alloc(&mut self, key: IdKey) -> usize {
        if let Some(i) = self.position(&key) {
            return i;
        }
        self.slots.push(key);
        self.slots.len() - 1
    }
}

pub struct Compiler<'a> {
    ts: &'a TypeSystem,
    frames: Vec<FrameCtx>,
}

impl<'a> Compiler<'a> {
    pub fn new(ts: &'a TypeSystem) -> Self {
        Compiler {
            ts,
            frames: vec![FrameCtx::default()],
        }
    }

    /// Compile a whole declaration into code evaluating to its binder
    /// values (a tuple when there are several).
    pub fn compile_statement(&mut self, decl: &Decl) -> (Code, usize) {
        let code = match decl {
            Decl::NonRecVal { pat, exp } => {
                let scrutinee = self.compile_exp(exp, None);
                let binders: Vec<Id> = pat.binders().into_iter().cloned().collect();
                let (tree, _) = matches::compile(std::slice::from_ref(pat), self.ts);
                let switch = self.lower_tree(&tree);
                let result = self.binder_result(&binders);
                Code::Match {
                    scrutinee: Box::new(scrutinee),
                    switch: Box::new(switch),
                    arms: vec![result],
                    fail: FailKind::Bind,
                    pos: pos::zero(),
                }
            }
            Decl::RecVal { binds } => {
                let binders: Vec<Id> = binds.iter().map(|(id, _)| id.clone()).collect();
                let letrec = self.compile_letrec(binds, |me| {
                    me.binder_result(&binders)
                });
                letrec
            }
        };
        let nslots = self.frames[0].slots.len();
        (code, nslots)
    }

    fn binder_result(&mut self, binders: &[Id]) -> Code {
        match binders.len() {
            0 => Code::Constant(Value::Unit),
            1 => {
                let slot = self.slot_of(&binders[0].key());
                Code::Get {
                    name: binders[0].name.clone(),
                    slot,
                }
            }
            _ => Code::Tuple(
                binders
                    .iter()
                    .map(|id| {
                        let slot = self.slot_of(&id.key());
                        Code::Get {
                            name: id.name.clone(),
                            slot,
                        }
                    })
                    .collect(),
            ),
        }
    }

    fn slot_of(&mut self, key: &IdKey) -> usize {
        let top = self.frames.len() - 1;
        self.slot_in(top, key)
    }

    fn slot_in(&mut self, frame: usize, key: &IdKey) -> usize {
        if let Some(i) = self.frames[frame].position(key) {
            return i;
        }
        if frame == 0 {
            // An unbound local is a resolver bug; allocate so the
            // evaluator sees unit rather than the host panicking.
            return self.frames[frame].alloc(key.clone());
        }
        let outer = self.slot_in(frame - 1, key);
        let mine = self.frames[frame].alloc(key.clone());
        self.frames[frame].captures.push((mine, outer));
        mine
    }

    fn alloc(&mut self, key: IdKey) -> usize {
        self.frames
            .last_mut()
            .expect("a frame is always open")
            .alloc(key)
    }

    fn compile_exp(&mut self, exp: &Exp, tail: Option<&IdKey>) -> Code {
        match exp {
            Exp::Literal { value, .. } => Code::Constant(literal_value(value)),
            Exp::Id(id) => {
                let slot = self.slot_of(&id.key());
                Code::Get {
                    name: id.name.clone(),
                    slot,
                }
            }
            Exp::Builtin { builtin, .. } => Code::Constant(Value::Primitive {
                builtin: *builtin,
                args: Vec::new(),
            }),
            Exp::Global { name, .. } => Code::GetGlobal { name: name.clone() },
            Exp::Tuple { items, .. } => {
                Code::Tuple(items.iter().map(|e| self.compile_exp(e, None)).collect())
            }
            Exp::Record { fields, .. } => Code::Record {
                labels: fields.iter().map(|(l, _)| l.clone()).collect(),
                fields: fields
                    .iter()
                    .map(|(_, e)| self.compile_exp(e, None))
                    .collect(),
            },
            Exp::List { items, .. } => {
                Code::MakeList(items.iter().map(|e| self.compile_exp(e, None)).collect())
            }
            Exp::Ctor {
                name,
                ordinal,
                datatype,
                arg,
                ..
            } => match arg {
                Some(arg) => Code::Ctor {
                    name: name.clone(),
                    ordinal: *ordinal,
                    datatype: datatype.clone(),
                    arg: Some(Box::new(self.compile_exp(arg, None))),
                },
                None => {
                    let unary = self
                        .ts
                        .lookup_ctor(name)
                        .map(|def| def.arg.is_some())
                        .unwrap_or(false);
                    if unary {
                        Code::Constant(Value::ctor_fn(name.clone(), *ordinal, datatype.clone()))
                    } else {
                        Code::Constant(Value::ctor(name.clone(), *ordinal, datatype.clone(), None))
                    }
                }
            },
            Exp::Apply { func, arg, pos, .. } => {
                if let (Some(self_key), Exp::Id(id)) = (tail, &**func) {
                    if id.key() == *self_key {
                        return Code::SelfCall {
                            arg: Box::new(self.compile_exp(arg, None)),
                        };
                    }
                }
                Code::Apply {
                    func: Box::new(self.compile_exp(func, None)),
                    arg: Box::new(self.compile_exp(arg, None)),
                    pos: pos.clone(),
                }
            }
            Exp::Fn { param, body, .. } => {
                let fn_code = self.compile_fn(param, body, None, None);
                Code::MakeClosure { fn_code }
            }
            Exp::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => Code::If {
                cond: Box::new(self.compile_exp(cond, None)),
                then_branch: Box::new(self.compile_exp(then_branch, tail)),
                else_branch: Box::new(self.compile_exp(else_branch, tail)),
            },
            Exp::Let { decl, body, .. } => match &**decl {
                Decl::NonRecVal { pat, exp } => {
                    let scrutinee = self.compile_exp(exp, None);
                    let (tree, _) = matches::compile(std::slice::from_ref(pat), self.ts);
                    let switch = self.lower_tree(&tree);
                    let body = self.compile_exp(body, tail);
                    Code::Match {
                        scrutinee: Box::new(scrutinee),
                        switch: Box::new(switch),
                        arms: vec![body],
                        fail: FailKind::Bind,
                        pos: pos::zero(),
                    }
                }
                Decl::RecVal { binds } => self.compile_letrec(binds, |me| {
                    me.compile_exp(body, tail)
                }),
            },
            Exp::Match {
                scrutinee,
                arms,
                pos,
                ..
            } => {
                let scrutinee_code = self.compile_exp(scrutinee, None);
                let pats: Vec<Pat> = arms.iter().map(|(p, _)| p.clone()).collect();
                let (tree, _) = matches::compile(&pats, self.ts);
                let switch = self.lower_tree(&tree);
                let arm_codes = arms
                    .iter()
                    .map(|(_, body)| self.compile_exp(body, tail))
                    .collect();
                Code::Match {
                    scrutinee: Box::new(scrutinee_code),
                    switch: Box::new(switch),
                    arms: arm_codes,
                    fail: FailKind::Match,
                    pos: pos.clone(),
                }
            }
            Exp::Raise { exp, pos, .. } => Code::Raise {
                exp: Box::new(self.compile_exp(exp, None)),
                pos: pos.clone(),
            },
            Exp::Handle {
                body,
                arms,
                pos,
                ..
            } => {
                let body_code = self.compile_exp(body, None);
                let pats: Vec<Pat> = arms.iter().map(|(p, _)| p.clone()).collect();
                let (tree, _) = matches::compile(&pats, self.ts);
                let switch = self.lower_tree(&tree);
                let arm_codes = arms
                    .iter()
                    .map(|(_, arm)| self.compile_exp(arm, tail))
                    .collect();
                Code::Handle {
                    body: Box::new(body_code),
                    switch: Box::new(switch),
                    arms: arm_codes,
                    pos: pos.clone(),
                }
            }
            Exp::From { steps, .. } => {
                let mut step_codes = Vec::with_capacity(steps.len());
                for step in steps {
                    step_codes.push(self.compile_step(step));
                }
                Code::From(Box::new(FromCode { steps: step_codes }))
            }
            Exp::Rel { rel, .. } => Code::Rel(Box::new(self.compile_rel(rel))),
        }
    }

    fn compile_letrec(
        &mut self,
        binds: &[(Id, Exp)],
        body: impl FnOnce(&mut Self) -> Code,
    ) -> Code {
        let mut slots = Vec::with_capacity(binds.len());
        for (id, _) in binds {
            slots.push(self.alloc(id.key()));
        }
        let mut compiled = Vec::with_capacity(binds.len());
        for ((id, exp), slot) in binds.iter().zip(slots) {
            let fn_code = match exp {
                Exp::Fn { param, body, .. } => {
                    self.compile_fn(param, body, Some(id.name.clone()), Some(id.key()))
                }
                _ => unreachable!("recursive right-hand sides are lambdas"),
            };
            compiled.push((slot, fn_code));
        }
        Code::LetRec {
            binds: compiled,
            body: Box::new(body(self)),
        }
    }

    fn compile_fn(
        &mut self,
        param: &Pat,
        body: &Exp,
        name: Option<String>,
        self_key: Option<IdKey>,
    ) -> Rc<FnCode> {
        self.frames.push(FrameCtx::default());
        let mut param_binds = Vec::new();
        self.bind_irrefutable(param, Access::root(), &mut param_binds);
        let body_code = self.compile_exp(body, self_key.as_ref());
        let ctx = self.frames.pop().expect("frame pushed above");
        Rc::new(FnCode {
            name,
            nslots: ctx.slots.len(),
            param_binds,
            body: body_code,
            captures: ctx.captures,
        })
    }

    /// Destructure an irrefutable pattern into slot writes.
    fn bind_irrefutable(&mut self, pat: &Pat, access: Access, out: &mut Vec<(usize, Access)>) {
        match pat {
            Pat::Wildcard(_) | Pat::Literal { .. } | Pat::Nil(_) => {}
            Pat::Id(id) => {
                let slot = self.alloc(id.key());
                out.push((slot, access));
            }
            Pat::Layered { id, pat, .. } => {
                let slot = self.alloc(id.key());
                out.push((slot, access.clone()));
                self.bind_irrefutable(pat, access, out);
            }
            Pat::Tuple { items, .. } => {
                for (i, item) in items.iter().enumerate() {
                    self.bind_irrefutable(
                        item,
                        access.then(crate::eval::code::AccessStep::TupleIdx(i)),
                        out,
                    );
                }
            }
            Pat::Record { fields, .. } => {
                for (i, (_, field)) in fields.iter().enumerate() {
                    self.bind_irrefutable(
                        field,
                        access.then(crate::eval::code::AccessStep::Field(i)),
                        out,
                    );
                }
            }
            Pat::Ctor { arg, .. } => {
                if let Some(arg) = arg {
                    self.bind_irrefutable(
                        arg,
                        access.then(crate::eval::code::AccessStep::CtorArg),
                        out,
                    );
                }
            }
            Pat::Cons { head, tail, .. } => {
                self.bind_irrefutable(
                    head,
                    access.then(crate::eval::code::AccessStep::Head),
                    out,
                );
                self.bind_irrefutable(
                    tail,
                    access.then(crate::eval::code::AccessStep::Tail),
                    out,
                );
            }
        }
    }

    fn lower_tree(&mut self, tree: &matches::Tree) -> Switch {
        match tree {
            matches::Tree::Leaf { arm, binds } => Switch::Leaf {
                arm: *arm,
                binds: binds
                    .iter()
                    .map(|(id, access)| (self.alloc(id.key()), access.clone()))
                    .collect(),
            },
            matches::Tree::Fail => Switch::Fail,
            matches::Tree::Test {
                access,
                cases,
                default,
            } => Switch::Test {
                access: access.clone(),
                cases: cases
                    .iter()
                    .map(|(test, t)| (test.clone(), self.lower_tree(t)))
                    .collect(),
                default: Box::new(self.lower_tree(default)),
            },
        }
    }

    fn compile_step(&mut self, step: &FromStep) -> FromStepCode {
        match step {
            FromStep::Scan { pat, exp } => {
                let input = self.compile_exp(exp, None);
                let (tree, _) = matches::compile(std::slice::from_ref(pat), self.ts);
                let switch = self.lower_tree(&tree);
                FromStepCode::Scan {
                    input,
                    switch: Box::new(switch),
                }
            }
            FromStep::Where(e) => FromStepCode::Where(self.compile_exp(e, None)),
            FromStep::Yield(e) => FromStepCode::Yield(self.compile_exp(e, None)),
            FromStep::Group { keys, aggs } => FromStepCode::Group {
                keys: keys
                    .iter()
                    .map(|(id, e)| {
                        let code = self.compile_exp(e, None);
                        (self.alloc(id.key()), id.name.clone(), code)
                    })
                    .collect(),
                aggs: aggs
                    .iter()
                    .map(|(id, agg, e)| {
                        let code = self.compile_exp(e, None);
                        (self.alloc(id.key()), id.name.clone(), *agg, code)
                    })
                    .collect(),
            },
        }
    }

    fn compile_rel(&mut self, rel: &Rel) -> RelCode {
        match rel {
            Rel::Scan { input, .. } => RelCode::Scan {
                input: self.compile_exp(input, None),
            },
            Rel::Filter { input, pred } => RelCode::Filter {
                input: Box::new(self.compile_rel(input)),
                pred: self.compile_exp(pred, None),
            },
            Rel::Project { input, proj, .. } => RelCode::Project {
                input: Box::new(self.compile_rel(input)),
                proj: self.compile_exp(proj, None),
            },
            Rel::Join {
                left, right, cond, ..
            } => RelCode::Join {
                left: Box::new(self.compile_rel(left)),
                right: Box::new(self.compile_rel(right)),
                cond: cond.as_ref().map(|c| self.compile_exp(c, None)),
            },
            Rel::Union { left, right } => RelCode::Union {
                left: Box::new(self.compile_rel(left)),
                right: Box::new(self.compile_rel(right)),
            },
            Rel::GroupBy {
                input, key, aggs, ..
            } => RelCode::GroupBy {
                input: Box::new(self.compile_rel(input)),
                key: self.compile_exp(key, None),
                aggs: aggs
                    .iter()
                    .map(|(l, a, e)| (l.clone(), *a, self.compile_exp(e, None)))
                    .collect(),
            },
            Rel::Aggregate { input, aggs, .. } => RelCode::Aggregate {
                input: Box::new(self.compile_rel(input)),
                aggs: aggs
                    .iter()
                    .map(|(l, a, e)| (l.clone(), *a, self.compile_exp(e, None)))
                    .collect(),
            },
        }
    }
}

pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Unit => Value::Unit,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Real(x) => Value::Real(*x),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Char(c) => Value::Char(*c),
    }
}
