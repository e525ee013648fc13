//! Evaluable code.
//!
//! The compiler lowers Core to this closure-friendly tree. Variables
//! are addressed by frame slot, assigned at compile time; only
//! bindings made by earlier statements of the session are fetched by
//! name from the environment. Every node renders a textual plan via
//! `describe`, which the test suite asserts on.

use std::fmt;
use std::rc::Rc;

use lachs::Span;

use crate::core::Agg;
use crate::eval::builtins;
use crate::eval::value::Value;

/// A path from a matched value down to one of its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Access(pub Vec<AccessStep>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessStep {
    /// i-th component of a tuple.
    TupleIdx(usize),
    /// i-th field of a record (label order).
    Field(usize),
    /// Payload of a unary constructor.
    CtorArg,
    Head,
    Tail,
}

impl Access {
    pub fn root() -> Access {
        Access(Vec::new())
    }

    pub fn then(&self, step: AccessStep) -> Access {
        let mut steps = self.0.clone();
        steps.push(step);
        Access(steps)
    }

    /// Fetch the addressed part of `value`.
    pub fn fetch(&self, value: &Value) -> Value {
        let mut current = value.clone();
        for step in &self.0 {
            current = match (step, &current) {
                (AccessStep::TupleIdx(i), Value::Tuple(items)) => items[*i].clone(),
                (AccessStep::Field(i), Value::Record(fields)) => fields[*i].1.clone(),
                (AccessStep::CtorArg, Value::Ctor(c)) => {
                    c.arg.clone().unwrap_or(Value::Unit)
                }
                (AccessStep::Head, Value::List(items)) => items[0].clone(),
                (AccessStep::Tail, Value::List(items)) => Value::list(items[1..].to_vec()),
                _ => Value::Unit,
            };
        }
        current
    }
}

/// A runtime test performed by a decision tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    Int(i64),
    Real(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Ctor { name: String, ordinal: usize },
    Nil,
    ConsCell,
}

impl Test {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Test::Int(a), Value::Int(b)) => a == b,
            (Test::Real(a), Value::Real(b)) => a == b,
            (Test::Bool(a), Value::Bool(b)) => a == b,
            (Test::Char(a), Value::Char(b)) => a == b,
            (Test::Str(a), Value::String(b)) => a == b,
            (Test::Ctor { ordinal, .. }, Value::Ctor(c)) => *ordinal == c.ordinal,
            (Test::Nil, Value::List(items)) => items.is_empty(),
            (Test::ConsCell, Value::List(items)) => !items.is_empty(),
            _ => false,
        }
    }
}

/// A compiled decision tree: nested switches over parts of the
/// scrutinee, leaves selecting an arm after writing its bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Switch {
    Leaf {
        arm: usize,
        binds: Vec<(usize, Access)>,
    },
    Fail,
    Test {
        access: Access,
        cases: Vec<(Test, Switch)>,
        default: Box<Switch>,
    },
}

/// What a fallen-through match raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailKind {
    Match,
    Bind,
}

impl FailKind {
    pub fn packet(&self) -> Value {
        match self {
            FailKind::Match => builtins::match_packet(),
            FailKind::Bind => builtins::bind_packet(),
        }
    }
}

/// The body of a function value, shared by all its closures.
#[derive(Debug, Clone)]
pub struct FnCode {
    /// Binder name, for plans.
    pub name: Option<String>,
    pub nslots: usize,
    /// Irrefutable destructuring of the argument into slots.
    pub param_binds: Vec<(usize, Access)>,
    pub body: Code,
    /// `(my slot, enclosing frame slot)` pairs copied at closure
    /// creation.
    pub captures: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub fn_code: Rc<FnCode>,
    /// Full-size frame with captured values already in place.
    pub frame: Vec<Value>,
}

/// An in-flight raise: either a real exception packet or the internal
/// unwind used to express self tail calls as a loop.
#[derive(Debug, Clone)]
pub enum Raised {
    Exn { value: Value, pos: Option<Span> },
    TailCall(Value),
}

impl Raised {
    pub fn exn(value: Value, pos: &Span) -> Raised {
        Raised::Exn {
            value,
            pos: Some(pos.clone()),
        }
    }

    /// A shape mismatch that a well-typed program cannot produce.
    pub fn internal(pos: &Span) -> Raised {
        Raised::Exn {
            value: Value::ctor("Internal", usize::MAX - 5, "exn", None),
            pos: Some(pos.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Code {
    Constant(Value),
    /// A local, by frame slot.
    Get { name: String, slot: usize },
    /// A binding made by an earlier statement, by name.
    GetGlobal { name: String },
    Tuple(Vec<Code>),
    Record {
        labels: Vec<String>,
        fields: Vec<Code>,
    },
    MakeList(Vec<Code>),
    Ctor {
        name: String,
        ordinal: usize,
        datatype: String,
        arg: Option<Box<Code>>,
    },
    Apply {
        func: Box<Code>,
        arg: Box<Code>,
        pos: Span,
    },
    /// Self-recursive call in tail position; unwinds to the enclosing
    /// application loop.
    SelfCall {
        arg: Box<Code>,
    },
    If {
        cond: Box<Code>,
        then_branch: Box<Code>,
        else_branch: Box<Code>,
    },
    /// Decision tree over a scrutinee. Also expresses `val pat = ...`
    /// (fail kind `Bind`) and `handle` arm selection.
    Match {
        scrutinee: Box<Code>,
        switch: Box<Switch>,
        arms: Vec<Code>,
        fail: FailKind,
        pos: Span,
    },
    MakeClosure {
        fn_code: Rc<FnCode>,
    },
    /// Mutually recursive closures created together.
    LetRec {
        binds: Vec<(usize, Rc<FnCode>)>,
        body: Box<Code>,
    },
    Raise {
        exp: Box<Code>,
        pos: Span,
    },
    Handle {
        body: Box<Code>,
        switch: Box<Switch>,
        arms: Vec<Code>,
        pos: Span,
    },
    From(Box<FromCode>),
    Rel(Box<RelCode>),
}

#[derive(Debug, Clone)]
pub struct FromCode {
    pub steps: Vec<FromStepCode>,
}

#[derive(Debug, Clone)]
pub enum FromStepCode {
    /// Bind a row; rows failing a refutable pattern are skipped.
    Scan {
        input: Code,
        switch: Box<Switch>,
    },
    Where(Code),
    Yield(Code),
    Group {
        keys: Vec<(usize, String, Code)>,
        aggs: Vec<(usize, String, Agg, Code)>,
    },
}

#[derive(Debug, Clone)]
pub enum RelCode {
    Scan {
        input: Code,
    },
    Filter {
        input: Box<RelCode>,
        pred: Code,
    },
    Project {
        input: Box<RelCode>,
        proj: Code,
    },
    Join {
        left: Box<RelCode>,
        right: Box<RelCode>,
        cond: Option<Code>,
    },
    Union {
        left: Box<RelCode>,
        right: Box<RelCode>,
    },
    GroupBy {
        input: Box<RelCode>,
        key: Code,
        aggs: Vec<(String, Agg, Code)>,
    },
    Aggregate {
        input: Box<RelCode>,
        aggs: Vec<(String, Agg, Code)>,
    },
}

impl Code {
    /// The textual plan of this code, used by tests.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

fn join_codes(codes: &[Code]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Code::Constant(v) => match v {
                Value::Primitive { builtin, .. } => write!(f, "fnValue {}", builtin.name()),
                _ => write!(f, "constant({v})"),
            },
            Code::Get { name, .. } => write!(f, "get(name {name})"),
            Code::GetGlobal { name } => write!(f, "get(name {name})"),
            Code::Tuple(items) => write!(f, "tuple({})", join_codes(items)),
            Code::Record { labels, fields } => {
                write!(f, "record(")?;
                for (i, (l, c)) in labels.iter().zip(fields).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{l} = {c}")?;
                }
                write!(f, ")")
            }
            Code::MakeList(items) => write!(f, "list({})", join_codes(items)),
            Code::Ctor { name, arg, .. } => match arg {
                None => write!(f, "constructor({name})"),
                Some(a) => write!(f, "constructor({name}, {a})"),
            },
            Code::Apply { func, arg, .. } => write!(f, "apply({func}, argCode {arg})"),
            Code::SelfCall { arg } => write!(f, "selfCall(argCode {arg})"),
            Code::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if({cond}, {then_branch}, {else_branch})"),
            Code::Match {
                scrutinee, arms, ..
            } => write!(f, "match({scrutinee}, {})", join_codes(arms)),
            Code::MakeClosure { fn_code } => match &fn_code.name {
                Some(name) => write!(f, "closure({name})"),
                None => write!(f, "closure"),
            },
            Code::LetRec { binds, body } => {
                write!(f, "letRec(")?;
                for (i, (_, fc)) in binds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &fc.name {
                        Some(name) => write!(f, "{name} = {}", fc.body)?,
                        None => write!(f, "fn = {}", fc.body)?,
                    }
                }
                write!(f, "; {body})")
            }
            Code::Raise { exp, .. } => write!(f, "raise({exp})"),
            Code::Handle { body, arms, .. } => {
                write!(f, "handle({body}, {})", join_codes(arms))
            }
            Code::From(from) => {
                write!(f, "from(")?;
                for (i, step) in from.steps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match step {
                        FromStepCode::Scan { input, .. } => write!(f, "scan({input})")?,
                        FromStepCode::Where(c) => write!(f, "where({c})")?,
                        FromStepCode::Yield(c) => write!(f, "yield({c})")?,
                        FromStepCode::Group { keys, aggs } => {
                            write!(f, "group(")?;
                            for (i, (_, label, c)) in keys.iter().enumerate() {
                                if i > 0 {
                                    write!(f, ", ")?;
                                }
                                write!(f, "{label} = {c}")?;
                            }
                            for (_, label, agg, c) in aggs {
                                write!(f, ", {label} = {} of {c}", agg.name())?;
                            }
                            write!(f, ")")?;
                        }
                    }
                }
                write!(f, ")")
            }
            Code::Rel(rel) => write!(f, "{rel}"),
        }
    }
}

impl fmt::Display for RelCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelCode::Scan { input } => write!(f, "scan({input})"),
            RelCode::Filter { input, pred } => write!(f, "filter({input}, {pred})"),
            RelCode::Project { input, proj } => write!(f, "project({input}, {proj})"),
            RelCode::Join { left, right, cond } => match cond {
                Some(c) => write!(f, "join({left}, {right}, on {c})"),
                None => write!(f, "join({left}, {right})"),
            },
            RelCode::Union { left, right } => write!(f, "union({left}, {right})"),
            RelCode::GroupBy { input, key, aggs } => {
                write!(f, "groupBy({input}, key {key}")?;
                for (label, agg, c) in aggs {
                    write!(f, ", {label} = {} of {c}", agg.name())?;
                }
                write!(f, ")")
            }
            RelCode::Aggregate { input, aggs } => {
                write!(f, "aggregate({input}")?;
                for (label, agg, c) in aggs {
                    write!(f, ", {label} = {} of {c}", agg.name())?;
                }
                write!(f, ")")
            }
        }
    }
}
