//! Evaluator: a strict, single-threaded tree walk over `Code`.
//!
//! Evaluation order is left to right everywhere. Exceptions are an
//! explicit `Result` sum (`Raised`); host panics are never used for
//! language-level control flow. A self tail call unwinds to the
//! enclosing application, which runs the body in a loop.

pub mod builtins;
pub mod code;
pub mod value;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lachs::Span;

use crate::catalog::RelBuilder;
use crate::core::Agg;
use crate::env::Environment;
use crate::pos::position_label;

use code::{Code, FromStepCode, Raised, RelCode, Switch};
use value::Value;

pub struct EvalContext<'a> {
    pub env: &'a Environment,
    pub rel_builder: Option<&'a dyn RelBuilder>,
}

/// An evaluation failure surfaced to the host: an uncaught exception
/// packet.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub packet: Value,
    pub pos: Option<Span>,
}

impl EvalError {
    pub fn from_raised(raised: Raised) -> EvalError {
        match raised {
            Raised::Exn { value, pos } => EvalError { packet: value, pos },
            // A tail-call escaping is a compiler bug; report it as an
            // internal error rather than panicking.
            Raised::TailCall(_) => EvalError {
                packet: Value::ctor("Internal", usize::MAX - 5, "exn", None),
                pos: None,
            },
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "uncaught exception {}", self.packet)?;
        if let Some(pos) = &self.pos {
            write!(f, " at {}", position_label(pos))?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// Apply a function value to an argument. The workhorse for `Apply`
/// nodes, higher-order builtins and the relational operators.
pub fn apply_value(
    ctx: &EvalContext,
    func: Value,
    arg: Value,
    pos: &Span,
) -> Result<Value, Raised> {
    match func.unwrap_rec() {
        Value::Closure(closure) => {
            let mut frame = closure.frame.clone();
            let mut current = arg;
            loop {
                for (slot, access) in &closure.fn_code.param_binds {
                    frame[*slot] = access.fetch(&current);
                }
                match closure.fn_code.body.eval(ctx, &mut frame) {
                    Err(Raised::TailCall(next)) => {
                        current = next;
                    }
                    other => return other,
                }
            }
        }
        Value::Primitive { builtin, mut args } => {
            args.push(arg);
            if args.len() < builtin.arity() {
                Ok(Value::Primitive { builtin, args })
            } else {
                builtin.apply(args, pos, &mut |f, a| apply_value(ctx, f, a, pos))
            }
        }
        Value::Ctor(c) if c.needs_arg => {
            Ok(Value::ctor(
                c.name.clone(),
                c.ordinal,
                c.datatype.clone(),
                Some(arg),
            ))
        }
        _ => Err(Raised::internal(pos)),
    }
}

/// Run a decision tree against a value. `Some(arm)` selects an arm
/// after writing its bindings into the frame; `None` means no row
/// matched.
fn run_switch(
    switch: &Switch,
    value: &Value,
    frame: &mut Vec<Value>,
) -> Option<usize> {
    match switch {
        Switch::Leaf { arm, binds } => {
            for (slot, access) in binds {
                frame[*slot] = access.fetch(value);
            }
            Some(*arm)
        }
        Switch::Fail => None,
        Switch::Test {
            access,
            cases,
            default,
        } => {
            let part = access.fetch(value);
            for (test, next) in cases {
                if test.matches(&part) {
                    return run_switch(next, value, frame);
                }
            }
            run_switch(default, value, frame)
        }
    }
}

impl Code {
    pub fn eval(&self, ctx: &EvalContext, frame: &mut Vec<Value>) -> Result<Value, Raised> {
        match self {
            Code::Constant(v) => Ok(v.clone()),
            Code::Get { slot, .. } => Ok(frame[*slot].clone().unwrap_rec()),
            Code::GetGlobal { name } => match ctx.env.lookup(name).and_then(|b| b.value.clone()) {
                Some(v) => Ok(v),
                None => Err(Raised::internal(&Span::default())),
            },
            Code::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.eval(ctx, frame)?);
                }
                Ok(Value::tuple(out))
            }
            Code::Record { labels, fields } => {
                let mut out = Vec::with_capacity(fields.len());
                for (label, field) in labels.iter().zip(fields) {
                    out.push((label.clone(), field.eval(ctx, frame)?));
                }
                Ok(Value::record(out))
            }
            Code::MakeList(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.eval(ctx, frame)?);
                }
                Ok(Value::list(out))
            }
            Code::Ctor {
                name,
                ordinal,
                datatype,
                arg,
            } => {
                let arg = match arg {
                    Some(code) => Some(code.eval(ctx, frame)?),
                    None => None,
                };
                Ok(Value::ctor(name.clone(), *ordinal, datatype.clone(), arg))
            }
            Code::Apply { func, arg, pos } => {
                let f = func.eval(ctx, frame)?;
                let a = arg.eval(ctx, frame)?;
                apply_value(ctx, f, a, pos)
            }
            Code::SelfCall { arg } => {
                let a = arg.eval(ctx, frame)?;
                Err(Raised::TailCall(a))
            }
            Code::If {
                cond,
                then_branch,
                else_branch,
            } => match cond.eval(ctx, frame)? {
                Value::Bool(true) => then_branch.eval(ctx, frame),
                Value::Bool(false) => else_branch.eval(ctx, frame),
                _ => Err(Raised::internal(&Span::default())),
            },
            Code::Match {
                scrutinee,
                switch,
                arms,
                fail,
                pos,
            } => {
                let v = scrutinee.eval(ctx, frame)?;
                match run_switch(switch, &v, frame) {
                    Some(arm) => arms[arm].eval(ctx, frame),
                    None => Err(Raised::exn(fail.packet(), pos)),
                }
            }
            Code::MakeClosure { fn_code } => {
                let mut template = vec![Value::Unit; fn_code.nslots];
                for (mine, outer) in &fn_code.captures {
                    template[*mine] = frame[*outer].clone();
                }
                Ok(Value::closure(fn_code.clone(), template))
            }
            Code::LetRec { binds, body } => {
                let cells: Vec<Rc<RefCell<Value>>> = binds
                    .iter()
                    .map(|_| Rc::new(RefCell::new(Value::Unit)))
                    .collect();
                for ((slot, _), cell) in binds.iter().zip(&cells) {
                    frame[*slot] = Value::Rec(cell.clone());
                }
                for ((slot, fn_code), cell) in binds.iter().zip(&cells) {
                    let mut template = vec![Value::Unit; fn_code.nslots];
                    for (mine, outer) in &fn_code.captures {
                        template[*mine] = frame[*outer].clone();
                    }
                    let closure = Value::closure(fn_code.clone(), template);
                    *cell.borrow_mut() = closure.clone();
                    frame[*slot] = closure;
                }
                body.eval(ctx, frame)
            }
            Code::Raise { exp, pos } => {
                let packet = exp.eval(ctx, frame)?;
                Err(Raised::exn(packet, pos))
            }
            Code::Handle {
                body,
                switch,
                arms,
                pos: _,
            } => match body.eval(ctx, frame) {
                Err(Raised::Exn { value, pos }) => match run_switch(switch, &value, frame) {
                    Some(arm) => arms[arm].eval(ctx, frame),
                    None => Err(Raised::Exn { value, pos }),
                },
                other => other,
            },
            Code::From(from) => {
                let mut out = Vec::new();
                eval_from(&from.steps, ctx, frame, &mut out)?;
                Ok(Value::list(out))
            }
            Code::Rel(rel) => {
                let rows = eval_rel(rel, ctx, frame)?;
                Ok(Value::list(rows))
            }
        }
    }
}

fn as_list(value: Value, pos: &Span) -> Result<Rc<Vec<Value>>, Raised> {
    match value {
        Value::List(items) => Ok(items),
        _ => Err(Raised::internal(pos)),
    }
}

/// Drive a `from` pipeline. If a `group` step is present the pipeline
/// splits: rows reaching the group are materialised, grouped by key
/// values, and the remaining steps run once per group with the key and
/// aggregate slots bound.
fn eval_from(
    steps: &[FromStepCode],
    ctx: &EvalContext,
    frame: &mut Vec<Value>,
    out: &mut Vec<Value>,
) -> Result<(), Raised> {
    let pos = Span::default();
    let group_at = steps
        .iter()
        .position(|s| matches!(s, FromStepCode::Group { .. }));
    let Some(group_at) = group_at else {
        return enumerate(steps, 0, ctx, frame, &mut |_frame| Ok(()), out);
    };

    // Phase 1: materialise the frame of every row reaching the group.
    let mut snapshots: Vec<Vec<Value>> = Vec::new();
    {
        let mut collect = |frame: &mut Vec<Value>| {
            snapshots.push(frame.clone());
            Ok(())
        };
        let mut sink = Vec::new();
        enumerate(&steps[..group_at], 0, ctx, frame, &mut collect, &mut sink)?;
    }

    let (keys, aggs) = match &steps[group_at] {
        FromStepCode::Group { keys, aggs } => (keys, aggs),
        _ => unreachable!("position() found a group step"),
    };

    // Phase 2: group rows by key values.
    let mut groups: Vec<(Vec<Value>, Vec<Vec<Value>>)> = Vec::new();
    for snapshot in snapshots {
        *frame = snapshot;
        let mut key_vals = Vec::with_capacity(keys.len());
        for (_, _, code) in keys {
            key_vals.push(code.eval(ctx, frame)?);
        }
        let mut agg_vals = Vec::with_capacity(aggs.len());
        for (_, _, _, code) in aggs {
            agg_vals.push(code.eval(ctx, frame)?);
        }
        let found = groups.iter_mut().find(|(gk, _)| {
            gk.iter().zip(&key_vals).all(|(a, b)| a.eq_value(b))
        });
        match found {
            Some((_, columns)) => {
                for (column, v) in columns.iter_mut().zip(agg_vals) {
                    column.push(v);
                }
            }
            None => {
                groups.push((key_vals, agg_vals.into_iter().map(|v| vec![v]).collect()));
            }
        }
    }

    // Phase 3: run the tail of the pipeline once per group.
    for (key_vals, columns) in groups {
        for ((slot, _, _), v) in keys.iter().zip(key_vals) {
            frame[*slot] = v;
        }
        for ((slot, _, agg, _), column) in aggs.iter().zip(&columns) {
            frame[*slot] = aggregate(*agg, column, &pos)?;
        }
        eval_from(&steps[group_at + 1..], ctx, frame, out)?;
    }
    Ok(())
}

/// Enumerate scan/where/yield steps recursively. `at_end` fires when a
/// row survives every step without hitting a yield (used to snapshot
/// rows feeding a group).
fn enumerate(
    steps: &[FromStepCode],
    index: usize,
    ctx: &EvalContext,
    frame: &mut Vec<Value>,
    at_end: &mut dyn FnMut(&mut Vec<Value>) -> Result<(), Raised>,
    out: &mut Vec<Value>,
) -> Result<(), Raised> {
    if index == steps.len() {
        return at_end(frame);
    }
    match &steps[index] {
        FromStepCode::Scan { input, switch } => {
            let rows = as_list(input.eval(ctx, frame)?, &Span::default())?;
            for row in rows.iter() {
                if run_switch(switch, row, frame).is_some() {
                    enumerate(steps, index + 1, ctx, frame, at_end, out)?;
                }
            }
            Ok(())
        }
        FromStepCode::Where(cond) => {
            if matches!(cond.eval(ctx, frame)?, Value::Bool(true)) {
                enumerate(steps, index + 1, ctx, frame, at_end, out)?;
            }
            Ok(())
        }
        FromStepCode::Yield(exp) => {
            out.push(exp.eval(ctx, frame)?);
            Ok(())
        }
        FromStepCode::Group { .. } => Err(Raised::internal(&Span::default())),
    }
}

/// Aggregate a column of values.
fn aggregate(agg: Agg, values: &[Value], pos: &Span) -> Result<Value, Raised> {
    match agg {
        Agg::Count => Ok(Value::Int(values.len() as i64)),
        Agg::Sum => {
            if values.iter().any(|v| matches!(v, Value::Real(_))) {
                let mut total = 0.0;
                for v in values {
                    match v {
                        Value::Real(x) => total += x,
                        Value::Int(x) => total += *x as f64,
                        _ => return Err(Raised::internal(pos)),
                    }
                }
                Ok(Value::Real(total))
            } else {
                let mut total: i64 = 0;
                for v in values {
                    match v {
                        Value::Int(x) => {
                            total = total
                                .checked_add(*x)
                                .ok_or_else(|| Raised::exn(builtins::overflow_packet(), pos))?;
                        }
                        _ => return Err(Raised::internal(pos)),
                    }
                }
                Ok(Value::Int(total))
            }
        }
        Agg::Min | Agg::Max => {
            let mut best: Option<Value> = None;
            for v in values {
                best = Some(match best {
                    None => v.clone(),
                    Some(b) => {
                        let ord = v.compare(&b).ok_or_else(|| Raised::internal(pos))?;
                        let take = if agg == Agg::Min { ord.is_lt() } else { ord.is_gt() };
                        if take {
                            v.clone()
                        } else {
                            b
                        }
                    }
                });
            }
            best.ok_or_else(|| Raised::exn(builtins::empty_packet(), pos))
        }
    }
}

/// Evaluate the relational operators over in-memory rows, unless an
/// external `RelBuilder` claims the subtree.
pub fn eval_rel(
    rel: &RelCode,
    ctx: &EvalContext,
    frame: &mut Vec<Value>,
) -> Result<Vec<Value>, Raised> {
    if let Some(builder) = ctx.rel_builder {
        if let Some(result) = builder.materialize(rel, ctx, frame) {
            return result;
        }
    }
    let pos = Span::default();
    match rel {
        RelCode::Scan { input } => {
            let rows = as_list(input.eval(ctx, frame)?, &pos)?;
            Ok(rows.iter().cloned().collect())
        }
        RelCode::Filter { input, pred } => {
            let rows = eval_rel(input, ctx, frame)?;
            let pred_fn = pred.eval(ctx, frame)?;
            let mut out = Vec::new();
            for row in rows {
                if matches!(
                    apply_value(ctx, pred_fn.clone(), row.clone(), &pos)?,
                    Value::Bool(true)
                ) {
                    out.push(row);
                }
            }
            Ok(out)
        }
        RelCode::Project { input, proj } => {
            let rows = eval_rel(input, ctx, frame)?;
            let proj_fn = proj.eval(ctx, frame)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(apply_value(ctx, proj_fn.clone(), row, &pos)?);
            }
            Ok(out)
        }
        RelCode::Join { left, right, cond } => {
            let left_rows = eval_rel(left, ctx, frame)?;
            let right_rows = eval_rel(right, ctx, frame)?;
            let cond_fn = match cond {
                Some(c) => Some(c.eval(ctx, frame)?),
                None => None,
            };
            let mut out = Vec::new();
            for l in &left_rows {
                for r in &right_rows {
                    let merged = merge_rows(l, r, &pos)?;
                    let keep = match &cond_fn {
                        Some(f) => matches!(
                            apply_value(ctx, f.clone(), merged.clone(), &pos)?,
                            Value::Bool(true)
                        ),
                        None => true,
                    };
                    if keep {
                        out.push(merged);
                    }
                }
            }
            Ok(out)
        }
        RelCode::Union { left, right } => {
            let mut out = eval_rel(left, ctx, frame)?;
            out.extend(eval_rel(right, ctx, frame)?);
            Ok(out)
        }
        RelCode::GroupBy { input, key, aggs } => {
            let rows = eval_rel(input, ctx, frame)?;
            let key_fn = key.eval(ctx, frame)?;
            let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
            for row in rows {
                let k = apply_value(ctx, key_fn.clone(), row.clone(), &pos)?;
                match groups.iter_mut().find(|(gk, _)| gk.eq_value(&k)) {
                    Some((_, members)) => members.push(row),
                    None => groups.push((k, vec![row])),
                }
            }
            let mut out = Vec::with_capacity(groups.len());
            for (k, members) in groups {
                out.push(finish_group(Some(&k), &members, aggs, ctx, frame, &pos)?);
            }
            Ok(out)
        }
        RelCode::Aggregate { input, aggs } => {
            let rows = eval_rel(input, ctx, frame)?;
            let row = finish_group(None, &rows, aggs, ctx, frame, &pos)?;
            Ok(vec![row])
        }
    }
}

fn finish_group(
    key: Option<&Value>,
    members: &[Value],
    aggs: &[(String, Agg, Code)],
    ctx: &EvalContext,
    frame: &mut Vec<Value>,
    pos: &Span,
) -> Result<Value, Raised> {
    let mut fields: Vec<(String, Value)> = match key {
        Some(Value::Record(key_fields)) => key_fields.iter().cloned().collect(),
        Some(other) => vec![("key".to_string(), other.clone())],
        None => Vec::new(),
    };
    for (label, agg, arg) in aggs {
        let arg_fn = arg.eval(ctx, frame)?;
        let mut column = Vec::with_capacity(members.len());
        for row in members {
            column.push(apply_value(ctx, arg_fn.clone(), row.clone(), pos)?);
        }
        fields.push((label.clone(), aggregate(*agg, &column, pos)?));
    }
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(Value::record(fields))
}

fn merge_rows(left: &Value, right: &Value, pos: &Span) -> Result<Value, Raised> {
    match (left, right) {
        (Value::Record(a), Value::Record(b)) => {
            let mut fields: Vec<(String, Value)> =
                a.iter().cloned().chain(b.iter().cloned()).collect();
            fields.sort_by(|(x, _), (y, _)| x.cmp(y));
            Ok(Value::record(fields))
        }
        _ => Err(Raised::internal(pos)),
    }
}
