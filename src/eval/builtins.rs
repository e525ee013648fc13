//! Builtin operators and functions.
//!
//! One table keyed by identifier: each builtin has a scheme (possibly
//! carrying an equality, numeric or ordered constraint) and an
//! implementation. Overloading is settled at inference time by
//! unification against the constrained scheme; the evaluator never
//! dispatches on runtime types except to pick the int or real flavour
//! of an arithmetic op, which the type system has already made
//! consistent.

use lachs::Span;

use crate::ast::BinOp;
use crate::types::ty::Type;
use crate::types::TypeSystem;

use super::code::Raised;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    // arithmetic
    Plus,
    Minus,
    Times,
    Divide,
    Div,
    Mod,
    Negate,
    Abs,
    // strings
    Caret,
    Size,
    // equality and order
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // booleans
    Not,
    // lists
    Cons,
    Append,
    Hd,
    Tl,
    Rev,
    Length,
    Map,
    Filter,
    // misc
    Compose,
    Ignore,
}

/// Reserved identities for the builtin exceptions.
pub mod exn {
    pub const MATCH: usize = usize::MAX;
    pub const BIND: usize = usize::MAX - 1;
    pub const DIV: usize = usize::MAX - 2;
    pub const OVERFLOW: usize = usize::MAX - 3;
    pub const EMPTY: usize = usize::MAX - 4;
}

pub fn match_packet() -> Value {
    Value::ctor("Match", exn::MATCH, "exn", None)
}

pub fn bind_packet() -> Value {
    Value::ctor("Bind", exn::BIND, "exn", None)
}

pub fn div_packet() -> Value {
    Value::ctor("Div", exn::DIV, "exn", None)
}

pub fn overflow_packet() -> Value {
    Value::ctor("Overflow", exn::OVERFLOW, "exn", None)
}

pub fn empty_packet() -> Value {
    Value::ctor("Empty", exn::EMPTY, "exn", None)
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Plus => "+",
            Builtin::Minus => "-",
            Builtin::Times => "*",
            Builtin::Divide => "/",
            Builtin::Div => "div",
            Builtin::Mod => "mod",
            Builtin::Negate => "~",
            Builtin::Abs => "abs",
            Builtin::Caret => "^",
            Builtin::Size => "size",
            Builtin::Eq => "=",
            Builtin::Ne => "<>",
            Builtin::Lt => "<",
            Builtin::Gt => ">",
            Builtin::Le => "<=",
            Builtin::Ge => ">=",
            Builtin::Not => "not",
            Builtin::Cons => "::",
            Builtin::Append => "@",
            Builtin::Hd => "hd",
            Builtin::Tl => "tl",
            Builtin::Rev => "rev",
            Builtin::Length => "length",
            Builtin::Map => "map",
            Builtin::Filter => "filter",
            Builtin::Compose => "o",
            Builtin::Ignore => "ignore",
        }
    }

    /// Builtins usable as plain identifiers.
    pub fn by_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "abs" => Builtin::Abs,
            "size" => Builtin::Size,
            "not" => Builtin::Not,
            "hd" => Builtin::Hd,
            "tl" => Builtin::Tl,
            "rev" => Builtin::Rev,
            "length" => Builtin::Length,
            "map" => Builtin::Map,
            "filter" => Builtin::Filter,
            "ignore" => Builtin::Ignore,
            _ => return None,
        })
    }

    pub fn of_binop(op: BinOp) -> Option<Builtin> {
        Some(match op {
            BinOp::Plus => Builtin::Plus,
            BinOp::Minus => Builtin::Minus,
            BinOp::Times => Builtin::Times,
            BinOp::Divide => Builtin::Divide,
            BinOp::Div => Builtin::Div,
            BinOp::Mod => Builtin::Mod,
            BinOp::Caret => Builtin::Caret,
            BinOp::Eq => Builtin::Eq,
            BinOp::Ne => Builtin::Ne,
            BinOp::Lt => Builtin::Lt,
            BinOp::Gt => Builtin::Gt,
            BinOp::Le => Builtin::Le,
            BinOp::Ge => Builtin::Ge,
            BinOp::Cons => Builtin::Cons,
            BinOp::Append => Builtin::Append,
            BinOp::Compose => Builtin::Compose,
            // andalso/orelse are syntactic and short-circuit
            BinOp::Andalso | BinOp::Orelse => return None,
        })
    }

    /// How many curried arguments the implementation needs. Binary
    /// operators take their operands as one tuple.
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Map | Builtin::Filter | Builtin::Compose => 2,
            _ => 1,
        }
    }

    /// A fresh instance of the builtin's scheme.
    pub fn instantiate_type(&self, ts: &mut TypeSystem) -> Type {
        match self {
            Builtin::Plus | Builtin::Minus | Builtin::Times => {
                let n = ts.fresh_numeric_var();
                let pair = ts.tuple_type(vec![n.clone(), n.clone()]);
                ts.fn_type(pair, n)
            }
            Builtin::Divide => {
                let r = ts.real();
                let pair = ts.tuple_type(vec![r.clone(), r.clone()]);
                ts.fn_type(pair, r)
            }
            Builtin::Div | Builtin::Mod => {
                let i = ts.int();
                let pair = ts.tuple_type(vec![i.clone(), i.clone()]);
                ts.fn_type(pair, i)
            }
            Builtin::Negate | Builtin::Abs => {
                let n = ts.fresh_numeric_var();
                ts.fn_type(n.clone(), n)
            }
            Builtin::Caret => {
                let s = ts.string();
                let pair = ts.tuple_type(vec![s.clone(), s.clone()]);
                ts.fn_type(pair, s)
            }
            Builtin::Size => {
                let s = ts.string();
                let i = ts.int();
                ts.fn_type(s, i)
            }
            Builtin::Eq | Builtin::Ne => {
                let a = ts.fresh_var(true);
                let pair = ts.tuple_type(vec![a.clone(), a]);
                let b = ts.bool();
                ts.fn_type(pair, b)
            }
            Builtin::Lt | Builtin::Gt | Builtin::Le | Builtin::Ge => {
                let a = ts.fresh_ordered_var();
                let pair = ts.tuple_type(vec![a.clone(), a]);
                let b = ts.bool();
                ts.fn_type(pair, b)
            }
            Builtin::Not => {
                let b = ts.bool();
                ts.fn_type(b.clone(), b)
            }
            Builtin::Cons => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a.clone());
                let pair = ts.tuple_type(vec![a, list.clone()]);
                ts.fn_type(pair, list)
            }
            Builtin::Append => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a);
                let pair = ts.tuple_type(vec![list.clone(), list.clone()]);
                ts.fn_type(pair, list)
            }
            Builtin::Hd => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a.clone());
                ts.fn_type(list, a)
            }
            Builtin::Tl => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a);
                ts.fn_type(list.clone(), list)
            }
            Builtin::Rev => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a);
                ts.fn_type(list.clone(), list)
            }
            Builtin::Length => {
                let a = ts.fresh_var(false);
                let list = ts.list_type(a);
                let i = ts.int();
                ts.fn_type(list, i)
            }
            Builtin::Map => {
                let a = ts.fresh_var(false);
                let b = ts.fresh_var(false);
                let f = ts.fn_type(a.clone(), b.clone());
                let la = ts.list_type(a);
                let lb = ts.list_type(b);
                let inner = ts.fn_type(la, lb);
                ts.fn_type(f, inner)
            }
            Builtin::Filter => {
                let a = ts.fresh_var(false);
                let bool_ty = ts.bool();
                let f = ts.fn_type(a.clone(), bool_ty);
                let la = ts.list_type(a);
                let inner = ts.fn_type(la.clone(), la);
                ts.fn_type(f, inner)
            }
            Builtin::Compose => {
                let a = ts.fresh_var(false);
                let b = ts.fresh_var(false);
                let c = ts.fresh_var(false);
                let f = ts.fn_type(b.clone(), c.clone());
                let g = ts.fn_type(a.clone(), b);
                let pair = ts.tuple_type(vec![f, g]);
                let h = ts.fn_type(a, c);
                ts.fn_type(pair, h)
            }
            Builtin::Ignore => {
                let a = ts.fresh_var(false);
                let u = ts.unit();
                ts.fn_type(a, u)
            }
        }
    }

    /// Run the builtin on its collected arguments. `apply_fn` calls
    /// back into the evaluator for higher-order builtins.
    pub fn apply(
        &self,
        mut args: Vec<Value>,
        pos: &Span,
        apply_fn: &mut dyn FnMut(Value, Value) -> Result<Value, Raised>,
    ) -> Result<Value, Raised> {
        match self {
            Builtin::Plus | Builtin::Minus | Builtin::Times => {
                let (a, b) = take_pair(args);
                arith(*self, a, b, pos)
            }
            Builtin::Divide => {
                let (a, b) = take_pair(args);
                match (a, b) {
                    (Value::Real(x), Value::Real(y)) => Ok(Value::Real(x / y)),
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Div | Builtin::Mod => {
                let (a, b) = take_pair(args);
                let (x, y) = match (a, b) {
                    (Value::Int(x), Value::Int(y)) => (x, y),
                    _ => return Err(Raised::internal(pos)),
                };
                if y == 0 {
                    return Err(Raised::exn(div_packet(), pos));
                }
                let result = if *self == Builtin::Div {
                    x.checked_div_euclid(y)
                } else {
                    x.checked_rem_euclid(y)
                };
                match result {
                    Some(v) => Ok(Value::Int(v)),
                    None => Err(Raised::exn(overflow_packet(), pos)),
                }
            }
            Builtin::Negate => match args.pop() {
                Some(Value::Int(x)) => x
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| Raised::exn(overflow_packet(), pos)),
                Some(Value::Real(x)) => Ok(Value::Real(-x)),
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Abs => match args.pop() {
                Some(Value::Int(x)) => x
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| Raised::exn(overflow_packet(), pos)),
                Some(Value::Real(x)) => Ok(Value::Real(x.abs())),
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Caret => {
                let (a, b) = take_pair(args);
                match (a, b) {
                    (Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Size => match args.pop() {
                Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Eq => {
                let (a, b) = take_pair(args);
                Ok(Value::Bool(a.eq_value(&b)))
            }
            Builtin::Ne => {
                let (a, b) = take_pair(args);
                Ok(Value::Bool(!a.eq_value(&b)))
            }
            Builtin::Lt | Builtin::Gt | Builtin::Le | Builtin::Ge => {
                let (a, b) = take_pair(args);
                let ordering = a.compare(&b).ok_or_else(|| Raised::internal(pos))?;
                let result = match self {
                    Builtin::Lt => ordering.is_lt(),
                    Builtin::Gt => ordering.is_gt(),
                    Builtin::Le => ordering.is_le(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            Builtin::Not => match args.pop() {
                Some(Value::Bool(b)) => Ok(Value::Bool(!b)),
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Cons => {
                let (head, tail) = take_pair(args);
                match tail {
                    Value::List(items) => {
                        let mut out = Vec::with_capacity(items.len() + 1);
                        out.push(head);
                        out.extend(items.iter().cloned());
                        Ok(Value::list(out))
                    }
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Append => {
                let (a, b) = take_pair(args);
                match (a, b) {
                    (Value::List(x), Value::List(y)) => {
                        let mut out = Vec::with_capacity(x.len() + y.len());
                        out.extend(x.iter().cloned());
                        out.extend(y.iter().cloned());
                        Ok(Value::list(out))
                    }
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Hd => match args.pop() {
                Some(Value::List(items)) => match items.first() {
                    Some(v) => Ok(v.clone()),
                    None => Err(Raised::exn(empty_packet(), pos)),
                },
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Tl => match args.pop() {
                Some(Value::List(items)) => {
                    if items.is_empty() {
                        Err(Raised::exn(empty_packet(), pos))
                    } else {
                        Ok(Value::list(items[1..].to_vec()))
                    }
                }
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Rev => match args.pop() {
                Some(Value::List(items)) => {
                    let mut out: Vec<Value> = items.iter().cloned().collect();
                    out.reverse();
                    Ok(Value::list(out))
                }
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Length => match args.pop() {
                Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
                _ => Err(Raised::internal(pos)),
            },
            Builtin::Map => {
                let list = args.pop();
                let func = args.pop();
                match (func, list) {
                    (Some(f), Some(Value::List(items))) => {
                        let mut out = Vec::with_capacity(items.len());
                        for v in items.iter() {
                            out.push(apply_fn(f.clone(), v.clone())?);
                        }
                        Ok(Value::list(out))
                    }
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Filter => {
                let list = args.pop();
                let func = args.pop();
                match (func, list) {
                    (Some(f), Some(Value::List(items))) => {
                        let mut out = Vec::new();
                        for v in items.iter() {
                            if matches!(apply_fn(f.clone(), v.clone())?, Value::Bool(true)) {
                                out.push(v.clone());
                            }
                        }
                        Ok(Value::list(out))
                    }
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Compose => {
                let x = args.pop();
                let pair = args.pop();
                match (pair, x) {
                    (Some(Value::Tuple(fg)), Some(x)) => {
                        let g = fg[1].clone();
                        let f = fg[0].clone();
                        let gx = apply_fn(g, x)?;
                        apply_fn(f, gx)
                    }
                    _ => Err(Raised::internal(pos)),
                }
            }
            Builtin::Ignore => {
                args.pop();
                Ok(Value::Unit)
            }
        }
    }
}

fn take_pair(mut args: Vec<Value>) -> (Value, Value) {
    match args.pop() {
        Some(Value::Tuple(items)) if items.len() == 2 => (items[0].clone(), items[1].clone()),
        _ => (Value::Unit, Value::Unit),
    }
}

fn arith(op: Builtin, a: Value, b: Value, pos: &Span) -> Result<Value, Raised> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            let result = match op {
                Builtin::Plus => x.checked_add(y),
                Builtin::Minus => x.checked_sub(y),
                _ => x.checked_mul(y),
            };
            match result {
                Some(v) => Ok(Value::Int(v)),
                None => Err(Raised::exn(overflow_packet(), pos)),
            }
        }
        (Value::Real(x), Value::Real(y)) => {
            let v = match op {
                Builtin::Plus => x + y,
                Builtin::Minus => x - y,
                _ => x * y,
            };
            Ok(Value::Real(v))
        }
        _ => Err(Raised::internal(pos)),
    }
}
