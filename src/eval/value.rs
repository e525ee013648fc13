//! Runtime value representation.
//!
//! A value's shape is fixed by its static type; the evaluator never
//! checks shapes except where a bug would make it miscompile, in which
//! case it raises an internal error rather than panicking.

use std::fmt;
use std::rc::Rc;

use super::code::{Closure, FnCode};
use crate::eval::builtins::Builtin;

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Real(f64),
    Char(char),
    String(String),
    Tuple(Rc<Vec<Value>>),
    /// Fields in label order.
    Record(Rc<Vec<(String, Value)>>),
    List(Rc<Vec<Value>>),
    /// A data-constructor or exception value.
    Ctor(Rc<CtorValue>),
    Closure(Rc<Closure>),
    /// A builtin, possibly partially applied.
    Primitive {
        builtin: Builtin,
        args: Vec<Value>,
    },
    /// Indirection cell for recursive bindings; transparent to `Get`.
    Rec(Rc<std::cell::RefCell<Value>>),
}

#[derive(Debug, Clone)]
pub struct CtorValue {
    pub name: String,
    /// Tag within the datatype; for exceptions a session-unique id.
    pub ordinal: usize,
    pub datatype: String,
    pub arg: Option<Value>,
    /// A unary constructor not yet applied; behaves as a function.
    pub needs_arg: bool,
}

impl Value {
    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn record(fields: Vec<(String, Value)>) -> Value {
        Value::Record(Rc::new(fields))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn ctor(name: impl Into<String>, ordinal: usize, datatype: impl Into<String>, arg: Option<Value>) -> Value {
        Value::Ctor(Rc::new(CtorValue {
            name: name.into(),
            ordinal,
            datatype: datatype.into(),
            arg,
            needs_arg: false,
        }))
    }

    /// A unary constructor awaiting its payload.
    pub fn ctor_fn(name: impl Into<String>, ordinal: usize, datatype: impl Into<String>) -> Value {
        Value::Ctor(Rc::new(CtorValue {
            name: name.into(),
            ordinal,
            datatype: datatype.into(),
            arg: None,
            needs_arg: true,
        }))
    }

    pub fn closure(fn_code: Rc<FnCode>, frame: Vec<Value>) -> Value {
        Value::Closure(Rc::new(Closure { fn_code, frame }))
    }

    /// Look through a recursion cell.
    pub fn unwrap_rec(self) -> Value {
        match self {
            Value::Rec(cell) => cell.borrow().clone(),
            v => v,
        }
    }

    /// Structural equality, defined for every equality-admitting shape.
    /// Function values never reach this through a well-typed program.
    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_value(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((l1, x), (l2, y))| l1 == l2 && x.eq_value(y))
            }
            (Value::Ctor(a), Value::Ctor(b)) => {
                a.ordinal == b.ordinal
                    && a.datatype == b.datatype
                    && match (&a.arg, &b.arg) {
                        (None, None) => true,
                        (Some(x), Some(y)) => x.eq_value(y),
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    /// Ordering for the overloaded comparison operators: defined on
    /// int, real, string and char.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// SML-style rendering of a real: always with a decimal point, tilde
/// for the sign.
fn format_real(x: f64) -> String {
    let s = if x == x.trunc() && x.is_finite() {
        format!("{x:.1}")
    } else {
        format!("{x}")
    };
    s.replace('-', "~")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => {
                if *i < 0 {
                    write!(f, "~{}", i.unsigned_abs())
                } else {
                    write!(f, "{i}")
                }
            }
            Value::Real(x) => write!(f, "{}", format_real(*x)),
            Value::Char(c) => write!(f, "#\"{c}\""),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (l, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{l}={v}")?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Ctor(c) if c.needs_arg => write!(f, "fn"),
            Value::Ctor(c) => match &c.arg {
                None => write!(f, "{}", c.name),
                Some(arg) => {
                    let needs_parens = matches!(arg, Value::Ctor(inner) if inner.arg.is_some());
                    if needs_parens {
                        write!(f, "{} ({})", c.name, arg)
                    } else {
                        write!(f, "{} {}", c.name, arg)
                    }
                }
            },
            Value::Closure(_) | Value::Primitive { .. } | Value::Rec(_) => write!(f, "fn"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_negative_numbers_use_tilde() {
        assert_eq!(Value::Int(-2).to_string(), "~2");
        assert_eq!(Value::Real(-10.25).to_string(), "~10.25");
    }

    #[test]
    fn display_whole_reals_keep_a_decimal_point() {
        assert_eq!(Value::Real(5.0).to_string(), "5.0");
    }

    #[test]
    fn display_collections() {
        let v = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(v.to_string(), "[1,2]");
        let t = Value::tuple(vec![Value::Int(1), Value::String("a".into())]);
        assert_eq!(t.to_string(), "(1,\"a\")");
        let r = Value::record(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Bool(true)),
        ]);
        assert_eq!(r.to_string(), "{a=1,b=true}");
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(a.eq_value(&b));
        let c = Value::ctor("SOME", 1, "option", Some(Value::Int(1)));
        let d = Value::ctor("SOME", 1, "option", Some(Value::Int(2)));
        assert!(!c.eq_value(&d));
    }

    #[test]
    fn compare_is_defined_on_ordered_prims() {
        use std::cmp::Ordering;
        assert_eq!(
            Value::String("a".into()).compare(&Value::String("b".into())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(2).compare(&Value::Int(2)), Some(Ordering::Equal));
    }
}
