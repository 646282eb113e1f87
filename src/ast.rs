//! This module defines the [`Value`] type that flows through the reader and the
//! evaluator. A single enum covers atoms (symbols, numbers, booleans), lists, and
//! procedures, so that code and data share one shape: a list read from source is
//! indistinguishable from a list built at runtime. Ergonomic helpers such as
//! [`val`], [`sym`] and [`nil`] build trees in code and tests, and the
//! [`std::fmt::Display`] implementation is the textual renderer used by the REPL.

use crate::Error;
use crate::evaluator::Environment;
use crate::intooperation::OperationFn;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

/// Numeric payload: an exact integer or a float
///
/// Equality and ordering are numeric across both kinds, so `5` equals `5.0`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    pub(crate) fn add(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .ok_or_else(|| overflow("addition")),
            (a, b) => Ok(Number::Float(a.as_f64() + b.as_f64())),
        }
    }

    pub(crate) fn sub(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_sub(b)
                .map(Number::Int)
                .ok_or_else(|| overflow("subtraction")),
            (a, b) => Ok(Number::Float(a.as_f64() - b.as_f64())),
        }
    }

    pub(crate) fn mul(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_mul(b)
                .map(Number::Int)
                .ok_or_else(|| overflow("multiplication")),
            (a, b) => Ok(Number::Float(a.as_f64() * b.as_f64())),
        }
    }

    /// True division; the result is always a float
    pub(crate) fn div(self, other: Number) -> Result<Number, Error> {
        if other.is_zero() {
            return Err(Error::HostProcedure("division by zero".into()));
        }
        Ok(Number::Float(self.as_f64() / other.as_f64()))
    }

    pub(crate) fn neg(self) -> Result<Number, Error> {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .ok_or_else(|| overflow("negation")),
            Number::Float(x) => Ok(Number::Float(-x)),
        }
    }

    pub(crate) fn abs(self) -> Result<Number, Error> {
        match self {
            Number::Int(n) => n
                .checked_abs()
                .map(Number::Int)
                .ok_or_else(|| overflow("abs")),
            Number::Float(x) => Ok(Number::Float(x.abs())),
        }
    }
}

fn overflow(operation: &str) -> Error {
    Error::HostProcedure(format!("integer overflow in {operation}"))
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            // Debug formatting keeps the fractional part ("5.0"), so a rendered
            // float reads back as a float
            Number::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// Host-side implementation of a builtin procedure
#[derive(Clone)]
pub enum Builtin {
    /// Plain function of its evaluated arguments
    Operation(Arc<OperationFn>),
    /// Function that calls back into the evaluator (`map`, `apply`)
    HigherOrder(HigherOrderFn),
}

/// Callback handed to higher-order builtins for applying a procedure value
pub type ApplyFn<'a> = dyn FnMut(&Value, Vec<Value>) -> Result<Value, Error> + 'a;

/// Signature of builtins that apply procedures
pub type HigherOrderFn = fn(Vec<Value>, &mut ApplyFn<'_>) -> Result<Value, Error>;

/// A user-defined procedure: parameter names, body and defining environment
///
/// Closures are never mutated after creation.
pub struct Closure {
    pub(crate) params: Vec<String>,
    pub(crate) body: Value,
    pub(crate) env: Environment,
}

impl Closure {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// Core expression type of the interpreter
///
/// To build trees by hand, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Integers and floats
    Number(Number),
    /// Symbols (identifiers)
    Symbol(String),
    /// Boolean values, produced by comparisons and predicates
    Bool(bool),
    /// Lists, both source code and runtime data; the empty list is nil
    List(Vec<Value>),
    /// Host-provided procedures, compared by id
    BuiltinFunction { id: String, func: Builtin },
    /// User-defined closures, compared by identity
    Function(Rc<Closure>),
    /// Result of forms evaluated only for their effect (define, set!, print)
    /// These values never equal themselves or any other value
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(Number::Int(n)) => write!(f, "Int({n})"),
            Value::Number(Number::Float(x)) => write!(f, "Float({x:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
            Value::Function(closure) => write!(
                f,
                "Function(params={:?}, body={:?})",
                closure.params, closure.body
            ),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(Number::Float(x))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(Number::Int(i64::from(n)))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        match i64::try_from(n) {
            Ok(n) => Value::Number(Number::Int(n)),
            Err(_) => Value::Number(Number::Float(n as f64)),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into Rust types, used by the builtin
// argument adapters.

impl TryFrom<Value> for Number {
    type Error = Error;

    fn try_from(value: Value) -> Result<Number, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::HostProcedure(format!("expected number, got {value}")))
        }
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Vec<Value>, Error> {
        if let Value::List(items) = value {
            Ok(items)
        } else {
            Err(Error::HostProcedure(format!("expected list, got {value}")))
        }
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating values from Rust literals, arrays and vectors
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
pub fn nil() -> Value {
    Value::List(vec![])
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::BuiltinFunction { id, .. } => write!(f, "#<builtin:{id}>"),
            Value::Function(closure) => write!(f, "#<lambda ({})>", closure.params.join(" ")),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl Value {
    /// Check if a value represents nil (empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::BuiltinFunction { .. } | Value::Function(_))
    }

    /// Truthiness used by `if` and `not`
    ///
    /// `#f`, the empty list, numeric zero and the unspecified result of
    /// `define`/`set!`/`print` are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Number(n) => !n.is_zero(),
            Value::Unspecified => false,
            Value::Symbol(_) | Value::BuiltinFunction { .. } | Value::Function(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::BuiltinFunction { id: id1, .. }, Value::BuiltinFunction { id: id2, .. }) => {
                // Compare builtins by id string, not function pointer
                id1 == id2
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Unspecified, _) | (_, Value::Unspecified) => false, // Unspecified never equals anything
            _ => false,
        }
    }
}
