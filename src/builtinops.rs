//! Standard library installed into the root environment.
//!
//! Every entry is an ordinary procedure: its arguments are evaluated before
//! the call. Special forms (`quote`, `if`, `define`, `set!`, `lambda`) are
//! recognized by the evaluator and are not part of this registry.
//!
//! ```scheme
//! (+ 1 2 3)                    ; 6
//! (/ 1 4)                      ; 0.25
//! (map + (list 1 2) (list 10 20)) ; (11 22)
//! (round 2.5)                  ; 2
//! ```
//!
//! ## Conventions
//!
//! - Arithmetic keeps integers exact and reports overflow; any float operand
//!   makes the result a float, and `/` always produces a float
//! - `<`, `>`, `<=` and `>=` take two or more numbers and hold for every
//!   adjacent pair; `=` compares any values, numbers numerically
//! - Type errors are reported as [`Error::HostProcedure`]
//! - Arity is validated before the implementation runs
//!
//! ## Adding New Operations
//!
//! 1. Write the function with typed parameters (`Number`, `Value`,
//!    `Vec<Value>`, `ValueIter`, `NumIter`, `ListIter`)
//! 2. Add a [`BuiltinOp`] entry to `BUILTIN_OPS` with its identifier and arity
//! 3. Procedures that call other procedures take the [`HigherOrderFn`] shape

use crate::Error;
use crate::ast::{ApplyFn, Builtin, HigherOrderFn, Number, Value};
use crate::evaluator::Arity;
use crate::intooperation::{
    IntoOperation, IntoVariadicOperation, ListIter, NumIter, OperationFn, ValueIter,
};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Definition of a built-in procedure
#[derive(Clone)]
pub struct BuiltinOp {
    /// Identifier the procedure is bound to in the root environment
    pub id: &'static str,
    /// Expected number of arguments
    pub arity: Arity,
    builtin: Builtin,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Plain procedure; the argument count is checked before `func` runs
    fn function(id: &'static str, arity: Arity, func: Arc<OperationFn>) -> Self {
        let checked: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            func(args)
        });
        BuiltinOp {
            id,
            arity,
            builtin: Builtin::Operation(checked),
        }
    }

    /// Procedure that applies other procedures; `func` checks its own arguments
    fn higher_order(id: &'static str, arity: Arity, func: HigherOrderFn) -> Self {
        BuiltinOp {
            id,
            arity,
            builtin: Builtin::HigherOrder(func),
        }
    }

    pub fn builtin(&self) -> &Builtin {
        &self.builtin
    }

    /// The procedure value bound in the root environment
    pub fn to_value(&self) -> Value {
        Value::BuiltinFunction {
            id: self.id.to_owned(),
            func: self.builtin.clone(),
        }
    }
}

//
// Builtin Function Implementations
//

// Chained numeric comparison: holds when every adjacent pair satisfies `$op`
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: Number, rest: NumIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

// Chained equality over any values; numbers compare numerically
fn builtin_eq(first: Value, rest: ValueIter<'_>) -> bool {
    let mut prev = &first;
    for current in rest {
        if prev != current {
            return false;
        }
        prev = current;
    }
    true
}

fn builtin_add(args: NumIter<'_>) -> Result<Number, Error> {
    let mut sum = Number::Int(0);
    for n in args {
        sum = sum.add(n)?;
    }
    Ok(sum)
}

fn builtin_sub(first: Number, rest: NumIter<'_>) -> Result<Number, Error> {
    let mut iter = rest.peekable();

    if iter.peek().is_none() {
        return first.neg();
    }

    let mut result = first;
    for n in iter {
        result = result.sub(n)?;
    }
    Ok(result)
}

fn builtin_mul(args: NumIter<'_>) -> Result<Number, Error> {
    let mut product = Number::Int(1);
    for n in args {
        product = product.mul(n)?;
    }
    Ok(product)
}

// (/ x) is the reciprocal of x
fn builtin_div(first: Number, rest: NumIter<'_>) -> Result<Number, Error> {
    let mut iter = rest.peekable();

    if iter.peek().is_none() {
        return Number::Int(1).div(first);
    }

    let mut result = first;
    for n in iter {
        result = result.div(n)?;
    }
    Ok(result)
}

fn builtin_abs(n: Number) -> Result<Number, Error> {
    n.abs()
}

/// Pick the number `wins` prefers; a single list argument supplies the candidates
fn extremum(
    name: &str,
    first: Value,
    rest: NumIter<'_>,
    wins: fn(&Number, &Number) -> bool,
) -> Result<Number, Error> {
    let candidates: Vec<Number> = match first {
        Value::List(items) if rest.len() == 0 => items
            .into_iter()
            .map(Number::try_from)
            .collect::<Result<_, _>>()?,
        other => std::iter::once(Number::try_from(other)?)
            .chain(rest)
            .collect(),
    };

    let mut candidates = candidates.into_iter();
    let Some(mut result) = candidates.next() else {
        return Err(Error::HostProcedure(format!("{name} of empty list")));
    };
    for n in candidates {
        if wins(&n, &result) {
            result = n;
        }
    }
    Ok(result)
}

fn builtin_max(first: Value, rest: NumIter<'_>) -> Result<Number, Error> {
    extremum("max", first, rest, Number::gt)
}

fn builtin_min(first: Value, rest: NumIter<'_>) -> Result<Number, Error> {
    extremum("min", first, rest, Number::lt)
}

/// Round an integer to a negative number of decimal places, half to even
fn round_int_places(n: i64, places: i64) -> Result<Number, Error> {
    if places >= 0 {
        return Ok(Number::Int(n));
    }

    // Past 10^38 every i64 rounds to zero
    let Some(scale) = u32::try_from(places.unsigned_abs())
        .ok()
        .and_then(|exp| 10i128.checked_pow(exp))
    else {
        return Ok(Number::Int(0));
    };

    let n = i128::from(n);
    let mut quotient = n.div_euclid(scale);
    let twice_remainder = 2 * n.rem_euclid(scale);
    if twice_remainder > scale || (twice_remainder == scale && quotient % 2 != 0) {
        quotient += 1;
    }

    i64::try_from(quotient * scale)
        .map(Number::Int)
        .map_err(|_| Error::HostProcedure("integer overflow in round".into()))
}

/// Round half to even. Without a digit count the result is an integer; with
/// one, integers stay integers and floats stay floats.
fn builtin_round(n: Number, mut digits: NumIter<'_>) -> Result<Number, Error> {
    match (n, digits.next()) {
        (Number::Int(_), None) => Ok(n),
        (Number::Float(x), None) => {
            let rounded = x.round_ties_even();
            // i64::MAX as f64 rounds up to 2^63, which is out of range
            if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
                Ok(Number::Int(rounded as i64))
            } else {
                Err(Error::HostProcedure(format!(
                    "cannot round {x} to an integer"
                )))
            }
        }
        (Number::Int(i), Some(Number::Int(places))) => round_int_places(i, places),
        (Number::Float(x), Some(Number::Int(places))) => {
            let places = i32::try_from(places).map_err(|_| {
                Error::HostProcedure(format!("round: digit count out of range: {places}"))
            })?;
            let scale = 10f64.powi(places);
            Ok(Number::Float((x * scale).round_ties_even() / scale))
        }
        (_, Some(other)) => Err(Error::HostProcedure(format!(
            "round: digit count must be an integer, got {other}"
        ))),
    }
}

fn builtin_car(mut list: ValueIter<'_>) -> Result<Value, Error> {
    match list.next() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::HostProcedure("car of empty list".into())),
    }
}

fn builtin_cdr(mut list: ValueIter<'_>) -> Result<Value, Error> {
    let Some(_) = list.next() else {
        return Err(Error::HostProcedure("cdr of empty list".into()));
    };

    Ok(Value::List(list.cloned().collect()))
}

// The tail must be a list; there are no dotted pairs
fn builtin_cons(first: Value, rest: Vec<Value>) -> Value {
    let mut new_list = Vec::with_capacity(rest.len() + 1);
    new_list.push(first);
    new_list.extend(rest);
    Value::List(new_list)
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::List(args.cloned().collect())
}

fn builtin_append(lists: ListIter<'_>) -> Value {
    Value::List(lists.flat_map(|items| items.iter().cloned()).collect())
}

fn builtin_length(list: ValueIter<'_>) -> usize {
    list.len()
}

fn builtin_begin(first: Value, rest: ValueIter<'_>) -> Value {
    rest.last().cloned().unwrap_or(first)
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

fn builtin_is_eq(first: Value, second: Value) -> bool {
    match (&first, &second) {
        // Distinct list objects are never identical; only the empty list is unique
        (Value::List(a), Value::List(b)) => a.is_empty() && b.is_empty(),
        _ => first == second,
    }
}

fn builtin_is_equal(first: Value, second: Value) -> bool {
    first == second
}

fn builtin_is_list(value: Value) -> bool {
    matches!(value, Value::List(_))
}

fn builtin_is_null(value: Value) -> bool {
    value.is_nil()
}

fn builtin_is_number(value: Value) -> bool {
    matches!(value, Value::Number(_))
}

fn builtin_is_procedure(value: Value) -> bool {
    value.is_procedure()
}

fn builtin_is_symbol(value: Value) -> bool {
    matches!(value, Value::Symbol(_))
}

fn builtin_print(args: ValueIter<'_>) -> Value {
    let rendered: Vec<String> = args.map(ToString::to_string).collect();
    println!("{}", rendered.join(" "));
    Value::Unspecified
}

// (apply proc (arg ...))
fn builtin_apply(args: Vec<Value>, apply: &mut ApplyFn<'_>) -> Result<Value, Error> {
    let [procedure, arguments] = <[Value; 2]>::try_from(args)
        .map_err(|args| Error::arity_error(Arity::Exact(2), args.len()))?;

    match arguments {
        Value::List(items) => apply(&procedure, items),
        other => Err(Error::HostProcedure(format!(
            "apply: expected list, got {other}"
        ))),
    }
}

// (map proc list ...) stops at the shortest list
fn builtin_map(args: Vec<Value>, apply: &mut ApplyFn<'_>) -> Result<Value, Error> {
    Arity::AtLeast(2).validate(args.len())?;

    let mut args = args.into_iter();
    let Some(procedure) = args.next() else {
        return Err(Error::arity_error(Arity::AtLeast(2), 0));
    };

    let lists = args
        .map(|arg| match arg {
            Value::List(items) => Ok(items),
            other => Err(Error::HostProcedure(format!(
                "map: expected list, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let shortest = lists.iter().map(Vec::len).min().unwrap_or(0);

    (0..shortest)
        .map(|i| {
            let call_args = lists.iter().map(|items| items[i].clone()).collect();
            apply(&procedure, call_args)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

/// Global registry of all built-in procedures.
///
/// Fixed and variadic builtins are wired through the same adapter layer
/// used for custom builtin registration, once, via a `LazyLock`.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    vec![
        // Arithmetic
        BuiltinOp::function(
            "+",
            Arity::Any,
            builtin_variadic::<(NumIter<'static>,), _>(builtin_add),
        ),
        BuiltinOp::function(
            "-",
            Arity::AtLeast(1),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_sub),
        ),
        BuiltinOp::function(
            "*",
            Arity::Any,
            builtin_variadic::<(NumIter<'static>,), _>(builtin_mul),
        ),
        BuiltinOp::function(
            "/",
            Arity::AtLeast(1),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_div),
        ),
        BuiltinOp::function(
            "abs",
            Arity::Exact(1),
            builtin_fixed::<(Number,), _>(builtin_abs),
        ),
        BuiltinOp::function(
            "max",
            Arity::AtLeast(1),
            builtin_variadic::<(Value, NumIter<'static>), _>(builtin_max),
        ),
        BuiltinOp::function(
            "min",
            Arity::AtLeast(1),
            builtin_variadic::<(Value, NumIter<'static>), _>(builtin_min),
        ),
        BuiltinOp::function(
            "round",
            Arity::Range(1, 2),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_round),
        ),
        // Comparison
        BuiltinOp::function(
            "=",
            Arity::AtLeast(2),
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_eq),
        ),
        BuiltinOp::function(
            "<",
            Arity::AtLeast(2),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_lt),
        ),
        BuiltinOp::function(
            ">",
            Arity::AtLeast(2),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_gt),
        ),
        BuiltinOp::function(
            "<=",
            Arity::AtLeast(2),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_le),
        ),
        BuiltinOp::function(
            ">=",
            Arity::AtLeast(2),
            builtin_variadic::<(Number, NumIter<'static>), _>(builtin_ge),
        ),
        // Lists
        BuiltinOp::function(
            "car",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_car),
        ),
        BuiltinOp::function(
            "cdr",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_cdr),
        ),
        BuiltinOp::function(
            "cons",
            Arity::Exact(2),
            builtin_fixed::<(Value, Vec<Value>), _>(builtin_cons),
        ),
        BuiltinOp::function(
            "list",
            Arity::Any,
            builtin_variadic::<(ValueIter<'static>,), _>(builtin_list),
        ),
        BuiltinOp::function(
            "append",
            Arity::Any,
            builtin_variadic::<(ListIter<'static>,), _>(builtin_append),
        ),
        BuiltinOp::function(
            "length",
            Arity::Exact(1),
            builtin_fixed::<(ValueIter<'static>,), _>(builtin_length),
        ),
        // Predicates
        BuiltinOp::function(
            "not",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_not),
        ),
        BuiltinOp::function(
            "eq?",
            Arity::Exact(2),
            builtin_fixed::<(Value, Value), _>(builtin_is_eq),
        ),
        BuiltinOp::function(
            "equal?",
            Arity::Exact(2),
            builtin_fixed::<(Value, Value), _>(builtin_is_equal),
        ),
        BuiltinOp::function(
            "list?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_list),
        ),
        BuiltinOp::function(
            "null?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_null),
        ),
        BuiltinOp::function(
            "number?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_number),
        ),
        BuiltinOp::function(
            "procedure?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_procedure),
        ),
        BuiltinOp::function(
            "symbol?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_symbol),
        ),
        // Sequencing and output
        BuiltinOp::function(
            "begin",
            Arity::AtLeast(1),
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_begin),
        ),
        BuiltinOp::function(
            "print",
            Arity::Any,
            builtin_variadic::<(ValueIter<'static>,), _>(builtin_print),
        ),
        // Higher-order
        BuiltinOp::higher_order("apply", Arity::Exact(2), builtin_apply),
        BuiltinOp::higher_order("map", Arity::AtLeast(2), builtin_map),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// All builtin procedures, in registry order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin procedure by identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use pretty_assertions::assert_eq;

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    fn builtin(name: &str) -> Value {
        find_builtin_op(name).unwrap().to_value()
    }

    /// Apply callback that only understands builtins, enough for registry tests
    fn apply_builtin(procedure: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match procedure {
            Value::BuiltinFunction { id, .. } => call_builtin(id, &args),
            other => Err(Error::NotAProcedure(other.to_string())),
        }
    }

    /// Invoke a builtin through the registry using the erased signature
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        match op.builtin() {
            Builtin::Operation(func) => func(args.to_vec()),
            Builtin::HigherOrder(func) => func(args.to_vec(), &mut apply_builtin),
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let car_op = find_builtin_op("car").unwrap();
        assert_eq!(car_op.arity, Arity::Exact(1));
        assert_eq!(car_op.to_value(), builtin("car"));
        assert_eq!(car_op.to_value().to_string(), "#<builtin:car>");

        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::Any);
        if let Builtin::Operation(func) = add_op.builtin() {
            assert_eq!(func(vec![val(1), val(2)]).unwrap(), val(3));
        } else {
            panic!("Expected Operation variant");
        }

        assert!(matches!(
            find_builtin_op("map").unwrap().builtin(),
            Builtin::HigherOrder(_)
        ));

        // Special forms live in the evaluator
        for form in ["quote", "if", "define", "set!", "lambda"] {
            assert!(find_builtin_op(form).is_none(), "{form} should not be a builtin");
        }
        assert!(find_builtin_op("unknown").is_none());

        // Ids are unique
        let all_ops = get_builtin_ops();
        let mut ids: Vec<&str> = all_ops.iter().map(|op| op.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all_ops.len());
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let int_list = val([1, 2, 3]);
        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();
        let ascending: Vec<Value> = (0..10).map(val).collect();
        let nested = val([val([val([1])])]);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            test!("+", &[], success(0)),
            test!("+", &[val(5)], success(5)),
            test!("+", &[val(1), val(2), val(3)], success(6)),
            test!("+", &many_ones, success(100)),
            test!("+", &[val(1), val(0.5)], success(1.5)),
            test!("+", &[val(i64::MAX), val(1)], None),
            test!("+", &[val(1), sym("a")], None),
            test!("-", &[val(5)], success(-5)),
            test!("-", &[val(10), val(3), val(2)], success(5)),
            test!("-", &[val(2.5)], success(-2.5)),
            test!("-", &[val(i64::MIN)], None),
            test!("-", &[], None),
            test!("*", &[], success(1)),
            test!("*", &[val(2), val(3), val(4)], success(24)),
            test!("*", &[val(2), val(0.5)], success(1.0)),
            test!("*", &[val(i64::MAX), val(2)], None),
            test!("/", &[val(10), val(2)], success(5.0)),
            test!("/", &[val(1), val(4)], success(0.25)),
            test!("/", &[val(4)], success(0.25)),
            test!("/", &[val(100), val(5), val(2)], success(10.0)),
            test!("/", &[val(1), val(0)], None),
            test!("/", &[val(0)], None),
            test!("/", &[], None),
            test!("abs", &[val(-7)], success(7)),
            test!("abs", &[val(-2.5)], success(2.5)),
            test!("abs", &[val(i64::MIN)], None),
            test!("max", &[val(3), val(9), val(4)], success(9)),
            test!("max", &[val(1), val(2.5)], success(2.5)),
            test!("min", &[val(3), val(-9), val(4)], success(-9)),
            test!("min", &[val(7)], success(7)),
            test!("max", &[], None),
            test!("max", &[int_list.clone()], success(3)),
            test!("min", &[val([4, -2, 7])], success(-2)),
            test!("max", &[val(vec![val(1), val(2.5)])], success(2.5)),
            test!("max", &[nil()], None),
            test!("max", &[val([1, 2]), val(3)], None),
            test!("min", &[val([1, 2]), val([3])], None),
            test!("max", &[sym("a")], None),
            // =================================================================
            // ROUNDING (half to even)
            // =================================================================
            test!("round", &[val(2.5)], success(2)),
            test!("round", &[val(3.5)], success(4)),
            test!("round", &[val(-2.5)], success(-2)),
            test!("round", &[val(2.6)], success(3)),
            test!("round", &[val(7)], success(7)),
            test!("round", &[val(3.14159), val(2)], success(3.14)),
            test!("round", &[val(1.25), val(1)], success(1.2)),
            test!("round", &[val(3.14159), val(2.0)], None),
            test!("round", &[val(7), val(2)], success(7)),
            test!("round", &[val(1234), val(-2)], success(1200)),
            test!("round", &[val(1250), val(-2)], success(1200)),
            test!("round", &[val(1350), val(-2)], success(1400)),
            test!("round", &[val(-25), val(-1)], success(-20)),
            test!("round", &[val(5), val(-1)], success(0)),
            test!("round", &[val(i64::MAX), val(-50)], success(0)),
            test!("round", &[val(i64::MAX), val(-19)], None),
            test!("round", &[val(1e300)], None),
            test!("round", &[val(1), val(2), val(3)], None),
            // =================================================================
            // COMPARISON (chained)
            // =================================================================
            test!(">", &[val(5), val(3)], success(true)),
            test!(">", &[val(3), val(5)], success(false)),
            test!("<", &ascending, success(true)),
            test!("<", &[val(1), val(3), val(2)], success(false)),
            test!(">=", &[val(3), val(3), val(2)], success(true)),
            test!("<=", &[val(1), val(1), val(0)], success(false)),
            test!("=", &[val(2), val(2.0)], success(true)),
            test!("=", &[val(2), val(2), val(3)], success(false)),
            test!("=", &[val(2)], None),
            test!("=", &[sym("a"), sym("a")], success(true)),
            test!("=", &[sym("a"), sym("b")], success(false)),
            test!("=", &[val(1), sym("a")], success(false)),
            test!("=", &[int_list.clone(), val([1, 2, 3])], success(true)),
            test!("=", &[val(true), val(true), val(true)], success(true)),
            test!("<", &[val(1), sym("b")], None),
            // =================================================================
            // LIST OPERATIONS
            // =================================================================
            test!("car", &[int_list.clone()], success(1)),
            test!("car", &[nested.clone()], success([val([1])])),
            test!("car", &[nil()], None),
            test!("car", &[val(1)], None),
            test!("cdr", &[int_list.clone()], success([2, 3])),
            test!("cdr", &[val([1])], success(nil())),
            test!("cdr", &[nil()], None),
            test!("cons", &[val(0), int_list.clone()], success([0, 1, 2, 3])),
            test!("cons", &[int_list.clone(), nil()], success([int_list.clone()])),
            test!("cons", &[val(1), val(2)], None),
            test!("list", &[], success(nil())),
            test!("list", &[val(1), sym("a")], success(vec![val(1), sym("a")])),
            test!(
                "append",
                &[val([1, 2]), nil(), val([3])],
                success([1, 2, 3])
            ),
            test!("append", &[], success(nil())),
            test!("append", &[val([1]), val(2)], None),
            test!("length", &[int_list.clone()], success(3)),
            test!("length", &[nil()], success(0)),
            test!("length", &[val(5)], None),
            // =================================================================
            // PREDICATES
            // =================================================================
            test!("not", &[val(false)], success(true)),
            test!("not", &[val(0)], success(true)),
            test!("not", &[nil()], success(true)),
            test!("not", &[val(1)], success(false)),
            test!("not", &[sym("x")], success(false)),
            test!("eq?", &[sym("a"), sym("a")], success(true)),
            test!("eq?", &[val(1), val(1)], success(true)),
            test!("eq?", &[nil(), nil()], success(true)),
            test!("eq?", &[int_list.clone(), int_list.clone()], success(false)),
            test!("eq?", &[builtin("car"), builtin("car")], success(true)),
            test!("equal?", &[int_list.clone(), val([1, 2, 3])], success(true)),
            test!("equal?", &[int_list.clone(), val([1, 2])], success(false)),
            test!("equal?", &[val(1), sym("a")], success(false)),
            test!("list?", &[nil()], success(true)),
            test!("list?", &[val(1)], success(false)),
            test!("null?", &[nil()], success(true)),
            test!("null?", &[int_list.clone()], success(false)),
            test!("number?", &[val(2.5)], success(true)),
            test!("number?", &[sym("x")], success(false)),
            test!("procedure?", &[builtin("+")], success(true)),
            test!("procedure?", &[sym("+")], success(false)),
            test!("symbol?", &[sym("x")], success(true)),
            test!("symbol?", &[val(true)], success(false)),
            // =================================================================
            // SEQUENCING
            // =================================================================
            test!("begin", &[val(1)], success(1)),
            test!("begin", &[val(1), val(2), val(3)], success(3)),
            test!("begin", &[], None),
            // =================================================================
            // HIGHER-ORDER
            // =================================================================
            test!("apply", &[builtin("+"), int_list.clone()], success(6)),
            test!("apply", &[builtin("list"), nil()], success(nil())),
            test!("apply", &[builtin("+"), val(1)], None),
            test!("apply", &[builtin("+")], None),
            test!("apply", &[sym("x"), nil()], None),
            test!("map", &[builtin("abs"), val([-1, 2, -3])], success([1, 2, 3])),
            test!(
                "map",
                &[builtin("+"), val([1, 2, 3]), val([10, 20])],
                success([11, 22])
            ),
            test!("map", &[builtin("abs"), nil()], success(nil())),
            test!("map", &[builtin("abs")], None),
            test!("map", &[builtin("abs"), val(1)], None),
            test!("map", &[builtin("car"), val([1, 2])], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "#{} ({name}) wrong result", i + 1);
                }
                (Err(_), None) => {}
                (Ok(actual), None) => {
                    panic!("#{} ({name}) expected error, got {actual:?}", i + 1)
                }
                (Err(err), Some(expected)) => {
                    panic!("#{} ({name}) expected {expected:?}, got error {err}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_print_returns_unspecified() {
        let result = call_builtin("print", &[val(1), sym("a")]).unwrap();
        assert!(matches!(result, Value::Unspecified));
    }

    #[test]
    fn test_error_message_construction() {
        let test_cases: Vec<(&str, Vec<Value>, &str)> = vec![
            ("car", vec![nil()], "car of empty list"),
            ("cdr", vec![nil()], "cdr of empty list"),
            ("/", vec![val(1), val(0)], "division by zero"),
            ("+", vec![val(1), sym("a")], "expected number, got a"),
            ("cons", vec![val(1), val(2)], "expected list, got 2"),
            ("map", vec![builtin("abs"), val(3)], "map: expected list, got 3"),
            (
                "car",
                vec![],
                "ArityMismatch: procedure expected exactly 1 arguments, got 0",
            ),
            (
                "round",
                vec![val(1), val(2), val(3)],
                "ArityMismatch: procedure expected between 1 and 2 arguments, got 3",
            ),
            (
                "=",
                vec![val(1)],
                "ArityMismatch: procedure expected at least 2 arguments, got 1",
            ),
        ];

        for (name, args, expected) in test_cases {
            let err = call_builtin(name, &args).unwrap_err();
            assert_eq!(err.to_string(), expected, "{name}");
        }
    }
}
