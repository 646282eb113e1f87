use crate::ast::{Builtin, Closure, Value};
use crate::builtinops::get_builtin_ops;
use crate::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::{DEFAULT_MAX_EVAL_DEPTH, Error};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Minimum stack space to keep available before recursing (100KB red zone)
const RED_ZONE: usize = 100 * 1024;

/// Stack space allocated each time the red zone is reached (1MB)
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Number of arguments a procedure accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(self, arg_count: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Range(min, max) => (min..=max).contains(&arg_count),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, arg_count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "between {min} and {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of evaluator calls before [`Error::RecursionLimit`]
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}

impl EvalConfig {
    pub fn with_max_depth(max_depth: usize) -> Self {
        EvalConfig { max_depth }
    }
}

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Environment for variable bindings
///
/// A cheap, shared handle to one scope node. Cloning the handle does not copy
/// the bindings: a closure holding a clone keeps the scope alive and observes
/// later `define`/`set!` on it. Scopes only point at their parent.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<&String> = scope.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("parent", &scope.parent)
            .finish()
    }
}

impl Environment {
    /// Create an empty root environment (no builtins; see [`create_global_env`])
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create an empty scope chained to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Create a scope binding `params` to `args` positionally, chained to `outer`
    ///
    /// The two lists must have the same length.
    pub fn from_bindings(
        params: &[String],
        args: Vec<Value>,
        outer: &Environment,
    ) -> Result<Self, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error(Arity::Exact(params.len()), args.len()));
        }

        let bindings = params.iter().cloned().zip(args).collect();
        Ok(Environment(Rc::new(RefCell::new(Scope {
            bindings,
            parent: Some(outer.clone()),
        }))))
    }

    /// Bind `name` in this scope, shadowing any outer binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Find the innermost environment in the chain that binds `name`
    pub fn find(&self, name: &str) -> Result<Environment, Error> {
        let mut current = self.clone();
        loop {
            let parent = {
                let scope = current.0.borrow();
                if scope.bindings.contains_key(name) {
                    break;
                }
                scope.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Err(Error::UnboundVariable(name.to_owned())),
            }
        }
        Ok(current)
    }

    /// Look up `name` through the chain
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.find(name)?
            .0
            .borrow()
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Assign to the existing binding of `name` wherever it is found
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let target = self.find(name)?;
        target.0.borrow_mut().bindings.insert(name.to_owned(), value);
        Ok(())
    }

    /// True if `name` is bound in this scope itself (ignoring parents)
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// True if both handles refer to the same scope node
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a custom builtin function operating on raw argument slices.
    ///
    /// This is the low-level API. For most new code, prefer
    /// [`Environment::register_builtin_operation`], which converts
    /// arguments to Rust types and checks arity automatically.
    ///
    /// # Example
    /// ```
    /// use minilisp::evaluator::{create_global_env, eval};
    /// use minilisp::reader::parse;
    /// use minilisp::ast::Value;
    /// use minilisp::Error;
    ///
    /// fn count_args(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::from(args.len()))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count-args", count_args);
    /// let result = eval(&parse("(count-args 1 2 3)").unwrap(), &env).unwrap();
    /// assert_eq!(result, Value::from(3));
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.define_builtin(name, wrapped);
    }

    /// Register a strongly-typed Rust function or closure as a builtin.
    ///
    /// ```rust,ignore
    /// fn add(a: Number, b: Number) -> Result<Number, Error> { ... }
    /// env.register_builtin_operation::<_, (Number, Number)>("add", add);
    /// ```
    ///
    /// Supported parameter types: `Value`, `Number`, `Vec<Value>` and the
    /// list iterators `ValueIter<'_>`, `NumIter<'_>` and `ListIter<'_>`.
    /// Supported return types: anything `Into<Value>`, or `Result<R, Error>`
    /// with `R: Into<Value>`. Arity is the number of parameters.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        self.define_builtin(name, func.into_operation());
    }

    /// Register a builtin whose last parameter collects the remaining arguments.
    ///
    /// The rest parameter is one of `ValueIter<'_>`, `NumIter<'_>` or
    /// `ListIter<'_>`, optionally preceded by fixed parameters. Since the
    /// total argument count is not derivable from the signature, `arity`
    /// is validated before each call.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.define_builtin(name, wrapped);
    }

    fn define_builtin(&self, name: &str, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                func: Builtin::Operation(func),
            },
        );
    }

    /// Get all bindings visible from this environment
    /// Returns (name, value) pairs sorted by name; inner bindings shadow outer ones
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        let scope = self.0.borrow();

        if let Some(parent) = &scope.parent {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in &scope.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Special forms, recognized by the leading symbol of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Quote,
    If,
    Define,
    Set,
    Lambda,
}

impl SpecialForm {
    fn from_symbol(name: &str) -> Option<Self> {
        match name {
            "quote" => Some(SpecialForm::Quote),
            "if" => Some(SpecialForm::If),
            "define" => Some(SpecialForm::Define),
            "set!" => Some(SpecialForm::Set),
            "lambda" => Some(SpecialForm::Lambda),
            _ => None,
        }
    }
}

/// Evaluate an expression with the default [`EvalConfig`]
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an expression with explicit settings
pub fn eval_with_config(
    expr: &Value,
    env: &Environment,
    config: &EvalConfig,
) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, config, 0)
}

/// Grow the native stack on demand so `max_depth` is reachable on small thread stacks
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= config.max_depth {
        warn!(max_depth = config.max_depth, "evaluation depth limit exceeded");
        return Err(Error::RecursionLimit {
            max_depth: config.max_depth,
        });
    }

    ensure_sufficient_stack(|| match expr {
        Value::Number(_)
        | Value::Bool(_)
        | Value::BuiltinFunction { .. }
        | Value::Function(_)
        | Value::Unspecified => Ok(expr.clone()),

        Value::Symbol(name) => env.get(name),

        Value::List(elements) => eval_list(elements, env, config, depth),
    })
}

fn eval_list(
    elements: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match elements {
        [] => Err(Error::NotAProcedure("()".to_owned())),
        [Value::Symbol(name), args @ ..] => match SpecialForm::from_symbol(name) {
            Some(SpecialForm::Quote) => eval_quote(args),
            Some(SpecialForm::If) => eval_if(args, env, config, depth),
            Some(SpecialForm::Define) => eval_define(args, env, config, depth),
            Some(SpecialForm::Set) => eval_set(args, env, config, depth),
            Some(SpecialForm::Lambda) => eval_lambda(args, env),
            None => eval_application(&elements[0], args, env, config, depth),
        },
        [op, args @ ..] => eval_application(op, args, env, config, depth),
    }
}

fn eval_quote(args: &[Value]) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::malformed(
            "quote",
            format!("expected exactly 1 argument, got {}", args.len()),
        )),
    }
}

fn eval_if(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [test, conseq, alt] => {
            let condition = eval_with_depth_tracking(test, env, config, depth + 1)?;
            let branch = if condition.is_truthy() { conseq } else { alt };
            eval_with_depth_tracking(branch, env, config, depth + 1)
        }
        _ => Err(Error::malformed(
            "if",
            format!("expected (if test conseq alt), got {} arguments", args.len()),
        )),
    }
}

fn eval_define(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, config, depth + 1)?;
            debug!(name = %name, value = %value, "define");
            env.define(name.clone(), value);
            Ok(Value::Unspecified)
        }
        // (define (name p1 p2 ...) body)
        [Value::List(signature), body] => match signature.as_slice() {
            [Value::Symbol(name), params @ ..] => {
                let params = parse_params("define", params)?;
                debug!(name = %name, ?params, "define procedure");
                env.define(name.clone(), make_closure(params, body, env));
                Ok(Value::Unspecified)
            }
            _ => Err(Error::malformed(
                "define",
                "procedure name must be a symbol",
            )),
        },
        [_, _] => Err(Error::malformed(
            "define",
            "target must be a symbol or (name params...)",
        )),
        _ => Err(Error::malformed(
            "define",
            format!("expected exactly 2 arguments, got {}", args.len()),
        )),
    }
}

fn eval_set(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            // The value is computed before the binding is looked up
            let value = eval_with_depth_tracking(expr, env, config, depth + 1)?;
            debug!(name = %name, value = %value, "set!");
            env.set(name, value)?;
            Ok(Value::Unspecified)
        }
        [_, _] => Err(Error::malformed("set!", "target must be a symbol")),
        _ => Err(Error::malformed(
            "set!",
            format!("expected exactly 2 arguments, got {}", args.len()),
        )),
    }
}

fn eval_lambda(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::List(params), body] => {
            let params = parse_params("lambda", params)?;
            Ok(make_closure(params, body, env))
        }
        [_, _] => Err(Error::malformed("lambda", "parameters must be a list")),
        _ => Err(Error::malformed(
            "lambda",
            format!("expected (lambda (params...) body), got {} arguments", args.len()),
        )),
    }
}

/// Validate a parameter list: symbols only, no duplicates
fn parse_params(form: &'static str, params: &[Value]) -> Result<Vec<String>, Error> {
    let mut names: Vec<String> = Vec::with_capacity(params.len());
    for param in params {
        match param {
            Value::Symbol(name) => {
                if names.contains(name) {
                    return Err(Error::malformed(
                        form,
                        format!("duplicate parameter name: {name}"),
                    ));
                }
                names.push(name.clone());
            }
            other => {
                return Err(Error::malformed(
                    form,
                    format!("parameters must be symbols, got {other}"),
                ));
            }
        }
    }
    Ok(names)
}

fn make_closure(params: Vec<String>, body: &Value, env: &Environment) -> Value {
    Value::Function(Rc::new(Closure {
        params,
        body: body.clone(),
        env: env.clone(),
    }))
}

/// Evaluate operator and operands left to right, then apply
fn eval_application(
    op: &Value,
    arg_exprs: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    let func = eval_with_depth_tracking(op, env, config, depth + 1)?;

    let args = arg_exprs
        .iter()
        .map(|arg| eval_with_depth_tracking(arg, env, config, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;

    apply_procedure(&func, args, config, depth)
}

/// Apply a procedure value to already-evaluated arguments
fn apply_procedure(
    func: &Value,
    args: Vec<Value>,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match func {
        Value::BuiltinFunction { id, func: builtin } => {
            let result = match builtin {
                Builtin::Operation(op) => op(args),
                Builtin::HigherOrder(op) => {
                    let mut apply = |proc: &Value, proc_args: Vec<Value>| {
                        apply_procedure(proc, proc_args, config, depth + 1)
                    };
                    op(args, &mut apply)
                }
            };
            result.map_err(|err| name_callee(err, id))
        }
        Value::Function(closure) => {
            let call_env = Environment::from_bindings(&closure.params, args, &closure.env)
                .map_err(|err| name_callee(err, &func.to_string()))?;
            trace!(procedure = %func, depth, "apply closure");
            eval_with_depth_tracking(&closure.body, &call_env, config, depth + 1)
        }
        other => Err(Error::NotAProcedure(other.to_string())),
    }
}

/// Attach the callee name to arity errors that were raised without one
fn name_callee(err: Error, callee: &str) -> Error {
    match err {
        Error::ArityMismatch {
            callee: None,
            expected,
            got,
        } => Error::arity_error_for(callee, expected, got),
        other => other,
    }
}

/// Create a root environment populated with the standard library
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    for builtin_op in get_builtin_ops() {
        env.define(builtin_op.id, builtin_op.to_value());
    }
    env
}
