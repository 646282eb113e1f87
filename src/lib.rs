//! minilisp - a minimal Lisp interpreter
//!
//! This crate turns source text into a nested expression tree and evaluates that
//! tree against a chain of lexical environments. The language is deliberately
//! small: atoms, lists, five special forms and user-defined closures.
//!
//! ```scheme
//! (define (factorial n) (if (= n 0) 1 (* n (factorial (- n 1)))))
//! (factorial 5)                      ; 120
//! (define make-adder (lambda (n) (lambda (x) (+ x n))))
//! ((make-adder 5) 3)                 ; 8
//! (car (list 1 2 3))                 ; 1
//! ```
//!
//! ## Semantics
//!
//! - Numbers are either exact integers or floats; integer arithmetic that
//!   overflows is reported rather than wrapped
//! - `#f`, the empty list, numeric zero and the unspecified result of
//!   `define`/`set!`/`print` are false, everything else is true
//! - Closures capture their defining environment (lexical scoping)
//! - Procedure application checks arity strictly
//! - Recursion depth is bounded by [`evaluator::EvalConfig::max_depth`]
//!
//! ## Modules
//!
//! - `reader`: tokenizer and recursive-descent parser
//! - `ast`: the [`ast::Value`] model and its textual rendering
//! - `evaluator`: environments, special forms and procedure application
//! - `builtinops`: the standard library installed into the root environment
//!
//! ## Example
//!
//! ```
//! use minilisp::evaluator::{create_global_env, eval};
//! use minilisp::reader::parse;
//!
//! let env = create_global_env();
//! eval(&parse("(define x 10)").unwrap(), &env).unwrap();
//! let result = eval(&parse("(+ x 5)").unwrap(), &env).unwrap();
//! assert_eq!(result.to_string(), "15");
//! ```

use crate::evaluator::Arity;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 1024;

/// Default maximum evaluation depth
///
/// Every nested call to the evaluator counts as one level. A closure call costs
/// two or three levels, so the default allows a few thousand levels of user
/// recursion.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 10_000;

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The token stream ended while an expression was still open
    #[error("ParseError: unexpected end of input")]
    UnexpectedEndOfInput,

    /// A `)` appeared where an expression was expected
    #[error("ParseError: unexpected ')'")]
    UnexpectedCloseParen,

    /// Tokens were left over after a complete expression
    #[error("ParseError: unexpected trailing input starting at '{found}'")]
    TrailingInput { found: String },

    /// Lists were nested deeper than [`MAX_PARSE_DEPTH`]
    #[error("ParseError: expression too deeply nested (max depth: {max_depth})")]
    TooDeeplyNested { max_depth: usize },

    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("{}", arity_message(.callee, .expected, .got))]
    ArityMismatch {
        callee: Option<String>,
        expected: Arity,
        got: usize,
    },

    /// Wrong shape or argument count for `quote`, `if`, `define`, `set!` or `lambda`
    #[error("MalformedSpecialForm: {form}: {message}")]
    MalformedSpecialForm { form: &'static str, message: String },

    #[error("Cannot apply non-procedure: {0}")]
    NotAProcedure(String),

    #[error("Evaluation depth limit exceeded (max: {max_depth})")]
    RecursionLimit { max_depth: usize },

    /// A builtin rejected its arguments (type errors, division by zero, ...)
    #[error("{0}")]
    HostProcedure(String),
}

fn arity_message(callee: &Option<String>, expected: &Arity, got: &usize) -> String {
    match callee {
        Some(name) => {
            format!("ArityMismatch: {name} expected {expected} arguments, got {got}")
        }
        None => format!("ArityMismatch: procedure expected {expected} arguments, got {got}"),
    }
}

impl Error {
    /// Create an ArityMismatch without callee context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityMismatch {
            callee: None,
            expected,
            got,
        }
    }

    /// Create an ArityMismatch naming the procedure that was called
    pub fn arity_error_for(callee: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::ArityMismatch {
            callee: Some(callee.into()),
            expected,
            got,
        }
    }

    pub(crate) fn malformed(form: &'static str, message: impl Into<String>) -> Self {
        Error::MalformedSpecialForm {
            form,
            message: message.into(),
        }
    }

    /// True for the errors raised by the reader
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEndOfInput
                | Error::UnexpectedCloseParen
                | Error::TrailingInput { .. }
                | Error::TooDeeplyNested { .. }
        )
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod intooperation;
pub mod reader;
