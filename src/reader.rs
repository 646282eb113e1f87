//! Source text to expression trees.
//!
//! Reading happens in two steps. [`tokenize`] splits the input into `(`, `)`
//! and maximal runs of other non-whitespace characters; [`parse`] then builds
//! a [`Value`] from the token sequence by recursive descent. Atoms become
//! integers when they read as one, else floats, else `#t`/`#f`, else symbols.
//!
//! There is no quote shorthand, no comments and no string syntax: `'x` is the
//! symbol `'x`, and `;` or `"` are ordinary symbol characters.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till1, take_while},
    multi::many0,
    sequence::preceded,
};
use tracing::trace;

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{Number, Value};

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

/// One token, skipping leading whitespace
fn token(input: &str) -> IResult<&str, &str> {
    preceded(
        take_while(char::is_whitespace),
        alt((tag("("), tag(")"), take_till1(is_delimiter))),
    )
    .parse(input)
}

/// Split source text into tokens
///
/// Whitespace separates tokens and is otherwise ignored; parentheses are
/// always tokens of their own, even without surrounding spaces.
pub fn tokenize(input: &str) -> Vec<&str> {
    // `token` always consumes input when it succeeds, so `many0` stops at the
    // first failure (trailing whitespace or end of input)
    many0(token)
        .parse(input)
        .map(|(_, tokens)| tokens)
        .unwrap_or_default()
}

/// Classify a non-parenthesis token
fn parse_atom(token: &str) -> Value {
    if let Ok(n) = token.parse::<i64>() {
        return Value::Number(Number::Int(n));
    }
    if let Ok(x) = token.parse::<f64>() {
        return Value::Number(Number::Float(x));
    }
    match token {
        "#t" => Value::Bool(true),
        "#f" => Value::Bool(false),
        _ => Value::Symbol(token.to_owned()),
    }
}

/// Cursor over a token sequence
struct Reader<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        let tokens = tokenize(input);
        trace!(count = tokens.len(), "tokenized input");
        Reader { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Read one expression; `depth` counts the lists currently open
    fn read_expr(&mut self, depth: usize) -> Result<Value, Error> {
        match self.advance().ok_or(Error::UnexpectedEndOfInput)? {
            "(" => {
                if depth >= MAX_PARSE_DEPTH {
                    return Err(Error::TooDeeplyNested {
                        max_depth: MAX_PARSE_DEPTH,
                    });
                }

                let mut elements = Vec::new();
                loop {
                    match self.peek() {
                        None => return Err(Error::UnexpectedEndOfInput),
                        Some(")") => {
                            self.pos += 1;
                            return Ok(Value::List(elements));
                        }
                        Some(_) => elements.push(self.read_expr(depth + 1)?),
                    }
                }
            }
            ")" => Err(Error::UnexpectedCloseParen),
            atom => Ok(parse_atom(atom)),
        }
    }

    /// Error for tokens left over after a complete expression
    fn trailing_error(&self) -> Error {
        match self.peek() {
            Some(")") => Error::UnexpectedCloseParen,
            Some(found) => Error::TrailingInput {
                found: found.to_owned(),
            },
            None => Error::UnexpectedEndOfInput,
        }
    }
}

/// Parse exactly one expression
///
/// Empty input is [`Error::UnexpectedEndOfInput`]; anything after the first
/// complete expression is rejected.
pub fn parse(input: &str) -> Result<Value, Error> {
    let mut reader = Reader::new(input);
    let expr = reader.read_expr(0)?;
    if reader.at_end() {
        Ok(expr)
    } else {
        Err(reader.trailing_error())
    }
}

/// Parse a whole program: every expression in order
///
/// Input consisting only of whitespace yields no expressions.
pub fn parse_all(input: &str) -> Result<Vec<Value>, Error> {
    let mut reader = Reader::new(input);
    let mut exprs = Vec::new();
    while !reader.at_end() {
        exprs.push(reader.read_expr(0)?);
    }
    Ok(exprs)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use pretty_assertions::assert_eq;

    /// Test result variants for comprehensive parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),              // Parsing should succeed with this value
        SpecificError(&'static str), // Parsing should fail with error containing this string
        Error,                       // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// Run parse tests, checking that rendered successes read back identically
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);

            match (parse(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    let displayed = format!("{actual}");
                    let reparsed = parse(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch for '{input}'"
                    );
                }
                (Err(_), Error) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let error_msg = format!("{err}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got '{error_msg}'"
                    );
                }
                (Ok(actual), Error | SpecificError(_)) => {
                    panic!("{test_id}: '{input}' expected error, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: '{input}' expected success, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_tokenize() {
        let test_cases: Vec<(&str, Vec<&str>)> = vec![
            ("(+ 1 2)", vec!["(", "+", "1", "2", ")"]),
            ("  (  a   b )  ", vec!["(", "a", "b", ")"]),
            ("(a(b)c)", vec!["(", "a", "(", "b", ")", "c", ")"]),
            ("'(1 2 3)", vec!["'", "(", "1", "2", "3", ")"]),
            ("foo\n\tbar\r\nbaz", vec!["foo", "bar", "baz"]),
            ("))((", vec![")", ")", "(", "("]),
            ("set! x-y? <=", vec!["set!", "x-y?", "<="]),
            ("", vec![]),
            ("   \n  ", vec![]),
        ];

        for (input, expected) in test_cases {
            assert_eq!(tokenize(input), expected, "tokenize({input:?})");
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== ATOMS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("+7", success(7)),
            ("0", success(0)),
            ("2.5", success(2.5)),
            ("-0.5", success(-0.5)),
            ("1e3", success(1000.0)),
            ("5.0", success(5.0)),
            ("#t", success(true)),
            ("#f", success(false)),
            ("x", success(sym("x"))),
            ("set!", success(sym("set!"))),
            ("null?", success(sym("null?"))),
            ("<=", success(sym("<="))),
            ("'x", success(sym("'x"))),
            ("a.b", success(sym("a.b"))),
            ("1+", success(sym("1+"))),
            // Out of i64 range reads as a float
            ("99999999999999999999", success(1e20)),
            // ===== LISTS =====
            ("()", success(nil())),
            ("( )", success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("(+ 1 2)", success(vec![sym("+"), val(1), val(2)])),
            (
                "((1 2) (3))",
                success(vec![val([1, 2]), val([3])]),
            ),
            (
                "(define x 10)",
                success(vec![sym("define"), sym("x"), val(10)]),
            ),
            (
                "(if (> x 0) x (- x))",
                success(vec![
                    sym("if"),
                    val(vec![sym(">"), sym("x"), val(0)]),
                    sym("x"),
                    val(vec![sym("-"), sym("x")]),
                ]),
            ),
            (
                "(lambda (x) (* x x))",
                success(vec![
                    sym("lambda"),
                    val(vec![sym("x")]),
                    val(vec![sym("*"), sym("x"), sym("x")]),
                ]),
            ),
            (
                "(define circle-area (lambda (r) (* pi (* r r))))",
                success(vec![
                    sym("define"),
                    sym("circle-area"),
                    val(vec![
                        sym("lambda"),
                        val(vec![sym("r")]),
                        val(vec![
                            sym("*"),
                            sym("pi"),
                            val(vec![sym("*"), sym("r"), sym("r")]),
                        ]),
                    ]),
                ]),
            ),
            ("  (a\n  b)  ", success(vec![sym("a"), sym("b")])),
            // ===== ERRORS =====
            ("", SpecificError("unexpected end of input")),
            ("   ", SpecificError("unexpected end of input")),
            ("(", SpecificError("unexpected end of input")),
            ("(1 2", SpecificError("unexpected end of input")),
            ("((1 2)", SpecificError("unexpected end of input")),
            (")", SpecificError("unexpected ')'")),
            ("(1))", SpecificError("unexpected ')'")),
            ("1 2", SpecificError("trailing input starting at '2'")),
            ("(a) (b)", SpecificError("trailing input starting at '('")),
            ("x )", Error),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parse_errors_are_classified() {
        for input in ["", "(", ")", "1 2"] {
            assert!(parse(input).unwrap_err().is_parse_error(), "{input:?}");
        }
    }

    #[test]
    fn test_parse_all() {
        let program = "(define x 1)\n(define (f y) (+ x y))\n\n(f 2)\n";
        let exprs = parse_all(program).unwrap();
        assert_eq!(exprs.len(), 3);
        assert_eq!(exprs[2], val(vec![sym("f"), val(2)]));

        assert!(parse_all("").unwrap().is_empty());
        assert!(parse_all(" \n ").unwrap().is_empty());
        assert_eq!(parse_all("1 x #t").unwrap(), vec![val(1), sym("x"), val(true)]);
        assert_eq!(
            parse_all("(a) (b").unwrap_err(),
            crate::Error::UnexpectedEndOfInput
        );
        assert_eq!(
            parse_all("(a))").unwrap_err(),
            crate::Error::UnexpectedCloseParen
        );
    }

    #[test]
    fn test_parser_depth_limits() {
        let under_limit = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        let over_limit = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH + 1),
            ")".repeat(MAX_PARSE_DEPTH + 1)
        );

        assert!(parse(&under_limit).is_ok());
        assert_eq!(
            parse(&over_limit).unwrap_err(),
            crate::Error::TooDeeplyNested {
                max_depth: MAX_PARSE_DEPTH
            }
        );
    }
}
