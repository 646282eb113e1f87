//! `minilisp` command-line front end.
//!
//! With file arguments, every file is read as a program and evaluated in one
//! shared root environment. Without arguments an interactive loop starts.
//!
//! Environment variables:
//! - `RUST_LOG`: tracing filter (default `warn`), output goes to stderr
//! - `MINILISP_MAX_DEPTH`: evaluation depth limit
//! - `MINILISP_SILENT`: when set, script results are not printed

use minilisp::DEFAULT_MAX_EVAL_DEPTH;
use minilisp::ast::Value;
use minilisp::evaluator::{self, EvalConfig, Environment};
use minilisp::reader::parse_all;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    let config = eval_config_from_env();
    let files: Vec<String> = std::env::args().skip(1).collect();

    let result = panic::catch_unwind(|| {
        if files.is_empty() {
            run_repl(&config);
            0
        } else {
            run_files(&files, &config, silent_from_env())
        }
    });

    match result {
        Ok(code) => process::exit(code),
        Err(panic_info) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }

            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn eval_config_from_env() -> EvalConfig {
    match std::env::var("MINILISP_MAX_DEPTH") {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(max_depth) if max_depth > 0 => EvalConfig::with_max_depth(max_depth),
            _ => {
                warn!(
                    value = %raw,
                    default = DEFAULT_MAX_EVAL_DEPTH,
                    "ignoring invalid MINILISP_MAX_DEPTH"
                );
                EvalConfig::default()
            }
        },
        Err(_) => EvalConfig::default(),
    }
}

fn silent_from_env() -> bool {
    std::env::var("MINILISP_SILENT").is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Evaluate each file in order; returns the process exit code
fn run_files(files: &[String], config: &EvalConfig, silent: bool) -> i32 {
    let env = evaluator::create_global_env();

    for path in files {
        debug!(path = %path, "running file");

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("Error: cannot read {path}: {err}");
                return 1;
            }
        };

        let program = match parse_all(&source) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("Error: {path}: {err}");
                return 1;
            }
        };

        for expr in &program {
            match evaluator::eval_with_config(expr, &env, config) {
                Ok(Value::Unspecified) => {}
                Ok(result) => {
                    if !silent {
                        println!("{result}");
                    }
                }
                Err(err) => {
                    eprintln!("Error: {path}: {err}");
                    return 1;
                }
            }
        }
    }

    0
}

fn run_repl(config: &EvalConfig) {
    println!("minilisp - a minimal Lisp interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Error: could not initialize line editor: {err}");
            return;
        }
    };
    let env = evaluator::create_global_env();

    loop {
        match rl.readline("lisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // A line may hold several expressions; stop at the first error
                let result = parse_all(line).and_then(|exprs| {
                    exprs.iter().try_for_each(|expr| {
                        let value = evaluator::eval_with_config(expr, &env, config)?;
                        if !matches!(value, Value::Unspecified) {
                            println!("{value}");
                        }
                        Ok(())
                    })
                });

                if let Err(e) = result {
                    println!("Error: {e}");
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("minilisp commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (quote x)  (if test conseq alt)  (define name value)");
    println!("  (define (name params...) body)  (set! name value)");
    println!("  (lambda (params...) body)");
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (map square (list 1 2 3))");
    println!("  (define make-adder (lambda (n) (lambda (x) (+ x n))))");
    println!("  ((make-adder 5) 3)");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::BuiltinFunction { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        for row in builtins.chunks(4) {
            for name in row {
                print!("  {name:<12}");
            }
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
