//! The REPL wire surface.
//!
//! Input is a sequence of statements terminated by `;`. Each statement
//! runs through the full pipeline and prints zero or more
//! `val <name> = <value> : <type>` lines; a bare expression binds
//! `it`. A failed statement leaves the session usable and every
//! binding made by earlier statements intact.

use crate::ast::statement::Statement;
use crate::compile::{prepare_statement, CompiledStatement, StatementError};
use crate::eval::{EvalContext, EvalError};
use crate::parser;
use crate::session::Session;

/// Exit code classification for the host: parse/type/compile errors
/// dominate evaluation errors, which dominate success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRun {
    pub output: String,
    pub exit_code: i32,
}

/// One statement's outcome; warnings surfaced before a runtime
/// failure are kept.
pub enum StatementOutcome {
    Ok(Vec<String>),
    Static(StatementError),
    Eval {
        lines: Vec<String>,
        error: EvalError,
    },
}

/// Execute a whole input against a session, accumulating output lines
/// and the process exit code.
pub fn run(session: &mut Session, input: &str) -> ShellRun {
    let mut output = String::new();
    let mut saw_static = false;
    let mut saw_eval = false;

    let statements = match parser::program(input) {
        Ok(statements) => statements,
        Err(e) => {
            output.push_str(&format!("{e}\n"));
            return ShellRun {
                output,
                exit_code: 2,
            };
        }
    };

    for statement in statements {
        match execute(session, statement) {
            StatementOutcome::Ok(lines) => {
                for line in lines {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
            StatementOutcome::Static(e) => {
                saw_static = true;
                output.push_str(&format!("{e}\n"));
            }
            StatementOutcome::Eval { lines, error } => {
                saw_eval = true;
                for line in lines {
                    output.push_str(&line);
                    output.push('\n');
                }
                output.push_str(&format!("{error}\n"));
            }
        }
    }

    let exit_code = if saw_static {
        2
    } else if saw_eval {
        1
    } else {
        0
    };
    ShellRun { output, exit_code }
}

/// Run a single parsed statement: compile, surface warnings, evaluate,
/// accumulate bindings into the session environment.
pub fn execute(session: &mut Session, statement: Statement<()>) -> StatementOutcome {
    let mut warnings = Vec::new();
    let hybrid = session.hybrid();
    let compiled = match prepare_statement(
        &mut session.type_system,
        &session.env,
        statement,
        hybrid,
        &mut warnings,
    ) {
        Ok(compiled) => compiled,
        Err(e) => return StatementOutcome::Static(e),
    };

    let mut lines: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
    session.warnings.extend(warnings);

    session.enter_eval();
    let result = {
        let ctx = EvalContext {
            env: &session.env,
            rel_builder: session.rel_builder.as_deref(),
        };
        compiled.eval(&ctx)
    };
    session.leave_eval();

    let bindings = match result {
        Ok(bindings) => bindings,
        Err(error) => return StatementOutcome::Eval { lines, error },
    };

    match &compiled {
        CompiledStatement::TypeDecl { text, .. } => lines.push(text.clone()),
        CompiledStatement::Decl { .. } => {
            for binding in &bindings {
                let value = binding.value.as_ref().expect("evaluation produced a value");
                lines.push(format!(
                    "val {} = {} : {}",
                    binding.name, value, binding.scheme.ty
                ));
            }
        }
    }

    for binding in bindings {
        session.env = session
            .env
            .bind(binding.name.clone(), binding.scheme.clone(), binding.value);
    }

    StatementOutcome::Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_fresh(input: &str) -> ShellRun {
        let mut session = Session::new();
        run(&mut session, input)
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let result = run_fresh("");
        assert_eq!(result.output, "");
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn repl_transcript() {
        let result = run_fresh("val x = 5;\nx;\nit + 1;\n");
        assert_eq!(
            result.output,
            "val x = 5 : int\nval it = 5 : int\nval it = 6 : int\n"
        );
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn type_errors_exit_2_but_keep_session_usable() {
        let mut session = Session::new();
        let result = run(&mut session, "val x = 1;\nx andalso true;\nx + 1;\n");
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("type error"));
        assert!(result.output.contains("val it = 2 : int"));
    }

    #[test]
    fn uncaught_exception_exits_1() {
        let result = run_fresh("1 div 0;\n");
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("uncaught exception Div"));
    }
}
