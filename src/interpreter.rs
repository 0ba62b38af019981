use crate::ast::Node;
use crate::environment::Environment;
use crate::evaluator::{self, EvalError, EvalResult};
use crate::lexer::{self, LexerError, Token};
use crate::parser::{self, ParseError};
use crate::primitives::Output;
use crate::types::Value;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Any failure from running source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToilError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Owns a global frame so that successive `run` calls share bindings.
///
/// The runtime library lives in a root frame; user definitions go into a
/// child of it, so a program may shadow `print` or `add` without losing
/// the native.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_output(Output::Stdout)
    }

    pub fn with_output(output: Output) -> Self {
        let builtins = Environment::new_global_with_output(output);
        Interpreter {
            globals: Environment::new_enclosed(builtins),
        }
    }

    pub fn global_env(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        lexer::tokenize(input)
    }

    pub fn parse(&self, input: &str) -> Result<Node, ParseError> {
        let ast = parser::parse_str(input)?;
        debug!(ast = %ast, "parsed");
        Ok(ast)
    }

    pub fn evaluate(&self, ast: &Node) -> EvalResult {
        let result = evaluator::evaluate(ast, self.globals.clone());
        match &result {
            Ok(value) => debug!(result = %value, "evaluated"),
            Err(err) => debug!(error = %err, "evaluation failed"),
        }
        result
    }

    /// Tokenizes, parses and evaluates `input` in the global frame.
    pub fn run(&self, input: &str) -> Result<Value, ToilError> {
        let ast = self.parse(input)?;
        Ok(self.evaluate(&ast)?)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bindings_persist_between_runs() {
        let interpreter = Interpreter::with_output(Output::buffer());
        assert_eq!(interpreter.run("x := 40"), Ok(Value::Integer(40)));
        assert_eq!(interpreter.run("x + 2"), Ok(Value::Integer(42)));
    }

    #[test]
    fn test_user_bindings_shadow_runtime_library() {
        let output = Output::buffer();
        let interpreter = Interpreter::with_output(output.clone());
        interpreter.run("print := 5").unwrap();
        assert_eq!(interpreter.run("print"), Ok(Value::Integer(5)));

        // A fresh interpreter still has the native
        let fresh = Interpreter::with_output(output.clone());
        fresh.run("print(1)").unwrap();
        assert_eq!(output.contents(), "1\n");
    }

    #[test]
    fn test_errors_are_wrapped() {
        let interpreter = Interpreter::with_output(Output::buffer());
        assert!(matches!(
            interpreter.run("1 +"),
            Err(ToilError::Parse(ParseError::UnexpectedEof(_)))
        ));
        assert_eq!(
            interpreter.run("nope"),
            Err(ToilError::Eval(EvalError::EnvError(
                crate::EnvError::UndefinedVariable("nope".to_string(), Span::new(0, 4))
            )))
        );
    }

    #[test]
    fn test_failed_run_keeps_earlier_bindings() {
        let interpreter = Interpreter::with_output(Output::buffer());
        assert!(interpreter.run("x := 1; x = nope").is_err());
        assert_eq!(interpreter.run("x"), Ok(Value::Integer(1)));
    }

    #[test]
    fn test_tokenize_ends_with_eof() {
        let interpreter = Interpreter::new();
        let tokens = interpreter.tokenize("1 + 2").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3].kind, crate::TokenKind::Eof);
    }
}
