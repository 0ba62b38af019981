use crate::{EnvError, EvalError, LexerError, ParseError, ToilError};
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

type Builder<'a> = ariadne::ReportBuilder<'a, (&'a str, Range<usize>)>;

fn report<'a>(source_name: &'a str, range: Range<usize>, message: String, label: String) -> Builder<'a> {
    Report::build(ReportKind::Error, (source_name, range.clone()))
        .with_message(message)
        .with_label(Label::new((source_name, range)).with_message(label))
}

fn emit(builder: Builder<'_>, source_name: &str, input: &str) -> io::Result<()> {
    builder
        .finish()
        .eprint((source_name, Source::from(input)))
}

impl LexerError {
    pub fn pretty_print(&self, source_name: &str, input: &str) -> io::Result<()> {
        let builder = report(
            source_name,
            self.span.to_range(),
            "Lexer Error".to_string(),
            self.error.to_string(),
        );
        emit(builder, source_name, input)
    }
}

impl ParseError {
    pub fn pretty_print(&self, source_name: &str, input: &str) -> io::Result<()> {
        let builder = match self {
            ParseError::UnexpectedToken { found, expected } => report(
                source_name,
                found.span.to_range(),
                format!("Unexpected token: {}", found.kind),
                format!("Expected {expected}"),
            ),
            ParseError::UnexpectedEof(expected) => {
                let idx = input.len();
                report(
                    source_name,
                    idx..idx,
                    "Unexpected end of input".to_string(),
                    format!("Expected {expected}"),
                )
            }
            ParseError::ExtraToken(found) => report(
                source_name,
                found.span.to_range(),
                format!("Extra token: {}", found.kind),
                "The expression already ended before this token".to_string(),
            ),
            ParseError::InvalidDefineTarget { target, span } => report(
                source_name,
                span.to_range(),
                format!("Cannot define `{}`", target),
                "Only a name can appear on the left of `:=`".to_string(),
            ),
            ParseError::LexerError(lex_err) => return lex_err.pretty_print(source_name, input),
        };
        emit(builder, source_name, input)
    }
}

impl EvalError {
    pub fn pretty_print(&self, source_name: &str, input: &str) -> io::Result<()> {
        let range = self.span().to_range();
        let builder = match self {
            EvalError::EnvError(EnvError::UndefinedVariable(name, _)) => report(
                source_name,
                range,
                format!("Undefined variable `{}`", name),
                "This name is not defined in the current scope".to_string(),
            ),
            EvalError::IllegalAssignTarget(target, _) => report(
                source_name,
                range,
                format!("Cannot assign to {}", target),
                "Only names and array elements can be assigned".to_string(),
            ),
            EvalError::IndexTypeError(message, _) => report(
                source_name,
                range,
                "Bad index".to_string(),
                message.clone(),
            ),
            EvalError::IllegalOperator(value, _) => report(
                source_name,
                range,
                format!("Not a function: {}", value),
                "This expression cannot be called".to_string(),
            ),
            EvalError::InvalidArguments(message, _) => report(
                source_name,
                range,
                "Invalid arguments".to_string(),
                message.clone(),
            ),
            EvalError::TypeMismatch {
                operation, found, ..
            } => report(
                source_name,
                range,
                format!("Type mismatch in `{}`", operation),
                format!("`{}` does not support {}", operation, found),
            ),
            EvalError::IndexOutOfRange { index, len, .. } => report(
                source_name,
                range,
                "Index out of range".to_string(),
                format!("Index {} is outside an array of length {}", index, len),
            ),
            EvalError::DivisionByZero(_) => report(
                source_name,
                range,
                "Division by zero".to_string(),
                "The divisor evaluated to 0".to_string(),
            ),
            EvalError::IntegerOverflow(operation, _) => report(
                source_name,
                range,
                "Integer overflow".to_string(),
                format!("`{}` overflowed a 64-bit integer", operation),
            ),
        };
        emit(builder, source_name, input)
    }
}

impl ToilError {
    pub fn pretty_print(&self, source_name: &str, input: &str) -> io::Result<()> {
        match self {
            ToilError::Parse(err) => err.pretty_print(source_name, input),
            ToilError::Eval(err) => err.pretty_print(source_name, input),
        }
    }
}
