// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

use std::sync::Once;

pub use ast::{Expr, Literal, Node};
pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, evaluate};
pub use interpreter::{Interpreter, ToilError};
pub use lexer::{LexerError, LexerErrorKind, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, keyword_identifiers, parse_str};
pub use primitives::Output;
pub use source::Span;
pub use types::{Closure, Primitive, Value};

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, and only runs once per process.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
