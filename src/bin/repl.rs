use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use toil::{Environment, Interpreter, Token, TokenKind, init_tracing, keyword_identifiers, tokenize};

const DEFAULT_HISTORY_FILE: &str = "toil_history.txt";

// Keywords that open a block closed by `end`
const BLOCK_OPENERS: &[&str] = &["func", "scope", "if", "while", "deffunc"];

struct ToilCompleter {
    env: Rc<RefCell<Environment>>,
}

impl ToilCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        ToilCompleter { env }
    }
}

impl rustyline::completion::Completer for ToilCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let tokens = match tokenize(&line[..pos]) {
            Ok(tokens) => tokens,
            Err(_) => return Ok((pos, vec![])),
        };
        // Only complete a name that runs right up to the cursor
        let prefix = match tokens.iter().rev().find(|t| t.kind != TokenKind::Eof) {
            Some(Token {
                kind: TokenKind::Name(prefix),
                span,
            }) if span.end == pos => prefix.clone(),
            _ => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .union(&keyword_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .filter(|suffix| !suffix.is_empty())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: ToilValidator,
    #[rustyline(Highlighter)]
    highlighter: ToilHighlighter,
    #[rustyline(Completer)]
    completer: ToilCompleter,
}

fn closing_for(kind: &TokenKind) -> Option<TokenKind> {
    match kind {
        TokenKind::LParen => Some(TokenKind::RParen),
        TokenKind::LBracket => Some(TokenKind::RBracket),
        _ => None,
    }
}

fn is_closing(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::RParen | TokenKind::RBracket)
}

fn is_block_opener(kind: &TokenKind) -> bool {
    BLOCK_OPENERS.iter().any(|word| kind.is_name(word))
}

struct ToilValidator;

impl Validator for ToilValidator {
    /// Keeps reading lines while brackets or `... end` blocks are still open.
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        // Scan errors are reported when the input runs
        let Ok(tokens) = tokenize(ctx.input()) else {
            return Ok(ValidationResult::Valid(None));
        };

        let mut brackets: Vec<TokenKind> = Vec::new();
        let mut open_blocks = 0usize;
        for token in &tokens {
            if let Some(closing) = closing_for(&token.kind) {
                brackets.push(closing);
            } else if is_closing(&token.kind) {
                if brackets.pop().as_ref() != Some(&token.kind) {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched {}",
                        token
                    ))));
                }
            } else if is_block_opener(&token.kind) {
                open_blocks += 1;
            } else if token.kind.is_name("end") {
                if open_blocks == 0 {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched {}",
                        token
                    ))));
                }
                open_blocks -= 1;
            }
        }

        if brackets.is_empty() && open_blocks == 0 {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

struct ToilHighlighter;

impl ToilHighlighter {
    fn color_for(kind: &TokenKind) -> Option<&'static str> {
        match kind {
            TokenKind::Integer(_) => Some("\x1b[33m"), // Yellow for numbers
            TokenKind::Boolean(_) | TokenKind::Null => Some("\x1b[36m"), // Cyan for constants
            TokenKind::Name(name) if keyword_identifiers().contains(name) => Some("\x1b[35m"), // Magenta for keywords
            TokenKind::Bang | TokenKind::Colon => Some("\x1b[31m"), // Red, never valid on their own
            TokenKind::Assign | TokenKind::Define => Some("\x1b[1m"), // Bold for binding operators
            _ => None,
        }
    }

    /// Token index -> partner index for every matched bracket pair.
    fn bracket_pairs(tokens: &[Token]) -> HashMap<usize, usize> {
        let mut pairs = HashMap::new();
        let mut stack: Vec<(usize, TokenKind)> = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if let Some(closing) = closing_for(&token.kind) {
                stack.push((i, closing));
            } else if is_closing(&token.kind) {
                match stack.pop() {
                    Some((open, closing)) if closing == token.kind => {
                        pairs.insert(open, i);
                        pairs.insert(i, open);
                    }
                    _ => stack.clear(),
                }
            }
        }
        pairs
    }
}

impl Highlighter for ToilHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let Ok(tokens) = tokenize(line) else {
            return Cow::Borrowed(line);
        };
        let pairs = Self::bracket_pairs(&tokens);

        // The bracket just before or under the cursor, plus its partner
        let matched: Vec<usize> = tokens
            .iter()
            .enumerate()
            .find(|(_, t)| t.span.end == pos || t.span.start == pos)
            .and_then(|(i, _)| pairs.get(&i).map(|&partner| vec![i, partner]))
            .unwrap_or_default();

        let mut highlighted = String::with_capacity(line.len());
        let mut last = 0;
        for (i, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Eof {
                break;
            }
            // Whitespace and comments pass through untouched
            highlighted.push_str(&line[last..token.span.start]);
            let text = &line[token.span.to_range()];
            let color = if matched.contains(&i) {
                Some("\x1b[1;34m") // Bold blue for matching brackets
            } else {
                Self::color_for(&token.kind)
            };
            match color {
                Some(color) => highlighted.push_str(&format!("{}{}\x1b[0m", color, text)),
                None => highlighted.push_str(text),
            }
            last = token.span.end;
        }
        highlighted.push_str(&line[last..]);

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn edit_mode() -> rustyline::EditMode {
    match std::env::var("TOIL_EDIT_MODE") {
        Ok(mode) if mode.eq_ignore_ascii_case("vi") => rustyline::EditMode::Vi,
        _ => rustyline::EditMode::Emacs,
    }
}

fn main() -> rustyline::Result<()> {
    init_tracing();
    println!("Toil REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let interpreter = Interpreter::new();
    let h = InputValidator {
        highlighter: ToilHighlighter,
        validator: ToilValidator,
        completer: ToilCompleter::new(interpreter.global_env()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(edit_mode())
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    let history_file =
        std::env::var("TOIL_HISTORY").unwrap_or_else(|_| DEFAULT_HISTORY_FILE.to_string());
    if rl.load_history(&history_file).is_err() {
        println!("No previous history.");
    }

    loop {
        let readline = rl.readline("toil> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match interpreter.run(trimmed_input) {
                    Ok(value) => println!("{}", value),
                    Err(e) => {
                        if e.pretty_print("REPL", trimmed_input).is_err() {
                            eprintln!("{}", e);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&history_file)
}
