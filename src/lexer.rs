use logos::Logos;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::Span;

/// Raw token straight out of logos. `tokenize` maps these onto `TokenKind`
/// and appends the end-of-input sentinel, which logos never produces.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip comments
#[logos(error = LexerErrorKind)]
enum RawToken {
    #[regex(r"[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::IntegerOverflow(slice.to_string()))
    })]
    Integer(i64),
    #[token("True", |_| true)]
    #[token("true", |_| true)]
    #[token("False", |_| false)]
    #[token("false", |_| false)]
    Boolean(bool),
    #[token("None")]
    #[token("null")]
    Null,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[token("=")]
    Assign,
    #[token(":=")]
    Define,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("!")]
    Bang,
    #[token(":")]
    Colon,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Boolean(bool),
    Null,
    // Identifiers and every contextual keyword (if, end, and, ...)
    Name(String),
    Assign,
    Define,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Bang,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Eof,
}

impl TokenKind {
    /// True if this is a name token spelled exactly `word`.
    pub fn is_name(&self, word: &str) -> bool {
        matches!(self, TokenKind::Name(name) if name == word)
    }
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Integer(n) => TokenKind::Integer(n),
            RawToken::Boolean(b) => TokenKind::Boolean(b),
            RawToken::Null => TokenKind::Null,
            RawToken::Name(name) => TokenKind::Name(name),
            RawToken::Assign => TokenKind::Assign,
            RawToken::Define => TokenKind::Define,
            RawToken::EqualEqual => TokenKind::EqualEqual,
            RawToken::NotEqual => TokenKind::NotEqual,
            RawToken::Less => TokenKind::Less,
            RawToken::Greater => TokenKind::Greater,
            RawToken::LessEqual => TokenKind::LessEqual,
            RawToken::GreaterEqual => TokenKind::GreaterEqual,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Comma => TokenKind::Comma,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            _ => write!(f, "`{}` at {}", self.kind, self.span),
        }
    }
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            TokenKind::Null => write!(f, "None"),
            TokenKind::Name(name) => write!(f, "{}", name),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Define => write!(f, ":="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Invalid character encountered: '{0}'")]
    InvalidCharacter(char),
    #[error("Integer literal does not fit in 64 bits: '{0}'")]
    IntegerOverflow(String),
    // logos reports unmatched input with this; `tokenize` replaces it with
    // `InvalidCharacter` once the offending text is known.
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

/// Splits `input` into tokens. The returned vector always ends with exactly
/// one `TokenKind::Eof`.
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    let mut tokens: Vec<Token> = RawToken::lexer(input)
        .spanned()
        .map(|(result, range)| {
            let span = Span::from(range);
            match result {
                Ok(raw) => Ok(Token {
                    kind: raw.into(),
                    span,
                }),
                Err(LexerErrorKind::InvalidToken) => {
                    let bad = input[span.to_range()].chars().next().unwrap_or('\0');
                    Err(LexerError {
                        error: LexerErrorKind::InvalidCharacter(bad),
                        span,
                    })
                }
                Err(error) => Err(LexerError { error, span }),
            }
        })
        .collect::<LexerRangedResult<_>>()?;

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::point(input.len()),
    });
    debug!(count = tokens.len(), "tokenized input");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences; the trailing Eof is implied
    fn assert_tokens(input: &str, mut expected: Vec<TokenKind>) {
        expected.push(TokenKind::Eof);
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected_error: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => assert_eq!(e.error, expected_error, "Input: '{}'", input),
        }
    }

    fn name(s: &str) -> TokenKind {
        TokenKind::Name(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("   \n\t  ", vec![]);
    }

    #[test]
    fn test_simple_expression() {
        assert_tokens(
            "2 + 3",
            vec![TokenKind::Integer(2), TokenKind::Plus, TokenKind::Integer(3)],
        );
    }

    #[test]
    fn test_literal_keywords() {
        assert_tokens(
            "True False None true false null",
            vec![
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Null,
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Null,
            ],
        );
        // Only exact spellings are literals
        assert_tokens("Truex nulls _None", vec![name("Truex"), name("nulls"), name("_None")]);
    }

    #[test]
    fn test_names_and_keywords() {
        assert_tokens(
            "if x then y_1 else _z end",
            vec![
                name("if"),
                name("x"),
                name("then"),
                name("y_1"),
                name("else"),
                name("_z"),
                name("end"),
            ],
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_tokens(
            "== != <= >= := = < > ! :",
            vec![
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Define,
                TokenKind::Assign,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Bang,
                TokenKind::Colon,
            ],
        );
        // One-character look-ahead only
        assert_tokens("===", vec![TokenKind::EqualEqual, TokenKind::Assign]);
        assert_tokens("a:=b", vec![name("a"), TokenKind::Define, name("b")]);
    }

    #[test]
    fn test_punctuation() {
        assert_tokens(
            "+-*/%()[];,",
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Semicolon,
                TokenKind::Comma,
            ],
        );
    }

    #[test]
    fn test_numbers_have_no_sign() {
        assert_tokens("-45", vec![TokenKind::Minus, TokenKind::Integer(45)]);
        assert_tokens("007", vec![TokenKind::Integer(7)]);
        assert_tokens("12ab", vec![TokenKind::Integer(12), name("ab")]);
    }

    #[test]
    fn test_comments() {
        let input = "
            x := 10 # define x
            # another comment line
            x + 5 # add";
        assert_tokens(
            input,
            vec![
                name("x"),
                TokenKind::Define,
                TokenKind::Integer(10),
                name("x"),
                TokenKind::Plus,
                TokenKind::Integer(5),
            ],
        );
        assert_tokens("# only comment", vec![]);
    }

    #[test]
    fn test_invalid_character() {
        assert_lexer_error("2 $ 3", LexerErrorKind::InvalidCharacter('$'));
        assert_lexer_error("\"str\"", LexerErrorKind::InvalidCharacter('"'));
    }

    #[test]
    fn test_integer_overflow() {
        assert_lexer_error(
            "99999999999999999999",
            LexerErrorKind::IntegerOverflow("99999999999999999999".to_string()),
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "f(1)";
        let tokens = tokenize(input).expect("Should tokenize successfully");

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(1, 2));
        assert_eq!(tokens[2].span, Span::new(2, 3));
        assert_eq!(tokens[3].span, Span::new(3, 4));
        assert_eq!(tokens[4].kind, TokenKind::Eof);
        assert_eq!(tokens[4].span, Span::point(4));
    }

    #[test]
    fn test_error_span_points_at_character() {
        let err = tokenize("ab @").unwrap_err();
        assert_eq!(err.span, Span::new(3, 4));
    }
}
