use crate::Span;
use crate::ast::{Expr, Literal, Node};
use crate::lexer::{LexerError, Token, TokenKind};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse Error: expected {expected}, got {found}")]
    UnexpectedToken { found: Token, expected: String },
    #[error("Parse Error: Unexpected end of input. Expected {0}")]
    UnexpectedEof(String),
    #[error("Parse Error: Extra token {0} after a complete expression")]
    ExtraToken(Token),
    #[error("Parse Error: Cannot define `{target}`, the left side of `:=` must be a name")]
    InvalidDefineTarget { target: String, span: Span },
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

impl ParseError {
    /// Source location of the failure, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { found, .. } => Some(found.span),
            ParseError::UnexpectedEof(_) => None,
            ParseError::ExtraToken(found) => Some(found.span),
            ParseError::InvalidDefineTarget { span, .. } => Some(*span),
            ParseError::LexerError(lex_err) => Some(lex_err.span),
        }
    }
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

// Names the parser gives meaning to; none of them can be used as a variable.
const KEYWORDS: &[&str] = &[
    "if", "then", "elif", "else", "end", "while", "do", "func", "scope", "deffunc", "params",
    "and", "or", "not",
];

const COMPARISON_OPERATORS: &[(TokenKind, &str)] = &[
    (TokenKind::EqualEqual, "equal"),
    (TokenKind::NotEqual, "not_equal"),
    (TokenKind::Less, "less"),
    (TokenKind::Greater, "greater"),
    (TokenKind::LessEqual, "less_equal"),
    (TokenKind::GreaterEqual, "greater_equal"),
];

const ADDITIVE_OPERATORS: &[(TokenKind, &str)] =
    &[(TokenKind::Plus, "add"), (TokenKind::Minus, "sub")];

const MULTIPLICATIVE_OPERATORS: &[(TokenKind, &str)] = &[
    (TokenKind::Star, "mul"),
    (TokenKind::Slash, "div"),
    (TokenKind::Percent, "mod"),
];

/// Identifiers with parser-level meaning, for REPL completion.
pub fn keyword_identifiers() -> HashSet<String> {
    KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub struct Parser {
    tokens: Vec<Token>,
    // Never moves past the trailing Eof
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.kind == TokenKind::Eof) {
            let end = tokens.last().map_or(0, |token| token.span.end);
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::point(end),
            });
        }
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    // Consumes the current token. Eof is sticky.
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = self.current();
        if found.kind == TokenKind::Eof {
            ParseError::UnexpectedEof(expected.to_string())
        } else {
            ParseError::UnexpectedToken {
                found: found.clone(),
                expected: expected.to_string(),
            }
        }
    }

    fn consume(&mut self, expected: &TokenKind) -> ParseResult<Token> {
        if self.current().kind == *expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{}`", expected)))
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> ParseResult<Token> {
        if self.current().kind.is_name(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{}`", keyword)))
        }
    }

    /// Parses the whole token stream as one expression.
    pub fn parse(mut self) -> ParseResult<Node> {
        let expr = self.expression()?;
        match self.current().kind {
            TokenKind::Eof => Ok(expr),
            _ => Err(ParseError::ExtraToken(self.current().clone())),
        }
    }

    fn expression(&mut self) -> ParseResult<Node> {
        self.sequence()
    }

    fn sequence(&mut self) -> ParseResult<Node> {
        let first = self.define_assign()?;
        if self.current().kind != TokenKind::Semicolon {
            return Ok(first);
        }

        let mut exprs = vec![first];
        while self.current().kind == TokenKind::Semicolon {
            self.advance();
            exprs.push(self.define_assign()?);
        }
        let span = exprs[0].span.merge(exprs[exprs.len() - 1].span);
        Ok(Node::new(Expr::Sequence(exprs), span))
    }

    // `:=` and `=` are right-associative: `a := b := 2` defines both.
    fn define_assign(&mut self) -> ParseResult<Node> {
        let left = self.and_or()?;
        match self.current().kind {
            TokenKind::Define => {
                self.advance();
                let value = self.define_assign()?;
                let span = left.span.merge(value.span);
                match left.kind {
                    Expr::Name(name) => Ok(Node::new(
                        Expr::Define {
                            name,
                            value: Box::new(value),
                        },
                        span,
                    )),
                    other => Err(ParseError::InvalidDefineTarget {
                        target: other.to_string(),
                        span: left.span,
                    }),
                }
            }
            TokenKind::Assign => {
                self.advance();
                let value = self.define_assign()?;
                let span = left.span.merge(value.span);
                Ok(Node::new(
                    Expr::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                    span,
                ))
            }
            _ => Ok(left),
        }
    }

    // `A and B` is `if A then B else A`, `A or B` is `if A then A else B`.
    fn and_or(&mut self) -> ParseResult<Node> {
        let mut left = self.not()?;
        loop {
            let is_and = self.current().kind.is_name("and");
            if !is_and && !self.current().kind.is_name("or") {
                return Ok(left);
            }
            self.advance();
            let right = Rc::new(self.not()?);
            let span = left.span.merge(right.span);
            let condition = Rc::new(left);
            let (then_branch, else_branch) = if is_and {
                (right, Rc::clone(&condition))
            } else {
                (Rc::clone(&condition), right)
            };
            left = Node::new(
                Expr::If {
                    condition,
                    then_branch,
                    else_branch,
                },
                span,
            );
        }
    }

    fn not(&mut self) -> ParseResult<Node> {
        if self.current().kind.is_name("not") {
            let operator = self.advance();
            let operand = self.not()?;
            Ok(Node::new_operator("not", operator.span, vec![operand]))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> ParseResult<Node> {
        self.binary_left(COMPARISON_OPERATORS, Parser::add_sub)
    }

    fn add_sub(&mut self) -> ParseResult<Node> {
        self.binary_left(ADDITIVE_OPERATORS, Parser::mul_div_mod)
    }

    fn mul_div_mod(&mut self) -> ParseResult<Node> {
        self.binary_left(MULTIPLICATIVE_OPERATORS, Parser::neg)
    }

    fn neg(&mut self) -> ParseResult<Node> {
        if self.current().kind == TokenKind::Minus {
            let operator = self.advance();
            let operand = self.neg()?;
            Ok(Node::new_operator("neg", operator.span, vec![operand]))
        } else {
            self.call_index()
        }
    }

    fn binary_left(
        &mut self,
        operators: &[(TokenKind, &'static str)],
        operand: fn(&mut Parser) -> ParseResult<Node>,
    ) -> ParseResult<Node> {
        let mut left = operand(self)?;
        while let Some(name) = operator_name(operators, &self.current().kind) {
            let operator = self.advance();
            let right = operand(self)?;
            left = Node::new_operator(name, operator.span, vec![left, right]);
        }
        Ok(left)
    }

    fn call_index(&mut self) -> ParseResult<Node> {
        let mut target = self.primary()?;
        loop {
            match self.current().kind {
                TokenKind::LParen => {
                    self.advance();
                    let (args, close) = self.arguments()?;
                    let span = target.span.merge(close.span);
                    target = Node::new(
                        Expr::Call {
                            callee: Box::new(target),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    let open = self.advance();
                    let index = self.expression()?;
                    let close = self.consume(&TokenKind::RBracket)?;
                    let mut node = Node::new_operator("index", open.span, vec![target, index]);
                    node.span = node.span.merge(close.span);
                    target = node;
                }
                _ => return Ok(target),
            }
        }
    }

    // Comma-separated expressions up to and including `)`.
    fn arguments(&mut self) -> ParseResult<(Vec<Node>, Token)> {
        let mut args = Vec::new();
        if self.current().kind != TokenKind::RParen {
            args.push(self.expression()?);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                args.push(self.expression()?);
            }
        }
        let close = self.consume(&TokenKind::RParen)?;
        Ok((args, close))
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::LParen => self.paren(),
            TokenKind::Integer(n) => self.literal(Literal::Integer(n)),
            TokenKind::Boolean(b) => self.literal(Literal::Boolean(b)),
            TokenKind::Null => self.literal(Literal::Null),
            TokenKind::Name(name) => match name.as_str() {
                "func" => self.func(),
                "scope" => self.scope(),
                "if" => self.if_expr(),
                "while" => self.while_expr(),
                "deffunc" => self.deffunc(),
                keyword if is_keyword(keyword) => Err(self.unexpected("an expression")),
                _ => {
                    self.advance();
                    Ok(Node::new_name(name, token.span))
                }
            },
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn literal(&mut self, literal: Literal) -> ParseResult<Node> {
        let token = self.advance();
        Ok(Node::new_literal(literal, token.span))
    }

    fn paren(&mut self) -> ParseResult<Node> {
        let open = self.advance();
        let mut expr = self.expression()?;
        let close = self.consume(&TokenKind::RParen)?;
        expr.span = open.span.merge(close.span);
        Ok(expr)
    }

    fn parameter_name(&mut self) -> ParseResult<String> {
        match &self.current().kind {
            TokenKind::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a parameter name")),
        }
    }

    // Comma-separated names up to and including `do`.
    fn parameters(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        if !self.current().kind.is_name("do") {
            params.push(self.parameter_name()?);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                params.push(self.parameter_name()?);
            }
        }
        self.consume_keyword("do")?;
        Ok(params)
    }

    // func PARAMS do BODY end
    fn func(&mut self) -> ParseResult<Node> {
        let start = self.advance();
        let params = self.parameters()?;
        let body = self.expression()?;
        let end = self.consume_keyword("end")?;
        Ok(Node::new(
            Expr::FuncLiteral {
                params,
                body: Rc::new(body),
            },
            start.span.merge(end.span),
        ))
    }

    // scope BODY end
    fn scope(&mut self) -> ParseResult<Node> {
        let start = self.advance();
        let body = self.expression()?;
        let end = self.consume_keyword("end")?;
        Ok(Node::new(
            Expr::Scope(Box::new(body)),
            start.span.merge(end.span),
        ))
    }

    // if COND then THEN [elif COND then THEN ...] [else ELSE] end
    // Also entered on `elif`, which shares the trailing `end` of its parent.
    fn if_expr(&mut self) -> ParseResult<Node> {
        let start = self.advance();
        let condition = self.expression()?;
        self.consume_keyword("then")?;
        let then_branch = self.expression()?;

        let else_branch = if self.current().kind.is_name("elif") {
            self.if_expr()?
        } else if self.current().kind.is_name("else") {
            self.advance();
            let mut else_branch = self.expression()?;
            let end = self.consume_keyword("end")?;
            // Stretch to `end` so the if node's span covers the whole block
            else_branch.span = else_branch.span.merge(end.span);
            else_branch
        } else {
            let end = self.consume_keyword("end")?;
            Node::new_literal(Literal::Null, end.span)
        };

        let span = start.span.merge(else_branch.span);
        Ok(Node::new(
            Expr::If {
                condition: Rc::new(condition),
                then_branch: Rc::new(then_branch),
                else_branch: Rc::new(else_branch),
            },
            span,
        ))
    }

    // while COND do BODY end
    fn while_expr(&mut self) -> ParseResult<Node> {
        let start = self.advance();
        let condition = self.expression()?;
        self.consume_keyword("do")?;
        let body = self.expression()?;
        let end = self.consume_keyword("end")?;
        Ok(Node::new(
            Expr::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            start.span.merge(end.span),
        ))
    }

    // deffunc NAME params PARAMS do BODY end  ==  NAME := func PARAMS do BODY end
    fn deffunc(&mut self) -> ParseResult<Node> {
        let start = self.advance();
        let name = match &self.current().kind {
            TokenKind::Name(name) if !is_keyword(name) => name.clone(),
            _ => return Err(self.unexpected("a function name")),
        };
        self.advance();
        self.consume_keyword("params")?;
        let params = self.parameters()?;
        let body = self.expression()?;
        let end = self.consume_keyword("end")?;
        let span = start.span.merge(end.span);
        let func = Node::new(
            Expr::FuncLiteral {
                params,
                body: Rc::new(body),
            },
            span,
        );
        Ok(Node::new(
            Expr::Define {
                name,
                value: Box::new(func),
            },
            span,
        ))
    }
}

fn operator_name(operators: &[(TokenKind, &'static str)], kind: &TokenKind) -> Option<&'static str> {
    operators
        .iter()
        .find(|(token, _)| token == kind)
        .map(|(_, name)| *name)
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}
