use crate::source::Span;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr, // The expression itself
    pub span: Span, // The source span it covers
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_literal(literal: Literal, span: Span) -> Self {
        Node::new(Expr::Literal(literal), span)
    }

    pub fn new_name(name: impl Into<String>, span: Span) -> Self {
        Node::new(Expr::Name(name.into()), span)
    }

    /// Builds a call to a runtime-library operator such as `add` or `index`.
    pub fn new_operator(operator: &str, operator_span: Span, args: Vec<Node>) -> Self {
        let span = args
            .iter()
            .fold(operator_span, |span, arg| span.merge(arg.span));
        Node::new(
            Expr::Call {
                callee: Box::new(Node::new_name(operator, operator_span)),
                args,
            },
            span,
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Boolean(true) => write!(f, "True"),
            Literal::Boolean(false) => write!(f, "False"),
            Literal::Null => write!(f, "None"),
        }
    }
}

/// The closed set of expression shapes. Operators, indexing and ordinary
/// function calls all share `Call`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    // Always holds at least two expressions
    Sequence(Vec<Node>),
    Define {
        name: String,
        value: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    // `and`/`or` share their left operand between the condition and a branch
    If {
        condition: Rc<Node>,
        then_branch: Rc<Node>,
        else_branch: Rc<Node>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    // The body is shared with every closure created from this literal
    FuncLiteral {
        params: Vec<String>,
        body: Rc<Node>,
    },
    Scope(Box<Node>),
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
}

impl Expr {
    /// Returns `(collection, index)` if this is an `index(coll, idx)` call.
    pub fn as_index(&self) -> Option<(&Node, &Node)> {
        match self {
            Expr::Call { callee, args } => match (&callee.kind, args.as_slice()) {
                (Expr::Name(name), [collection, index]) if name == "index" => {
                    Some((collection, index))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

fn write_spaced(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for node in nodes {
        write!(f, " {}", node)?;
    }
    Ok(())
}

// Prefix form, e.g. `(add 2 (mul 3 4))`
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::Sequence(exprs) => {
                write!(f, "(seq")?;
                write_spaced(f, exprs)?;
                write!(f, ")")
            }
            Expr::Define { name, value } => write!(f, "(define {} {})", name, value),
            Expr::Assign { target, value } => write!(f, "(assign {} {})", target, value),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                // A shared operand is printed once
                if Rc::ptr_eq(condition, else_branch) {
                    write!(f, "(and {} {})", condition, then_branch)
                } else if Rc::ptr_eq(condition, then_branch) {
                    write!(f, "(or {} {})", condition, else_branch)
                } else {
                    write!(f, "(if {} {} {})", condition, then_branch, else_branch)
                }
            }
            Expr::While { condition, body } => write!(f, "(while {} {})", condition, body),
            Expr::FuncLiteral { params, body } => {
                write!(f, "(func ({}) {})", params.join(" "), body)
            }
            Expr::Scope(body) => write!(f, "(scope {})", body),
            Expr::Call { callee, args } => {
                write!(f, "({}", callee)?;
                write_spaced(f, args)?;
                write!(f, ")")
            }
        }
    }
}
