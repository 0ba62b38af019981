use crate::ast::{Expr, Node};
use crate::environment::{EnvError, Environment};
use crate::primitives::resolve_index;
use crate::source::Span;
use crate::types::{Closure, Value};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Evaluation Error: Illegal assignment target: {0}")]
    IllegalAssignTarget(String, Span),
    #[error("Evaluation Error: Bad index - {0}")]
    IndexTypeError(String, Span),
    #[error("Evaluation Error: Expected a function, but got: {0}")]
    IllegalOperator(String, Span), // Tried to call something that isn't callable
    #[error("Evaluation Error: Invalid arguments - {0}")]
    InvalidArguments(String, Span), // Mismatched native arity
    #[error("Evaluation Error: '{operation}' does not support {found}")]
    TypeMismatch {
        operation: String,
        found: String,
        span: Span,
    },
    #[error("Evaluation Error: Index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: i64, len: usize, span: Span },
    #[error("Evaluation Error: Division by zero")]
    DivisionByZero(Span),
    #[error("Evaluation Error: Integer overflow in '{0}'")]
    IntegerOverflow(String, Span),
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::EnvError(EnvError::UndefinedVariable(_, span))
            | EvalError::IllegalAssignTarget(_, span)
            | EvalError::IndexTypeError(_, span)
            | EvalError::IllegalOperator(_, span)
            | EvalError::InvalidArguments(_, span)
            | EvalError::TypeMismatch { span, .. }
            | EvalError::IndexOutOfRange { span, .. }
            | EvalError::DivisionByZero(span)
            | EvalError::IntegerOverflow(_, span) => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: Rc<RefCell<Environment>>) -> EvalResult {
    match &node.kind {
        Expr::Literal(literal) => Ok(Value::from(*literal)),

        Expr::Name(name) => {
            let value = env.borrow().get(name, node.span)?;
            Ok(value)
        }

        Expr::Sequence(exprs) => evaluate_sequence(exprs, env),

        // `:=` always binds in the current frame
        Expr::Define { name, value } => {
            let value = evaluate(value, env.clone())?;
            let value = env.borrow_mut().define(name.clone(), value);
            Ok(value)
        }

        Expr::Assign { target, value } => evaluate_assign(target, value, env),

        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => evaluate_if(condition, then_branch, else_branch, env),

        Expr::While { condition, body } => evaluate_while(condition, body, env),

        Expr::FuncLiteral { params, body } => Ok(Value::Closure(Rc::new(Closure {
            params: params.clone(),
            body: body.clone(),
            env,
        }))),

        Expr::Scope(body) => {
            trace!(span = %node.span, "entering scope");
            evaluate(body, Environment::new_enclosed(env))
        }

        Expr::Call { callee, args } => evaluate_call(callee, args, env, node.span),
    }
}

fn evaluate_sequence(exprs: &[Node], env: Rc<RefCell<Environment>>) -> EvalResult {
    let mut result = Value::Null;
    for expr in exprs {
        result = evaluate(expr, env.clone())?;
    }
    Ok(result)
}

fn evaluate_if(
    condition: &Rc<Node>,
    then_branch: &Rc<Node>,
    else_branch: &Rc<Node>,
    env: Rc<RefCell<Environment>>,
) -> EvalResult {
    // Only the chosen branch is evaluated
    let test = evaluate(condition, env.clone())?;
    let branch = if test.is_truthy() {
        then_branch
    } else {
        else_branch
    };
    // The shared operand of `and`/`or` is not evaluated a second time
    if Rc::ptr_eq(branch, condition) {
        return Ok(test);
    }
    evaluate(branch, env)
}

fn evaluate_while(condition: &Node, body: &Node, env: Rc<RefCell<Environment>>) -> EvalResult {
    while evaluate(condition, env.clone())?.is_truthy() {
        evaluate(body, env.clone())?;
    }
    Ok(Value::Null)
}

/// `target = value`. The right-hand side is evaluated first, then the target
/// must be a name bound somewhere up the chain or an `index(coll, idx)` call.
fn evaluate_assign(target: &Node, value: &Node, env: Rc<RefCell<Environment>>) -> EvalResult {
    let value = evaluate(value, env.clone())?;

    if let Expr::Name(name) = &target.kind {
        let value = env.borrow_mut().set(name, value, target.span)?;
        return Ok(value);
    }

    let Some((collection, index)) = target.kind.as_index() else {
        return Err(EvalError::IllegalAssignTarget(
            target.to_string(),
            target.span,
        ));
    };

    let collection = evaluate(collection, env.clone())?;
    let index = evaluate(index, env)?;
    let Value::Array(items) = &collection else {
        return Err(EvalError::IndexTypeError(
            format!("cannot assign into {}", collection.type_name()),
            target.span,
        ));
    };
    let &Value::Integer(index) = &index else {
        return Err(EvalError::IndexTypeError(
            format!("array index must be an integer, got {}", index.type_name()),
            target.span,
        ));
    };

    let mut items = items.borrow_mut();
    let len = items.len();
    let slot = resolve_index(index, len).ok_or(EvalError::IndexOutOfRange {
        index,
        len,
        span: target.span,
    })?;
    items[slot] = value.clone();
    Ok(value)
}

fn evaluate_call(
    callee: &Node,
    args: &[Node],
    env: Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let procedure = evaluate(callee, env.clone())?;

    // Arguments are evaluated left to right, before the call
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, env.clone())?);
    }

    match procedure {
        Value::Primitive(primitive) => primitive.call(evaluated_args, span),
        Value::Closure(closure) => apply_closure(&closure, evaluated_args),
        other => Err(EvalError::IllegalOperator(other.to_string(), callee.span)),
    }
}

/// Runs a closure body in a fresh frame enclosing the captured one.
///
/// Parameters are bound positionally. Surplus arguments are dropped and
/// missing ones leave their parameter unbound, so referring to it fails
/// with `UndefinedVariable` (or finds an outer binding of the same name).
pub fn apply_closure(closure: &Closure, args: Vec<Value>) -> EvalResult {
    trace!(params = ?closure.params, args = args.len(), "calling closure");
    let frame = Environment::new_enclosed(closure.env.clone());
    {
        let mut frame_mut = frame.borrow_mut();
        for (param, arg) in closure.params.iter().zip(args) {
            frame_mut.define(param.clone(), arg);
        }
    }
    evaluate(&closure.body, frame)
}
