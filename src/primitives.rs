use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::types::ArrayId;
use crate::{EvalError, EvalResult, Span, Value};

// --- Output ---

/// Where `print` writes. `Buffer` collects lines so callers can inspect
/// program output.
#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

impl Output {
    pub fn buffer() -> Self {
        Output::Buffer(Rc::new(RefCell::new(String::new())))
    }

    pub fn println(&self, line: &str) {
        match self {
            Output::Stdout => println!("{}", line),
            Output::Buffer(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(line);
                buffer.push('\n');
            }
        }
    }

    /// Everything printed so far. Always empty for `Stdout`.
    pub fn contents(&self) -> String {
        match self {
            Output::Stdout => String::new(),
            Output::Buffer(buffer) => buffer.borrow().clone(),
        }
    }
}

// --- Argument helpers ---

fn arity_error(name: &str, expected: usize, actual: usize, span: Span) -> EvalError {
    EvalError::InvalidArguments(
        format!(
            "Primitive '{}' expects exactly {} arguments, got {}",
            name, expected, actual
        ),
        span,
    )
}

fn expect_args<const N: usize>(args: Vec<Value>, name: &str, span: Span) -> EvalResult<[Value; N]> {
    let actual = args.len();
    <[Value; N]>::try_from(args).map_err(|_| arity_error(name, N, actual, span))
}

fn type_mismatch(name: &str, args: &[&Value], span: Span) -> EvalError {
    let found = args
        .iter()
        .map(|arg| arg.type_name())
        .collect::<Vec<_>>()
        .join(" and ");
    EvalError::TypeMismatch {
        operation: name.to_string(),
        found,
        span,
    }
}

fn overflow(name: &str, span: Span) -> EvalError {
    EvalError::IntegerOverflow(name.to_string(), span)
}

/// Maps a possibly negative index onto `0..len`, counting negatives from the end.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

fn integer_op(
    args: Vec<Value>,
    span: Span,
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> EvalResult {
    let [left, right] = expect_args(args, name, span)?;
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => {
            op(*a, *b).map(Value::Integer).ok_or_else(|| overflow(name, span))
        }
        _ => Err(type_mismatch(name, &[&left, &right], span)),
    }
}

fn repeat(items: &Rc<RefCell<Vec<Value>>>, count: i64, span: Span) -> EvalResult {
    let items = items.borrow();
    let count = usize::try_from(count).unwrap_or(0);
    let total = items
        .len()
        .checked_mul(count)
        .ok_or_else(|| overflow("mul", span))?;
    Ok(Value::new_array(
        items.iter().cycle().take(total).cloned().collect(),
    ))
}

// --- Arithmetic ---

pub fn prim_add(args: Vec<Value>, span: Span) -> EvalResult {
    let [left, right] = expect_args(args, "add", span)?;
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_add(*b)
            .map(Value::Integer)
            .ok_or_else(|| overflow("add", span)),
        (Value::Array(a), Value::Array(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::new_array(items))
        }
        _ => Err(type_mismatch("add", &[&left, &right], span)),
    }
}

pub fn prim_sub(args: Vec<Value>, span: Span) -> EvalResult {
    integer_op(args, span, "sub", i64::checked_sub)
}

pub fn prim_mul(args: Vec<Value>, span: Span) -> EvalResult {
    let [left, right] = expect_args(args, "mul", span)?;
    match (&left, &right) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_mul(*b)
            .map(Value::Integer)
            .ok_or_else(|| overflow("mul", span)),
        (Value::Array(items), Value::Integer(count))
        | (Value::Integer(count), Value::Array(items)) => repeat(items, *count, span),
        _ => Err(type_mismatch("mul", &[&left, &right], span)),
    }
}

// Quotient rounded toward negative infinity
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

// Remainder takes the sign of the divisor
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let remainder = a.wrapping_rem(b);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder.checked_add(b)
    } else {
        Some(remainder)
    }
}

fn division(args: Vec<Value>, span: Span, name: &str, op: fn(i64, i64) -> Option<i64>) -> EvalResult {
    let [left, right] = expect_args(args, name, span)?;
    match (&left, &right) {
        (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero(span)),
        (Value::Integer(a), Value::Integer(b)) => {
            op(*a, *b).map(Value::Integer).ok_or_else(|| overflow(name, span))
        }
        _ => Err(type_mismatch(name, &[&left, &right], span)),
    }
}

pub fn prim_div(args: Vec<Value>, span: Span) -> EvalResult {
    division(args, span, "div", floor_div)
}

pub fn prim_mod(args: Vec<Value>, span: Span) -> EvalResult {
    division(args, span, "mod", floor_mod)
}

pub fn prim_neg(args: Vec<Value>, span: Span) -> EvalResult {
    let [value] = expect_args(args, "neg", span)?;
    match value {
        Value::Integer(n) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| overflow("neg", span)),
        other => Err(type_mismatch("neg", &[&other], span)),
    }
}

// --- Comparison ---

pub fn prim_equal(args: Vec<Value>, span: Span) -> EvalResult {
    let [left, right] = expect_args(args, "equal", span)?;
    Ok(Value::Boolean(left == right))
}

pub fn prim_not_equal(args: Vec<Value>, span: Span) -> EvalResult {
    let [left, right] = expect_args(args, "not_equal", span)?;
    Ok(Value::Boolean(left != right))
}

// `comparing` holds the array pairs already being compared further up.
fn compare_values(
    left: &Value,
    right: &Value,
    name: &str,
    span: Span,
    comparing: &mut Vec<(ArrayId, ArrayId)>,
) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(Ordering::Equal);
            }
            let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
            if comparing.contains(&pair) {
                return Err(EvalError::InvalidArguments(
                    format!("Primitive '{}' cannot order an array that contains itself", name),
                    span,
                ));
            }
            comparing.push(pair);
            let (a, b) = (a.borrow(), b.borrow());
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y, name, span, comparing)?;
                if ordering != Ordering::Equal {
                    return Ok(ordering);
                }
            }
            comparing.pop();
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(type_mismatch(name, &[left, right], span)),
    }
}

fn ordering_op(args: Vec<Value>, span: Span, name: &str, accept: fn(Ordering) -> bool) -> EvalResult {
    let [left, right] = expect_args(args, name, span)?;
    let ordering = compare_values(&left, &right, name, span, &mut Vec::new())?;
    Ok(Value::Boolean(accept(ordering)))
}

pub fn prim_less(args: Vec<Value>, span: Span) -> EvalResult {
    ordering_op(args, span, "less", Ordering::is_lt)
}

pub fn prim_greater(args: Vec<Value>, span: Span) -> EvalResult {
    ordering_op(args, span, "greater", Ordering::is_gt)
}

pub fn prim_less_equal(args: Vec<Value>, span: Span) -> EvalResult {
    ordering_op(args, span, "less_equal", Ordering::is_le)
}

pub fn prim_greater_equal(args: Vec<Value>, span: Span) -> EvalResult {
    ordering_op(args, span, "greater_equal", Ordering::is_ge)
}

pub fn prim_not(args: Vec<Value>, span: Span) -> EvalResult {
    let [value] = expect_args(args, "not", span)?;
    Ok(Value::Boolean(!value.is_truthy()))
}

// --- Arrays ---

pub fn prim_arr(args: Vec<Value>, _span: Span) -> EvalResult {
    Ok(Value::new_array(args))
}

fn expect_array(value: &Value, name: &str, span: Span) -> EvalResult<Rc<RefCell<Vec<Value>>>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(type_mismatch(name, &[other], span)),
    }
}

pub fn prim_len(args: Vec<Value>, span: Span) -> EvalResult {
    let [array] = expect_args(args, "len", span)?;
    let len = expect_array(&array, "len", span)?.borrow().len();
    i64::try_from(len)
        .map(Value::Integer)
        .map_err(|_| overflow("len", span))
}

pub fn prim_index(args: Vec<Value>, span: Span) -> EvalResult {
    let [collection, index] = expect_args(args, "index", span)?;
    let Value::Array(items) = &collection else {
        return Err(EvalError::IndexTypeError(
            format!("cannot index into {}", collection.type_name()),
            span,
        ));
    };
    let &Value::Integer(index) = &index else {
        return Err(EvalError::IndexTypeError(
            format!("array index must be an integer, got {}", index.type_name()),
            span,
        ));
    };
    let items = items.borrow();
    resolve_index(index, items.len())
        .map(|slot| items[slot].clone())
        .ok_or(EvalError::IndexOutOfRange {
            index,
            len: items.len(),
            span,
        })
}

// `None` picks the default, negatives count from the end, then clamp.
fn slice_bound(bound: &Value, len: usize, default: usize, span: Span) -> EvalResult<usize> {
    match bound {
        Value::Null => Ok(default),
        Value::Integer(n) => {
            let len_i = i64::try_from(len).map_err(|_| overflow("slice", span))?;
            let resolved = if *n < 0 { n.saturating_add(len_i) } else { *n };
            Ok(usize::try_from(resolved.clamp(0, len_i)).unwrap_or(0))
        }
        other => Err(EvalError::IndexTypeError(
            format!("slice bounds must be integers or None, got {}", other.type_name()),
            span,
        )),
    }
}

pub fn prim_slice(args: Vec<Value>, span: Span) -> EvalResult {
    let [collection, start, end] = expect_args(args, "slice", span)?;
    let Value::Array(items) = &collection else {
        return Err(EvalError::IndexTypeError(
            format!("cannot slice {}", collection.type_name()),
            span,
        ));
    };
    let items = items.borrow();
    let start = slice_bound(&start, items.len(), 0, span)?;
    let end = slice_bound(&end, items.len(), items.len(), span)?;
    if start >= end {
        return Ok(Value::new_array(Vec::new()));
    }
    Ok(Value::new_array(items[start..end].to_vec()))
}

pub fn prim_push(args: Vec<Value>, span: Span) -> EvalResult {
    let [array, value] = expect_args(args, "push", span)?;
    expect_array(&array, "push", span)?.borrow_mut().push(value);
    Ok(Value::Null)
}

pub fn prim_pop(args: Vec<Value>, span: Span) -> EvalResult {
    let [array] = expect_args(args, "pop", span)?;
    let popped = expect_array(&array, "pop", span)?.borrow_mut().pop();
    popped.ok_or(EvalError::IndexOutOfRange {
        index: -1,
        len: 0,
        span,
    })
}

// --- Output ---

pub fn prim_print(output: &Output, args: Vec<Value>, _span: Span) -> EvalResult {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    output.println(&line);
    Ok(Value::Null)
}
