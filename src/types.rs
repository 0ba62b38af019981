use crate::ast::{Literal, Node};
use crate::environment::Environment;
use crate::evaluator::EvalResult;
use crate::source::Span;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A runtime value. Arrays, closures and natives are reference types:
/// cloning a `Value` aliases them rather than copying.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    Array(Rc<RefCell<Vec<Value>>>),
    Closure(Rc<Closure>),
    Primitive(Primitive),
}

impl Value {
    pub fn new_array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// `False`, `0` and `None` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(
            self,
            Value::Boolean(false) | Value::Integer(0) | Value::Null
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Null => "None",
            Value::Array(_) => "array",
            Value::Closure(_) => "function",
            Value::Primitive(_) => "native function",
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Integer(n) => Value::Integer(n),
            Literal::Boolean(b) => Value::Boolean(b),
            Literal::Null => Value::Null,
        }
    }
}

/// Identity of an array's storage, used to detect arrays that contain themselves.
pub type ArrayId = *const RefCell<Vec<Value>>;

impl Value {
    // Pairs already being compared further up count as equal, so two
    // self-containing arrays of the same shape are equal.
    fn equal_guarded(&self, other: &Value, comparing: &mut Vec<(ArrayId, ArrayId)>) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
                if comparing.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                comparing.push(pair);
                let equal = a
                    .iter()
                    .zip(b.iter())
                    .all(|(x, y)| x.equal_guarded(y, comparing));
                comparing.pop();
                equal
            }
            _ => self == other,
        }
    }

    fn write_guarded(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<ArrayId>) -> fmt::Result {
        let Value::Array(items) = self else {
            return write!(f, "{}", self);
        };
        let id = Rc::as_ptr(items);
        if open.contains(&id) {
            return write!(f, "[...]");
        }
        open.push(id);
        write!(f, "[")?;
        for (i, item) in items.borrow().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            item.write_guarded(f, open)?;
        }
        open.pop();
        write!(f, "]")
    }
}

// Arrays compare by contents, functions by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(_), Value::Array(_)) => self.equal_guarded(other, &mut Vec::new()),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

// An array nested inside itself prints as `[...]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Null => write!(f, "None"),
            Value::Array(_) => self.write_guarded(f, &mut Vec::new()),
            Value::Closure(closure) => write!(f, "<func({})>", closure.params.join(", ")),
            Value::Primitive(primitive) => write!(f, "<native {}>", primitive.name),
        }
    }
}

/// A function value: parameters and body plus the frame that was current
/// when the `func` expression ran.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub env: Rc<RefCell<Environment>>,
}

// The captured frame usually holds the closure itself, so it is left out.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

pub type PrimitiveFunc = Rc<dyn Fn(Vec<Value>, Span) -> EvalResult<Value>>;

/// A native callable from the runtime library.
#[derive(Clone)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFunc,
}

impl Primitive {
    pub fn call(&self, args: Vec<Value>, span: Span) -> EvalResult<Value> {
        (self.func)(args, span)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(Value::new_array(vec![]).is_truthy());
    }

    #[test]
    fn test_display() {
        let nested = Value::new_array(vec![
            Value::Integer(2),
            Value::Null,
            Value::new_array(vec![Value::Boolean(true), Value::Boolean(false)]),
        ]);
        assert_eq!(nested.to_string(), "[2, None, [True, False]]");
        assert_eq!(Value::new_array(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_equality() {
        let a = Value::new_array(vec![Value::Integer(1)]);
        let b = Value::new_array(vec![Value::Integer(1)]);
        assert_eq!(a, b);
        assert_ne!(Value::Integer(1), Value::Boolean(true));
        assert_ne!(Value::Integer(0), Value::Null);
    }

    // Builds `a := arr(1); push(a, a)`
    fn self_containing() -> Value {
        let a = Value::new_array(vec![Value::Integer(1)]);
        if let Value::Array(items) = &a {
            items.borrow_mut().push(a.clone());
        }
        a
    }

    #[test]
    fn test_self_containing_array() {
        let a = self_containing();
        assert_eq!(a.to_string(), "[1, [...]]");
        assert_eq!(a, a.clone());

        let b = self_containing();
        assert_eq!(a, b);
        assert_ne!(a, Value::new_array(vec![Value::Integer(1), Value::Null]));

        let wrapper = Value::new_array(vec![a.clone(), a]);
        assert_eq!(wrapper.to_string(), "[[1, [...]], [1, [...]]]");
    }

    #[test]
    fn test_clone_aliases_arrays() {
        let a = Value::new_array(vec![]);
        let alias = a.clone();
        if let Value::Array(items) = &alias {
            items.borrow_mut().push(Value::Integer(5));
        }
        assert_eq!(a.to_string(), "[5]");
    }
}
