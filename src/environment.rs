use crate::evaluator::EvalResult;
use crate::primitives::{self, Output};
use crate::source::Span;
use crate::types::{Primitive, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Undefined variable: '{0}'")]
    UndefinedVariable(String, Span), // Name, span where lookup happened
}

// --- Environment Definition ---

/// One frame of the lexical environment chain.
#[derive(Debug, Default)]
pub struct Environment {
    // Use Rc<RefCell<...>> to allow shared ownership and interior mutability.
    // Needed for closures capturing environments and for `=`.
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A root frame holding the runtime library, printing to stdout.
    pub fn new_global_populated() -> Rc<RefCell<Environment>> {
        Environment::new_global_with_output(Output::Stdout)
    }

    /// A root frame holding the runtime library, printing to `output`.
    pub fn new_global_with_output(output: Output) -> Rc<RefCell<Environment>> {
        let env_ptr = Environment::new(); // Create empty global env
        {
            // Borrow mutably only inside this scope
            let mut env = env_ptr.borrow_mut();
            env.add_primitive("add", primitives::prim_add);
            env.add_primitive("sub", primitives::prim_sub);
            env.add_primitive("mul", primitives::prim_mul);
            env.add_primitive("div", primitives::prim_div);
            env.add_primitive("mod", primitives::prim_mod);
            env.add_primitive("neg", primitives::prim_neg);

            env.add_primitive("equal", primitives::prim_equal);
            env.add_primitive("not_equal", primitives::prim_not_equal);
            env.add_primitive("less", primitives::prim_less);
            env.add_primitive("greater", primitives::prim_greater);
            env.add_primitive("less_equal", primitives::prim_less_equal);
            env.add_primitive("greater_equal", primitives::prim_greater_equal);
            env.add_primitive("not", primitives::prim_not);

            // --- Array Primitives ---
            env.add_primitive("arr", primitives::prim_arr);
            env.add_primitive("len", primitives::prim_len);
            env.add_primitive("index", primitives::prim_index);
            env.add_primitive("slice", primitives::prim_slice);
            env.add_primitive("push", primitives::prim_push);
            env.add_primitive("pop", primitives::prim_pop);

            // --- Output ---
            env.add_primitive("print", move |args, span| {
                primitives::prim_print(&output, args, span)
            });
        }
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> Value {
        self.bindings.insert(name.into(), value.clone());
        value
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    /// `lookup_span` is the location where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UndefinedVariable(name.to_string(), lookup_span)),
            }
        }
    }

    /// Sets the value of an *existing* variable in the environment chain.
    /// Searches outward from the current environment and updates the first frame
    /// where the variable is found. Errors if the variable is not defined.
    pub fn set(&mut self, name: &str, value: Value, set_span: Span) -> Result<Value, EnvError> {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value.clone();
            Ok(value)
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow_mut().set(name, value, set_span),
                None => Err(EnvError::UndefinedVariable(name.to_string(), set_span)),
            }
        }
    }

    /// Helper to add a primitive procedure to the environment.
    fn add_primitive(
        &mut self,
        name: &'static str,
        func: impl Fn(Vec<Value>, Span) -> EvalResult<Value> + 'static,
    ) {
        let primitive = Primitive {
            name,
            func: Rc::new(func),
        };
        self.define(name, Value::Primitive(primitive));
    }

    /// Gets the set of identifiers visible from this frame
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}
