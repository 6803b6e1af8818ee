//! Native method registry
//!
//! Class files can declare a method body as `Native("symbol")`. At definition
//! time each symbol is resolved against a [`NativeRegistry`]; an unknown
//! symbol fails the definition.

use crate::class::ClassRef;
use crate::fault::{kinds, Fault};
use crate::object::ObjectRef;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A native method implementation
pub type NativeFn = Arc<dyn Fn(&NativeCall<'_>) -> Result<Value, Fault> + Send + Sync>;

/// Arguments of a native method call
pub struct NativeCall<'a> {
    /// Class declaring the method
    pub class: &'a ClassRef,
    /// Receiver, `None` for static methods
    pub this: Option<&'a Value>,
    /// Arguments, already converted to the declared parameter types
    pub args: &'a [Value],
}

impl<'a> NativeCall<'a> {
    /// Argument `index`, or an `IllegalArgumentException` fault
    pub fn arg(&self, index: usize) -> Result<&'a Value, Fault> {
        self.args.get(index).ok_or_else(|| {
            Fault::with_message(kinds::ILLEGAL_ARGUMENT, format!("missing argument {}", index))
        })
    }

    /// Argument `index` as an `int`
    pub fn int_arg(&self, index: usize) -> Result<i32, Fault> {
        match self.arg(index)? {
            Value::Int(v) => Ok(*v),
            other => Err(Fault::with_message(
                kinds::ILLEGAL_ARGUMENT,
                format!("argument {} is {}, not int", index, other.type_label()),
            )),
        }
    }

    /// Receiver object, or a `NullPointerException` fault
    pub fn this_object(&self) -> Result<&'a ObjectRef, Fault> {
        self.this
            .and_then(Value::as_object)
            .ok_or_else(|| Fault::new(kinds::NULL_POINTER, None))
    }
}

/// Registry of native methods indexed by symbolic name
#[derive(Clone, Default)]
pub struct NativeRegistry {
    handlers: FxHashMap<String, NativeFn>,
}

impl NativeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native method under `name`
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&NativeCall<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(
        mut self,
        name: &str,
        handler: impl Fn(&NativeCall<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.register(name, handler);
        self
    }

    /// Get a handler by name (used at definition time)
    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.handlers.get(name).cloned()
    }

    /// Check if a handler is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("count", &self.handlers.len())
            .finish()
    }
}
