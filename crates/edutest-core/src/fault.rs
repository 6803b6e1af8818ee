//! Faults raised by running class code
//!
//! A [`Fault`] is the runtime's exception object. Cloning a fault shares
//! it, so a fault that travels through several layers keeps its identity
//! ([`Fault::ptr_eq`]), stack trace and cause.

use crate::callstack::{self, StackFrame};
use std::fmt;
use std::sync::Arc;

/// Well-known fault type names raised by the runtime itself
pub mod kinds {
    /// Arithmetic error such as integer division by zero
    pub const ARITHMETIC: &str = "lang.ArithmeticException";
    /// Receiver or operand was `null`
    pub const NULL_POINTER: &str = "lang.NullPointerException";
    /// Call depth limit exceeded
    pub const STACK_OVERFLOW: &str = "lang.StackOverflowError";
    /// The running thread was asked to stop
    pub const INTERRUPTED: &str = "lang.InterruptedException";
    /// Missing instance or static field
    pub const NO_SUCH_FIELD: &str = "lang.NoSuchFieldError";
    /// Missing method
    pub const NO_SUCH_METHOD: &str = "lang.NoSuchMethodError";
    /// Class could not be loaded or initialized
    pub const NO_CLASS_DEF: &str = "lang.NoClassDefFoundError";
    /// Call of a method without a body
    pub const ABSTRACT_METHOD: &str = "lang.AbstractMethodError";
    /// Attempt to instantiate an abstract class
    pub const INSTANTIATION: &str = "lang.InstantiationError";
    /// Malformed code or an operand of the wrong type
    pub const INTERNAL: &str = "lang.InternalError";
    /// Generic state error, convenient for native code
    pub const ILLEGAL_STATE: &str = "lang.IllegalStateException";
    /// Generic argument error, convenient for native code
    pub const ILLEGAL_ARGUMENT: &str = "lang.IllegalArgumentException";
}

struct FaultInner {
    type_name: String,
    message: Option<String>,
    stack: Vec<StackFrame>,
    cause: Option<Fault>,
}

/// An exception raised by class code
#[derive(Clone)]
pub struct Fault(Arc<FaultInner>);

impl Fault {
    /// Create a fault, capturing the current thread's call stack
    pub fn new(type_name: impl Into<String>, message: Option<String>) -> Self {
        Self::with_stack(type_name, message, callstack::snapshot())
    }

    /// Create a fault with a message, capturing the current call stack
    pub fn with_message(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(type_name, Some(message.into()))
    }

    /// Create a fault with an explicit stack trace
    pub fn with_stack(
        type_name: impl Into<String>,
        message: Option<String>,
        stack: Vec<StackFrame>,
    ) -> Self {
        Fault(Arc::new(FaultInner {
            type_name: type_name.into(),
            message,
            stack,
            cause: None,
        }))
    }

    /// Create a fault caused by another one
    pub fn caused_by(type_name: impl Into<String>, message: Option<String>, cause: Fault) -> Self {
        Fault(Arc::new(FaultInner {
            type_name: type_name.into(),
            message,
            stack: callstack::snapshot(),
            cause: Some(cause),
        }))
    }

    /// A new fault with the same type and stack trace but a different
    /// message and cause
    pub fn rebuild(&self, message: Option<String>, cause: Option<Fault>) -> Self {
        Fault(Arc::new(FaultInner {
            type_name: self.0.type_name.clone(),
            message,
            stack: self.0.stack.clone(),
            cause,
        }))
    }

    /// Fully qualified type name
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// Type name without its package
    pub fn simple_name(&self) -> &str {
        edutest_bytecode::simple_name(&self.0.type_name)
    }

    /// Message, if any
    pub fn message(&self) -> Option<&str> {
        self.0.message.as_deref()
    }

    /// Stack trace, innermost frame first
    pub fn stack(&self) -> &[StackFrame] {
        &self.0.stack
    }

    /// The fault that caused this one
    pub fn cause(&self) -> Option<&Fault> {
        self.0.cause.as_ref()
    }

    /// Whether two handles refer to the same fault
    pub fn ptr_eq(a: &Fault, b: &Fault) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Whether this fault reports a cancelled thread
    pub fn is_interrupted(&self) -> bool {
        self.0.type_name == kinds::INTERRUPTED
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.message {
            Some(msg) => write!(f, "{}: {}", self.0.type_name, msg),
            None => f.write_str(&self.0.type_name),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)?;
        for frame in &self.0.stack {
            write!(f, "\n    at {}", frame)?;
        }
        if let Some(cause) = &self.0.cause {
            write!(f, "\nCaused by: {:?}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .cause
            .as_ref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}
