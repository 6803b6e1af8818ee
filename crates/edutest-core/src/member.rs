//! Method and constructor handles
//!
//! Handles are obtained from [`Class::declared_method`](crate::Class::declared_method)
//! and friends. Invoking a handle checks access, receiver and arguments the
//! way reflective invocation does, runs the class's static initializer if
//! needed and executes the body.

use crate::class::{ClassRef, MethodInfo};
use crate::fault::Fault;
use crate::interpreter;
use crate::loader::LoadError;
use crate::object::Object;
use crate::types::Type;
use crate::value::Value;
use edutest_bytecode::{access, TypeDesc};
use thiserror::Error;

/// Reflective invocation failures
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// The member is not public and was not made accessible
    #[error("illegal access: {0}")]
    IllegalAccess(String),

    /// Wrong receiver, argument count or argument types
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Instantiation of an abstract class
    #[error("cannot instantiate {0}")]
    Instantiation(String),

    /// The invoked code raised a fault
    #[error("invocation target fault: {0}")]
    Target(Fault),
}

/// Handle to a method
#[derive(Debug, Clone)]
pub struct Method {
    class: ClassRef,
    index: usize,
    accessible: bool,
}

/// Handle to a constructor
#[derive(Debug, Clone)]
pub struct Constructor {
    class: ClassRef,
    index: usize,
    accessible: bool,
}

macro_rules! member_accessors {
    ($ty:ident) => {
        impl $ty {
            pub(crate) fn new(class: ClassRef, index: usize) -> Self {
                Self {
                    class,
                    index,
                    accessible: false,
                }
            }

            fn info(&self) -> &MethodInfo {
                &self.class.methods[self.index]
            }

            /// Declaring class
            pub fn declaring_class(&self) -> &ClassRef {
                &self.class
            }

            /// Access flags
            pub fn access(&self) -> u16 {
                self.info().access
            }

            /// Declared parameter types, unresolved
            pub fn parameter_descs(&self) -> &[TypeDesc] {
                &self.info().params
            }

            /// Declared parameter types, resolved from the declaring class
            pub fn parameter_types(&self) -> Result<Vec<Type>, LoadError> {
                self.info()
                    .params
                    .iter()
                    .map(|desc| self.class.resolve_type(desc))
                    .collect()
            }

            /// Let `invoke` bypass visibility checks
            pub fn set_accessible(&mut self, accessible: bool) {
                self.accessible = accessible;
            }

            /// Whether visibility checks are bypassed
            pub fn is_accessible(&self) -> bool {
                self.accessible
            }

            fn check_access(&self, what: &str) -> Result<(), InvokeError> {
                if self.access() & access::PUBLIC == 0 && !self.accessible {
                    return Err(InvokeError::IllegalAccess(format!(
                        "{} {} is not public",
                        what,
                        self.class.name()
                    )));
                }
                Ok(())
            }

            fn convert_args(&self, args: &[Value]) -> Result<Vec<Value>, InvokeError> {
                let params = self.parameter_types().map_err(|e| {
                    InvokeError::Target(Fault::with_message(
                        crate::fault::kinds::NO_CLASS_DEF,
                        e.to_string(),
                    ))
                })?;
                if params.len() != args.len() {
                    return Err(InvokeError::IllegalArgument(format!(
                        "wrong number of arguments: expected {}, got {}",
                        params.len(),
                        args.len()
                    )));
                }
                params
                    .iter()
                    .zip(args)
                    .enumerate()
                    .map(|(i, (ty, arg))| {
                        ty.coerce(arg).ok_or_else(|| {
                            InvokeError::IllegalArgument(format!(
                                "argument {} type mismatch: expected {}, got {}",
                                i + 1,
                                ty.name(),
                                arg.type_label()
                            ))
                        })
                    })
                    .collect()
            }
        }
    };
}

member_accessors!(Method);
member_accessors!(Constructor);

impl Method {
    /// Method name
    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.info().is_static()
    }

    /// Whether the method is abstract
    pub fn is_abstract(&self) -> bool {
        self.access() & access::ABSTRACT != 0
    }

    /// Declared return type, unresolved
    pub fn return_desc(&self) -> &TypeDesc {
        &self.info().return_type
    }

    /// Declared return type, resolved from the declaring class
    pub fn return_type(&self) -> Result<Type, LoadError> {
        self.class.resolve_type(&self.info().return_type)
    }

    /// Invoke the method
    ///
    /// `receiver` is ignored for static methods. Instance methods dispatch
    /// on the receiver's runtime class unless they are private. Returns
    /// [`Value::Void`] for `void` methods.
    pub fn invoke(&self, receiver: Option<&Value>, args: &[Value]) -> Result<Value, InvokeError> {
        self.check_access("method")?;
        let args = self.convert_args(args)?;

        if self.is_static() {
            self.class.ensure_initialized().map_err(InvokeError::Target)?;
            return interpreter::execute(&self.class, self.index, args).map_err(InvokeError::Target);
        }

        let object = match receiver {
            Some(Value::Object(obj)) => obj.clone(),
            Some(Value::Null) | None => {
                return Err(InvokeError::IllegalArgument(format!(
                    "missing receiver for {}.{}",
                    self.class.name(),
                    self.name()
                )))
            }
            Some(other) => {
                return Err(InvokeError::IllegalArgument(format!(
                    "receiver of type {} is not an instance of {}",
                    other.type_label(),
                    self.class.name()
                )))
            }
        };
        if !object.class().is_subclass_of(&self.class) {
            return Err(InvokeError::IllegalArgument(format!(
                "object of type {} is not an instance of {}",
                object.class().name(),
                self.class.name()
            )));
        }

        let (target_class, target_index) = if self.access() & access::PRIVATE != 0 {
            (self.class.clone(), self.index)
        } else {
            interpreter::find_override(object.class(), self.name(), &self.info().params)
                .unwrap_or((self.class.clone(), self.index))
        };
        let mut frame = Vec::with_capacity(args.len() + 1);
        frame.push(Value::Object(object));
        frame.extend(args);
        interpreter::execute(&target_class, target_index, frame).map_err(InvokeError::Target)
    }
}

impl Constructor {
    /// Create a new instance
    pub fn new_instance(&self, args: &[Value]) -> Result<Value, InvokeError> {
        self.check_access("constructor of")?;
        if self.class.is_abstract() {
            return Err(InvokeError::Instantiation(self.class.name().to_string()));
        }
        let args = self.convert_args(args)?;
        self.class.ensure_initialized().map_err(InvokeError::Target)?;

        let object = Value::Object(Object::allocate(&self.class));
        let mut frame = Vec::with_capacity(args.len() + 1);
        frame.push(object.clone());
        frame.extend(args);
        interpreter::execute(&self.class, self.index, frame).map_err(InvokeError::Target)?;
        Ok(object)
    }
}
