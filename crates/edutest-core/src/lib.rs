//! Edutest class runtime
//!
//! This crate hosts compiled classes for the edutest toolkit:
//! - Loading contexts and the isolating loader
//! - Class objects with per-definition static state
//! - Method and constructor handles for reflective invocation
//! - A bytecode interpreter with cooperative cancellation

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builtins;
pub mod callstack;
pub mod cancel;
pub mod class;
pub mod context;
pub mod fault;
pub mod interpreter;
pub mod loader;
pub mod member;
pub mod native;
pub mod object;
pub mod types;
pub mod value;

pub use callstack::StackFrame;
pub use cancel::CancellationToken;
pub use class::{Class, ClassId, ClassRef, FieldInfo};
pub use context::{ContextId, IsolatingLoader, LoadPolicy, LoadingContext};
pub use fault::{kinds, Fault};
pub use loader::{
    BytecodeLoader, DirectoryClassPath, LoadError, MemoryClassPath, ResourceLookup,
    CLASS_FILE_EXTENSION,
};
pub use member::{Constructor, InvokeError, Method};
pub use native::{NativeCall, NativeFn, NativeRegistry};
pub use object::{Object, ObjectRef};
pub use types::Type;
pub use value::Value;
