//! Class file definitions for the edutest class runtime
//!
//! This crate provides the class file format, the method body instruction
//! set, a structural verifier and a builder for assembling class files.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod class_file;
pub mod encoder;
pub mod opcode;
pub mod verify;

pub use builder::{ClassBuilder, CodeBuilder, Label, MethodSig};
pub use class_file::{
    access, simple_name, ClassFile, ClassFileError, FieldDef, MethodBody, MethodDef,
    PrimitiveType, TypeDesc, CONSTRUCTOR_NAME, STATIC_INIT_NAME,
};
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::Opcode;
pub use verify::{verify_class, VerifyError};
