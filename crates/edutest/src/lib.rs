//! Edutest: helpers for grading student classes
//!
//! This crate provides the test-facing side of the toolkit:
//! - Reflective lookup and invocation with localized diagnostics ([`reflect`])
//! - A typed fluent wrapper over it ([`reflex`])
//! - CPU time limits for test bodies ([`timing`])
//! - Fault message rewriting ([`exceptions`])
//! - Locale, message catalogs and configuration
//!
//! Classes are hosted by [`runtime`] (the `edutest-core` crate) and encoded
//! with [`bytecode`] (the `edutest-bytecode` crate).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod exceptions;
pub mod locale;
pub mod messages;
pub mod reflect;
pub mod reflex;
pub mod timing;

pub use edutest_bytecode as bytecode;
pub use edutest_core as runtime;

pub use config::{ConfigError, EduConfig, TimeLimitConfig};
pub use exceptions::ExceptionMessageFilter;
pub use locale::Locale;
pub use reflect::{AccessSet, Diagnostic, FailureKind, MemberDescriptor, ReflectError, Reflector};
pub use reflex::{types, MethodRef, ReflexClass};
pub use timing::{CpuStopwatch, CpuTimeLimit, StopwatchMode, TimeLimitError};
