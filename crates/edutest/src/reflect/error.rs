//! Reflective failures

use edutest_core::{Fault, LoadError, StackFrame};
use std::fmt;
use thiserror::Error;

/// What went wrong, independent of the message language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No class file exists for the name
    ClassNotFound,
    /// No constructor or method with the requested signature
    MemberNotFound,
    /// The member exists but has the wrong access, staticness or return type
    AccessMismatch,
    /// The runtime refused the call (access, arguments, abstract class)
    InvocationFailure,
    /// A fault raised by the invoked code, passed through unchanged
    PropagatedFault,
    /// A fault raised by the invoked code, rewritten into a diagnostic
    WrappedFault,
    /// The test itself uses the API wrongly
    Misuse,
    /// The class exists but could not be loaded
    Load,
}

/// A user-facing failure with a fully formatted, localized message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    kind: FailureKind,
    message: String,
    call: Option<String>,
    custom: Option<String>,
    stack: Vec<StackFrame>,
    cause: Option<Fault>,
}

impl Diagnostic {
    /// A diagnostic with only a message
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            call: None,
            custom: None,
            stack: Vec::new(),
            cause: None,
        }
    }

    pub(crate) fn wrapping(
        message: String,
        call: String,
        custom: Option<String>,
        original: &Fault,
    ) -> Self {
        Self {
            kind: FailureKind::WrappedFault,
            message,
            call: Some(call),
            custom,
            stack: original.stack().to_vec(),
            cause: original.cause().cloned(),
        }
    }

    /// Failure kind
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Localized message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rendition of the call that failed, for wrapped faults
    pub fn call(&self) -> Option<&str> {
        self.call.as_deref()
    }

    /// Caller-supplied annotation, for wrapped faults
    pub fn custom(&self) -> Option<&str> {
        self.custom.as_deref()
    }

    /// Stack trace of the wrapped fault
    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Cause of the wrapped fault
    pub fn cause(&self) -> Option<&Fault> {
        self.cause.as_ref()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Diagnostic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Error returned by the reflective layer
#[derive(Debug, Error)]
pub enum ReflectError {
    /// Lookup, access or invocation failure with a localized message
    #[error(transparent)]
    Diagnostic(Diagnostic),

    /// Fault raised by the invoked code, unchanged
    #[error(transparent)]
    Fault(Fault),

    /// The test uses the API wrongly
    #[error("{0}")]
    Misuse(String),

    /// Class loading failed for a reason other than a missing class
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl ReflectError {
    pub(crate) fn diagnostic(kind: FailureKind, message: String) -> Self {
        ReflectError::Diagnostic(Diagnostic::new(kind, message))
    }

    /// Failure kind
    pub fn kind(&self) -> FailureKind {
        match self {
            ReflectError::Diagnostic(d) => d.kind,
            ReflectError::Fault(_) => FailureKind::PropagatedFault,
            ReflectError::Misuse(_) => FailureKind::Misuse,
            ReflectError::Load(_) => FailureKind::Load,
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// The propagated fault, if this is one
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ReflectError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// The diagnostic, if this is one
    pub fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            ReflectError::Diagnostic(d) => Some(d),
            _ => None,
        }
    }
}

impl From<Fault> for ReflectError {
    fn from(fault: Fault) -> Self {
        ReflectError::Fault(fault)
    }
}

impl From<Diagnostic> for ReflectError {
    fn from(diagnostic: Diagnostic) -> Self {
        ReflectError::Diagnostic(diagnostic)
    }
}
