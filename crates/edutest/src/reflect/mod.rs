//! Reflective access to loaded classes
//!
//! Lookups check a [`MemberDescriptor`]'s constraints and fail with a
//! localized [`Diagnostic`]. Invocations pass faults raised by the invoked
//! code through unchanged ([`ReflectError::Fault`]) and turn everything the
//! runtime refuses into diagnostics.

mod access;
mod descriptor;
mod error;
mod format;

pub use access::{access_modifiers_to_string, AccessSet};
pub use descriptor::MemberDescriptor;
pub use error::{Diagnostic, FailureKind, ReflectError};
pub use format::{
    describe_call, get_nice_exception, method_signature, nice_constructor_signature,
    nice_method_signature, primitive_type_to_object_type,
};

use crate::messages::{keys, tr};
use edutest_core::{
    ClassRef, Constructor, InvokeError, IsolatingLoader, LoadError, LoadingContext, Method, Type,
    Value,
};
use std::sync::Arc;

/// Entry point for class lookups against a fixed root context
#[derive(Debug, Clone)]
pub struct Reflector {
    root: Arc<LoadingContext>,
}

impl Reflector {
    /// Reflector resolving names through `root`
    pub fn new(root: Arc<LoadingContext>) -> Self {
        Self { root }
    }

    /// Root context
    pub fn root(&self) -> &Arc<LoadingContext> {
        &self.root
    }

    /// Find a class by its dotted name
    pub fn find_class(&self, name: &str) -> Result<ClassRef, ReflectError> {
        if name.contains('/') {
            return Err(ReflectError::Misuse(
                "Test writer: use '.' as the package separator instead of '/'.".to_string(),
            ));
        }
        load_class_with(name, &self.root)
    }

    /// Load a fresh copy of `name` with its own identity and static state
    ///
    /// The class is not initialized until first use.
    pub fn new_instance_of_class(&self, name: &str) -> Result<ClassRef, ReflectError> {
        let loader = IsolatingLoader::new(&self.root, name);
        log::debug!("reloading {} in isolated context {}", name, loader.context().id().as_u64());
        load_class_with(name, loader.context())
    }

    /// [`new_instance_of_class`](Self::new_instance_of_class) by class object
    pub fn new_instance_of(&self, class: &ClassRef) -> Result<ClassRef, ReflectError> {
        self.new_instance_of_class(class.name())
    }
}

/// Load `name` through `context`, translating a missing class into a diagnostic
pub fn load_class_with(name: &str, context: &LoadingContext) -> Result<ClassRef, ReflectError> {
    match context.load_class(name) {
        Ok(class) => Ok(class),
        Err(LoadError::ClassNotFound(_)) => {
            let key = if name.contains('.') {
                keys::CLASS_NOT_FOUND_PKG
            } else {
                keys::CLASS_NOT_FOUND
            };
            Err(ReflectError::diagnostic(FailureKind::ClassNotFound, tr(key, &[name])))
        }
        Err(e) => Err(ReflectError::Load(e)),
    }
}

/// Fail unless `class` has one of the levels in `access`
pub fn require_class_access(class: &ClassRef, access: AccessSet) -> Result<(), ReflectError> {
    if access.matches(class.access()) {
        return Ok(());
    }
    Err(ReflectError::diagnostic(
        FailureKind::AccessMismatch,
        tr(
            keys::CLASS_WRONG_ACCESS,
            &[class.name(), access_modifiers_to_string(access).as_str()],
        ),
    ))
}

/// Find the constructor `descriptor` names and check its access
///
/// The returned handle is accessible whatever its declared visibility.
pub fn require_constructor(descriptor: &MemberDescriptor) -> Result<Constructor, ReflectError> {
    if !descriptor.is_constructor() {
        return Err(ReflectError::Misuse(
            "require_constructor called with a method descriptor".to_string(),
        ));
    }
    let class = descriptor.class();
    let mut ctor = class.declared_constructor(descriptor.params()).ok_or_else(|| {
        ReflectError::diagnostic(
            FailureKind::MemberNotFound,
            tr(
                keys::CTOR_MISSING,
                &[nice_method_signature(None, class.simple_name(), descriptor.params()).as_str()],
            ),
        )
    })?;
    ctor.set_accessible(true);

    if let Some(access) = descriptor.access() {
        if !access.matches(ctor.access()) {
            return Err(ReflectError::diagnostic(
                FailureKind::AccessMismatch,
                tr(
                    keys::CTOR_WRONG_ACCESS,
                    &[
                        nice_constructor_signature(&ctor).as_str(),
                        access_modifiers_to_string(access).as_str(),
                    ],
                ),
            ));
        }
    }
    Ok(ctor)
}

fn find_in_superclass_chain(class: &ClassRef, name: &str, params: &[Type]) -> Option<Method> {
    let mut current = Some(class.clone());
    while let Some(class) = current {
        if let Some(method) = class.declared_method(name, params) {
            return Some(method);
        }
        current = class.superclass().cloned();
    }
    None
}

/// Find the method `descriptor` names and check its constraints
///
/// The search starts at the descriptor's class and walks up the superclass
/// chain. Return type, staticness and access are checked in that order.
/// The returned handle is accessible whatever its declared visibility.
pub fn require_method(descriptor: &MemberDescriptor) -> Result<Method, ReflectError> {
    let Some(name) = descriptor.name() else {
        return Err(ReflectError::Misuse(
            "require_method called with a constructor descriptor".to_string(),
        ));
    };
    let class = descriptor.class();
    let params = descriptor.params();
    let class_name = class.simple_name();

    let mut method = find_in_superclass_chain(class, name, params).ok_or_else(|| {
        ReflectError::diagnostic(
            FailureKind::MemberNotFound,
            tr(
                keys::METHOD_MISSING,
                &[nice_method_signature(None, name, params).as_str(), class_name],
            ),
        )
    })?;
    method.set_accessible(true);

    let expected_return = descriptor.return_type();
    let signature = || nice_method_signature(expected_return, name, params);
    let mismatch = |key: &str, extra: Option<&str>| {
        let signature = signature();
        let mut args = vec![signature.as_str(), class_name];
        args.extend(extra);
        ReflectError::diagnostic(FailureKind::AccessMismatch, tr(key, &args))
    };

    if let Some(expected) = expected_return {
        if method.return_type()? != *expected {
            return Err(mismatch(keys::METHOD_WRONG_RETURN_TYPE, None));
        }
    }

    match (descriptor.expect_static(), method.is_static()) {
        (Some(false), true) => return Err(mismatch(keys::METHOD_SHOULD_NOT_BE_STATIC, None)),
        (Some(true), false) => return Err(mismatch(keys::METHOD_SHOULD_BE_STATIC, None)),
        _ => {}
    }

    if let Some(access) = descriptor.access() {
        if !access.matches(method.access()) {
            let levels = access_modifiers_to_string(access);
            return Err(mismatch(keys::METHOD_WRONG_ACCESS, Some(levels.as_str())));
        }
    }
    Ok(method)
}

/// Create an instance through `ctor`
///
/// Faults raised by the constructor or the static initializer are returned
/// unchanged as [`ReflectError::Fault`].
pub fn invoke_constructor(ctor: &Constructor, args: &[Value]) -> Result<Value, ReflectError> {
    ctor.new_instance(args).map_err(|e| {
        let (key, subject) = match e {
            InvokeError::Target(fault) => return ReflectError::Fault(fault),
            InvokeError::IllegalAccess(_) => {
                (keys::CTOR_INACCESSIBLE, nice_constructor_signature(ctor))
            }
            InvokeError::IllegalArgument(_) => {
                (keys::CTOR_INCORRECT_PARAMS, nice_constructor_signature(ctor))
            }
            InvokeError::Instantiation(_) => (
                keys::CTOR_ABSTRACT,
                ctor.declaring_class().simple_name().to_string(),
            ),
        };
        ReflectError::diagnostic(FailureKind::InvocationFailure, tr(key, &[subject.as_str()]))
    })
}

/// Call `method` and check its result against `expected`
///
/// With a `void` expectation the method must not return a value. Otherwise
/// the result must be null or an instance of `expected`, primitives
/// compared through their boxed class.
pub fn invoke_method(
    expected: &Type,
    method: &Method,
    receiver: Option<&Value>,
    args: &[Value],
) -> Result<Value, ReflectError> {
    let class_name = method.declaring_class().simple_name();
    let failure = |kind: FailureKind, key: &str| {
        ReflectError::diagnostic(kind, tr(key, &[method_signature(method).as_str(), class_name]))
    };

    let value = method.invoke(receiver, args).map_err(|e| match e {
        InvokeError::Target(fault) => ReflectError::Fault(fault),
        InvokeError::IllegalAccess(_) => {
            failure(FailureKind::InvocationFailure, keys::METHOD_INACCESSIBLE)
        }
        InvokeError::IllegalArgument(_) | InvokeError::Instantiation(_) => {
            failure(FailureKind::InvocationFailure, keys::METHOD_INCORRECT_PARAMS)
        }
    })?;

    if expected.is_void() {
        return if value.is_void() || value.is_null() {
            Ok(Value::Void)
        } else {
            Err(failure(FailureKind::AccessMismatch, keys::METHOD_SHOULD_BE_VOID))
        };
    }
    if value.is_null() || primitive_type_to_object_type(expected).is_instance(&value) {
        Ok(value)
    } else {
        Err(failure(FailureKind::AccessMismatch, keys::METHOD_WRONG_RETURN_TYPE))
    }
}
