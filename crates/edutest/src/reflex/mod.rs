//! Typed reflective invocation
//!
//! A fluent chain declares the expected signature before anything is looked
//! up:
//!
//! ```ignore
//! let add = ReflexClass::new(calc)
//!     .static_method("add")
//!     .returning(types::int())
//!     .taking((types::int(), types::int()));
//! assert!(add.exists());
//! let sum: i32 = add.invoke((1, 2))?;
//! ```
//!
//! Every intermediate step is a plain value; lookups happen only in the
//! terminal operations of [`MethodRef`].

pub mod types;

use crate::reflect::{
    self, get_nice_exception, AccessSet, FailureKind, MemberDescriptor, ReflectError, Reflector,
};
use edutest_core::{ClassRef, Constructor, Method, Type, Value};
use std::fmt;
use std::marker::PhantomData;
use types::{FromValue, ParamList, ParamTokens, TypeToken};

/// A class to call into
#[derive(Debug, Clone)]
pub struct ReflexClass {
    class: ClassRef,
}

impl ReflexClass {
    /// Wrap a loaded class
    pub fn new(class: ClassRef) -> Self {
        Self { class }
    }

    /// Find `name` through `reflector`
    pub fn load(reflector: &Reflector, name: &str) -> Result<Self, ReflectError> {
        reflector.find_class(name).map(Self::new)
    }

    /// The wrapped class
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Select a constructor
    pub fn constructor(&self) -> ConstructorSelector {
        ConstructorSelector {
            class: self.class.clone(),
        }
    }

    /// Select an instance method; the receiver is given at invocation
    pub fn method(&self, name: impl Into<String>) -> MethodSelector {
        self.selector(name.into(), false, None)
    }

    /// Select an instance method bound to `receiver`
    pub fn method_on(&self, receiver: Value, name: impl Into<String>) -> MethodSelector {
        self.selector(name.into(), false, Some(receiver))
    }

    /// Select a static method
    pub fn static_method(&self, name: impl Into<String>) -> MethodSelector {
        self.selector(name.into(), true, None)
    }

    fn selector(&self, name: String, is_static: bool, receiver: Option<Value>) -> MethodSelector {
        MethodSelector {
            class: self.class.clone(),
            name,
            is_static,
            receiver,
        }
    }

    /// Whether this class is `other` or a subclass of it
    pub fn inherits(&self, other: &ReflexClass) -> bool {
        self.class.is_subclass_of(&other.class)
    }
}

/// Constructor selection, waiting for the parameter list
#[derive(Debug, Clone)]
pub struct ConstructorSelector {
    class: ClassRef,
}

impl ConstructorSelector {
    /// Declare the parameter types
    pub fn taking<P: ParamTokens>(self, params: P) -> MethodRef<Value, P::Args> {
        MethodRef::new(self.class, Target::Constructor, params.types(), None)
    }

    /// A constructor without parameters
    pub fn taking_no_params(self) -> MethodRef<Value, ()> {
        self.taking(())
    }
}

/// Method selection, waiting for the return type
#[derive(Debug, Clone)]
pub struct MethodSelector {
    class: ClassRef,
    name: String,
    is_static: bool,
    receiver: Option<Value>,
}

impl MethodSelector {
    /// Declare the return type
    pub fn returning<R>(self, token: TypeToken<R>) -> ReturningSelector<R> {
        ReturningSelector {
            selector: self,
            return_type: token.runtime_type().clone(),
            _marker: PhantomData,
        }
    }

    /// The method returns nothing
    pub fn returning_void(self) -> ReturningSelector<()> {
        self.returning(types::void())
    }
}

/// Method selection with a return type, waiting for the parameter list
pub struct ReturningSelector<R> {
    selector: MethodSelector,
    return_type: Type,
    _marker: PhantomData<fn() -> R>,
}

impl<R> ReturningSelector<R> {
    /// Declare the parameter types
    pub fn taking<P: ParamTokens>(self, params: P) -> MethodRef<R, P::Args> {
        let MethodSelector {
            class,
            name,
            is_static,
            receiver,
        } = self.selector;
        MethodRef::new(
            class,
            Target::Method {
                name,
                is_static,
                return_type: self.return_type,
            },
            params.types(),
            receiver,
        )
    }

    /// A method without parameters
    pub fn taking_no_params(self) -> MethodRef<R, ()> {
        self.taking(())
    }
}

#[derive(Debug, Clone)]
enum Target {
    Constructor,
    Method {
        name: String,
        is_static: bool,
        return_type: Type,
    },
}

enum Member {
    Constructor(Constructor),
    Method(Method),
}

impl Member {
    fn access(&self) -> u16 {
        match self {
            Member::Constructor(ctor) => ctor.access(),
            Member::Method(method) => method.access(),
        }
    }
}

/// A fully declared constructor or method
///
/// `R` is the Rust return type and `A` the tuple of Rust argument types.
pub struct MethodRef<R, A> {
    class: ClassRef,
    target: Target,
    params: Vec<Type>,
    receiver: Option<Value>,
    nice_error: Option<String>,
    _marker: PhantomData<fn(A) -> R>,
}

impl<R, A> Clone for MethodRef<R, A> {
    fn clone(&self) -> Self {
        Self {
            class: self.class.clone(),
            target: self.target.clone(),
            params: self.params.clone(),
            receiver: self.receiver.clone(),
            nice_error: self.nice_error.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R, A> fmt::Debug for MethodRef<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({}: {})", self.class.name(), self.signature())
    }
}

impl<R, A> MethodRef<R, A> {
    fn new(class: ClassRef, target: Target, params: Vec<Type>, receiver: Option<Value>) -> Self {
        Self {
            class,
            target,
            params,
            receiver,
            nice_error: None,
            _marker: PhantomData,
        }
    }

    /// Declaring class where the lookup starts
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Name used in diagnostics: the method name or the class's simple name
    fn display_name(&self) -> &str {
        match &self.target {
            Target::Constructor => self.class.simple_name(),
            Target::Method { name, .. } => name,
        }
    }

    fn descriptor(&self, access: Option<AccessSet>) -> MemberDescriptor {
        let descriptor = match &self.target {
            Target::Constructor => MemberDescriptor::constructor(&self.class, self.params.clone()),
            Target::Method {
                name,
                is_static,
                return_type,
            } => MemberDescriptor::method(&self.class, name.clone(), self.params.clone())
                .with_static(*is_static)
                .with_return_type(return_type.clone()),
        };
        match access {
            Some(access) => descriptor.with_access(access),
            None => descriptor,
        }
    }

    fn lookup(&self, access: Option<AccessSet>) -> Result<Member, ReflectError> {
        let descriptor = self.descriptor(access);
        Ok(match self.target {
            Target::Constructor => Member::Constructor(reflect::require_constructor(&descriptor)?),
            Target::Method { .. } => Member::Method(reflect::require_method(&descriptor)?),
        })
    }

    /// Whether a member with this signature exists
    ///
    /// Staticness and return type are checked; access is not.
    pub fn exists(&self) -> bool {
        match self.lookup(None) {
            Ok(_) => true,
            Err(e) => {
                if !matches!(e.kind(), FailureKind::MemberNotFound | FailureKind::AccessMismatch) {
                    log::warn!("lookup of {} failed: {}", self.signature(), e);
                }
                false
            }
        }
    }

    /// Fail unless the member exists
    pub fn require_exists(&self) -> Result<(), ReflectError> {
        self.lookup(None).map(|_| ())
    }

    /// Fail unless the member exists and is public
    pub fn require_public(&self) -> Result<(), ReflectError> {
        self.lookup(Some(AccessSet::PUBLIC)).map(|_| ())
    }

    /// Fail unless the member exists and is protected
    pub fn require_protected(&self) -> Result<(), ReflectError> {
        self.lookup(Some(AccessSet::PROTECTED)).map(|_| ())
    }

    /// Fail unless the member exists and is private
    pub fn require_private(&self) -> Result<(), ReflectError> {
        self.lookup(Some(AccessSet::PRIVATE)).map(|_| ())
    }

    /// Fail unless the member exists and has no visibility modifier
    pub fn require_package_private(&self) -> Result<(), ReflectError> {
        self.lookup(Some(AccessSet::PACKAGE_PRIVATE)).map(|_| ())
    }

    fn has_access(&self, level: AccessSet) -> Result<bool, ReflectError> {
        Ok(AccessSet::of_flags(self.lookup(None)?.access()) == level)
    }

    /// Whether the member is public
    pub fn is_public(&self) -> Result<bool, ReflectError> {
        self.has_access(AccessSet::PUBLIC)
    }

    /// Whether the member is protected
    pub fn is_protected(&self) -> Result<bool, ReflectError> {
        self.has_access(AccessSet::PROTECTED)
    }

    /// Whether the member is private
    pub fn is_private(&self) -> Result<bool, ReflectError> {
        self.has_access(AccessSet::PRIVATE)
    }

    /// Whether the member has no visibility modifier
    pub fn is_package_private(&self) -> Result<bool, ReflectError> {
        self.has_access(AccessSet::PACKAGE_PRIVATE)
    }

    /// `"[static ]ret name(params)"`, or `"Name(params)"` for constructors
    pub fn signature(&self) -> String {
        match &self.target {
            Target::Constructor => {
                reflect::nice_method_signature(None, self.class.simple_name(), &self.params)
            }
            Target::Method {
                name,
                is_static,
                return_type,
            } => {
                let signature = reflect::nice_method_signature(Some(return_type), name, &self.params);
                if *is_static {
                    format!("static {}", signature)
                } else {
                    signature
                }
            }
        }
    }

    /// A copy that reports faults from the invoked code as diagnostics
    /// ending in `custom`
    pub fn with_nice_error(&self, custom: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.nice_error = Some(custom.into());
        copy
    }
}

impl<R: FromValue, A: ParamList> MethodRef<R, A> {
    /// Invoke with the receiver bound by `method_on`, if any
    pub fn invoke(&self, args: A) -> Result<R, ReflectError> {
        self.call(self.receiver.as_ref(), args)
    }

    /// Invoke on `receiver`
    pub fn invoke_on(&self, receiver: &Value, args: A) -> Result<R, ReflectError> {
        self.call(Some(receiver), args)
    }

    fn call(&self, receiver: Option<&Value>, args: A) -> Result<R, ReflectError> {
        let args = args.into_values();
        let result = match (&self.target, self.lookup(None)?) {
            (Target::Method { return_type, .. }, Member::Method(method)) => {
                reflect::invoke_method(return_type, &method, receiver, &args)
            }
            (_, Member::Constructor(ctor)) => reflect::invoke_constructor(&ctor, &args),
            (Target::Constructor, Member::Method(_)) => {
                return Err(ReflectError::Misuse("constructor lookup returned a method".into()))
            }
        };
        let value = match (result, &self.nice_error) {
            (Err(ReflectError::Fault(fault)), Some(custom)) => {
                return Err(get_nice_exception(&fault, self.display_name(), &args, Some(custom)))
            }
            (result, _) => result?,
        };
        let label = value.type_label();
        R::from_value(value).ok_or_else(|| {
            ReflectError::Misuse(format!(
                "{} returned {}, which does not convert to the declared Rust type",
                self.signature(),
                label
            ))
        })
    }
}
