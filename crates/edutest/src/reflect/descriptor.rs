//! Member lookup descriptors

use super::AccessSet;
use edutest_core::{ClassRef, Type};

/// What to look up and what to expect of it
///
/// `None` constraints are not checked.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    class: ClassRef,
    name: Option<String>,
    params: Vec<Type>,
    access: Option<AccessSet>,
    is_static: Option<bool>,
    return_type: Option<Type>,
}

impl MemberDescriptor {
    /// A method `name(params)` declared in `class` or a superclass
    pub fn method(class: &ClassRef, name: impl Into<String>, params: Vec<Type>) -> Self {
        Self {
            class: class.clone(),
            name: Some(name.into()),
            params,
            access: None,
            is_static: None,
            return_type: None,
        }
    }

    /// A constructor of `class`
    pub fn constructor(class: &ClassRef, params: Vec<Type>) -> Self {
        Self {
            class: class.clone(),
            name: None,
            params,
            access: None,
            is_static: None,
            return_type: None,
        }
    }

    /// Require one of these access levels
    pub fn with_access(mut self, access: AccessSet) -> Self {
        self.access = Some(access);
        self
    }

    /// Require the method to be static or not
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = Some(is_static);
        self
    }

    /// Require this exact return type
    pub fn with_return_type(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Declaring class where the search starts
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Method name; `None` for constructors
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this describes a constructor
    pub fn is_constructor(&self) -> bool {
        self.name.is_none()
    }

    /// Parameter types
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// Expected access
    pub fn access(&self) -> Option<AccessSet> {
        self.access
    }

    /// Expected staticness
    pub fn expect_static(&self) -> Option<bool> {
        self.is_static
    }

    /// Expected return type
    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.as_ref()
    }
}
