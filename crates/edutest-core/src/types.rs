//! Resolved types
//!
//! A [`Type`] is a [`TypeDesc`](edutest_bytecode::TypeDesc) whose class names
//! have been resolved to class objects. Class types compare by identity:
//! two classes with the same name from different loading contexts are
//! different types.

use crate::builtins;
use crate::class::ClassRef;
use crate::value::Value;
use edutest_bytecode::PrimitiveType;
use std::fmt;
use std::sync::Arc;

/// A resolved type
#[derive(Clone)]
pub enum Type {
    /// No value
    Void,
    /// A primitive kind
    Primitive(PrimitiveType),
    /// A class
    Class(ClassRef),
}

impl Type {
    /// Qualified name (`int`, `void`, `lang.String`)
    pub fn name(&self) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Primitive(kind) => kind.name().to_string(),
            Type::Class(class) => class.name().to_string(),
        }
    }

    /// Unqualified name (`int`, `String`)
    pub fn simple_name(&self) -> String {
        match self {
            Type::Class(class) => class.simple_name().to_string(),
            other => other.name(),
        }
    }

    /// Whether this is a primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// The class, for class types
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Type::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Whether `value` can be stored in a slot of this type as is
    ///
    /// `null` is an instance of every class type. Primitive values are
    /// instances of their boxed class and of `lang.Object`.
    pub fn is_instance(&self, value: &Value) -> bool {
        match self {
            Type::Void => value.is_void(),
            Type::Primitive(kind) => value.primitive_kind() == Some(*kind),
            Type::Class(class) => match value {
                Value::Null => true,
                Value::Void => false,
                Value::Object(obj) => obj.class().is_subclass_of(class),
                Value::Str(_) => builtins::string().is_subclass_of(class),
                other => other
                    .primitive_kind()
                    .is_some_and(|kind| builtins::boxed(kind).is_subclass_of(class)),
            },
        }
    }

    /// Convert `value` for a slot of this type, applying primitive widening
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match self {
            Type::Primitive(kind) => widen(value, *kind),
            _ if self.is_instance(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Apply a widening primitive conversion
pub fn widen(value: &Value, to: PrimitiveType) -> Option<Value> {
    use PrimitiveType::*;

    let from = value.primitive_kind()?;
    if from == to {
        return Some(value.clone());
    }
    let allowed = match from {
        Byte => matches!(to, Short | Int | Long | Float | Double),
        Short | Char => matches!(to, Int | Long | Float | Double),
        Int => matches!(to, Long | Float | Double),
        Long => matches!(to, Float | Double),
        Float => to == Double,
        Boolean | Double => false,
    };
    if !allowed {
        return None;
    }
    Some(match to {
        Short => Value::Short(value.as_i64()? as i16),
        Int => Value::Int(value.as_i64()? as i32),
        Long => Value::Long(value.as_i64()?),
        Float => Value::Float(value.as_f64()? as f32),
        Double => Value::Double(value.as_f64()?),
        Boolean | Byte | Char => return None,
    })
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Void, Type::Void) => true,
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Class(a), Type::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Type {}

impl From<PrimitiveType> for Type {
    fn from(kind: PrimitiveType) -> Self {
        Type::Primitive(kind)
    }
}

impl From<ClassRef> for Type {
    fn from(class: ClassRef) -> Self {
        Type::Class(class)
    }
}

impl From<&ClassRef> for Type {
    fn from(class: &ClassRef) -> Self {
        Type::Class(class.clone())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Class(class) => write!(f, "{}#{}", class.name(), class.id().as_u64()),
            other => f.write_str(&other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening() {
        assert_eq!(widen(&Value::Int(3), PrimitiveType::Long), Some(Value::Long(3)));
        assert_eq!(widen(&Value::Char('a'), PrimitiveType::Int), Some(Value::Int(97)));
        assert_eq!(widen(&Value::Byte(2), PrimitiveType::Double), Some(Value::Double(2.0)));
        assert_eq!(widen(&Value::Long(3), PrimitiveType::Int), None);
        assert_eq!(widen(&Value::Int(1), PrimitiveType::Char), None);
        assert_eq!(widen(&Value::Bool(true), PrimitiveType::Int), None);
    }

    #[test]
    fn test_builtin_instances() {
        let object = Type::Class(builtins::object());
        let string = Type::Class(builtins::string());
        let integer = Type::Class(builtins::boxed(PrimitiveType::Int));

        assert!(object.is_instance(&Value::str("x")));
        assert!(object.is_instance(&Value::Int(1)));
        assert!(string.is_instance(&Value::Null));
        assert!(!string.is_instance(&Value::Int(1)));
        assert!(integer.is_instance(&Value::Int(1)));
        assert!(!integer.is_instance(&Value::Long(1)));
        assert!(!object.is_instance(&Value::Void));
    }

    #[test]
    fn test_coerce_primitive_slot() {
        let long = Type::Primitive(PrimitiveType::Long);
        assert_eq!(long.coerce(&Value::Int(7)), Some(Value::Long(7)));
        assert_eq!(long.coerce(&Value::Null), None);
        assert_eq!(Type::Void.coerce(&Value::Void), Some(Value::Void));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Type::Class(builtins::string()).to_string(), "String");
        assert_eq!(Type::Class(builtins::string()).name(), "lang.String");
        assert_eq!(Type::Primitive(PrimitiveType::Int).to_string(), "int");
        assert_eq!(Type::Void.to_string(), "void");
    }
}
