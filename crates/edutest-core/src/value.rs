//! Runtime values

use crate::class::ClassRef;
use crate::object::ObjectRef;
use edutest_bytecode::PrimitiveType;
use std::sync::Arc;

/// A value held in a local, a field or on the operand stack
///
/// Primitive variants double as their boxed counterparts: a `Value::Int`
/// stored into a `lang.Object` slot stays a `Value::Int`.
#[derive(Debug, Clone)]
pub enum Value {
    /// Result of a `void` method
    Void,
    /// The null reference
    Null,
    /// `boolean`
    Bool(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(char),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `lang.String`
    Str(Arc<str>),
    /// Instance of a loaded class
    Object(ObjectRef),
}

impl Value {
    /// A string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Whether this is `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is the void sentinel
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Primitive kind of this value, if it is one
    pub fn primitive_kind(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Bool(_) => PrimitiveType::Boolean,
            Value::Byte(_) => PrimitiveType::Byte,
            Value::Char(_) => PrimitiveType::Char,
            Value::Short(_) => PrimitiveType::Short,
            Value::Int(_) => PrimitiveType::Int,
            Value::Long(_) => PrimitiveType::Long,
            Value::Float(_) => PrimitiveType::Float,
            Value::Double(_) => PrimitiveType::Double,
            _ => return None,
        })
    }

    /// Runtime class of a reference value (`None` for null, void and primitives)
    pub fn class(&self) -> Option<ClassRef> {
        match self {
            Value::Str(_) => Some(crate::builtins::string()),
            Value::Object(obj) => Some(obj.class().clone()),
            _ => None,
        }
    }

    /// Short description of the value's runtime type, for error messages
    pub fn type_label(&self) -> String {
        match self {
            Value::Void => "void".to_string(),
            Value::Null => "null".to_string(),
            Value::Str(_) => "lang.String".to_string(),
            Value::Object(obj) => obj.class().name().to_string(),
            other => other
                .primitive_kind()
                .map(|k| k.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object reference, if this is an object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Widen an integral value to `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::Char(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Widen a numeric value to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Default value of a field of the given type
    pub fn default_for(kind: Option<PrimitiveType>) -> Self {
        match kind {
            None => Value::Null,
            Some(PrimitiveType::Boolean) => Value::Bool(false),
            Some(PrimitiveType::Byte) => Value::Byte(0),
            Some(PrimitiveType::Char) => Value::Char('\0'),
            Some(PrimitiveType::Short) => Value::Short(0),
            Some(PrimitiveType::Int) => Value::Int(0),
            Some(PrimitiveType::Long) => Value::Long(0),
            Some(PrimitiveType::Float) => Value::Float(0.0),
            Some(PrimitiveType::Double) => Value::Double(0.0),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

/// Format a floating point number the way class code prints it (`1.0`, `NaN`, `Infinity`)
pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Single precision counterpart of [`format_float`]
pub(crate) fn format_float32(v: f32) -> String {
    if v.is_nan() || v.is_infinite() {
        format_float(v as f64)
    } else if v.fract() == 0.0 && v.abs() < 1e7 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_kinds() {
        assert_eq!(Value::Int(1).primitive_kind(), Some(PrimitiveType::Int));
        assert_eq!(Value::Char('a').primitive_kind(), Some(PrimitiveType::Char));
        assert_eq!(Value::str("x").primitive_kind(), None);
        assert_eq!(Value::Null.primitive_kind(), None);
    }

    #[test]
    fn test_widening_accessors() {
        assert_eq!(Value::Byte(-3).as_i64(), Some(-3));
        assert_eq!(Value::Char('A').as_i64(), Some(65));
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::str("a"), Value::from("a"));
        assert_ne!(Value::Int(1), Value::Long(1));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Void);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_float32(0.1), "0.1");
        assert_eq!(format_float32(3.0), "3.0");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Value::default_for(None), Value::Null);
        assert_eq!(Value::default_for(Some(PrimitiveType::Long)), Value::Long(0));
    }
}
