//! Type tokens and value conversions
//!
//! A [`TypeToken<T>`] pairs a runtime [`Type`] with the Rust type `T` its
//! values convert to and from.

use edutest_bytecode::PrimitiveType;
use edutest_core::{builtins, ClassRef, Type, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A runtime type together with its Rust counterpart
pub struct TypeToken<T> {
    ty: Type,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeToken<T> {
    fn new(ty: Type) -> Self {
        Self {
            ty,
            _marker: PhantomData,
        }
    }

    /// The runtime type
    pub fn runtime_type(&self) -> &Type {
        &self.ty
    }
}

impl<T> Clone for TypeToken<T> {
    fn clone(&self) -> Self {
        Self::new(self.ty.clone())
    }
}

impl<T> fmt::Debug for TypeToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken({:?})", self.ty)
    }
}

/// `void`
pub fn void() -> TypeToken<()> {
    TypeToken::new(Type::Void)
}

/// `boolean`
pub fn boolean() -> TypeToken<bool> {
    TypeToken::new(Type::Primitive(PrimitiveType::Boolean))
}

/// `byte`
pub fn byte() -> TypeToken<i8> {
    TypeToken::new(Type::Primitive(PrimitiveType::Byte))
}

/// `char`
pub fn char() -> TypeToken<char> {
    TypeToken::new(Type::Primitive(PrimitiveType::Char))
}

/// `short`
pub fn short() -> TypeToken<i16> {
    TypeToken::new(Type::Primitive(PrimitiveType::Short))
}

/// `int`
pub fn int() -> TypeToken<i32> {
    TypeToken::new(Type::Primitive(PrimitiveType::Int))
}

/// `long`
pub fn long() -> TypeToken<i64> {
    TypeToken::new(Type::Primitive(PrimitiveType::Long))
}

/// `float`
pub fn float() -> TypeToken<f32> {
    TypeToken::new(Type::Primitive(PrimitiveType::Float))
}

/// `double`
pub fn double() -> TypeToken<f64> {
    TypeToken::new(Type::Primitive(PrimitiveType::Double))
}

/// `lang.String`; a null result converts only into `Option<String>`
pub fn string() -> TypeToken<String> {
    TypeToken::new(Type::Class(builtins::string()))
}

/// `lang.String`, nullable
pub fn nullable_string() -> TypeToken<Option<String>> {
    TypeToken::new(Type::Class(builtins::string()))
}

/// `lang.Object`
pub fn object() -> TypeToken<Value> {
    TypeToken::new(Type::Class(builtins::object()))
}

/// Boxed class of a primitive kind, e.g. `lang.Integer`
pub fn boxed(kind: PrimitiveType) -> TypeToken<Value> {
    TypeToken::new(Type::Class(builtins::boxed(kind)))
}

/// A loaded class; values stay runtime values
pub fn class(class: &ClassRef) -> TypeToken<Value> {
    TypeToken::new(Type::Class(class.clone()))
}

/// Conversion out of a runtime value
pub trait FromValue: Sized {
    /// `None` if the value has a different type
    fn from_value(value: Value) -> Option<Self>;
}

/// Conversion into a runtime value
pub trait IntoValue {
    /// Convert
    fn into_value(self) -> Value;
}

macro_rules! primitive_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

primitive_conversions! {
    bool => Bool,
    i8 => Byte,
    char => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
}

impl FromValue for () {
    fn from_value(value: Value) -> Option<Self> {
        (value.is_void() || value.is_null()).then_some(())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Value {
        self.clone()
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(Arc::from(self))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::str(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map(IntoValue::into_value).unwrap_or(Value::Null)
    }
}

/// A tuple of type tokens describing a parameter list
pub trait ParamTokens {
    /// Tuple of Rust argument types
    type Args: ParamList;

    /// Runtime parameter types, in order
    fn types(&self) -> Vec<Type>;
}

/// A tuple of arguments
pub trait ParamList {
    /// Runtime values, in order
    fn into_values(self) -> Vec<Value>;
}

impl ParamTokens for () {
    type Args = ();

    fn types(&self) -> Vec<Type> {
        Vec::new()
    }
}

impl ParamList for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! tuple_params {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name),+> ParamTokens for ($(TypeToken<$name>,)+)
        where
            $($name: IntoValue,)+
        {
            type Args = ($($name,)+);

            fn types(&self) -> Vec<Type> {
                vec![$(self.$idx.ty.clone()),+]
            }
        }

        impl<$($name: IntoValue),+> ParamList for ($($name,)+) {
            fn into_values(self) -> Vec<Value> {
                vec![$(self.$idx.into_value()),+]
            }
        }
    };
}

tuple_params!(A: 0);
tuple_params!(A: 0, B: 1);
tuple_params!(A: 0, B: 1, C: 2);
tuple_params!(A: 0, B: 1, C: 2, D: 3);
