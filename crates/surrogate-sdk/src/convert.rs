//! Boxing and unboxing between `Value` and Rust types.
//!
//! `IntoValue` boxes a Rust value for the argument envelope, `FromValue`
//! unboxes a result (or an argument inside a method body). Unboxing never
//! coerces between numeric widths: an `i32` slot holding `I64` is a mismatch.

use crate::error::{ProxyError, ProxyResult};
use crate::value::Value;

/// Convert from a boxed `Value` to a Rust type.
pub trait FromValue: Sized {
    /// Unbox, returning `TypeMismatch` if the value has the wrong shape.
    fn from_value(value: Value) -> ProxyResult<Self>;
}

/// Convert from a Rust type to a boxed `Value`.
pub trait IntoValue {
    /// Box the value.
    fn into_value(self) -> Value;
}

macro_rules! primitive_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> ProxyResult<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        Value::Ref(slot) => <$ty>::from_value(slot.get()),
                        other => Err(ProxyError::mismatch($name, other.type_name())),
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
    bool => Bool, "bool";
    i32 => I32, "i32";
    i64 => I64, "i64";
    f64 => F64, "f64";
}

impl FromValue for String {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            Value::Ref(slot) => String::from_value(slot.get()),
            other => Err(ProxyError::mismatch("string", other.type_name())),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ProxyResult<Self> {
        Ok(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

// Members that return no value
impl FromValue for () {
    fn from_value(_value: Value) -> ProxyResult<Self> {
        Ok(())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

// Nullable
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}
