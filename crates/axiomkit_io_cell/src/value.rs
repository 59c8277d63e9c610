//! Dynamic cell value model and bridges to Rust field types.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::codec::SpecSequenceCodec;
use crate::spec::TypeKey;

/// Variables visible to an expression, keyed by attribute name.
pub type Scope = BTreeMap<String, Value>;

/// Decoded attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Single character.
    Char(char),
    /// Text.
    Str(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Wall-clock time.
    Time(NaiveTime),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// UUID.
    Uuid(Uuid),
    /// Enum constant name.
    Enum(String),
    /// Ordered elements of an array or iterable.
    Seq(Vec<Value>),
}

impl Value {
    /// Whether the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow text of `Str`/`Enum` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(val) | Self::Enum(val) => Some(val),
            _ => None,
        }
    }

    /// Short variant label used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Char(_) => "char",
            Self::Str(_) => "string",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::Uuid(_) => "uuid",
            Self::Enum(_) => "enum",
            Self::Seq(_) => "sequence",
        }
    }

    /// Neutral value for a blank cell of scalar type `key`.
    ///
    /// Numbers decode to zero, `bool` to `false`, `char` to NUL; every other
    /// type is absent.
    pub fn zero_of(key: &TypeKey) -> Value {
        match key {
            TypeKey::Bool => Self::Bool(false),
            TypeKey::I8 | TypeKey::I16 | TypeKey::I32 | TypeKey::I64 => Self::Int(0),
            TypeKey::U8 | TypeKey::U16 | TypeKey::U32 | TypeKey::U64 => Self::UInt(0),
            TypeKey::F32 | TypeKey::F64 => Self::Float(0.0),
            TypeKey::Char => Self::Char('\0'),
            _ => Self::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(val) => write!(f, "{val}"),
            Self::Int(val) => write!(f, "{val}"),
            Self::UInt(val) => write!(f, "{val}"),
            Self::Float(val) => write!(f, "{val}"),
            Self::Char(val) => write!(f, "{val}"),
            Self::Str(val) | Self::Enum(val) => f.write_str(val),
            Self::Date(val) => write!(f, "{val}"),
            Self::Time(val) => write!(f, "{val}"),
            Self::DateTime(val) => write!(f, "{val}"),
            Self::Uuid(val) => write!(f, "{val}"),
            Self::Seq(items) => {
                let l_tokens: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&SpecSequenceCodec::default().serialize(&l_tokens))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region IntoValue

/// Conversion of a Rust field value into a [`Value`].
pub trait IntoValue {
    /// Convert into a dynamic value.
    fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust field value.
pub trait FromValue: Sized {
    /// Convert from a dynamic value; the error text names the mismatch.
    fn from_value(value: Value) -> Result<Self, String>;
}

fn derive_mismatch_text(expected: &str, value: &Value) -> String {
    format!("expected {expected}, got {}", value.kind_name())
}

macro_rules! impl_value_signed {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::Null => Ok(0),
                        Value::Int(n) => <$ty>::try_from(n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        Value::UInt(n) => <$ty>::try_from(n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        other => Err(derive_mismatch_text(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_value_unsigned {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::UInt(u64::from(self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::Null => Ok(0),
                        Value::UInt(n) => <$ty>::try_from(n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        Value::Int(n) => <$ty>::try_from(n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        other => Err(derive_mismatch_text(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

impl_value_signed!(i8, i16, i32, i64);
impl_value_unsigned!(u8, u16, u32, u64);

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            Value::UInt(n) => Ok(n as f64),
            other => Err(derive_mismatch_text("f64", &other)),
        }
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, String> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(val) => Ok(val),
            other => Err(derive_mismatch_text("bool", &other)),
        }
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Char(self)
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok('\0'),
            Value::Char(val) => Ok(val),
            other => Err(derive_mismatch_text("char", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Str(val) | Value::Enum(val) => Ok(val),
            other => Err(derive_mismatch_text("string", &other)),
        }
    }
}

macro_rules! impl_value_required {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::$variant(val) => Ok(val),
                        other => Err(derive_mismatch_text(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

impl_value_required!(
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    Uuid => Uuid
);

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(val) => val.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn derive_items(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Null => Ok(vec![]),
        Value::Seq(items) => Ok(items),
        other => Err(derive_mismatch_text("sequence", &other)),
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        derive_items(value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        derive_items(value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: IntoValue> IntoValue for HashSet<T> {
    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        derive_items(value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_vectors_convert_both_ways() {
        let value = vec![vec![1i32, 2], vec![3]].into_value();
        assert_eq!(
            value,
            Value::Seq(vec![
                Value::Seq(vec![Value::Int(1), Value::Int(2)]),
                Value::Seq(vec![Value::Int(3)]),
            ])
        );
        let back = Vec::<Vec<i32>>::from_value(value).unwrap();
        assert_eq!(back, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn narrow_integers_reject_out_of_range_values() {
        assert_eq!(i8::from_value(Value::Int(127)), Ok(127));
        assert!(i8::from_value(Value::Int(128)).is_err());
        assert!(u8::from_value(Value::Int(-1)).is_err());
    }

    #[test]
    fn null_maps_to_none_and_empty_collections() {
        assert_eq!(Option::<Uuid>::from_value(Value::Null), Ok(None));
        assert_eq!(Vec::<i64>::from_value(Value::Null), Ok(vec![]));
        assert!(NaiveDate::from_value(Value::Null).is_err());
    }

    #[test]
    fn zero_values_follow_primitive_types() {
        assert_eq!(Value::zero_of(&TypeKey::I32), Value::Int(0));
        assert_eq!(Value::zero_of(&TypeKey::F64), Value::Float(0.0));
        assert_eq!(Value::zero_of(&TypeKey::Bool), Value::Bool(false));
        assert_eq!(Value::zero_of(&TypeKey::String), Value::Null);
    }

    #[test]
    fn display_of_sequences_uses_bracketed_form() {
        let value = Value::Seq(vec![Value::Int(1), Value::Seq(vec![Value::Int(2)])]);
        assert_eq!(value.to_string(), "[1, [2]]");
    }
}
