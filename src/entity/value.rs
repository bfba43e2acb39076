use std::fmt::Display;

use thiserror::Error;

/// The kind of a non-null [`Value`]. A null carries the kind of the field it was read
/// from, and is bound as a parameter of that type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    #[default]
    Integer,
    Real,
    Text,
    Blob,
}

/// A single column value as exchanged with the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(ValueKind),
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Default for Value {
    fn default() -> Self {
        Self::Null(ValueKind::default())
    }
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        if let Self::Integer(e) = self {
            Some(*e)
        } else {
            None
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null(_) => write!(f, "NULL"),
            Self::Bool(e) => write!(f, "{e}"),
            Self::Integer(e) => write!(f, "{e}"),
            Self::Real(e) => write!(f, "{e}"),
            Self::Text(e) => write!(f, "'{e}'"),
            Self::Blob(e) => write!(f, "<{} bytes>", e.len()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: String,
}

impl ValueError {
    fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.to_string(),
        }
    }
}

/// Conversion between a field's rust type and a [`Value`].
pub trait FieldValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// # Errors
    ///
    /// If the value's kind cannot represent `Self`.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FieldValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(e) => Ok(e),
            Value::Bool(e) => Ok(Self::from(e)),
            other => Err(ValueError::new("integer", &other)),
        }
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let wide = i64::from_value(value)?;

                    <$ty>::try_from(wide).map_err(|_| ValueError {
                        expected: stringify!($ty),
                        found: wide.to_string(),
                    })
                }
            }
        )*
    };
}

narrow_integer!(i32, i16);

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    // Integer columns holding whole amounts are accepted as floats.
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Real(e) => Ok(e),
            Value::Integer(e) => Ok(e as Self),
            other => Err(ValueError::new("real", &other)),
        }
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|e| e as Self)
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(e) => Ok(e),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(ValueError::new("bool", &other)),
        }
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(e) => Ok(e),
            other => Err(ValueError::new("text", &other)),
        }
    }
}

impl FieldValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Blob(e) => Ok(e),
            other => Err(ValueError::new("blob", &other)),
        }
    }
}

impl<T> FieldValue for Option<T>
where
    T: FieldValue,
{
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null(T::KIND), FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T> From<T> for Value
where
    T: FieldValue,
{
    fn from(value: T) -> Self {
        value.to_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Value, ValueKind};

    #[test]
    fn test_integer_widening_and_narrowing() {
        assert_eq!(i32::from_value(Value::Integer(42)), Ok(42));
        assert!(i16::from_value(Value::Integer(i64::from(i16::MAX) + 1)).is_err());
        assert_eq!(f64::from_value(Value::Integer(43)), Ok(43.0));
    }

    #[test]
    fn test_sqlite_booleans() {
        assert_eq!(bool::from_value(Value::Integer(1)), Ok(true));
        assert_eq!(bool::from_value(Value::Integer(0)), Ok(false));
        assert!(bool::from_value(Value::Integer(2)).is_err());
    }

    #[test]
    fn test_optional_values() {
        assert_eq!(
            Option::<String>::from_value(Value::Null(ValueKind::Integer)),
            Ok(None)
        );
        assert_eq!(
            Option::<String>::from_value(Value::Text("bread".into())),
            Ok(Some("bread".to_string()))
        );
        assert_eq!(Some(5_i64).to_value(), Value::Integer(5));
        assert_eq!(None::<i64>.to_value(), Value::Null(ValueKind::Integer));
    }

    #[test]
    fn test_nulls_keep_field_kind() {
        assert_eq!(None::<String>.to_value(), Value::Null(ValueKind::Text));
        assert_eq!(None::<f32>.to_value(), Value::Null(ValueKind::Real));
        assert_eq!(None::<bool>.to_value(), Value::Null(ValueKind::Bool));
        assert_eq!(None::<Vec<u8>>.to_value(), Value::Null(ValueKind::Blob));
        assert_eq!(None::<i16>.to_value(), Value::Null(ValueKind::Integer));
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_mismatch_reports_kinds() {
        let err = String::from_value(Value::Integer(7)).expect_err("Conversion should fail");

        assert_eq!(err.expected, "text");
        assert_eq!(err.found, "7");
        assert_eq!(Value::from("food"), Value::Text("food".to_string()));
    }
}
