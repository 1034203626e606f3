//! The contract between application types and the runtime.
//!
//! A persistent object hands its properties to the runtime as a [`State`] map and
//! accepts (partial) states back. Most types derive the implementation with
//! `#[derive(PersistentObject)]`; the derive relies on the conversions in this
//! module.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Property name → value map describing an object.
pub type State = HashMap<String, Value>;

/// A type whose instances are stored as rows of a mapped table.
///
/// The type is linked to its definition through [`CLASS`](Self::CLASS), which the
/// session resolves with its [`DefinitionManager`](crate::DefinitionManager).
pub trait PersistentObject: Default {
    /// Class name used to look up the definition.
    const CLASS: &'static str;

    /// Current property values, keyed by property name.
    fn state(&self) -> State;

    /// Assign the properties present in `state`; absent keys are left untouched.
    fn set_state(&mut self, state: &State) -> Result<()>;
}

/// A [`Value`] that does not fit the requested Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueTypeError {
    /// What the target type accepts.
    pub expected: &'static str,
    /// Variant that was found.
    pub found: &'static str,
}

impl ValueTypeError {
    fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: value.type_name(),
        }
    }

    /// Attach the class and property the value was destined for.
    pub fn into_error(self, class: &str, property: &str) -> Error {
        Error::PropertyConversion {
            class: class.to_string(),
            property: property.to_string(),
            expected: self.expected,
            found: self.found,
        }
    }
}

/// Conversion from a [`Value`] back into a Rust type.
pub trait FromValue: Sized {
    /// Convert, failing when the variant does not fit.
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError>;
}

/// Convert the value of `class.property`, used by generated `set_state` bodies.
pub fn property_from_value<T: FromValue>(class: &str, property: &str, value: &Value) -> Result<T> {
    T::from_value(value).map_err(|e| e.into_error(class, property))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        match value {
            Value::Double(d) if d.fract() == 0.0 => Ok(*d as i64),
            other => other
                .as_i64()
                .ok_or_else(|| ValueTypeError::new("an integer", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        i64::from_value(value).and_then(|i| {
            i32::try_from(i).map_err(|_| ValueTypeError::new("a 32-bit integer", value))
        })
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        i64::from_value(value).and_then(|i| {
            u32::try_from(i).map_err(|_| ValueTypeError::new("an unsigned 32-bit integer", value))
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        value
            .as_f64()
            .ok_or_else(|| ValueTypeError::new("a float", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        value
            .as_bool()
            .ok_or_else(|| ValueTypeError::new("a boolean", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(ValueTypeError::new("a string", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ValueTypeError::new("binary data", value))
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => {
                serde_json::from_str(s).map_err(|_| ValueTypeError::new("a JSON document", value))
            }
            other => Err(ValueTypeError::new("a JSON document", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> std::result::Result<Self, ValueTypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Note {
        id: Option<i64>,
        body: String,
    }

    impl PersistentObject for Note {
        const CLASS: &'static str = "Note";

        fn state(&self) -> State {
            State::from([
                ("id".to_string(), Value::from(self.id)),
                ("body".to_string(), Value::from(self.body.clone())),
            ])
        }

        fn set_state(&mut self, state: &State) -> Result<()> {
            if let Some(v) = state.get("id") {
                self.id = property_from_value(Self::CLASS, "id", v)?;
            }
            if let Some(v) = state.get("body") {
                self.body = property_from_value(Self::CLASS, "body", v)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_partial_set_state_keeps_other_fields() {
        let mut note = Note {
            id: Some(3),
            body: "draft".to_string(),
        };
        note.set_state(&State::from([("body".to_string(), Value::from("final"))]))
            .unwrap();
        assert_eq!(note.id, Some(3));
        assert_eq!(note.body, "final");
    }

    #[test]
    fn test_conversion_error_names_property() {
        let mut note = Note::default();
        let err = note
            .set_state(&State::from([("body".to_string(), Value::BigInt(1))]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "property 'Note.body' expects a string, found BIGINT"
        );
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(i32::from_value(&Value::BigInt(7)), Ok(7));
        assert!(i32::from_value(&Value::BigInt(i64::MAX)).is_err());
        assert_eq!(i64::from_value(&Value::Double(4.0)), Ok(4));
        assert_eq!(bool::from_value(&Value::BigInt(0)), Ok(false));
        assert_eq!(Option::<i64>::from_value(&Value::Null), Ok(None));
    }

    #[test]
    fn test_json_from_text() {
        let json = serde_json::Value::from_value(&Value::Text("[1,2]".into())).unwrap();
        assert_eq!(json, serde_json::json!([1, 2]));
    }
}
