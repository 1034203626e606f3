//! Conversions between [`Value`] and SQLite storage classes.

use persistent_core::Value;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

/// A bound parameter.
///
/// Booleans are stored as integers and JSON documents as text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SqlParam<'a>(pub(crate) &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::BigInt(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Double(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Json(json) => ToSqlOutput::Owned(SqlValue::Text(json.to_string())),
        })
    }
}

/// Read a column value. Integers come back as `BigInt`; the session coerces
/// them to the declared property type.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::BigInt(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
