//! Public field values.
//!
//! The server speaks JSON and uses `false` for "no value" in every field type.
//! [`FieldValue`] is what callers read from and assign to record fields; each
//! field descriptor converts between it and the wire shape.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::command::Command;
use crate::recordset::Recordset;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value (the server's `false`).
    #[default]
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Char, text, html, binary (base64) and selection keys.
    Text(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    /// Raw target ids, accepted when assigning relational fields.
    Ids(Vec<i64>),
    /// Target records of a relational field.
    Records(Recordset),
    /// Explicit relationship mutations for x2many fields.
    Commands(Vec<Command>),
    /// A value the client does not interpret (unknown field types).
    Raw(Value),
}

impl FieldValue {
    /// `true` for values a required field rejects.
    ///
    /// `false` and `0` are values, not blanks.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Ids(ids) => ids.is_empty(),
            FieldValue::Records(records) => records.is_empty(),
            FieldValue::Raw(value) => value.is_null() || value == &Value::Bool(false),
            _ => false,
        }
    }

    pub fn is_empty_value(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&Recordset> {
        match self {
            FieldValue::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn into_records(self) -> Option<Recordset> {
        match self {
            FieldValue::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Short name of the variant, used in validation messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Empty => "empty",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "string",
            FieldValue::Date(_) => "date",
            FieldValue::Datetime(_) => "datetime",
            FieldValue::Ids(_) => "id list",
            FieldValue::Records(_) => "recordset",
            FieldValue::Commands(_) => "command list",
            FieldValue::Raw(_) => "raw value",
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Datetime(value)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(value: Vec<i64>) -> Self {
        FieldValue::Ids(value)
    }
}

impl From<&[i64]> for FieldValue {
    fn from(value: &[i64]) -> Self {
        FieldValue::Ids(value.to_vec())
    }
}

impl From<Recordset> for FieldValue {
    fn from(value: Recordset) -> Self {
        FieldValue::Records(value)
    }
}

impl From<&Recordset> for FieldValue {
    fn from(value: &Recordset) -> Self {
        FieldValue::Records(value.clone())
    }
}

impl From<Vec<Command>> for FieldValue {
    fn from(value: Vec<Command>) -> Self {
        FieldValue::Commands(value)
    }
}

impl From<Command> for FieldValue {
    fn from(value: Command) -> Self {
        FieldValue::Commands(vec![value])
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Raw(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Empty)
    }
}
