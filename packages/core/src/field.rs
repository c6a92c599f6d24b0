//! Field descriptors.
//!
//! A model's fields are reported by the server's `fields_get` and turned into
//! a closed set of [`FieldKind`]s. Each [`Field`] knows how to:
//!
//! - render a wire value into a [`FieldValue`] ([`Field::render`]),
//! - validate and normalize a caller's value into its wire shape before it is
//!   staged for writing ([`Field::normalize`]),
//! - fold a flushed write back into the read cache ([`Field::store`]).
//!
//! Reads are tolerant (a malformed date comes back as the raw string), writes
//! are strict (a malformed date is a [`ValidationError`]).

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

use crate::command::{self, Command};
use crate::env::Environment;
use crate::error::ValidationError;
use crate::recordset::Recordset;
use crate::value::FieldValue;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Char,
    Text,
    Html,
    Binary,
    Boolean,
    Integer,
    Float,
    Date,
    Datetime,
    /// Allowed `(key, label)` pairs.
    Selection {
        options: Vec<(Value, String)>,
    },
    Many2one {
        relation: String,
    },
    One2many {
        relation: String,
        inverse: Option<String>,
    },
    Many2many {
        relation: String,
    },
    /// Polymorphic many2one stored as `"model,id"`; options list the allowed models.
    Reference {
        options: Vec<(Value, String)>,
    },
    /// A server type this client does not model. Values pass through untouched.
    Unknown {
        type_name: String,
    },
}

impl FieldKind {
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::Char => "char",
            FieldKind::Text => "text",
            FieldKind::Html => "html",
            FieldKind::Binary => "binary",
            FieldKind::Boolean => "boolean",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
            FieldKind::Datetime => "datetime",
            FieldKind::Selection { .. } => "selection",
            FieldKind::Many2one { .. } => "many2one",
            FieldKind::One2many { .. } => "one2many",
            FieldKind::Many2many { .. } => "many2many",
            FieldKind::Reference { .. } => "reference",
            FieldKind::Unknown { type_name } => type_name,
        }
    }

    /// Target model of many2one / one2many / many2many fields.
    pub fn relation(&self) -> Option<&str> {
        match self {
            FieldKind::Many2one { relation }
            | FieldKind::One2many { relation, .. }
            | FieldKind::Many2many { relation } => Some(relation),
            _ => None,
        }
    }

    pub fn is_relational(&self) -> bool {
        self.relation().is_some() || matches!(self, FieldKind::Reference { .. })
    }

    pub fn is_x2many(&self) -> bool {
        matches!(
            self,
            FieldKind::One2many { .. } | FieldKind::Many2many { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Human readable label.
    pub string: String,
    pub required: bool,
    /// Reported by the server; enforcement is left to the server.
    pub readonly: bool,
    /// Maximum length of string values.
    pub size: Option<usize>,
    pub help: Option<String>,
    /// Merged into the context of recordsets reached through this field.
    pub context: Map<String, Value>,
    pub domain: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            string: String::new(),
            required: false,
            readonly: false,
            size: None,
            help: None,
            context: Map::new(),
            domain: Value::Array(Vec::new()),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Build a descriptor from one entry of a `fields_get` response.
    pub fn from_metadata(name: &str, data: &Value) -> Self {
        let str_of = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        let relation = str_of("relation").unwrap_or_default();
        let type_name = str_of("type").unwrap_or_default();

        let kind = match type_name.as_str() {
            "char" => FieldKind::Char,
            "text" => FieldKind::Text,
            "html" => FieldKind::Html,
            "binary" => FieldKind::Binary,
            "boolean" => FieldKind::Boolean,
            "integer" => FieldKind::Integer,
            "float" | "monetary" => FieldKind::Float,
            "date" => FieldKind::Date,
            "datetime" => FieldKind::Datetime,
            "selection" => FieldKind::Selection {
                options: parse_options(data.get("selection")),
            },
            "many2one" => FieldKind::Many2one { relation },
            "one2many" => FieldKind::One2many {
                relation,
                inverse: str_of("relation_field"),
            },
            "many2many" => FieldKind::Many2many { relation },
            "reference" => FieldKind::Reference {
                options: parse_options(data.get("selection")),
            },
            _ => FieldKind::Unknown { type_name },
        };

        Self {
            name: name.to_string(),
            kind,
            string: str_of("string").unwrap_or_default(),
            required: data.get("required").and_then(Value::as_bool).unwrap_or(false),
            readonly: data.get("readonly").and_then(Value::as_bool).unwrap_or(false),
            size: data
                .get("size")
                .and_then(Value::as_u64)
                .filter(|size| *size > 0)
                .map(|size| size as usize),
            help: str_of("help"),
            // Older servers send the context as an unevaluated string.
            context: data
                .get("context")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            domain: data.get("domain").cloned().unwrap_or(Value::Array(Vec::new())),
        }
    }

    /// Public value of a field holding no data.
    pub fn empty_value(&self, env: &Environment) -> FieldValue {
        match &self.kind {
            FieldKind::Boolean => FieldValue::Bool(false),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Float => FieldValue::Float(0.0),
            FieldKind::Many2one { relation }
            | FieldKind::One2many { relation, .. }
            | FieldKind::Many2many { relation } => {
                FieldValue::Records(Recordset::new(relation.as_str(), Vec::new(), env.clone()))
            }
            _ => FieldValue::Empty,
        }
    }

    /// Render a wire value (read shape) as a public value.
    pub fn render(&self, raw: &Value, env: &Environment) -> FieldValue {
        if is_false(raw) && !matches!(self.kind, FieldKind::Boolean) {
            return self.empty_value(env);
        }

        match &self.kind {
            FieldKind::Char | FieldKind::Text | FieldKind::Html | FieldKind::Binary => {
                match raw {
                    Value::String(s) => FieldValue::Text(s.clone()),
                    other => FieldValue::Raw(other.clone()),
                }
            }
            FieldKind::Selection { .. } => match raw {
                Value::String(s) => FieldValue::Text(s.clone()),
                Value::Number(n) if n.is_i64() => FieldValue::Integer(n.as_i64().unwrap_or(0)),
                other => FieldValue::Raw(other.clone()),
            },
            FieldKind::Boolean => match raw {
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::Number(n) => FieldValue::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
                _ => FieldValue::Bool(false),
            },
            FieldKind::Integer => match raw.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Raw(raw.clone()),
            },
            FieldKind::Float => match raw.as_f64() {
                Some(f) => FieldValue::Float(f),
                None => FieldValue::Raw(raw.clone()),
            },
            FieldKind::Date => match raw.as_str() {
                Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map(FieldValue::Date)
                    .unwrap_or_else(|_| FieldValue::Text(s.to_string())),
                None => FieldValue::Raw(raw.clone()),
            },
            FieldKind::Datetime => match raw.as_str() {
                Some(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                    .map(FieldValue::Datetime)
                    .unwrap_or_else(|_| FieldValue::Text(s.to_string())),
                None => FieldValue::Raw(raw.clone()),
            },
            FieldKind::Many2one { relation } => {
                // `[id, display_name]` when the server ignored `_classic_write`.
                let id = raw
                    .as_i64()
                    .or_else(|| raw.get(0).and_then(Value::as_i64));
                let ids = id.into_iter().collect();
                FieldValue::Records(Recordset::new(relation.as_str(), ids, self.target_env(env)))
            }
            FieldKind::One2many { relation, .. } | FieldKind::Many2many { relation } => {
                let ids = raw
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                FieldValue::Records(Recordset::new(relation.as_str(), ids, self.target_env(env)))
            }
            FieldKind::Reference { .. } => match raw.as_str().and_then(parse_reference) {
                Some((model, id)) => {
                    FieldValue::Records(Recordset::new(model, vec![id], self.target_env(env)))
                }
                None => FieldValue::Empty,
            },
            FieldKind::Unknown { .. } => FieldValue::Raw(raw.clone()),
        }
    }

    /// Validate a caller value and convert it to the wire shape to stage.
    pub fn normalize(&self, value: FieldValue) -> Result<Value, ValidationError> {
        self.check_common(&value)?;

        match &self.kind {
            FieldKind::Char | FieldKind::Text | FieldKind::Html | FieldKind::Binary => {
                match value {
                    FieldValue::Text(s) => Ok(Value::String(s)),
                    v if is_clear(&v) => Ok(Value::Bool(false)),
                    v => Err(self.invalid(format!("expected a string, got {}", v.kind_name()))),
                }
            }
            FieldKind::Boolean => match value {
                FieldValue::Bool(b) => Ok(Value::Bool(b)),
                FieldValue::Integer(i) => Ok(Value::Bool(i != 0)),
                FieldValue::Empty => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!("expected a boolean, got {}", v.kind_name()))),
            },
            FieldKind::Integer => match value {
                FieldValue::Integer(i) => Ok(json!(i)),
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!("expected an integer, got {}", v.kind_name()))),
            },
            FieldKind::Float => match value {
                FieldValue::Float(f) if !f.is_finite() => {
                    Err(self.invalid(format!("{} is not a finite number", f)))
                }
                FieldValue::Float(f) => Ok(json!(f)),
                FieldValue::Integer(i) => Ok(json!(i as f64)),
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!("expected a number, got {}", v.kind_name()))),
            },
            FieldKind::Date => match value {
                FieldValue::Date(d) => Ok(Value::String(d.format(DATE_FORMAT).to_string())),
                FieldValue::Datetime(dt) => {
                    Ok(Value::String(dt.date().format(DATE_FORMAT).to_string()))
                }
                FieldValue::Text(s) => match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                    Ok(_) => Ok(Value::String(s)),
                    Err(_) => Err(self.invalid(format!("'{}' does not match YYYY-MM-DD", s))),
                },
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!("expected a date, got {}", v.kind_name()))),
            },
            FieldKind::Datetime => match value {
                FieldValue::Datetime(dt) => {
                    Ok(Value::String(dt.format(DATETIME_FORMAT).to_string()))
                }
                FieldValue::Text(s) => match NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT) {
                    Ok(_) => Ok(Value::String(s)),
                    Err(_) => Err(self.invalid(format!(
                        "'{}' does not match YYYY-MM-DD HH:MM:SS",
                        s
                    ))),
                },
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!("expected a datetime, got {}", v.kind_name()))),
            },
            FieldKind::Selection { options } => {
                let key = match value {
                    FieldValue::Text(s) => Value::String(s),
                    FieldValue::Integer(i) => json!(i),
                    v if is_clear(&v) => return Ok(Value::Bool(false)),
                    v => {
                        return Err(self.invalid(format!(
                            "expected a selection key, got {}",
                            v.kind_name()
                        )))
                    }
                };
                if options.iter().any(|(option, _)| option == &key) {
                    Ok(key)
                } else {
                    Err(self.invalid(format!(
                        "{} is not one of {}",
                        key,
                        option_keys(options)
                    )))
                }
            }
            FieldKind::Many2one { relation } => match value {
                FieldValue::Records(records) => {
                    self.check_target(relation, records.model_name())?;
                    match records.ids() {
                        [] => Ok(Value::Bool(false)),
                        [id] => Ok(json!(id)),
                        ids => Err(self.invalid(format!(
                            "expected a single record, got {} records",
                            ids.len()
                        ))),
                    }
                }
                FieldValue::Integer(id) => Ok(json!(id)),
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!(
                    "expected a record, an id or nothing, got {}",
                    v.kind_name()
                ))),
            },
            FieldKind::One2many { relation, .. } | FieldKind::Many2many { relation } => {
                let commands = match value {
                    FieldValue::Commands(commands) => commands,
                    FieldValue::Ids(ids) if ids.is_empty() => vec![Command::Clear],
                    FieldValue::Ids(ids) => vec![Command::Replace(ids)],
                    FieldValue::Records(records) => {
                        self.check_target(relation, records.model_name())?;
                        if records.is_empty() {
                            vec![Command::Clear]
                        } else {
                            vec![Command::Replace(records.ids().to_vec())]
                        }
                    }
                    FieldValue::Raw(raw) if raw.is_array() => match command::decode(&raw) {
                        Some(commands) => commands,
                        None => {
                            return Err(self.invalid(format!(
                                "{} is not a list of relationship commands",
                                raw
                            )))
                        }
                    },
                    v if is_clear(&v) => vec![Command::Clear],
                    v => {
                        return Err(self.invalid(format!(
                            "expected records, ids or commands, got {}",
                            v.kind_name()
                        )))
                    }
                };
                Ok(command::encode(&commands))
            }
            FieldKind::Reference { options } => match value {
                FieldValue::Records(records) => match records.ids() {
                    [] => Ok(Value::Bool(false)),
                    [id] => {
                        self.check_reference_model(options, records.model_name())?;
                        Ok(Value::String(format!("{},{}", records.model_name(), id)))
                    }
                    ids => Err(self.invalid(format!(
                        "expected a single record, got {} records",
                        ids.len()
                    ))),
                },
                FieldValue::Text(s) => {
                    let (model, _) = parse_reference(&s).ok_or_else(|| {
                        self.invalid(format!("'{}' is not formatted as 'model,id'", s))
                    })?;
                    self.check_reference_model(options, model)?;
                    Ok(Value::String(s))
                }
                v if is_clear(&v) => Ok(Value::Bool(false)),
                v => Err(self.invalid(format!(
                    "expected a record or a 'model,id' string, got {}",
                    v.kind_name()
                ))),
            },
            FieldKind::Unknown { .. } => Ok(to_wire(value)),
        }
    }

    /// Target ids of a value added to or removed from an x2many field.
    pub fn delta_ids(&self, value: FieldValue) -> Result<Vec<i64>, ValidationError> {
        let relation = match &self.kind {
            FieldKind::One2many { relation, .. } | FieldKind::Many2many { relation } => relation,
            other => {
                return Err(self.invalid(format!(
                    "records can only be added to one2many or many2many fields, not {}",
                    other.type_name()
                )))
            }
        };

        match value {
            FieldValue::Integer(id) => Ok(vec![id]),
            FieldValue::Ids(ids) => Ok(ids),
            FieldValue::Records(records) => {
                self.check_target(relation, records.model_name())?;
                Ok(records.ids().to_vec())
            }
            FieldValue::Empty => Ok(Vec::new()),
            v => Err(self.invalid(format!(
                "expected records or ids, got {}",
                v.kind_name()
            ))),
        }
    }

    /// Fold a value written to the server into the read-shape cache.
    ///
    /// x2many writes are command lists; the cache holds id lists.
    pub fn store(&self, cached: Option<&Value>, written: &Value) -> Value {
        if !self.kind.is_x2many() {
            return written.clone();
        }

        let mut ids = cached.map(ids_of).unwrap_or_default();
        if let Some(commands) = command::decode(written) {
            Command::apply(&commands, &mut ids);
        }
        json!(ids)
    }

    fn check_common(&self, value: &FieldValue) -> Result<(), ValidationError> {
        if let (Some(size), FieldValue::Text(s)) = (self.size, value) {
            if s.chars().count() > size {
                return Err(self.invalid(format!("length is limited to {}", size)));
            }
        }
        if self.required && value.is_blank() {
            return Err(self.invalid("field is required"));
        }
        Ok(())
    }

    fn check_target(&self, relation: &str, model: &str) -> Result<(), ValidationError> {
        if relation == model {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "expected '{}' records, got '{}'",
                relation, model
            )))
        }
    }

    fn check_reference_model(
        &self,
        options: &[(Value, String)],
        model: &str,
    ) -> Result<(), ValidationError> {
        if options.iter().any(|(option, _)| option.as_str() == Some(model)) {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "'{}' is not one of {}",
                model,
                option_keys(options)
            )))
        }
    }

    fn target_env(&self, env: &Environment) -> Environment {
        if self.context.is_empty() {
            env.clone()
        } else {
            env.with_context(self.context.clone())
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(&self.name, message)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut attrs = Vec::new();
        if !self.string.is_empty() {
            attrs.push(format!("string='{}'", self.string));
        }
        if let Some(relation) = self.kind.relation() {
            attrs.push(format!("relation='{}'", relation));
        }
        if self.required {
            attrs.push("required=true".to_string());
        }
        if self.readonly {
            attrs.push("readonly=true".to_string());
        }
        if let Some(size) = self.size {
            attrs.push(format!("size={}", size));
        }
        write!(f, "{}({})", self.kind.type_name(), attrs.join(", "))
    }
}

/// Split a `"model,id"` reference. `None` unless both parts are usable.
pub(crate) fn parse_reference(value: &str) -> Option<(&str, i64)> {
    let (model, id) = value.rsplit_once(',')?;
    let model = model.trim();
    let id = id.trim().parse::<i64>().ok()?;
    if model.is_empty() || id <= 0 {
        return None;
    }
    Some((model, id))
}

fn parse_options(value: Option<&Value>) -> Vec<(Value, String)> {
    // Dynamic selections arrive as a method name string; nothing to check against.
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let pair = item.as_array()?;
            let key = pair.first()?.clone();
            let label = pair.get(1).and_then(Value::as_str).unwrap_or_default();
            Some((key, label.to_string()))
        })
        .collect()
}

fn option_keys(options: &[(Value, String)]) -> String {
    let keys: Vec<String> = options.iter().map(|(key, _)| key.to_string()).collect();
    format!("[{}]", keys.join(", "))
}

fn is_false(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(false))
}

fn is_clear(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Empty | FieldValue::Bool(false))
        || matches!(value, FieldValue::Raw(raw) if is_false(raw))
}

pub(crate) fn ids_of(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn to_wire(value: FieldValue) -> Value {
    match value {
        FieldValue::Empty => Value::Bool(false),
        FieldValue::Bool(b) => Value::Bool(b),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Float(f) => json!(f),
        FieldValue::Text(s) => Value::String(s),
        FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        FieldValue::Datetime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        FieldValue::Ids(ids) => json!(ids),
        FieldValue::Records(records) => json!(records.ids()),
        FieldValue::Commands(commands) => command::encode(&commands),
        FieldValue::Raw(raw) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;

    fn selection() -> Field {
        Field::from_metadata(
            "state",
            &json!({
                "type": "selection",
                "string": "Status",
                "selection": [["draft", "Draft"], ["done", "Done"]]
            }),
        )
    }

    fn reference() -> Field {
        Field::from_metadata(
            "ref_doc",
            &json!({
                "type": "reference",
                "selection": [["res.partner", "Partner"], ["res.users", "User"]]
            }),
        )
    }

    #[test]
    fn metadata_parsing() {
        let field = Field::from_metadata(
            "name",
            &json!({"type": "char", "string": "Name", "required": true, "size": 64, "readonly": false}),
        );
        assert_eq!(field.kind, FieldKind::Char);
        assert_eq!(field.string, "Name");
        assert!(field.required);
        assert_eq!(field.size, Some(64));

        let field = Field::from_metadata(
            "child_ids",
            &json!({"type": "one2many", "relation": "res.partner", "relation_field": "parent_id", "context": {"active_test": false}}),
        );
        assert_eq!(
            field.kind,
            FieldKind::One2many {
                relation: "res.partner".to_string(),
                inverse: Some("parent_id".to_string())
            }
        );
        assert_eq!(field.context.get("active_test"), Some(&json!(false)));

        let field = Field::from_metadata("x", &json!({"type": "properties"}));
        assert_eq!(field.kind.type_name(), "properties");
    }

    #[test]
    fn string_context_is_ignored() {
        let field = Field::from_metadata(
            "partner_id",
            &json!({"type": "many2one", "relation": "res.partner", "context": "{'active_test': False}"}),
        );
        assert!(field.context.is_empty());
    }

    #[test]
    fn display_lists_attributes() {
        let field = Field::from_metadata(
            "parent_id",
            &json!({"type": "many2one", "string": "Parent", "relation": "res.partner", "required": true}),
        );
        assert_eq!(
            field.to_string(),
            "many2one(string='Parent', relation='res.partner', required=true)"
        );
    }

    #[test]
    fn char_checks_size_and_required() {
        let field = Field::new("name", FieldKind::Char).required(true).with_size(4);
        assert_eq!(field.normalize("Acme".into()).unwrap(), json!("Acme"));
        assert!(field.normalize("Acme Corp".into()).is_err());
        assert!(field.normalize("".into()).is_err());
        assert!(field.normalize(FieldValue::Empty).is_err());
        assert!(field.normalize(FieldValue::Integer(3)).is_err());

        let optional = Field::new("comment", FieldKind::Text);
        assert_eq!(optional.normalize(FieldValue::Empty).unwrap(), json!(false));
    }

    #[test]
    fn required_accepts_zero_and_false() {
        let field = Field::new("color", FieldKind::Integer).required(true);
        assert_eq!(field.normalize(FieldValue::Integer(0)).unwrap(), json!(0));

        let field = Field::new("active", FieldKind::Boolean).required(true);
        assert_eq!(field.normalize(FieldValue::Bool(false)).unwrap(), json!(false));
    }

    #[test]
    fn numeric_coercions() {
        let float = Field::new("credit", FieldKind::Float);
        assert_eq!(float.normalize(FieldValue::Integer(2)).unwrap(), json!(2.0));
        assert_eq!(float.normalize(FieldValue::Float(1.5)).unwrap(), json!(1.5));
        assert!(float.normalize("1.5".into()).is_err());
        assert!(float.normalize(FieldValue::Float(f64::NAN)).is_err());
        assert!(float.normalize(FieldValue::Float(f64::INFINITY)).is_err());
        assert!(float.normalize(FieldValue::Float(f64::NEG_INFINITY)).is_err());

        let int = Field::new("color", FieldKind::Integer);
        assert!(int.normalize(FieldValue::Float(1.5)).is_err());
        assert!(int.normalize(FieldValue::Bool(true)).is_err());

        let boolean = Field::new("active", FieldKind::Boolean);
        assert_eq!(boolean.normalize(FieldValue::Integer(5)).unwrap(), json!(true));
    }

    #[test]
    fn date_write_is_strict() {
        let field = Field::new("date", FieldKind::Date);
        let date = NaiveDate::from_ymd_opt(2013, 5, 1).unwrap();
        assert_eq!(field.normalize(date.into()).unwrap(), json!("2013-05-01"));
        assert_eq!(field.normalize("2013-05-01".into()).unwrap(), json!("2013-05-01"));
        assert!(field.normalize("01/05/2013".into()).is_err());
        assert!(field.normalize(FieldValue::Integer(1)).is_err());
        assert_eq!(field.normalize(FieldValue::Empty).unwrap(), json!(false));
    }

    #[test]
    fn datetime_write_is_strict() {
        let field = Field::new("write_at", FieldKind::Datetime);
        let dt = NaiveDate::from_ymd_opt(2013, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            field.normalize(dt.into()).unwrap(),
            json!("2013-05-01 08:30:00")
        );
        assert!(field.normalize("2013-05-01".into()).is_err());
    }

    #[test]
    fn selection_membership() {
        let field = selection();
        assert_eq!(field.normalize("done".into()).unwrap(), json!("done"));
        assert_eq!(field.normalize(FieldValue::Empty).unwrap(), json!(false));

        let err = field.normalize("bogus".into()).unwrap_err();
        assert_eq!(err.field, "state");
        assert!(err.message.contains("bogus"));

        // Labels are not keys.
        assert!(field.normalize("Done".into()).is_err());
    }

    #[test]
    fn reference_strings() {
        let field = reference();
        assert_eq!(
            field.normalize("res.users,2".into()).unwrap(),
            json!("res.users,2")
        );
        assert!(field.normalize("res.company,1".into()).is_err());
        assert!(field.normalize("res.users".into()).is_err());
        assert!(field.normalize("res.users,abc".into()).is_err());
        assert!(field.normalize(FieldValue::Integer(2)).is_err());
    }

    #[test]
    fn parse_reference_edge_cases() {
        assert_eq!(parse_reference("res.partner,7"), Some(("res.partner", 7)));
        assert_eq!(parse_reference(" res.partner , 7 "), Some(("res.partner", 7)));
        assert_eq!(parse_reference(",7"), None);
        assert_eq!(parse_reference("res.partner,0"), None);
        assert_eq!(parse_reference("garbage"), None);
    }

    #[test]
    fn x2many_normalization() {
        let field = Field::new(
            "category_id",
            FieldKind::Many2many {
                relation: "res.partner.category".to_string(),
            },
        );
        assert_eq!(
            field.normalize(vec![1, 2].into()).unwrap(),
            json!([[6, 0, [1, 2]]])
        );
        assert_eq!(field.normalize(FieldValue::Empty).unwrap(), json!([[5, 0, 0]]));
        assert_eq!(
            field.normalize(FieldValue::Ids(vec![])).unwrap(),
            json!([[5, 0, 0]])
        );
        assert_eq!(
            field.normalize(Command::Link(3).into()).unwrap(),
            json!([[4, 3, 0]])
        );
        assert_eq!(
            field.normalize(FieldValue::Raw(json!([[6, 0, [4]]]))).unwrap(),
            json!([[6, 0, [4]]])
        );
        assert!(field.normalize(FieldValue::Raw(json!([1, 2]))).is_err());
        assert!(field.normalize(FieldValue::Integer(1)).is_err());
    }

    #[test]
    fn delta_ids_rejects_scalar_fields() {
        let field = Field::new("name", FieldKind::Char);
        assert!(field.delta_ids(FieldValue::Integer(1)).is_err());

        let field = Field::new(
            "category_id",
            FieldKind::Many2many {
                relation: "res.partner.category".to_string(),
            },
        );
        assert_eq!(field.delta_ids(FieldValue::Integer(1)).unwrap(), vec![1]);
        assert_eq!(field.delta_ids(vec![1, 2].into()).unwrap(), vec![1, 2]);
    }

    #[test]
    fn store_folds_commands_into_ids() {
        let field = Field::new(
            "category_id",
            FieldKind::Many2many {
                relation: "res.partner.category".to_string(),
            },
        );
        let stored = field.store(Some(&json!([1, 2])), &json!([[4, 3, 0], [3, 1, 0]]));
        assert_eq!(stored, json!([2, 3]));

        let stored = field.store(None, &json!([[6, 0, [5]]]));
        assert_eq!(stored, json!([5]));

        let scalar = Field::new("name", FieldKind::Char);
        assert_eq!(scalar.store(Some(&json!("a")), &json!("b")), json!("b"));
    }

    #[test]
    fn render_scalars() {
        let (_client, env, _transport) = FakeServer::new().login();

        let date = Field::new("date", FieldKind::Date);
        assert_eq!(
            date.render(&json!("2012-01-01"), &env),
            FieldValue::Date(NaiveDate::from_ymd_opt(2012, 1, 1).unwrap())
        );
        // Tolerant read: unparseable dates come back as the raw string.
        assert_eq!(
            date.render(&json!("not a date"), &env),
            FieldValue::Text("not a date".to_string())
        );
        assert_eq!(date.render(&json!(false), &env), FieldValue::Empty);

        let float = Field::new("credit", FieldKind::Float);
        assert_eq!(float.render(&json!(false), &env), FieldValue::Float(0.0));
        let int = Field::new("color", FieldKind::Integer);
        assert_eq!(int.render(&json!(false), &env), FieldValue::Integer(0));
        let boolean = Field::new("active", FieldKind::Boolean);
        assert_eq!(boolean.render(&json!(false), &env), FieldValue::Bool(false));
        assert_eq!(boolean.render(&Value::Null, &env), FieldValue::Bool(false));
    }

    #[test]
    fn render_relations() {
        let (_client, env, _transport) = FakeServer::new().login();

        let parent = Field::new(
            "parent_id",
            FieldKind::Many2one {
                relation: "res.partner".to_string(),
            },
        );
        let records = parent.render(&json!(7), &env).into_records().unwrap();
        assert_eq!(records.model_name(), "res.partner");
        assert_eq!(records.ids(), &[7]);

        let records = parent.render(&json!([7, "Acme"]), &env).into_records().unwrap();
        assert_eq!(records.ids(), &[7]);

        let records = parent.render(&json!(false), &env).into_records().unwrap();
        assert!(records.is_empty());

        let field = reference();
        let records = field.render(&json!("res.users,2"), &env).into_records().unwrap();
        assert_eq!(records.model_name(), "res.users");
        assert_eq!(records.ids(), &[2]);
        assert_eq!(field.render(&json!("garbage"), &env), FieldValue::Empty);
    }

    #[test]
    fn relation_context_is_merged() {
        let (_client, env, _transport) = FakeServer::new().login();
        let field = Field::from_metadata(
            "child_ids",
            &json!({"type": "one2many", "relation": "res.partner", "context": {"active_test": false}}),
        );
        let records = field.render(&json!([8]), &env).into_records().unwrap();
        assert_eq!(records.env().context().get("active_test"), Some(&json!(false)));
        assert_eq!(records.env().context().get("lang"), Some(&json!("en_US")));
        assert!(env.context().get("active_test").is_none());
    }
}
