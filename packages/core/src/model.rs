use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::env::Environment;
use crate::error::Error;
use crate::field::Field;
use crate::recordset::{Ids, Recordset};

/// Names exposed through dedicated accessors rather than as fields.
const RESERVED: &[&str] = &["id", "ids", "env"];

/// Field descriptors of one model, as reported by `fields_get`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    pub name: String,
    pub fields: BTreeMap<String, Field>,
}

impl ModelSchema {
    pub fn from_fields_get(name: &str, response: &Value) -> Result<Self, Error> {
        let entries = response.as_object().ok_or_else(|| {
            Error::internal(format!(
                "fields_get of '{}' returned {} instead of an object",
                name, response
            ))
        })?;

        let fields = entries
            .iter()
            .filter(|(field_name, _)| !RESERVED.contains(&field_name.as_str()))
            .filter(|(_, data)| data.get("exportable").and_then(Value::as_bool) != Some(false))
            .map(|(field_name, data)| (field_name.clone(), Field::from_metadata(field_name, data)))
            .collect();

        Ok(Self {
            name: name.to_string(),
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }
}

/// Proxy of one remote model.
///
/// Methods are dispatched by name through [`Model::call`]; the typed helpers
/// cover the handful of ORM methods every model has.
#[derive(Clone)]
pub struct Model {
    schema: Rc<ModelSchema>,
    env: Environment,
}

impl Model {
    pub(crate) fn new(schema: Rc<ModelSchema>, env: Environment) -> Self {
        Self { schema, env }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Descriptors of every field, keyed by name.
    pub fn fields_get(&self) -> &BTreeMap<String, Field> {
        &self.schema.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.schema.field(name)
    }

    /// Records of this model. Never touches the network.
    pub fn browse(&self, ids: impl Into<Ids>) -> Recordset {
        Recordset::new(self.name(), ids.into().0, self.env.clone())
    }

    /// Call a model method by name.
    ///
    /// The environment context is added to `kwargs` unless it already has a
    /// `context` entry or auto context is off.
    pub fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, Error> {
        self.env.call_kw(self.name(), method, args, kwargs)
    }

    pub fn search(&self, domain: Value) -> Result<Vec<i64>, Error> {
        let result = self.call("search", vec![domain], Map::new())?;
        Ok(result
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default())
    }

    pub fn search_count(&self, domain: Value) -> Result<i64, Error> {
        let result = self.call("search_count", vec![domain], Map::new())?;
        result.as_i64().ok_or_else(|| {
            Error::internal(format!("search_count returned {}", result))
        })
    }

    /// Create a record and return its id.
    pub fn create(&self, values: Map<String, Value>) -> Result<i64, Error> {
        let result = self.call("create", vec![Value::Object(values)], Map::new())?;
        // Newer servers answer with a list of ids.
        result
            .as_i64()
            .or_else(|| result.get(0).and_then(Value::as_i64))
            .ok_or_else(|| Error::internal(format!("create returned {}", result)))
    }

    /// Server-side default values of `fields`.
    pub fn default_get(&self, fields: &[&str]) -> Result<Map<String, Value>, Error> {
        let result = self.call("default_get", vec![json!(fields)], Map::new())?;
        match result {
            Value::Object(map) => Ok(map),
            other => Err(Error::internal(format!("default_get returned {}", other))),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model({:?})", self.name())
    }
}
