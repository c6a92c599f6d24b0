//! Recordsets: lazily loaded, mutation tracking views over remote records.
//!
//! A [`Recordset`] is a model name, an ordered list of ids and a handle on
//! the environment. Values live in a [`RecordValues`] shared by the recordset
//! and every singleton obtained by iterating it:
//!
//! - `cache` holds wire values as read from the server,
//! - `pending` holds wire values assigned locally and not yet written.
//!
//! Reading a field checks `pending`, then `cache`, then reads every declared
//! field of the record in one call. Assigning a field validates the value,
//! stages it in `pending` and registers the record in the environment's dirty
//! set.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::command::{self, Command};
use crate::env::{Context, DirtyRecord, Environment};
use crate::error::Error;
use crate::field::{ids_of, Field};
use crate::model::ModelSchema;
use crate::value::FieldValue;

/// `Some(id)` for a stored record, `None` for the defaults of an id-less one.
pub(crate) type RecordKey = Option<i64>;

#[derive(Debug, Default)]
pub(crate) struct RecordValues {
    cache: HashMap<RecordKey, Map<String, Value>>,
    pending: HashMap<RecordKey, Map<String, Value>>,
}

impl RecordValues {
    pub fn cached(&self, field: &str, key: RecordKey) -> Option<&Value> {
        self.cache.get(&key)?.get(field)
    }

    pub fn set_cached(&mut self, field: &str, key: RecordKey, value: Value) {
        self.cache
            .entry(key)
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn pending(&self, field: &str, key: RecordKey) -> Option<&Value> {
        self.pending.get(&key)?.get(field)
    }

    pub fn set_pending(&mut self, field: &str, key: RecordKey, value: Value) {
        self.pending
            .entry(key)
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn remove_pending(&mut self, field: &str, key: RecordKey) {
        if let Some(values) = self.pending.get_mut(&key) {
            values.remove(field);
            if values.is_empty() {
                self.pending.remove(&key);
            }
        }
    }

    /// Every staged value of one record.
    pub fn pending_for(&self, key: RecordKey) -> Map<String, Value> {
        self.pending.get(&key).cloned().unwrap_or_default()
    }

    pub fn clear_pending(&mut self, key: RecordKey) {
        self.pending.remove(&key);
    }

    fn forget(&mut self, field: &str, key: RecordKey) {
        if let Some(values) = self.cache.get_mut(&key) {
            values.remove(field);
        }
    }

    fn clear_cache(&mut self, key: RecordKey) {
        self.cache.remove(&key);
    }
}

/// Ids accepted by [`Model::browse`](crate::Model::browse).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ids(pub Vec<i64>);

impl From<i64> for Ids {
    fn from(id: i64) -> Self {
        Ids(vec![id])
    }
}

impl From<Option<i64>> for Ids {
    fn from(id: Option<i64>) -> Self {
        Ids(id.into_iter().collect())
    }
}

impl From<Vec<i64>> for Ids {
    fn from(ids: Vec<i64>) -> Self {
        Ids(ids)
    }
}

impl From<&[i64]> for Ids {
    fn from(ids: &[i64]) -> Self {
        Ids(ids.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for Ids {
    fn from(ids: [i64; N]) -> Self {
        Ids(ids.to_vec())
    }
}

/// An ordered collection of records of one model.
#[derive(Clone)]
pub struct Recordset {
    model: String,
    ids: Vec<i64>,
    env: Environment,
    values: Rc<RefCell<RecordValues>>,
}

impl Recordset {
    pub(crate) fn new(model: impl Into<String>, ids: Vec<i64>, env: Environment) -> Self {
        Self {
            model: model.into(),
            ids,
            env,
            values: Rc::new(RefCell::new(RecordValues::default())),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Id of a single record, `None` for an empty recordset.
    pub fn id(&self) -> Result<Option<i64>, Error> {
        self.key()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Single-record recordsets sharing this recordset's values.
    pub fn iter(&self) -> impl Iterator<Item = Recordset> + '_ {
        self.ids.iter().map(|id| self.singleton(*id))
    }

    pub fn get(&self, index: usize) -> Option<Recordset> {
        self.ids.get(index).map(|id| self.singleton(*id))
    }

    /// The same records under a derived environment, with fresh values.
    pub fn with_context(&self, overrides: Context) -> Recordset {
        Recordset::new(
            self.model.as_str(),
            self.ids.clone(),
            self.env.with_context(overrides),
        )
    }

    /// Read a field of a single record.
    pub fn field(&self, name: &str) -> Result<FieldValue, Error> {
        let schema = self.env.schema(&self.model)?;
        let field = self.descriptor(&schema, name)?;
        let key = self.key()?;

        match self.wire_value(&schema, field, key)? {
            Some(raw) => Ok(field.render(&raw, &self.env)),
            None => Ok(field.empty_value(&self.env)),
        }
    }

    /// Assign a field of a single record.
    ///
    /// The value is validated before anything changes. It is written on the
    /// next commit, or right away when auto commit is on.
    pub fn set(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        let schema = self.env.schema(&self.model)?;
        let field = self.descriptor(&schema, name)?;
        let id = self.stored_id(name)?;

        let wire = field.normalize(value.into())?;
        self.stage(field, id, wire)
    }

    /// Link records to a one2many / many2many field.
    pub fn add(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        self.change_links(name, value.into(), Command::Link)
    }

    /// Unlink records from a one2many / many2many field.
    pub fn remove(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        self.change_links(name, value.into(), Command::Unlink)
    }

    /// Write the staged values of these records now.
    pub fn flush(&self) -> Result<(), Error> {
        for id in &self.ids {
            self.env.flush(&self.values, *id)?;
        }
        Ok(())
    }

    /// Drop staged values. Cached values stay; no network call.
    pub fn reset(&self) {
        let mut values = self.values.borrow_mut();
        for id in &self.ids {
            values.clear_pending(Some(*id));
            self.env.unmark(&self.values, *id);
        }
    }

    /// Drop staged and cached values and read the records again.
    ///
    /// An id-less recordset loads the server defaults instead.
    pub fn refresh(&self) -> Result<(), Error> {
        self.reset();
        {
            let mut values = self.values.borrow_mut();
            values.clear_cache(None);
            for id in &self.ids {
                values.clear_cache(Some(*id));
            }
        }

        let schema = self.env.schema(&self.model)?;
        if self.ids.is_empty() {
            self.load_defaults(&schema)
        } else {
            self.load(&schema, &self.ids)
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.ids
            .iter()
            .any(|id| self.env.is_marked(&self.values, *id))
    }

    /// Call a record method: the ids go first in the positional arguments.
    pub fn call(
        &self,
        method: &str,
        mut args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, Error> {
        args.insert(0, json!(self.ids));
        self.env.call_kw(&self.model, method, args, kwargs)
    }

    /// Raw `read` of `fields`, bypassing the cache.
    pub fn read(&self, fields: &[&str]) -> Result<Vec<Map<String, Value>>, Error> {
        let result = self.call("read", vec![json!(fields)], Map::new())?;
        Ok(result
            .as_array()
            .map(|rows| rows.iter().filter_map(Value::as_object).cloned().collect())
            .unwrap_or_default())
    }

    /// Write `values` on every record right away.
    ///
    /// Bypasses the dirty set. Cached values of these fields are dropped and
    /// read again on next access.
    pub fn write(&self, values: Map<String, Value>) -> Result<(), Error> {
        if self.ids.is_empty() {
            return Ok(());
        }
        let fields: Vec<String> = values.keys().cloned().collect();
        self.call("write", vec![Value::Object(values)], Map::new())?;

        let mut cached = self.values.borrow_mut();
        for id in &self.ids {
            for field in &fields {
                cached.forget(field, Some(*id));
            }
        }
        Ok(())
    }

    /// Delete the records on the server.
    pub fn unlink(&self) -> Result<bool, Error> {
        if self.ids.is_empty() {
            return Ok(true);
        }
        let result = self.call("unlink", Vec::new(), Map::new())?;
        self.reset();
        Ok(result.as_bool().unwrap_or(true))
    }

    fn singleton(&self, id: i64) -> Recordset {
        Recordset {
            model: self.model.clone(),
            ids: vec![id],
            env: self.env.clone(),
            values: Rc::clone(&self.values),
        }
    }

    fn key(&self) -> Result<RecordKey, Error> {
        match self.ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            ids => Err(Error::internal(format!(
                "expected a single '{}' record, got {}",
                self.model,
                ids.len()
            ))),
        }
    }

    fn stored_id(&self, field: &str) -> Result<i64, Error> {
        self.key()?.ok_or_else(|| {
            Error::internal(format!(
                "cannot assign '{}' on an empty '{}' recordset",
                field, self.model
            ))
        })
    }

    fn descriptor<'s>(&self, schema: &'s ModelSchema, name: &str) -> Result<&'s Field, Error> {
        schema.field(name).ok_or_else(|| Error::UnknownField {
            model: self.model.clone(),
            field: name.to_string(),
        })
    }

    /// Current wire value of a field: staged, cached or freshly read.
    fn wire_value(
        &self,
        schema: &ModelSchema,
        field: &Field,
        key: RecordKey,
    ) -> Result<Option<Value>, Error> {
        if !field.kind.is_x2many() {
            if let Some(pending) = self.values.borrow().pending(&field.name, key) {
                return Ok(Some(pending.clone()));
            }
        }

        let missing = {
            let values = self.values.borrow();
            values.cached(&field.name, key).is_none()
                && !(field.kind.is_x2many()
                    && values
                        .pending(&field.name, key)
                        .is_some_and(command::replaces_all))
        };
        if missing {
            match key {
                Some(id) => self.load(schema, &[id])?,
                None => return Ok(None),
            }
        }

        let values = self.values.borrow();
        let cached = values.cached(&field.name, key).cloned();
        if !field.kind.is_x2many() {
            return Ok(cached);
        }

        // Staged relationship commands apply on top of the cached ids.
        let mut ids = cached.as_ref().map(ids_of).unwrap_or_default();
        if let Some(commands) = values
            .pending(&field.name, key)
            .and_then(command::decode)
        {
            Command::apply(&commands, &mut ids);
        }
        Ok(Some(json!(ids)))
    }

    /// Read every declared field of `ids` in a single call.
    fn load(&self, schema: &ModelSchema, ids: &[i64]) -> Result<(), Error> {
        let names: Vec<&str> = schema.fields.keys().map(String::as_str).collect();
        let mut kwargs = Map::new();
        kwargs.insert("load".to_string(), json!("_classic_write"));

        let result = self.env.call_kw(
            &self.model,
            "read",
            vec![json!(ids), json!(names)],
            kwargs,
        )?;
        let rows = result.as_array().cloned().unwrap_or_default();

        let mut missing = Vec::new();
        let mut values = self.values.borrow_mut();
        for id in ids {
            let row = rows
                .iter()
                .filter_map(Value::as_object)
                .find(|row| row.get("id").and_then(Value::as_i64) == Some(*id));
            let Some(row) = row else {
                if !missing.contains(id) {
                    missing.push(*id);
                }
                continue;
            };
            for name in &names {
                let value = row.get(*name).cloned().unwrap_or(Value::Bool(false));
                values.set_cached(name, Some(*id), value);
            }
        }

        tracing::debug!(model = %self.model, ids = ?ids, "loaded records");
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::RecordNotFound {
                model: self.model.clone(),
                ids: missing,
            })
        }
    }

    fn load_defaults(&self, schema: &ModelSchema) -> Result<(), Error> {
        let names: Vec<&str> = schema.fields.keys().map(String::as_str).collect();
        let result = self.env.call_kw(
            &self.model,
            "default_get",
            vec![json!(names)],
            Map::new(),
        )?;

        let mut values = self.values.borrow_mut();
        for name in names {
            let value = result.get(name).cloned().unwrap_or(Value::Bool(false));
            values.set_cached(name, None, value);
        }
        Ok(())
    }

    fn change_links(
        &self,
        name: &str,
        value: FieldValue,
        make: fn(i64) -> Command,
    ) -> Result<(), Error> {
        let schema = self.env.schema(&self.model)?;
        let field = self.descriptor(&schema, name)?;
        let id = self.stored_id(name)?;
        let ids = field.delta_ids(value)?;

        let mut commands = self
            .values
            .borrow()
            .pending(name, Some(id))
            .and_then(command::decode)
            .unwrap_or_default();
        commands.extend(ids.into_iter().map(make));

        self.stage(field, id, command::encode(&commands))
    }

    fn stage(&self, field: &Field, id: i64, wire: Value) -> Result<(), Error> {
        self.values
            .borrow_mut()
            .set_pending(&field.name, Some(id), wire);
        self.env.mark_dirty(DirtyRecord {
            model: self.model.clone(),
            id,
            values: Rc::clone(&self.values),
            context: self.env.context().clone(),
        });

        if self.env.config().auto_commit {
            self.env.flush(&self.values, id)?;
        }
        Ok(())
    }
}

impl PartialEq for Recordset {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.ids == other.ids
    }
}

impl fmt::Debug for Recordset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recordset({:?}, {:?})", self.model, self.ids)
    }
}

impl fmt::Display for Recordset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recordset({:?}, {:?})", self.model, self.ids)
    }
}

impl<'a> IntoIterator for &'a Recordset {
    type Item = Recordset;
    type IntoIter = Box<dyn Iterator<Item = Recordset> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
