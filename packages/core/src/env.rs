//! Environments: credentials, context and the caches shared between them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use objrpc_transport::Server;
use serde_json::{json, Map, Value};

use crate::command;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::Error;
use crate::model::{Model, ModelSchema};
use crate::recordset::{RecordValues, Recordset};

/// Key/value options sent along with method calls (`lang`, `tz`, ...).
pub type Context = Map<String, Value>;

/// A record with values staged but not written yet.
#[derive(Clone)]
pub(crate) struct DirtyRecord {
    pub model: String,
    pub id: i64,
    pub values: Rc<RefCell<RecordValues>>,
    /// Context of the environment the assignment happened in.
    pub context: Context,
}

impl DirtyRecord {
    fn is(&self, values: &Rc<RefCell<RecordValues>>, id: i64) -> bool {
        self.id == id && Rc::ptr_eq(&self.values, values)
    }
}

/// State shared by an environment and every environment derived from it.
#[derive(Default)]
struct Shared {
    registry: HashMap<String, Rc<ModelSchema>>,
    dirty: Vec<DirtyRecord>,
}

/// A (database, user, context) bundle through which models are reached.
///
/// Cloning is cheap. Environments derived with [`Environment::with_context`]
/// share the model registry and the dirty set with their parent.
#[derive(Clone)]
pub struct Environment {
    conn: Rc<Connection>,
    db: String,
    uid: i64,
    context: Context,
    shared: Rc<RefCell<Shared>>,
}

impl Environment {
    pub(crate) fn new(conn: Rc<Connection>, db: String, uid: i64, context: Context) -> Self {
        Self {
            conn,
            db,
            uid,
            context,
            shared: Rc::new(RefCell::new(Shared::default())),
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn lang(&self) -> Option<&str> {
        self.context.get("lang").and_then(Value::as_str)
    }

    pub fn server(&self) -> &Server {
        self.conn.server()
    }

    pub fn config(&self) -> Config {
        self.conn.config()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.conn.config().timeout
    }

    /// A new environment with `overrides` merged over this context.
    pub fn with_context(&self, overrides: Context) -> Environment {
        let mut context = self.context.clone();
        context.extend(overrides);
        Environment {
            context,
            ..self.clone()
        }
    }

    /// Proxy of the model `name`, fetching its fields on first use.
    pub fn model(&self, name: &str) -> Result<Model, Error> {
        let schema = self.schema(name)?;
        Ok(Model::new(schema, self.clone()))
    }

    /// Whether the server knows the model `name`.
    pub fn has_model(&self, name: &str) -> Result<bool, Error> {
        if self.shared.borrow().registry.contains_key(name) {
            return Ok(true);
        }
        let found = self.call_kw(
            "ir.model",
            "search",
            vec![json!([["model", "=", name]])],
            Map::new(),
        )?;
        Ok(found.as_array().is_some_and(|ids| !ids.is_empty()))
    }

    /// The logged user as a `res.users` record. No network call.
    pub fn user(&self) -> Recordset {
        Recordset::new("res.users", vec![self.uid], self.clone())
    }

    /// Record behind an external id such as `base.main_company`.
    pub fn ref_record(&self, xml_id: &str) -> Result<Recordset, Error> {
        let (module, name) = xml_id.split_once('.').ok_or_else(|| {
            Error::internal(format!("'{}' is not a 'module.name' external id", xml_id))
        })?;
        let result = self.call_kw(
            "ir.model.data",
            "check_object_reference",
            vec![json!(module), json!(name), json!(true)],
            Map::new(),
        )?;
        let model = result.get(0).and_then(Value::as_str);
        let id = result.get(1).and_then(Value::as_i64);
        match (model, id) {
            (Some(model), Some(id)) => Ok(Recordset::new(model, vec![id], self.clone())),
            _ => Err(Error::internal(format!(
                "unexpected reply for external id '{}': {}",
                xml_id, result
            ))),
        }
    }

    /// Write every dirty record, in the order they became dirty.
    ///
    /// Stops at the first failure: records written before it stay committed,
    /// the failing record and those after it stay dirty.
    pub fn commit(&self) -> Result<(), Error> {
        let dirty = self.shared.borrow().dirty.clone();
        tracing::debug!(records = dirty.len(), "committing");
        for record in &dirty {
            self.flush_record(record)?;
        }
        Ok(())
    }

    /// Forget every dirty record along with its staged values.
    pub fn invalidate(&self) {
        let dirty = std::mem::take(&mut self.shared.borrow_mut().dirty);
        for record in dirty {
            record.values.borrow_mut().clear_pending(Some(record.id));
        }
    }

    pub fn dirty_count(&self) -> usize {
        self.shared.borrow().dirty.len()
    }

    pub fn is_dirty(&self, records: &Recordset) -> bool {
        records.is_dirty()
    }

    /// Drop cached field metadata; the next `model()` refetches it.
    pub fn clear_registry(&self) {
        self.shared.borrow_mut().registry.clear();
    }

    pub(crate) fn schema(&self, name: &str) -> Result<Rc<ModelSchema>, Error> {
        if let Some(schema) = self.shared.borrow().registry.get(name) {
            return Ok(Rc::clone(schema));
        }

        tracing::debug!(model = name, "fetching fields");
        let fields = self.call_kw(name, "fields_get", Vec::new(), Map::new())?;
        let schema = Rc::new(ModelSchema::from_fields_get(name, &fields)?);
        self.shared
            .borrow_mut()
            .registry
            .insert(name.to_string(), Rc::clone(&schema));
        Ok(schema)
    }

    /// `execute_kw`, adding this context unless the call brings its own.
    pub(crate) fn call_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
    ) -> Result<Value, Error> {
        if self.config().auto_context && !kwargs.contains_key("context") {
            kwargs.insert("context".to_string(), Value::Object(self.context.clone()));
        }
        self.conn
            .execute_kw(&self.db, self.uid, model, method, args, kwargs)
    }

    pub(crate) fn mark_dirty(&self, record: DirtyRecord) {
        let mut shared = self.shared.borrow_mut();
        if !shared.dirty.iter().any(|d| d.is(&record.values, record.id)) {
            shared.dirty.push(record);
        }
    }

    pub(crate) fn unmark(&self, values: &Rc<RefCell<RecordValues>>, id: i64) {
        self.shared
            .borrow_mut()
            .dirty
            .retain(|d| !d.is(values, id));
    }

    pub(crate) fn is_marked(&self, values: &Rc<RefCell<RecordValues>>, id: i64) -> bool {
        self.shared.borrow().dirty.iter().any(|d| d.is(values, id))
    }

    /// Flush one record if it is dirty.
    pub(crate) fn flush(&self, values: &Rc<RefCell<RecordValues>>, id: i64) -> Result<(), Error> {
        let record = self
            .shared
            .borrow()
            .dirty
            .iter()
            .find(|d| d.is(values, id))
            .cloned();
        match record {
            Some(record) => self.flush_record(&record),
            None => Ok(()),
        }
    }

    fn flush_record(&self, record: &DirtyRecord) -> Result<(), Error> {
        let key = Some(record.id);
        let schema = self.schema(&record.model)?;
        let pending = record.values.borrow().pending_for(key);

        if !pending.is_empty() {
            tracing::debug!(
                model = %record.model,
                id = record.id,
                fields = ?pending.keys().collect::<Vec<_>>(),
                "writing record"
            );

            let mut kwargs = Map::new();
            if self.config().auto_context {
                kwargs.insert("context".to_string(), Value::Object(record.context.clone()));
            }
            self.conn.execute_kw(
                &self.db,
                self.uid,
                &record.model,
                "write",
                vec![json!([record.id]), Value::Object(pending.clone())],
                kwargs,
            )?;

            let mut values = record.values.borrow_mut();
            for (name, written) in pending {
                let cached = values.cached(&name, key);
                let stored = match schema.field(&name) {
                    // Commands on ids never read: the next access reads them.
                    Some(field)
                        if field.kind.is_x2many()
                            && cached.is_none()
                            && !command::replaces_all(&written) =>
                    {
                        None
                    }
                    Some(field) => Some(field.store(cached, &written)),
                    None => Some(written),
                };
                if let Some(stored) = stored {
                    values.set_cached(&name, key, stored);
                }
                values.remove_pending(&name, key);
            }
        }

        self.unmark(&record.values, record.id);
        Ok(())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("db", &self.db)
            .field("uid", &self.uid)
            .field("context", &self.context)
            .finish()
    }
}
