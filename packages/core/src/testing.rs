//! In-memory server answering the calls the record layer makes.
//!
//! Backs a [`MockTransport`] so tests can assert on the recorded requests
//! while reads and writes behave like a real server.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use objrpc_transport::{Error as TransportError, MockTransport, RemoteFault, RpcRequest, Server};
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::command::{self, Command};
use crate::config::Config;
use crate::env::Environment;
use crate::field::ids_of;

pub(crate) const PASSWORD: &str = "s3cret";

#[derive(Default)]
struct State {
    fields: BTreeMap<String, Value>,
    rows: BTreeMap<String, BTreeMap<i64, Map<String, Value>>>,
    defaults: BTreeMap<String, Map<String, Value>>,
    failing_writes: HashSet<i64>,
    next_id: i64,
}

#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let mut state = State {
            next_id: 100,
            ..Default::default()
        };

        state.fields.insert(
            "res.partner".to_string(),
            json!({
                "id": {"type": "integer", "string": "ID"},
                "name": {"type": "char", "string": "Name", "required": true, "size": 64},
                "date": {"type": "date", "string": "Date"},
                "active": {"type": "boolean", "string": "Active"},
                "color": {"type": "integer", "string": "Color"},
                "credit": {"type": "float", "string": "Credit"},
                "state": {
                    "type": "selection",
                    "string": "Status",
                    "selection": [["draft", "Draft"], ["done", "Done"]]
                },
                "parent_id": {"type": "many2one", "relation": "res.partner"},
                "child_ids": {
                    "type": "one2many",
                    "relation": "res.partner",
                    "relation_field": "parent_id",
                    "context": {"active_test": false}
                },
                "category_id": {"type": "many2many", "relation": "res.partner.category"},
                "ref_doc": {
                    "type": "reference",
                    "selection": [["res.partner", "Partner"], ["res.users", "User"]]
                },
                "write_at": {"type": "datetime"},
                "comment": {"type": "text"},
                "payload": {"type": "json"},
                "password_hash": {"type": "char", "exportable": false}
            }),
        );
        state.fields.insert(
            "res.partner.category".to_string(),
            json!({"name": {"type": "char", "required": true}}),
        );
        state.fields.insert(
            "res.users".to_string(),
            json!({
                "name": {"type": "char"},
                "login": {"type": "char", "required": true},
                "partner_id": {"type": "many2one", "relation": "res.partner"}
            }),
        );

        let partners = state.rows.entry("res.partner".to_string()).or_default();
        partners.insert(
            7,
            object(json!({
                "name": "Acme",
                "date": "2012-01-01",
                "active": true,
                "color": false,
                "credit": false,
                "state": "draft",
                "parent_id": false,
                "child_ids": [8],
                "category_id": [1, 2],
                "ref_doc": "res.users,2",
                "write_at": "2012-01-01 10:20:30",
                "comment": false,
                "payload": {"a": 1}
            })),
        );
        partners.insert(
            8,
            object(json!({
                "name": "Child",
                "date": false,
                "active": true,
                "color": 3,
                "credit": 1.5,
                "state": "done",
                "parent_id": 7,
                "child_ids": [],
                "category_id": [],
                "ref_doc": false,
                "write_at": false,
                "comment": "note",
                "payload": false
            })),
        );

        let categories = state
            .rows
            .entry("res.partner.category".to_string())
            .or_default();
        for (id, name) in [(1, "Customer"), (2, "Supplier"), (3, "Partner"), (4, "Prospect")] {
            categories.insert(id, object(json!({ "name": name })));
        }

        let users = state.rows.entry("res.users".to_string()).or_default();
        users.insert(
            2,
            object(json!({"name": "Administrator", "login": "admin", "partner_id": 7})),
        );
        users.insert(
            6,
            object(json!({"name": "Demo", "login": "demo", "partner_id": false})),
        );

        state.defaults.insert(
            "res.partner".to_string(),
            object(json!({"active": true, "state": "draft", "color": 0})),
        );

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn transport(&self) -> MockTransport {
        let server = self.clone();
        MockTransport::new().with_handler(move |request| server.handle(request))
    }

    pub fn client(&self) -> (Client, MockTransport) {
        let transport = self.transport();
        let client = Client::with_transport(Server::default(), transport.clone());
        (client, transport)
    }

    /// Logged in as admin with the default config.
    pub fn login(&self) -> (Client, Environment, MockTransport) {
        self.login_with(Config::default())
    }

    pub fn login_with(&self, config: Config) -> (Client, Environment, MockTransport) {
        let (client, transport) = self.client();
        let mut client = client.with_config(config);
        let env = client.login("db", "admin", PASSWORD).unwrap();
        (client, env, transport)
    }

    /// Logged in with auto commit off.
    pub fn login_manual(&self) -> (Client, Environment, MockTransport) {
        self.login_with(Config {
            auto_commit: false,
            ..Config::default()
        })
    }

    pub fn fail_writes_for(&self, id: i64) {
        self.state.lock().unwrap().failing_writes.insert(id);
    }

    pub fn row(&self, model: &str, id: i64) -> Option<Map<String, Value>> {
        self.state.lock().unwrap().rows.get(model)?.get(&id).cloned()
    }

    /// Change a value behind the client's back.
    pub fn update_row(&self, model: &str, id: i64, field: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.rows.get_mut(model).and_then(|rows| rows.get_mut(&id)) {
            row.insert(field.to_string(), value);
        }
    }

    pub fn handle(&self, request: &RpcRequest) -> Result<Value, TransportError> {
        let arg = |i: usize| request.args.get(i).cloned().unwrap_or(Value::Null);
        match (request.service.as_str(), request.method.as_str()) {
            ("common", "version") => Ok(json!({
                "server_version": "17.0",
                "server_version_info": [17, 0, 0, "final", 0, ""],
                "protocol_version": 1
            })),
            ("common", "login") => {
                if arg(0) != json!("db") {
                    return Err(fault(format!("database {} does not exist", arg(0))));
                }
                Ok(uid_for(&arg(1), &arg(2)).map(Value::from).unwrap_or(json!(false)))
            }
            ("db", "list") => Ok(json!(["db", "demo"])),
            ("object", "execute") => {
                check_access(request)?;
                match arg(4).as_str() {
                    Some("context_get") => Ok(json!({"lang": "en_US", "tz": "Europe/Brussels"})),
                    _ => Ok(json!({ "args": &request.args[5..] })),
                }
            }
            ("object", "execute_kw") => {
                check_access(request)?;
                let model = arg(3);
                let method = arg(4);
                let args = arg(5).as_array().cloned().unwrap_or_default();
                let kwargs = arg(6);
                self.execute_kw(
                    model.as_str().unwrap_or_default(),
                    method.as_str().unwrap_or_default(),
                    &args,
                    &kwargs,
                )
            }
            (service, method) => Err(fault(format!("unknown call {}.{}", service, method))),
        }
    }

    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Value,
    ) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);

        match (model, method) {
            ("ir.model", "search") => {
                let name = arg(0)[0][2].clone();
                let known = name.as_str().is_some_and(|name| state.fields.contains_key(name));
                return Ok(if known { json!([1]) } else { json!([]) });
            }
            ("ir.model.data", "check_object_reference") => {
                return match (arg(0).as_str(), arg(1).as_str()) {
                    (Some("base"), Some("main_partner")) => Ok(json!(["res.partner", 7])),
                    (module, name) => Err(fault(format!(
                        "External ID not found in the system: {}.{}",
                        module.unwrap_or_default(),
                        name.unwrap_or_default()
                    ))),
                };
            }
            _ => {}
        }

        let fields = state
            .fields
            .get(model)
            .cloned()
            .ok_or_else(|| fault(format!("Object {} doesn't exist", model)))?;

        match method {
            "fields_get" => Ok(fields),
            "read" => {
                let names: Vec<String> = arg(1)
                    .as_array()
                    .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                let rows = state.rows.get(model).cloned().unwrap_or_default();
                let result: Vec<Value> = ids_of(&arg(0))
                    .into_iter()
                    .filter_map(|id| {
                        let row = rows.get(&id)?;
                        let mut out = Map::new();
                        out.insert("id".to_string(), json!(id));
                        for name in &names {
                            out.insert(name.clone(), row.get(name).cloned().unwrap_or(json!(false)));
                        }
                        Some(Value::Object(out))
                    })
                    .collect();
                Ok(Value::Array(result))
            }
            "write" => {
                let ids = ids_of(&arg(0));
                if ids.iter().any(|id| state.failing_writes.contains(id)) {
                    return Err(fault("write refused".to_string()));
                }
                let values = arg(1).as_object().cloned().unwrap_or_default();
                let rows = state.rows.entry(model.to_string()).or_default();
                for id in ids {
                    let Some(row) = rows.get_mut(&id) else {
                        return Err(fault(format!("Record {} does not exist", id)));
                    };
                    for (name, value) in &values {
                        let kind = fields[name.as_str()]["type"].as_str().unwrap_or_default();
                        let stored = if kind == "one2many" || kind == "many2many" {
                            let mut ids = row.get(name).map(ids_of).unwrap_or_default();
                            let commands: Vec<Command> = command::decode(value).unwrap_or_default();
                            Command::apply(&commands, &mut ids);
                            json!(ids)
                        } else {
                            value.clone()
                        };
                        row.insert(name.clone(), stored);
                    }
                }
                Ok(json!(true))
            }
            "create" => {
                let id = state.next_id;
                state.next_id += 1;
                let values = arg(0).as_object().cloned().unwrap_or_default();
                state.rows.entry(model.to_string()).or_default().insert(id, values);
                Ok(json!(id))
            }
            "unlink" => {
                let rows = state.rows.entry(model.to_string()).or_default();
                for id in ids_of(&arg(0)) {
                    rows.remove(&id);
                }
                Ok(json!(true))
            }
            "search" => {
                let ids: Vec<i64> = state
                    .rows
                    .get(model)
                    .map(|rows| rows.keys().copied().collect())
                    .unwrap_or_default();
                Ok(json!(ids))
            }
            "search_count" => Ok(json!(state.rows.get(model).map_or(0, BTreeMap::len))),
            "default_get" => {
                let defaults = state.defaults.get(model).cloned().unwrap_or_default();
                let wanted = arg(0);
                let result: Map<String, Value> = defaults
                    .into_iter()
                    .filter(|(name, _)| {
                        wanted
                            .as_array()
                            .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(name.as_str())))
                    })
                    .collect();
                Ok(Value::Object(result))
            }
            "explode" => Err(TransportError::Fault(RemoteFault {
                code: 200,
                message: "boom".to_string(),
                traceback: Some("Traceback (most recent call last):\n  ...".to_string()),
            })),
            _ => Ok(json!({ "args": args, "kwargs": kwargs })),
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn uid_for(login: &Value, password: &Value) -> Option<i64> {
    match (login.as_str()?, password.as_str()?) {
        ("admin", PASSWORD) => Some(2),
        ("demo", "demo") => Some(6),
        _ => None,
    }
}

fn check_access(request: &RpcRequest) -> Result<(), TransportError> {
    let uid = request.args.get(1).and_then(Value::as_i64);
    let password = request.args.get(2).cloned().unwrap_or(Value::Null);
    let login = match uid {
        Some(2) => json!("admin"),
        Some(6) => json!("demo"),
        _ => Value::Null,
    };
    match uid_for(&login, &password) {
        Some(_) => Ok(()),
        None => Err(fault("Access Denied".to_string())),
    }
}

fn fault(message: String) -> TransportError {
    TransportError::Fault(RemoteFault {
        code: 200,
        message,
        traceback: Some("Traceback (most recent call last):".to_string()),
    })
}

/// Number of `execute_kw` calls of `method`.
pub(crate) fn calls(transport: &MockTransport, method: &str) -> usize {
    transport
        .recorded_requests()
        .iter()
        .filter(|r| r.method == "execute_kw" && r.args.get(4).and_then(Value::as_str) == Some(method))
        .count()
}

/// Keyword arguments of the last `execute_kw` call.
pub(crate) fn last_kwargs(transport: &MockTransport) -> Value {
    transport
        .recorded_requests()
        .iter()
        .rev()
        .find(|r| r.method == "execute_kw")
        .and_then(|r| r.args.get(6).cloned())
        .unwrap_or(Value::Null)
}

/// `(ids, values, kwargs)` of every `write` call, in order.
pub(crate) fn writes(transport: &MockTransport) -> Vec<(Value, Value, Value)> {
    transport
        .recorded_requests()
        .iter()
        .filter(|r| r.method == "execute_kw" && r.args.get(4).and_then(Value::as_str) == Some("write"))
        .map(|r| {
            let args = &r.args[5];
            (args[0].clone(), args[1].clone(), r.args[6].clone())
        })
        .collect()
}
