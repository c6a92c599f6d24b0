use std::cell::{Cell, RefCell};
use std::fmt;

use objrpc_transport::{RpcRequest, Server, Transport};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::Error;

/// Credentials of the active login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub db: String,
    pub login: String,
    pub uid: i64,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("db", &self.db)
            .field("login", &self.login)
            .field("uid", &self.uid)
            .field("password", &"**********")
            .finish()
    }
}

/// State shared by a client and every environment derived from it.
pub(crate) struct Connection {
    transport: Box<dyn Transport>,
    server: Server,
    config: Cell<Config>,
    credentials: RefCell<Option<Credentials>>,
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>, server: Server, config: Config) -> Self {
        Self {
            transport,
            server,
            config: Cell::new(config),
            credentials: RefCell::new(None),
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn config(&self) -> Config {
        self.config.get()
    }

    pub fn set_config(&self, config: Config) {
        self.config.set(config);
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.borrow().clone()
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.borrow_mut() = credentials;
    }

    /// Send one request with the configured timeout.
    pub fn invoke(&self, request: RpcRequest) -> Result<Value, Error> {
        let request = request.with_timeout(self.config().timeout);
        self.transport.invoke(&request).map_err(Error::from)
    }

    /// Credentials for an environment bound to `db` / `uid`.
    ///
    /// Fails once the client logged out or logged in as someone else.
    fn session_for(&self, db: &str, uid: i64) -> Result<Credentials, Error> {
        match self.credentials() {
            Some(credentials) if credentials.db == db && credentials.uid == uid => {
                Ok(credentials)
            }
            Some(_) => Err(Error::internal(
                "environment belongs to a previous login",
            )),
            None => Err(Error::internal("login required")),
        }
    }

    /// `object.execute`: positional arguments only.
    pub fn execute(
        &self,
        db: &str,
        uid: i64,
        model: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        let credentials = self.session_for(db, uid)?;
        let request = RpcRequest::object("execute")
            .with_arg(credentials.db)
            .with_arg(credentials.uid)
            .with_arg(credentials.password)
            .with_arg(model)
            .with_arg(method)
            .with_args(args);
        self.invoke(request)
    }

    /// `object.execute_kw`: positional and keyword arguments.
    pub fn execute_kw(
        &self,
        db: &str,
        uid: i64,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, Error> {
        let credentials = self.session_for(db, uid)?;
        let request = RpcRequest::object("execute_kw")
            .with_arg(credentials.db)
            .with_arg(credentials.uid)
            .with_arg(credentials.password)
            .with_arg(model)
            .with_arg(method)
            .with_arg(Value::Array(args))
            .with_arg(Value::Object(kwargs));
        self.invoke(request)
    }
}
