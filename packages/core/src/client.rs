use std::rc::Rc;
use std::time::Duration;

use objrpc_transport::{JsonRpcTransport, RpcRequest, Server, Transport};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::connection::{Connection, Credentials};
use crate::env::{Context, Environment};
use crate::error::Error;

/// Entry point: a server address, options and, once logged in, a session.
///
/// ```no_run
/// use objrpc_core::Client;
/// use objrpc_transport::Server;
///
/// let mut client = Client::new(Server::default())?;
/// let env = client.login("db", "admin", "admin")?;
/// let partner = env.model("res.partner")?.browse(1);
/// println!("{:?}", partner.field("name")?);
/// # Ok::<(), objrpc_core::Error>(())
/// ```
pub struct Client {
    conn: Rc<Connection>,
    env: Option<Environment>,
}

impl Client {
    /// Client talking JSON-RPC over HTTP to `server`.
    pub fn new(server: Server) -> Result<Self, Error> {
        let transport = JsonRpcTransport::new(&server).map_err(|e| {
            Error::internal(format!("invalid server address {}: {}", server.root_url(), e))
        })?;
        Ok(Self::with_transport(server, transport))
    }

    pub fn with_transport(server: Server, transport: impl Transport + 'static) -> Self {
        Self {
            conn: Rc::new(Connection::new(
                Box::new(transport),
                server,
                Config::default(),
            )),
            env: None,
        }
    }

    pub fn with_config(self, config: Config) -> Self {
        self.conn.set_config(config);
        self
    }

    pub fn server(&self) -> &Server {
        self.conn.server()
    }

    pub fn config(&self) -> Config {
        self.conn.config()
    }

    /// Applies to every environment of this client from the next call on.
    pub fn set_config(&mut self, config: Config) {
        self.conn.set_config(config);
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.update_config(|config| config.timeout = timeout);
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.update_config(|config| config.auto_commit = auto_commit);
    }

    pub fn set_auto_context(&mut self, auto_context: bool) {
        self.update_config(|config| config.auto_context = auto_context);
    }

    fn update_config(&mut self, update: impl FnOnce(&mut Config)) {
        let mut config = self.conn.config();
        update(&mut config);
        self.conn.set_config(config);
    }

    /// Version string reported by the server.
    pub fn version(&self) -> Result<String, Error> {
        let info = self.conn.invoke(RpcRequest::common("version"))?;
        info.get("server_version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::internal(format!("unexpected version reply: {}", info)))
    }

    /// Databases hosted by the server.
    pub fn db_list(&self) -> Result<Vec<String>, Error> {
        let names = self.conn.invoke(RpcRequest::db("list"))?;
        Ok(names
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Log in and return a fresh environment for the user.
    ///
    /// The environment's context is the user context reported by the server,
    /// plus `uid`.
    pub fn login(&mut self, db: &str, login: &str, password: &str) -> Result<Environment, Error> {
        let request = RpcRequest::common("login")
            .with_arg(db)
            .with_arg(login)
            .with_arg(password);

        let uid = match self.conn.invoke(request) {
            Ok(uid) => uid.as_i64().filter(|uid| *uid > 0),
            Err(Error::Rpc { message, .. }) => return Err(Error::Authentication { message }),
            Err(e) => return Err(e),
        };
        let uid = uid.ok_or_else(|| Error::Authentication {
            message: format!("wrong login or password for '{}' on '{}'", login, db),
        })?;

        self.conn.set_credentials(Some(Credentials {
            db: db.to_string(),
            login: login.to_string(),
            uid,
            password: password.to_string(),
        }));

        let mut context = match self.conn.execute(db, uid, "res.users", "context_get", Vec::new()) {
            Ok(Value::Object(context)) => context,
            Ok(_) => Context::new(),
            Err(e) => {
                self.conn.set_credentials(None);
                self.env = None;
                return Err(e);
            }
        };
        context.insert("uid".to_string(), Value::from(uid));

        tracing::debug!(db, login, uid, "logged in");
        let env = Environment::new(Rc::clone(&self.conn), db.to_string(), uid, context);
        self.env = Some(env.clone());
        Ok(env)
    }

    /// Forget the session. Returns `false` if nobody was logged in.
    ///
    /// Environments obtained before stop working.
    pub fn logout(&mut self) -> bool {
        let logged_in = self.conn.credentials().is_some();
        self.conn.set_credentials(None);
        self.env = None;
        logged_in
    }

    /// Environment of the current session.
    pub fn env(&self) -> Result<Environment, Error> {
        self.env
            .clone()
            .ok_or_else(|| Error::internal("login required"))
    }

    /// Credentials of the current session.
    pub fn credentials(&self) -> Option<Credentials> {
        self.conn.credentials()
    }

    /// `object.execute` with positional arguments.
    pub fn execute(&self, model: &str, method: &str, args: Vec<Value>) -> Result<Value, Error> {
        let credentials = self.require_login()?;
        self.conn
            .execute(&credentials.db, credentials.uid, model, method, args)
    }

    /// `object.execute_kw` with positional and keyword arguments.
    pub fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, Error> {
        let credentials = self.require_login()?;
        self.conn
            .execute_kw(&credentials.db, credentials.uid, model, method, args, kwargs)
    }

    fn require_login(&self) -> Result<Credentials, Error> {
        self.conn
            .credentials()
            .ok_or_else(|| Error::internal("login required"))
    }
}
