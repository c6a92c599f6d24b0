use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Wire protocol used to reach the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    #[serde(rename = "jsonrpc")]
    JsonRpc,
    #[serde(rename = "jsonrpc+ssl")]
    JsonRpcSsl,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::JsonRpc => "http",
            Protocol::JsonRpcSsl => "https",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::JsonRpc => "jsonrpc",
            Protocol::JsonRpcSsl => "jsonrpc+ssl",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonrpc" => Ok(Protocol::JsonRpc),
            "jsonrpc+ssl" => Ok(Protocol::JsonRpcSsl),
            other => Err(Error::UnsupportedProtocol {
                protocol: other.to_string(),
            }),
        }
    }
}

/// Address of a remote server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub port: u16,
}

impl Server {
    pub fn new(host: impl Into<String>, protocol: Protocol, port: u16) -> Self {
        Self {
            host: host.into(),
            protocol,
            port,
        }
    }

    /// Root URL of the server, e.g. `http://localhost:8069`.
    pub fn root_url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new("localhost", Protocol::JsonRpc, 8069)
    }
}

/// One remote procedure call.
///
/// `service` is the server-side service (`common`, `object`, `db`), `method`
/// the function exposed by that service and `args` its positional arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RpcRequest {
    pub service: String,

    pub method: String,

    #[serde(default)]
    pub args: Vec<Value>,

    /// Per-call timeout. Not part of the wire payload.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl RpcRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn common(method: impl Into<String>) -> Self {
        Self::new("common", method)
    }

    pub fn object(method: impl Into<String>) -> Self {
        Self::new("object", method)
    }

    pub fn db(method: impl Into<String>) -> Self {
        Self::new("db", method)
    }

    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Argument positions carrying credentials, masked when logging.
    pub fn sensitive_args(&self) -> &'static [usize] {
        match (self.service.as_str(), self.method.as_str()) {
            ("object", _) => &[2],
            ("common", "login") | ("common", "authenticate") => &[2],
            ("db", "list") | ("db", "server_version") | ("db", "db_exist") => &[],
            ("db", _) => &[0],
            _ => &[],
        }
    }

    /// The arguments with credentials replaced by `**********`.
    pub fn redacted_args(&self) -> Vec<Value> {
        let hidden = self.sensitive_args();
        self.args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                if hidden.contains(&i) {
                    Value::String("**********".to_string())
                } else {
                    arg.clone()
                }
            })
            .collect()
    }
}

/// An error reported by the server after executing a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RemoteFault {
    pub code: i64,
    pub message: String,
    /// Server-side traceback, when the server sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl RemoteFault {
    /// Build a fault from a JSON-RPC `error` object.
    ///
    /// The human readable message lives in `error.data.message` when present,
    /// falling back to `error.message`.
    pub fn from_json_error(error: &Value) -> Self {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let data = error.get("data");
        let message = data
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .or_else(|| error.get("message").and_then(Value::as_str))
            .unwrap_or("unknown server error")
            .to_string();
        let traceback = data
            .and_then(|d| d.get("debug"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            code,
            message,
            traceback,
        }
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
