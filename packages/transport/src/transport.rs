//! RPC execution abstraction.
//!
//! Everything above this module talks to the server through [`Transport`],
//! which can be backed by the real JSON-RPC client or by a mock in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::blocking::Client;
use serde_json::{json, Value};
use url::Url;

use crate::error::Error;
use crate::types::{RemoteFault, RpcRequest, Server};

/// Executes remote procedure calls.
///
/// Implementations return the call's result, [`Error::Fault`] when the server
/// reports an error, and any other variant for failures on the way there.
pub trait Transport: Send + Sync {
    fn invoke(&self, request: &RpcRequest) -> Result<Value, Error>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn invoke(&self, request: &RpcRequest) -> Result<Value, Error> {
        (**self).invoke(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn invoke(&self, request: &RpcRequest) -> Result<Value, Error> {
        (**self).invoke(request)
    }
}

/// JSON-RPC 2.0 over HTTP POST to `<root>/jsonrpc`.
pub struct JsonRpcTransport {
    client: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(server: &Server) -> Result<Self, Error> {
        let client = Client::builder().build()?;
        Self::with_client(client, server)
    }

    /// Use a preconfigured reqwest client (proxies, TLS settings, auth headers).
    pub fn with_client(client: Client, server: &Server) -> Result<Self, Error> {
        let endpoint = Url::parse(&server.root_url())?.join("jsonrpc")?;

        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for JsonRpcTransport {
    fn invoke(&self, request: &RpcRequest) -> Result<Value, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": request,
            "id": id,
        });

        let args = Value::Array(request.redacted_args());
        tracing::debug!(
            url = %self.endpoint,
            service = %request.service,
            method = %request.method,
            args = %args,
            "(JSON,send)"
        );

        let mut builder = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(|e| map_send_error(e, request))?;
        let status = response.status();
        let body_text = response.text().map_err(|e| map_send_error(e, request))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body: Value = serde_json::from_str(&body_text)?;
        let result = parse_response(body);

        tracing::debug!(
            url = %self.endpoint,
            service = %request.service,
            method = %request.method,
            ok = result.is_ok(),
            "(JSON,recv)"
        );

        result
    }
}

fn map_send_error(error: reqwest::Error, request: &RpcRequest) -> Error {
    match request.timeout {
        Some(timeout) if error.is_timeout() => Error::Timeout(timeout),
        _ => Error::Http(error),
    }
}

/// Extract the `result` member of a JSON-RPC response, or its `error` as a fault.
pub(crate) fn parse_response(body: Value) -> Result<Value, Error> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(Error::Fault(RemoteFault::from_json_error(error)));
    }

    match body {
        Value::Object(mut map) => map.remove("result").ok_or_else(|| Error::Protocol {
            message: "response has neither 'result' nor 'error'".to_string(),
        }),
        other => Err(Error::Protocol {
            message: format!("expected a JSON object, got {}", other),
        }),
    }
}

/// Mock transport for testing.
///
/// Answers from a handler closure or from canned responses keyed by
/// `service.method`, and records every request it sees.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Handler = dyn Fn(&RpcRequest) -> Result<Value, Error> + Send + Sync;

    #[derive(Clone, Default)]
    pub struct MockTransport {
        /// Canned results keyed by `service.method`.
        responses: Arc<Mutex<HashMap<String, Value>>>,
        /// Takes precedence over canned results when set.
        handler: Arc<Mutex<Option<Arc<Handler>>>>,
        recorded_requests: Arc<Mutex<Vec<RpcRequest>>>,
        /// Fail every call with this fault message.
        fail_all: Arc<Mutex<Option<String>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, service_method: impl Into<String>, result: Value) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(service_method.into(), result);
            self
        }

        pub fn with_handler<F>(self, handler: F) -> Self
        where
            F: Fn(&RpcRequest) -> Result<Value, Error> + Send + Sync + 'static,
        {
            *self.handler.lock().unwrap() = Some(Arc::new(handler));
            self
        }

        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.fail_all.lock().unwrap() = Some(message.into());
            self
        }

        pub fn recorded_requests(&self) -> Vec<RpcRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.recorded_requests.lock().unwrap().len()
        }

        pub fn clear_recorded(&self) {
            self.recorded_requests.lock().unwrap().clear();
        }
    }

    impl Transport for MockTransport {
        fn invoke(&self, request: &RpcRequest) -> Result<Value, Error> {
            self.recorded_requests.lock().unwrap().push(request.clone());

            if let Some(message) = self.fail_all.lock().unwrap().clone() {
                return Err(Error::Fault(RemoteFault {
                    code: 0,
                    message,
                    traceback: None,
                }));
            }

            let handler = self.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                return handler(request);
            }

            let key = format!("{}.{}", request.service, request.method);
            match self.responses.lock().unwrap().get(&key) {
                Some(result) => Ok(result.clone()),
                None => Err(Error::Fault(RemoteFault {
                    code: 0,
                    message: format!("no mock response for {}", key),
                    traceback: None,
                })),
            }
        }
    }
}
