//! # objrpc-transport
//!
//! Remote procedure call transports for objrpc.
//!
//! The rest of the workspace sees the server as a single primitive:
//! [`Transport::invoke`] takes an [`RpcRequest`] (service, method, positional
//! arguments) and returns the call's JSON result, or an [`Error`]. A fault
//! raised by the server arrives as [`Error::Fault`]; everything else is a
//! failure to reach it.
//!
//! ```ignore
//! use objrpc_transport::{JsonRpcTransport, RpcRequest, Server, Transport};
//!
//! let transport = JsonRpcTransport::new(&Server::default())?;
//! let version = transport.invoke(&RpcRequest::common("version"))?;
//! ```

pub mod error;
pub mod transport;
pub mod types;

pub use error::Error;
pub use transport::{JsonRpcTransport, Transport};
pub use types::{Protocol, RemoteFault, RpcRequest, Server};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::mock::MockTransport;
