//! # objrpc
//!
//! Client for servers exposing business models over JSON-RPC.
//!
//! Models are reached through an [`Environment`] obtained at login; their
//! records are [`Recordset`]s that read lazily and write on commit.
//!
//! ```no_run
//! use objrpc::{Client, Server};
//!
//! let mut client = Client::new(Server::default())?;
//! let env = client.login("db", "admin", "admin")?;
//!
//! let partners = env.model("res.partner")?;
//! for partner in &partners.browse(partners.search(serde_json::json!([]))?) {
//!     println!("{:?}", partner.field("name")?);
//! }
//! # Ok::<(), objrpc::Error>(())
//! ```
//!
//! Sessions saved with [`session::save`] can be reopened with
//! [`session::login`].

pub mod session;

pub use objrpc_core::{
    Client, Command, Config, Context, Credentials, Environment, Error, Field, FieldKind,
    FieldValue, Ids, Model, ModelSchema, Recordset, ValidationError, DEFAULT_TIMEOUT,
};
pub use objrpc_transport::{JsonRpcTransport, Protocol, RemoteFault, RpcRequest, Server, Transport};

/// Transport layer, for custom [`Transport`] implementations.
pub mod transport {
    pub use objrpc_transport::Error;
}
