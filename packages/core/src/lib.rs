//! objrpc core: remote business objects as local values
//!
//! This layer turns the plain `invoke(service, method, args)` primitive of
//! `objrpc-transport` into an object model:
//! - `Client`: server address, options and the login session
//! - `Environment`: database, user and context, plus the caches shared by
//!   environments derived from one another
//! - `Model`: one remote model, with by-name method dispatch
//! - `Recordset`: records of a model, read lazily and written on commit
//! - `Field`: typed descriptors driving validation and conversion
//!
//! # Example
//!
//! ```no_run
//! use objrpc_core::{Client, FieldValue};
//! use objrpc_transport::Server;
//!
//! let mut client = Client::new(Server::default())?;
//! client.set_auto_commit(false);
//! let env = client.login("db", "admin", "admin")?;
//!
//! let partner = env.model("res.partner")?.browse(1);
//! partner.set("name", "Acme")?;
//! partner.set("category_id", vec![3, 4])?;
//! env.commit()?;
//!
//! assert_eq!(partner.field("name")?, FieldValue::from("Acme"));
//! # Ok::<(), objrpc_core::Error>(())
//! ```
//!
//! Environments and recordsets are `!Send`: use one client per thread.

mod client;
mod command;
mod config;
mod connection;
mod env;
mod error;
mod field;
mod model;
mod recordset;
mod value;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use command::Command;
pub use config::{Config, DEFAULT_TIMEOUT};
pub use connection::Credentials;
pub use env::{Context, Environment};
pub use error::{Error, ValidationError};
pub use field::{Field, FieldKind, DATETIME_FORMAT, DATE_FORMAT};
pub use model::{Model, ModelSchema};
pub use recordset::{Ids, Recordset};
pub use value::FieldValue;
