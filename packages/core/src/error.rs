//! Error types for the record layer.
//!
//! The variants map to distinct remedies: fix the local input
//! ([`Error::Validation`]), fix server-side data or permissions
//! ([`Error::Rpc`]), or retry / reconfigure the network
//! ([`Error::Transport`], [`Error::Timeout`]).

use std::time::Duration;

use objrpc_transport::Error as TransportError;

/// A value rejected by a field before anything was sent to the server.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid value for '{field}': {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The call never reached a server-side handler.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("RPC call timed out after {0:?}")]
    Timeout(Duration),

    /// The server executed the call and reported an error.
    #[error("RPC error: {message}")]
    Rpc {
        code: i64,
        message: String,
        traceback: Option<String>,
    },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no '{model}' record found for ids {ids:?}")]
    RecordNotFound { model: String, ids: Vec<i64> },

    #[error("'{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    /// A precondition was violated by the caller.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_rpc(&self) -> bool {
        matches!(self, Error::Rpc { .. })
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Fault(fault) => Error::Rpc {
                code: fault.code,
                message: fault.message,
                traceback: fault.traceback,
            },
            TransportError::Timeout(timeout) => Error::Timeout(timeout),
            other => Error::Transport(other),
        }
    }
}
