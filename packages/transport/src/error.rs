use std::time::Duration;

use crate::types::RemoteFault;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {message}")]
    Protocol { message: String },

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("remote fault: {0}")]
    Fault(RemoteFault),
}

impl Error {
    /// `true` when the server executed the call and reported an error.
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault(_))
    }

    /// `true` for failures that never reached a server-side handler.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_) | Error::Status { .. })
    }
}

impl From<RemoteFault> for Error {
    fn from(fault: RemoteFault) -> Self {
        Error::Fault(fault)
    }
}
