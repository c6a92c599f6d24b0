use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client-wide options, shared by every environment of a client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Flush a record as soon as one of its fields is assigned.
    pub auto_commit: bool,

    /// Send the environment context with every model method call that does
    /// not carry its own.
    pub auto_context: bool,

    /// Maximum duration of a single RPC call. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_commit: true,
            auto_context: true,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}
