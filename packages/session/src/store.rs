use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use objrpc_transport::{Protocol, Server};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// File name of the rc file in the home directory.
pub const DEFAULT_FILE_NAME: &str = ".objrpcrc";

/// Everything needed to reopen a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub host: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub port: u16,
    /// Seconds. `None` waits forever.
    #[serde(default)]
    pub timeout: Option<f64>,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl SessionData {
    pub fn server(&self) -> Server {
        Server::new(self.host.clone(), self.protocol, self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Named sessions stored as one JSON object in a file.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `~/.objrpcrc`.
    pub fn open_default() -> Result<Self, Error> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(Self::new(home.join(DEFAULT_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every saved session, by name. A missing file holds no session.
    pub fn list(&self) -> Result<BTreeMap<String, SessionData>, Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        tracing::debug!(path = %self.path.display(), "reading sessions");
        serde_json::from_str(&text).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })
    }

    pub fn load(&self, name: &str) -> Result<SessionData, Error> {
        self.list()?
            .remove(name)
            .ok_or_else(|| self.not_found(name))
    }

    /// Save `data` under `name`, replacing any session of that name.
    pub fn save(&self, name: &str, data: &SessionData) -> Result<(), Error> {
        let mut sessions = self.list()?;
        sessions.insert(name.to_string(), data.clone());
        self.write(&sessions)
    }

    pub fn remove(&self, name: &str) -> Result<(), Error> {
        let mut sessions = self.list()?;
        if sessions.remove(name).is_none() {
            return Err(self.not_found(name));
        }
        self.write(&sessions)
    }

    fn write(&self, sessions: &BTreeMap<String, SessionData>) -> Result<(), Error> {
        let io_error = |source| Error::Io {
            path: self.path.clone(),
            source,
        };

        let text = serde_json::to_string_pretty(sessions).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })?;
        let created = !self.path.exists();
        fs::write(&self.path, text).map_err(io_error)?;

        // Passwords live in this file.
        #[cfg(unix)]
        if created {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(io_error)?;
        }
        #[cfg(not(unix))]
        let _ = created;

        tracing::debug!(path = %self.path.display(), sessions = sessions.len(), "saved sessions");
        Ok(())
    }

    fn not_found(&self, name: &str) -> Error {
        Error::NotFound {
            name: name.to_string(),
            path: self.path.clone(),
        }
    }
}
