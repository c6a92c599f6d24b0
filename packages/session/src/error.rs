use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed session file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{name}' session does not exist in {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("no home directory to put the session file in")]
    NoHomeDir,
}
