//! Named sessions for objrpc.
//!
//! A session is a server address plus credentials, saved under a name in a
//! JSON rc file (`~/.objrpcrc` by default) so a client can log in again
//! without repeating them.

mod error;
mod store;

pub use error::Error;
pub use store::{SessionData, SessionStore, DEFAULT_FILE_NAME};
