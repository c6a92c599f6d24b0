//! Log in from, and save to, named sessions.

use objrpc_core::{Client, Environment};

pub use objrpc_session::{SessionData, SessionStore, DEFAULT_FILE_NAME};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] objrpc_session::Error),

    #[error(transparent)]
    Client(#[from] objrpc_core::Error),
}

/// Open a client on the session saved as `name` and log in.
pub fn login(store: &SessionStore, name: &str) -> Result<(Client, Environment), Error> {
    let data = store.load(name)?;
    let mut client = Client::new(data.server())?;
    client.set_timeout(data.timeout());

    tracing::debug!(session = name, host = %data.host, "opening session");
    let env = client.login(&data.database, &data.user, &data.password)?;
    Ok((client, env))
}

/// Save the client's server and credentials as `name`.
///
/// Fails with `Internal` if the client is not logged in.
pub fn save(store: &SessionStore, name: &str, client: &Client) -> Result<(), Error> {
    let credentials = client
        .credentials()
        .ok_or_else(|| objrpc_core::Error::internal("login required"))?;
    let server = client.server();

    let data = SessionData {
        host: server.host.clone(),
        protocol: server.protocol,
        port: server.port,
        timeout: client.config().timeout.map(|timeout| timeout.as_secs_f64()),
        database: credentials.db,
        user: credentials.login,
        password: credentials.password,
    };
    store.save(name, &data)?;
    Ok(())
}
