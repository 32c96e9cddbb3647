//! Connection Layer
//!
//! Access to the remote history store:
//!
//! - **types**: `Value` and `RowSet`, the raw shape of query results
//! - **sqlite**: read-only SQLite backend (local mirrors, tests)
//! - **mysql_tunnel**: MySQL backend behind an SSH tunnel (feature `mysql`)
//! - **tunnel**: `ssh -L` port forwarding with guard semantics
//! - **credentials**: secret lookup for database logins
//! - **error**: Error types
//!
//! # Lifetime
//!
//! ```text
//! provider.open() → Session { connector, tunnel } → query ... → drop
//!                                                      (connector closed, then tunnel)
//! ```
//!
//! A `Session` is opened right before a query sequence and dropped right after,
//! including on the error path. Nothing holds a session between calls.

pub mod credentials;
pub mod error;
#[cfg(feature = "mysql")]
pub mod mysql_tunnel;
pub mod sqlite;
pub mod tunnel;
pub mod types;

pub use credentials::{CredentialStore, EnvCredentials, StaticCredentials};
pub use error::{ConnectionError, ConnectionResult};
#[cfg(feature = "mysql")]
pub use mysql_tunnel::{MySqlConnector, TunneledMySqlProvider};
pub use sqlite::{SqliteConnector, SqliteProvider};
pub use tunnel::SshTunnel;
pub use types::{quote_ident, RowSet, Value};

use crate::config::{Config, DatabaseBackend};

/// A live database handle able to run statements
pub trait Connector {
    /// All table names in the database
    fn list_tables(&mut self) -> ConnectionResult<Vec<String>>;

    /// Column names of one table, in table order
    fn list_columns(&mut self, table: &str) -> ConnectionResult<Vec<String>>;

    /// Run a statement and collect every row
    fn query(&mut self, statement: &str) -> ConnectionResult<RowSet>;

    /// Fully qualified, quoted table reference for use in statements
    fn qualify(&self, table: &str) -> String {
        quote_ident(table)
    }

    /// Release the underlying connection
    fn close(&mut self) {}
}

/// Opens sessions against the history store
pub trait ConnectionProvider {
    fn open(&self) -> ConnectionResult<Session>;

    /// Human-readable description of the target, used in export headers
    fn describe(&self) -> String;
}

/// Scoped connection: connector plus the tunnel it runs through
///
/// Dropping the session closes the connector first, then stops the tunnel.
pub struct Session {
    connector: Box<dyn Connector>,
    tunnel: Option<SshTunnel>,
}

impl Session {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            tunnel: None,
        }
    }

    /// Session whose connector runs through `tunnel`
    pub fn tunneled(connector: Box<dyn Connector>, tunnel: SshTunnel) -> Self {
        Self {
            connector,
            tunnel: Some(tunnel),
        }
    }

    pub fn connector(&mut self) -> &mut dyn Connector {
        self.connector.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connector.close();
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.stop();
        }
        tracing::trace!("Session closed");
    }
}

/// Build the provider selected by the configuration
pub fn provider_from_config(config: &Config) -> ConnectionResult<Box<dyn ConnectionProvider>> {
    match config.database.backend {
        DatabaseBackend::Sqlite => {
            let path = config.database.path.as_ref().ok_or_else(|| {
                ConnectionError::Backend("sqlite backend requires database.path".to_string())
            })?;
            Ok(Box::new(SqliteProvider::new(path)))
        }
        #[cfg(feature = "mysql")]
        DatabaseBackend::Mysql => Ok(Box::new(TunneledMySqlProvider::new(
            config.ssh.clone(),
            config.database.clone(),
            Box::new(EnvCredentials::new()),
        ))),
        #[cfg(not(feature = "mysql"))]
        DatabaseBackend::Mysql => Err(ConnectionError::Backend(
            "mysql support not compiled in (rebuild with --features mysql)".to_string(),
        )),
    }
}
