//! Connection layer error types
//!
//! Everything that can go wrong while reaching the remote store: tunnel setup,
//! credentials, the database driver itself. These surface unchanged to the
//! caller and are never retried.

use thiserror::Error;

/// Errors raised while opening or using a database session
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// SSH tunnel could not be started or never became ready
    #[error("Tunnel error: {0}")]
    Tunnel(String),

    /// No secret available for the given scope and principal
    #[error("No password found for user {principal} on {scope}")]
    Auth { scope: String, principal: String },

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    MySql(String),

    /// Table does not exist in the database
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Requested backend is not available in this build
    #[error("Backend not available: {0}")]
    Backend(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// MySQL server error `ER_NO_SUCH_TABLE`
#[cfg(feature = "mysql")]
const ER_NO_SUCH_TABLE: u16 = 1146;

#[cfg(feature = "mysql")]
impl From<mysql::Error> for ConnectionError {
    fn from(err: mysql::Error) -> Self {
        match err {
            mysql::Error::MySqlError(e) if e.code == ER_NO_SUCH_TABLE => {
                ConnectionError::UnknownTable(e.message)
            }
            other => ConnectionError::MySql(other.to_string()),
        }
    }
}

/// Result type alias for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectionError::Auth {
            scope: "ucn_history".to_string(),
            principal: "ucn_reader".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No password found for user ucn_reader on ucn_history"
        );

        let err = ConnectionError::UnknownTable("nope".to_string());
        assert_eq!(err.to_string(), "Unknown table: nope");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: ConnectionError = io_err.into();
        assert!(matches!(err, ConnectionError::Io(_)));
    }

    #[cfg(feature = "mysql")]
    #[test]
    fn test_mysql_error_classification() {
        let server_err = |code: u16, message: &str| {
            mysql::Error::MySqlError(mysql::MySqlError {
                state: "42S02".to_string(),
                message: message.to_string(),
                code,
            })
        };

        let err: ConnectionError = server_err(1146, "Table 'ucn_history.nope' doesn't exist").into();
        assert!(matches!(err, ConnectionError::UnknownTable(msg) if msg.contains("nope")));

        // A message mentioning 1146 with another code is not an unknown table
        let err: ConnectionError = server_err(1064, "syntax error near '1146'").into();
        assert!(matches!(err, ConnectionError::MySql(_)));
    }
}
