//! SQLite backend
//!
//! Reads a local SQLite copy of the history database. The file is opened
//! read-only; every `open()` yields a fresh connection.

use super::{ConnectionProvider, ConnectionResult, Connector, RowSet, Session, Value};
use crate::connection::ConnectionError;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Provider for a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: PathBuf,
}

impl SqliteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for SqliteProvider {
    fn open(&self) -> ConnectionResult<Session> {
        let connector = SqliteConnector::open(&self.path)?;
        Ok(Session::new(Box::new(connector)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Live SQLite connection
pub struct SqliteConnector {
    conn: Connection,
}

impl SqliteConnector {
    /// Open an existing database file read-only
    pub fn open(path: &Path) -> ConnectionResult<Self> {
        if !path.exists() {
            return Err(ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database file not found: {}", path.display()),
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!("Opened SQLite database {:?}", path);

        Ok(Self { conn })
    }
}

impl Connector for SqliteConnector {
    fn list_tables(&mut self) -> ConnectionResult<Vec<String>> {
        let rows = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        Ok(rows.first_column())
    }

    fn list_columns(&mut self, table: &str) -> ConnectionResult<Vec<String>> {
        let rows = self.query(&format!(
            "PRAGMA table_info('{}')",
            table.replace('\'', "''")
        ))?;
        let name_idx = rows.column_index("name").unwrap_or(1);

        let columns: Vec<String> = rows
            .rows
            .iter()
            .filter_map(|row| row.get(name_idx).and_then(Value::as_string))
            .collect();

        // PRAGMA answers an unknown table with zero rows instead of an error
        if columns.is_empty() {
            return Err(ConnectionError::UnknownTable(table.to_string()));
        }
        Ok(columns)
    }

    fn query(&mut self, statement: &str) -> ConnectionResult<RowSet> {
        tracing::trace!(statement, "sqlite query");
        let mut stmt = self.conn.prepare(statement)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(value_from_ref))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RowSet { columns, rows })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE beta_measured (_i_time INTEGER, level REAL);
            CREATE TABLE alpha_settings (_i_time INTEGER, setpoint REAL);
            INSERT INTO beta_measured VALUES (100, 1.5), (200, NULL);
            ",
        )
        .unwrap();
    }

    #[test]
    fn test_list_tables_and_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let provider = SqliteProvider::new(&path);
        let mut session = provider.open().unwrap();

        let mut tables = session.connector().list_tables().unwrap();
        tables.sort();
        assert_eq!(tables, vec!["alpha_settings", "beta_measured"]);

        let columns = session.connector().list_columns("beta_measured").unwrap();
        assert_eq!(columns, vec!["_i_time", "level"]);
    }

    #[test]
    fn test_unknown_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let mut session = SqliteProvider::new(&path).open().unwrap();
        let err = session.connector().list_columns("missing").unwrap_err();
        assert!(matches!(err, ConnectionError::UnknownTable(_)));
    }

    #[test]
    fn test_query_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let mut session = SqliteProvider::new(&path).open().unwrap();
        let rows = session
            .connector()
            .query("SELECT `_i_time`, `level` FROM `beta_measured` ORDER BY `_i_time`")
            .unwrap();

        assert_eq!(rows.columns, vec!["_i_time", "level"]);
        assert_eq!(
            rows.rows,
            vec![
                vec![Value::Int(100), Value::Float(1.5)],
                vec![Value::Int(200), Value::Null],
            ]
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path().join("absent.db"));
        assert!(matches!(provider.open(), Err(ConnectionError::Io(_))));
    }
}
