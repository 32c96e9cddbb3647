//! Table → columns catalog, built lazily once per process

use crate::connection::{ConnectionProvider, ConnectionResult};
use std::fmt;

/// Measurement tables and their column names, in enumeration order
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    /// Substring identifying measurement tables
    marker: String,
    /// Columns never offered as search results (timestamps)
    excluded: Vec<String>,
    /// (table, columns) in the order tables were enumerated
    tables: Vec<(String, Vec<String>)>,
}

/// Index statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub tables: usize,
    pub columns: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tables, {} columns", self.tables, self.columns)
    }
}

impl NameIndex {
    /// Empty index for tables containing `marker`
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            excluded: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Leave `columns` out of the index when it is built
    pub fn with_excluded_columns(mut self, columns: Vec<String>) -> Self {
        self.excluded = columns;
        self
    }

    /// Index with preset contents
    pub fn from_tables(marker: impl Into<String>, tables: Vec<(String, Vec<String>)>) -> Self {
        Self {
            marker: marker.into(),
            excluded: Vec::new(),
            tables,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Build the index if it is empty; otherwise do nothing
    ///
    /// Uses one session for the whole enumeration. Connection faults are
    /// returned as-is and leave the index empty.
    pub fn ensure_built(&mut self, provider: &dyn ConnectionProvider) -> ConnectionResult<()> {
        if !self.is_empty() {
            return Ok(());
        }

        let mut session = provider.open()?;
        let conn = session.connector();

        let mut tables = conn.list_tables()?;
        tables.sort();

        let mut built = Vec::new();
        for table in tables.into_iter().filter(|t| t.contains(&self.marker)) {
            let columns: Vec<String> = conn
                .list_columns(&table)?
                .into_iter()
                .filter(|c| !self.excluded.contains(c))
                .collect();
            tracing::debug!(table = %table, columns = columns.len(), "Indexed table");
            built.push((table, columns));
        }
        drop(session);

        self.tables = built;
        tracing::info!("Built key names index: {}", self.stats());
        Ok(())
    }

    /// Iterate `(table, columns)` in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables
            .iter()
            .map(|(table, columns)| (table.as_str(), columns.as_slice()))
    }

    /// Columns of an indexed table
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            tables: self.tables.len(),
            columns: self.tables.iter().map(|(_, c)| c.len()).sum(),
        }
    }

    /// Drop all entries; the next `ensure_built` enumerates again
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionError, Session, SqliteProvider};
    use rusqlite::Connection;
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::tempdir;

    /// Wraps a provider and counts sessions opened
    struct CountingProvider {
        inner: SqliteProvider,
        opened: Cell<usize>,
    }

    impl ConnectionProvider for CountingProvider {
        fn open(&self) -> ConnectionResult<Session> {
            self.opened.set(self.opened.get() + 1);
            self.inner.open()
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }

    fn create_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE ucn2epicspressures_measured (_i_time INTEGER, _t_time TEXT, foo_pressure REAL);
            CREATE TABLE ucn2epicstemperature_measured (_i_time INTEGER, he_temp REAL);
            CREATE TABLE ucn2epicspressures_settings (_i_time INTEGER, foo_setpoint REAL);
            ",
        )
        .unwrap();
    }

    #[test]
    fn test_build_keeps_only_marked_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let mut index = NameIndex::new("measured");
        index.ensure_built(&SqliteProvider::new(&path)).unwrap();

        let tables: Vec<&str> = index.iter().map(|(t, _)| t).collect();
        assert_eq!(
            tables,
            vec!["ucn2epicspressures_measured", "ucn2epicstemperature_measured"]
        );
        assert_eq!(
            index.columns("ucn2epicspressures_measured").unwrap(),
            &["_i_time", "_t_time", "foo_pressure"]
        );
        assert!(index.columns("ucn2epicspressures_settings").is_none());
        assert_eq!(index.stats(), IndexStats { tables: 2, columns: 5 });
    }

    #[test]
    fn test_ensure_built_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let provider = CountingProvider {
            inner: SqliteProvider::new(&path),
            opened: Cell::new(0),
        };

        let mut index = NameIndex::new("measured");
        index.ensure_built(&provider).unwrap();
        index.ensure_built(&provider).unwrap();
        index.ensure_built(&provider).unwrap();
        assert_eq!(provider.opened.get(), 1);

        index.clear();
        index.ensure_built(&provider).unwrap();
        assert_eq!(provider.opened.get(), 2);
    }

    #[test]
    fn test_connection_fault_propagates() {
        let dir = tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path().join("missing.db"));

        let mut index = NameIndex::new("measured");
        let err = index.ensure_built(&provider).unwrap_err();
        assert!(matches!(err, ConnectionError::Io(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_excluded_columns_not_indexed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);

        let mut index = NameIndex::new("measured")
            .with_excluded_columns(vec!["_i_time".to_string(), "_t_time".to_string()]);
        index.ensure_built(&SqliteProvider::new(&path)).unwrap();

        assert_eq!(
            index.columns("ucn2epicspressures_measured").unwrap(),
            &["foo_pressure"]
        );
        assert_eq!(
            index.columns("ucn2epicstemperature_measured").unwrap(),
            &["he_temp"]
        );
        assert_eq!(index.stats(), IndexStats { tables: 2, columns: 2 });
    }
}
