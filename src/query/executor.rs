//! Data Fetcher
//!
//! Runs the range query for one table and normalizes the raw rows:
//!
//! ```text
//! columns (+ time column) → SELECT … WHERE time ∈ [start, stop) → RowSet
//!   → empty? EmptyResult → rename time column → drop all-NULL columns
//!   → drop raw timing columns → key records by epoch/local time
//! ```

use crate::config::{ConfigError, SchemaConfig};
use crate::connection::{quote_ident, Connector, RowSet, Value};
use crate::query::error::{QueryError, QueryResult};
use crate::query::record::{Record, RecordSet};
use crate::query::types::TimeWindow;
use chrono_tz::Tz;

/// Fetches and normalizes measurement rows
#[derive(Debug, Clone)]
pub struct DataFetcher {
    /// Reserved epoch timestamp column
    time_column: String,
    /// Output name of the epoch timestamp
    output_time_column: String,
    /// Raw timing columns removed from output
    internal_time_columns: Vec<String>,
    /// Facility timezone
    tz: Tz,
}

impl DataFetcher {
    pub fn new(
        time_column: impl Into<String>,
        output_time_column: impl Into<String>,
        internal_time_columns: Vec<String>,
        tz: Tz,
    ) -> Self {
        Self {
            time_column: time_column.into(),
            output_time_column: output_time_column.into(),
            internal_time_columns,
            tz,
        }
    }

    /// Fetcher for the configured schema layout
    pub fn from_schema(schema: &SchemaConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            schema.time_column.clone(),
            schema.output_time_column.clone(),
            schema.internal_time_columns.clone(),
            schema.tz()?,
        ))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Fetch `columns` (all when `None`) of `table` inside `window`
    pub fn fetch(
        &self,
        conn: &mut dyn Connector,
        table: &str,
        columns: Option<&[String]>,
        window: &TimeWindow,
    ) -> QueryResult<RecordSet> {
        let mut columns = match columns {
            Some(columns) => columns.to_vec(),
            None => conn.list_columns(table)?,
        };
        if !columns.contains(&self.time_column) {
            columns.push(self.time_column.clone());
        }

        let statement = self.build_statement(conn, table, &columns, window);
        tracing::debug!(table, window = %window, "Fetching data");

        let rows = conn.query(&statement)?;
        if rows.is_empty() {
            return Err(QueryError::EmptyResult {
                table: table.to_string(),
            });
        }

        let records = self.normalize(table, rows)?;
        tracing::info!(
            "Fetched {} rows, {} columns from {}",
            records.len(),
            records.columns.len(),
            table
        );
        Ok(records)
    }

    /// Range query over the time column
    pub fn build_statement(
        &self,
        conn: &dyn Connector,
        table: &str,
        columns: &[String],
        window: &TimeWindow,
    ) -> String {
        let select = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let time = quote_ident(&self.time_column);

        format!(
            "SELECT {} FROM {} WHERE {} >= {} AND {} < {} ORDER BY {}",
            select,
            conn.qualify(table),
            time,
            window.start,
            time,
            window.stop,
            time
        )
    }

    /// Turn raw rows into a keyed record set
    fn normalize(&self, table: &str, rows: RowSet) -> QueryResult<RecordSet> {
        let RowSet { mut columns, rows } = rows;

        let time_idx = rows_time_index(&columns, &self.time_column).ok_or_else(|| {
            QueryError::InvalidTime(format!("{} has no {} column", table, self.time_column))
        })?;
        columns[time_idx] = self.output_time_column.clone();

        // Value columns: not the key, not entirely empty, not raw timing
        let keep: Vec<usize> = (0..columns.len())
            .filter(|&i| i != time_idx)
            .filter(|&i| rows.iter().any(|row| !row[i].is_null()))
            .filter(|&i| !self.internal_time_columns.contains(&columns[i]))
            .collect();

        let dropped: Vec<&str> = (0..columns.len())
            .filter(|i| *i != time_idx && !keep.contains(i))
            .map(|i| columns[i].as_str())
            .collect();
        if !dropped.is_empty() {
            tracing::debug!(table, ?dropped, "Dropped empty or internal columns");
        }

        let records = rows
            .into_iter()
            .map(|mut row| {
                let epoch = row[time_idx].as_i64().ok_or_else(|| {
                    QueryError::InvalidTime(format!(
                        "non-integer {} value in {}",
                        self.time_column, table
                    ))
                })?;
                let values = keep
                    .iter()
                    .map(|&i| std::mem::replace(&mut row[i], Value::Null))
                    .collect();
                Record::new(epoch, self.tz, values)
            })
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(RecordSet {
            source: table.to_string(),
            time_column: self.output_time_column.clone(),
            columns: keep.iter().map(|&i| columns[i].clone()).collect(),
            records,
        })
    }
}

fn rows_time_index(columns: &[String], time_column: &str) -> Option<usize> {
    columns.iter().position(|c| c == time_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionProvider, SqliteProvider};
    use rusqlite::Connection;
    use std::path::Path;
    use tempfile::tempdir;

    fn fetcher() -> DataFetcher {
        DataFetcher::new(
            "_i_time",
            "epoch_time",
            vec!["_t_time".to_string(), "_i_time".to_string()],
            chrono_tz::America::Vancouver,
        )
    }

    fn create_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE t1_measured (_i_time INTEGER, _t_time TEXT, foo_pressure REAL, baz REAL, state TEXT);
            INSERT INTO t1_measured VALUES (1000, '1000', 1.0, NULL, 'on');
            INSERT INTO t1_measured VALUES (3000, '3000', 3.0, NULL, NULL);
            INSERT INTO t1_measured VALUES (2000, '2000', 2.0, NULL, 'off');
            INSERT INTO t1_measured VALUES (4000, '4000', 4.0, 9.0, 'on');
            ",
        )
        .unwrap();
    }

    fn with_conn<T>(f: impl FnOnce(&mut dyn Connector) -> T) -> T {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        create_db(&path);
        let mut session = SqliteProvider::new(&path).open().unwrap();
        f(session.connector())
    }

    #[test]
    fn test_fetch_all_columns() {
        let window = TimeWindow::try_new(1000, 4000).unwrap();
        let rs = with_conn(|conn| fetcher().fetch(conn, "t1_measured", None, &window)).unwrap();

        // baz is entirely NULL inside the window; _t_time is internal
        assert_eq!(rs.columns, vec!["foo_pressure", "state"]);
        assert_eq!(rs.time_column, "epoch_time");
        assert_eq!(rs.source, "t1_measured");
        assert_eq!(rs.epochs(), vec![1000, 2000, 3000]);
        assert_eq!(
            rs.column("foo_pressure").unwrap(),
            vec![&Value::Float(1.0), &Value::Float(2.0), &Value::Float(3.0)]
        );
        assert_eq!(rs.column("state").unwrap()[2], &Value::Null);
    }

    #[test]
    fn test_sparse_column_kept_when_it_has_data() {
        let window = TimeWindow::try_new(0, 10_000).unwrap();
        let rs = with_conn(|conn| fetcher().fetch(conn, "t1_measured", None, &window)).unwrap();
        assert_eq!(rs.columns, vec!["foo_pressure", "baz", "state"]);
        assert_eq!(rs.len(), 4);
    }

    #[test]
    fn test_fetch_explicit_columns_appends_time() {
        let window = TimeWindow::try_new(0, 10_000).unwrap();
        let columns = vec!["foo_pressure".to_string()];
        let rs = with_conn(|conn| fetcher().fetch(conn, "t1_measured", Some(&columns), &window))
            .unwrap();
        assert_eq!(rs.columns, vec!["foo_pressure"]);
        assert_eq!(rs.epochs(), vec![1000, 2000, 3000, 4000]);
    }

    #[test]
    fn test_records_strictly_ascending() {
        let window = TimeWindow::try_new(0, 10_000).unwrap();
        let rs = with_conn(|conn| fetcher().fetch(conn, "t1_measured", None, &window)).unwrap();
        assert!(rs.epochs().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(rs.records[0].time_string(), "1969-12-31 16:16:40-08:00");
    }

    #[test]
    fn test_empty_window_is_error() {
        let window = TimeWindow::try_new(5000, 6000).unwrap();
        let err = with_conn(|conn| fetcher().fetch(conn, "t1_measured", None, &window)).unwrap_err();
        assert!(err.is_empty_result());
        assert_eq!(err.to_string(), "No data found in t1_measured");
    }

    #[test]
    fn test_window_upper_bound_exclusive() {
        let window = TimeWindow::try_new(2000, 3000).unwrap();
        let rs = with_conn(|conn| fetcher().fetch(conn, "t1_measured", None, &window)).unwrap();
        assert_eq!(rs.epochs(), vec![2000]);
    }

    #[test]
    fn test_unknown_table_is_connection_fault() {
        let window = TimeWindow::try_new(0, 10).unwrap();
        let err = with_conn(|conn| fetcher().fetch(conn, "nope_measured", None, &window)).unwrap_err();
        assert!(err.is_connection_fault());
    }

    #[test]
    fn test_build_statement() {
        let window = TimeWindow::try_new(10, 20).unwrap();
        let columns = vec!["a".to_string(), "_i_time".to_string()];
        let statement = with_conn(|conn| fetcher().build_statement(conn, "t1_measured", &columns, &window));
        assert_eq!(
            statement,
            "SELECT `a`, `_i_time` FROM `t1_measured` WHERE `_i_time` >= 10 AND `_i_time` < 20 ORDER BY `_i_time`"
        );
    }
}
