//! Normalized record sets
//!
//! A `RecordSet` is keyed by epoch time: every record carries the epoch value
//! and the facility-local time derived from it, plus one value per column.
//! Records are kept in ascending time order.

use crate::connection::Value;
use crate::query::error::{QueryError, QueryResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Display format of the local time key
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// One timestamped row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Epoch seconds (UTC)
    pub epoch_time: i64,
    /// `epoch_time` in the facility timezone
    pub time: DateTime<Tz>,
    /// Values aligned with `RecordSet::columns`
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(epoch_time: i64, tz: Tz, values: Vec<Value>) -> QueryResult<Self> {
        Ok(Self {
            epoch_time,
            time: local_time(epoch_time, tz)?,
            values,
        })
    }

    /// Human-readable time key
    pub fn time_string(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }
}

/// Convert epoch seconds to the facility timezone
pub fn local_time(epoch: i64, tz: Tz) -> QueryResult<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.with_timezone(&tz))
        .ok_or_else(|| QueryError::InvalidTime(format!("epoch {} out of range", epoch)))
}

/// Timestamped rows fetched from one or more tables
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Source table(s), comma-separated for joined sets
    pub source: String,
    /// Output name of the epoch column
    pub time_column: String,
    /// Value column names
    pub columns: Vec<String>,
    /// Records in ascending time order
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in record order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.records.iter().map(|r| &r.values[idx]).collect())
    }

    /// Epoch timestamps in record order
    pub fn epochs(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.epoch_time).collect()
    }

    /// Rename a value column; returns false if it does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Outer-join record sets on their epoch key
    ///
    /// The result has one time key and the value columns of every input in
    /// order; times missing from an input get `Null` for its columns.
    pub fn join(sets: Vec<RecordSet>, tz: Tz) -> QueryResult<RecordSet> {
        let time_column = sets
            .first()
            .map(|s| s.time_column.clone())
            .unwrap_or_default();
        let width: usize = sets.iter().map(|s| s.columns.len()).sum();

        let mut columns = Vec::with_capacity(width);
        let mut sources: Vec<String> = Vec::new();
        let mut merged: BTreeMap<i64, Vec<Value>> = BTreeMap::new();
        let mut offset = 0;

        for set in sets {
            for record in set.records {
                let row = merged
                    .entry(record.epoch_time)
                    .or_insert_with(|| vec![Value::Null; width]);
                for (i, value) in record.values.into_iter().enumerate() {
                    row[offset + i] = value;
                }
            }
            offset += set.columns.len();
            columns.extend(set.columns);
            if !sources.contains(&set.source) {
                sources.push(set.source);
            }
        }

        let records = merged
            .into_iter()
            .map(|(epoch, values)| Record::new(epoch, tz, values))
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(RecordSet {
            source: sources.join(","),
            time_column,
            columns,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TZ: Tz = chrono_tz::America::Vancouver;

    fn set(source: &str, column: &str, rows: &[(i64, f64)]) -> RecordSet {
        RecordSet {
            source: source.to_string(),
            time_column: "epoch_time".to_string(),
            columns: vec![column.to_string()],
            records: rows
                .iter()
                .map(|&(t, v)| Record::new(t, TZ, vec![Value::Float(v)]).unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_local_time() {
        // 2024-03-04 20:00:00 UTC is 12:00 PST
        let record = Record::new(1_709_582_400, TZ, vec![]).unwrap();
        assert_eq!(record.time_string(), "2024-03-04 12:00:00-08:00");

        // Daylight saving time: 2024-07-01 19:00:00 UTC is 12:00 PDT
        let record = Record::new(1_719_860_400, TZ, vec![]).unwrap();
        assert_eq!(record.time_string(), "2024-07-01 12:00:00-07:00");
    }

    #[test]
    fn test_rename_column() {
        let mut rs = set("t1", "foo_pressure", &[(1, 1.0)]);
        assert!(rs.rename_column("foo_pressure", "pressure"));
        assert!(!rs.rename_column("missing", "x"));
        assert_eq!(rs.columns, vec!["pressure"]);
    }

    #[test]
    fn test_join_outer_on_time() {
        let a = set("t1", "a", &[(10, 1.0), (20, 2.0)]);
        let b = set("t2", "b", &[(20, 20.0), (30, 30.0)]);

        let joined = RecordSet::join(vec![a, b], TZ).unwrap();
        assert_eq!(joined.columns, vec!["a", "b"]);
        assert_eq!(joined.time_column, "epoch_time");
        assert_eq!(joined.source, "t1,t2");
        assert_eq!(joined.epochs(), vec![10, 20, 30]);
        assert_eq!(
            joined.column("a").unwrap(),
            vec![&Value::Float(1.0), &Value::Float(2.0), &Value::Null]
        );
        assert_eq!(
            joined.column("b").unwrap(),
            vec![&Value::Null, &Value::Float(20.0), &Value::Float(30.0)]
        );
    }

    #[test]
    fn test_join_same_source_listed_once() {
        let a = set("t1", "a", &[(10, 1.0)]);
        let b = set("t1", "b", &[(10, 2.0)]);
        let joined = RecordSet::join(vec![a, b], TZ).unwrap();
        assert_eq!(joined.source, "t1");
        assert_eq!(joined.len(), 1);
    }
}
