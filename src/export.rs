//! CSV Export
//!
//! Writes a record set as a commented CSV file:
//!
//! ```text
//! # Contents of database ucn_history.ucn2_measured
//! # Host: daq01.ucn.triumf.ca
//! # 2024-03-06 12:30:00
//! #
//! time,epoch_time,pressure
//! 2024-03-06 00:00:00-08:00,1709712000,1.5
//! ```

use crate::query::RecordSet;
use chrono::{Local, NaiveDate};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while exporting
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Provenance lines written above the table
#[derive(Debug, Clone)]
pub struct ExportHeader {
    pub database: String,
    pub table: String,
    pub host: String,
    /// When the file was produced
    pub generated: String,
}

impl ExportHeader {
    /// Header stamped with the current local time
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            host: host.into(),
            generated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    fn lines(&self) -> [String; 4] {
        [
            format!("# Contents of database {}.{}", self.database, self.table),
            format!("# Host: {}", self.host),
            format!("# {}", self.generated),
            "#".to_string(),
        ]
    }
}

/// `<yymmdd>_<table>.csv`
pub fn default_filename(table: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", date.format("%y%m%d"), table)
}

/// Replace whatever extension `path` has with `.csv`
pub fn csv_path(path: &Path) -> PathBuf {
    path.with_extension("csv")
}

/// Write header and records to `path` (extension forced to `.csv`)
///
/// Returns the path actually written.
pub fn write_csv(
    path: &Path,
    records: &RecordSet,
    header: &ExportHeader,
) -> Result<PathBuf, ExportError> {
    let path = csv_path(path);
    let io_err = |error| ExportError::Io {
        path: path.clone(),
        error,
    };

    let file = File::create(&path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write_records(&mut out, records, header)?;
    out.flush().map_err(io_err)?;

    tracing::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(path)
}

/// Write header and records to any writer
pub fn write_records<W: Write>(
    mut out: W,
    records: &RecordSet,
    header: &ExportHeader,
) -> Result<(), ExportError> {
    for line in header.lines() {
        writeln!(out, "{}", line).map_err(csv::Error::from)?;
    }

    let mut writer = csv::Writer::from_writer(out);

    let mut head = vec!["time", records.time_column.as_str()];
    head.extend(records.columns.iter().map(String::as_str));
    writer.write_record(&head)?;

    for record in &records.records {
        let mut row = Vec::with_capacity(record.values.len() + 2);
        row.push(record.time_string());
        row.push(record.epoch_time.to_string());
        row.extend(record.values.iter().map(ToString::to_string));
        writer.write_record(&row)?;
    }

    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Value;
    use crate::query::Record;
    use tempfile::tempdir;

    const TZ: chrono_tz::Tz = chrono_tz::America::Vancouver;

    fn records() -> RecordSet {
        RecordSet {
            source: "ucn2_measured".to_string(),
            time_column: "epoch_time".to_string(),
            columns: vec!["pressure".to_string(), "state".to_string()],
            records: vec![
                Record::new(1709712000, TZ, vec![Value::Float(1.5), Value::Text("on".into())])
                    .unwrap(),
                Record::new(1709715600, TZ, vec![Value::Null, Value::Text("a, b".into())])
                    .unwrap(),
            ],
        }
    }

    fn header() -> ExportHeader {
        ExportHeader {
            database: "ucn_history".to_string(),
            table: "ucn2_measured".to_string(),
            host: "daq01".to_string(),
            generated: "2024-03-06 12:30:00".to_string(),
        }
    }

    #[test]
    fn test_write_records() {
        let mut buf = Vec::new();
        write_records(&mut buf, &records(), &header()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let expected = "\
# Contents of database ucn_history.ucn2_measured
# Host: daq01
# 2024-03-06 12:30:00
#
time,epoch_time,pressure,state
2024-03-06 00:00:00-08:00,1709712000,1.5,on
2024-03-06 01:00:00-08:00,1709715600,,\"a, b\"
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_write_csv_forces_extension() {
        let dir = tempdir().unwrap();
        let written = write_csv(&dir.path().join("out.txt"), &records(), &header()).unwrap();

        assert_eq!(written, dir.path().join("out.csv"));
        let content = std::fs::read_to_string(&written).unwrap();
        assert!(content.starts_with("# Contents of database"));
        assert_eq!(content.lines().count(), 7);
    }

    #[test]
    fn test_write_csv_bad_directory() {
        let dir = tempdir().unwrap();
        let err = write_csv(&dir.path().join("missing/out.csv"), &records(), &header()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn test_default_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert_eq!(default_filename("ucn2_measured", date), "240306_ucn2_measured.csv");
    }

    #[test]
    fn test_csv_path() {
        assert_eq!(csv_path(Path::new("data")), PathBuf::from("data.csv"));
        assert_eq!(csv_path(Path::new("data.csv")), PathBuf::from("data.csv"));
        assert_eq!(csv_path(Path::new("dir/data.tsv")), PathBuf::from("dir/data.csv"));
    }
}
