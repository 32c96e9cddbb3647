//! Row and cell types shared by every backend
//!
//! - `Value`: a single cell as returned by the driver
//! - `RowSet`: the raw result of one statement (column names + rows)

use serde::{Serialize, Serializer};
use std::fmt;

/// A single cell returned by a query
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse text returned by a text-protocol driver into the narrowest type
    pub fn from_text(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Text(text.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the cell, truncating floats
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// First cell as a string, used for catalog listings
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Raw result of a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in select order
    pub columns: Vec<String>,
    /// One `Vec<Value>` per row, aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of the first column, skipping NULLs
    pub fn first_column(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first().and_then(Value::as_string))
            .collect()
    }
}

/// Quote an identifier with backticks (accepted by both MySQL and SQLite)
pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_text() {
        assert_eq!(Value::from_text("42"), Value::Int(42));
        assert_eq!(Value::from_text("1.5e-3"), Value::Float(0.0015));
        assert_eq!(Value::from_text("open"), Value::Text("open".to_string()));
    }

    #[test]
    fn test_value_display_and_json() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Int(7)).unwrap(), "7");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("foo_pressure"), "`foo_pressure`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_first_column_skips_nulls() {
        let rows = RowSet {
            columns: vec!["Field".to_string(), "Type".to_string()],
            rows: vec![
                vec![Value::Text("a".into()), Value::Text("int".into())],
                vec![Value::Null, Value::Text("int".into())],
                vec![Value::Text("b".into()), Value::Null],
            ],
        };
        assert_eq!(rows.first_column(), vec!["a", "b"]);
        assert_eq!(rows.column_index("Type"), Some(1));
    }
}
