//! Query input types
//!
//! - `Location`: resolved (table, column) address of a variable
//! - `Resolution`: one location or several candidates
//! - `TimeBound` / `TimeWindow`: user time input and the normalized interval
//! - `SearchQuery`: one variable name or a list of them

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Resolved address of a named variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub table: String,
    pub column: String,
}

impl Location {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Outcome of resolving a variable name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one column matched
    Single(Location),
    /// Several columns matched, in index order
    Candidates(Vec<Location>),
}

impl Resolution {
    /// All locations, in the order they should be tried
    pub fn locations(&self) -> &[Location] {
        match self {
            Resolution::Single(location) => std::slice::from_ref(location),
            Resolution::Candidates(locations) => locations,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Resolution::Candidates(_))
    }
}

/// One end of a requested time window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    /// Epoch seconds
    Epoch(i64),
    /// Absolute instant
    At(DateTime<Utc>),
    /// Free-form date expression, e.g. "March 4 12pm" or "now-2d"
    Expr(String),
}

impl From<i64> for TimeBound {
    fn from(epoch: i64) -> Self {
        TimeBound::Epoch(epoch)
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeBound::At(dt)
    }
}

impl From<&str> for TimeBound {
    fn from(expr: &str) -> Self {
        TimeBound::Expr(expr.to_string())
    }
}

impl From<String> for TimeBound {
    fn from(expr: String) -> Self {
        TimeBound::Expr(expr)
    }
}

/// Normalized half-open interval `[start, stop)` in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: i64,
    pub stop: i64,
}

impl TimeWindow {
    /// Length of the default window
    pub const DEFAULT_SPAN_SECS: i64 = 24 * 3600;

    /// Create a window, returning None unless start < stop
    pub fn try_new(start: i64, stop: i64) -> Option<Self> {
        if start < stop {
            Some(Self { start, stop })
        } else {
            None
        }
    }

    /// The trailing day ending at `stop`, None if it would underflow
    pub fn last_day(stop: i64) -> Option<Self> {
        let start = stop.checked_sub(Self::DEFAULT_SPAN_SECS)?;
        Some(Self { start, stop })
    }

    /// Check if an epoch timestamp falls within this window
    pub fn contains(&self, epoch: i64) -> bool {
        epoch >= self.start && epoch < self.stop
    }

    pub fn duration_secs(&self) -> i64 {
        self.stop.saturating_sub(self.start)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Variable names to search for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for SearchQuery {
    fn from(name: &str) -> Self {
        SearchQuery::Single(name.to_string())
    }
}

impl From<String> for SearchQuery {
    fn from(name: String) -> Self {
        SearchQuery::Single(name)
    }
}

impl From<Vec<String>> for SearchQuery {
    fn from(names: Vec<String>) -> Self {
        SearchQuery::Many(names)
    }
}

impl From<&[&str]> for SearchQuery {
    fn from(names: &[&str]) -> Self {
        SearchQuery::Many(names.iter().map(|n| n.to_string()).collect())
    }
}
