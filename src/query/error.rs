//! Query error types
//!
//! Three failure classes matter to callers:
//! - connection faults (`Connection`): the store could not be reached
//! - not found (`NoMatch`, `CandidatesExhausted`): no column for the name
//! - empty result (`EmptyResult`): the query ran but the window holds no rows

use crate::connection::ConnectionError;
use crate::query::types::Location;
use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Tunnel, auth, network or driver failure
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// No column matches the variable name
    #[error("No columns found for variable {0}")]
    NoMatch(String),

    /// Every candidate location had no data in the window
    #[error("Good data not found for {name}! Paths: {}", format_locations(.tried))]
    CandidatesExhausted { name: String, tried: Vec<Location> },

    /// Query succeeded but returned no rows
    #[error("No data found in {table}")]
    EmptyResult { table: String },

    /// Date expression could not be understood
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// Resolved start lies after resolved stop
    #[error("Invalid time window: start {start} is after stop {stop}")]
    InvalidWindow { start: i64, stop: i64 },
}

impl QueryError {
    /// Name lookup failed (recoverable by asking for another name)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueryError::NoMatch(_) | QueryError::CandidatesExhausted { .. }
        )
    }

    /// Query ran but the window was empty
    pub fn is_empty_result(&self) -> bool {
        matches!(self, QueryError::EmptyResult { .. })
    }

    /// Store unreachable
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, QueryError::Connection(_))
    }
}

fn format_locations(locations: &[Location]) -> String {
    locations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(QueryError::NoMatch("x".into()).is_not_found());
        assert!(QueryError::CandidatesExhausted {
            name: "x".into(),
            tried: vec![]
        }
        .is_not_found());
        assert!(QueryError::EmptyResult { table: "t".into() }.is_empty_result());
        assert!(QueryError::from(ConnectionError::Tunnel("down".into())).is_connection_fault());
        assert!(!QueryError::EmptyResult { table: "t".into() }.is_not_found());
    }

    #[test]
    fn test_exhausted_display_lists_candidates() {
        let err = QueryError::CandidatesExhausted {
            name: "pressure".into(),
            tried: vec![
                Location::new("t1_measured", "foo_pressure"),
                Location::new("t2_measured", "bar_pressure"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Good data not found for pressure! Paths: t1_measured.foo_pressure, t2_measured.bar_pressure"
        );
    }
}
