//! Resolver
//!
//! Maps a human-supplied variable name to the column(s) that may hold it.
//! Matching is by substring so partial names work; ambiguity is returned to
//! the caller as a candidate list in index order.

use crate::index::NameIndex;
use crate::query::error::{QueryError, QueryResult};
use crate::query::types::{Location, Resolution};

/// Canonical search key: lower case, spaces and colons as underscores
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace([' ', ':'], "_")
}

/// Resolve `name` against the current index contents
pub fn resolve(index: &NameIndex, name: &str) -> QueryResult<Resolution> {
    let key = normalize_name(name);
    if key.trim_matches('_').is_empty() {
        return Err(QueryError::NoMatch(name.to_string()));
    }

    let mut found: Vec<Location> = index
        .iter()
        .flat_map(|(table, columns)| {
            columns
                .iter()
                .filter(|column| column.contains(&key))
                .map(move |column| Location::new(table, column.as_str()))
        })
        .collect();

    tracing::debug!(variable = name, key = %key, matches = found.len(), "Resolved variable name");

    match found.len() {
        0 => Err(QueryError::NoMatch(name.to_string())),
        1 => Ok(Resolution::Single(found.remove(0))),
        _ => Ok(Resolution::Candidates(found)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(tables: Vec<(&str, Vec<&str>)>) -> NameIndex {
        NameIndex::from_tables(
            "measured",
            tables
                .into_iter()
                .map(|(t, cols)| (t.to_string(), cols.into_iter().map(String::from).collect()))
                .collect(),
        )
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("UCN2 Pressure:PG9L"), "ucn2_pressure_pg9l");
        assert_eq!(normalize_name("already_fine"), "already_fine");
    }

    #[test]
    fn test_single_match() {
        let idx = index(vec![("T1", vec!["foo_pressure", "_i_time"])]);
        assert_eq!(
            resolve(&idx, "pressure").unwrap(),
            Resolution::Single(Location::new("T1", "foo_pressure"))
        );
    }

    #[test]
    fn test_multiple_matches_keep_index_order() {
        let idx = index(vec![
            ("T1", vec!["foo_pressure", "_i_time"]),
            ("T2", vec!["bar_pressure", "_i_time"]),
        ]);
        assert_eq!(
            resolve(&idx, "pressure").unwrap(),
            Resolution::Candidates(vec![
                Location::new("T1", "foo_pressure"),
                Location::new("T2", "bar_pressure"),
            ])
        );
    }

    #[test]
    fn test_same_table_multiple_columns() {
        let idx = index(vec![("T1", vec!["he_temp_in", "he_temp_out", "_i_time"])]);
        let resolution = resolve(&idx, "HE TEMP").unwrap();
        assert_eq!(resolution.locations().len(), 2);
        assert!(resolution.locations().iter().all(|l| l.table == "T1"));
    }

    #[test]
    fn test_colon_and_space_normalized() {
        let idx = index(vec![("T1", vec!["ucn2_pg9l_pressure"])]);
        assert_eq!(
            resolve(&idx, "UCN2:PG9L pressure").unwrap(),
            Resolution::Single(Location::new("T1", "ucn2_pg9l_pressure"))
        );
    }

    #[test]
    fn test_no_match_is_error() {
        let idx = index(vec![("T1", vec!["foo_pressure"])]);
        let err = resolve(&idx, "voltage").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No columns found for variable voltage");

        assert!(resolve(&NameIndex::new("measured"), "pressure")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_blank_name_is_error() {
        let idx = index(vec![("T1", vec!["foo_pressure"])]);
        for name in ["", " ", "::"] {
            assert!(resolve(&idx, name).unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_every_containing_column_is_found() {
        let idx = index(vec![
            ("A", vec!["x_level", "y"]),
            ("B", vec!["level_x"]),
            ("C", vec!["levels"]),
        ]);
        let resolution = resolve(&idx, "level").unwrap();
        let tables: Vec<&str> = resolution.locations().iter().map(|l| l.table.as_str()).collect();
        assert_eq!(tables, vec!["A", "B", "C"]);
    }
}
