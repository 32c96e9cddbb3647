//! Query Orchestrator
//!
//! `History` ties the pieces together: it owns the connection provider, the
//! lazily built name index, the window normalizer and the data fetcher.
//!
//! ```text
//! search_data(name) → locate → [candidates in index order]
//!                              → fetch → EmptyResult? try next
//!                              → rename column to `name`
//! search_data([a, b]) → search_data(a), search_data(b) → join on epoch
//! ```
//!
//! Every call that touches the store opens its own `Session` and drops it
//! before returning, so no connection outlives a call.

use crate::config::{Config, ConfigError};
use crate::connection::ConnectionProvider;
use crate::index::{IndexStats, NameIndex};
use crate::query::{
    resolve, DataFetcher, DateParser, Location, QueryError, QueryResult, RecordSet, Resolution,
    SearchQuery, TimeBound, TimeWindow, WindowNormalizer,
};
use chrono_tz::Tz;

/// Entry point for catalog lookups, fetches and searches
pub struct History {
    provider: Box<dyn ConnectionProvider>,
    index: NameIndex,
    normalizer: WindowNormalizer,
    fetcher: DataFetcher,
}

impl History {
    /// Create a history client over `provider` with the configured schema layout
    pub fn new(config: &Config, provider: Box<dyn ConnectionProvider>) -> Result<Self, ConfigError> {
        let schema = &config.schema;
        let tz = schema.tz()?;

        let mut timing = schema.internal_time_columns.clone();
        if !timing.contains(&schema.time_column) {
            timing.push(schema.time_column.clone());
        }

        Ok(Self {
            provider,
            index: NameIndex::new(schema.measurement_marker.clone()).with_excluded_columns(timing),
            normalizer: WindowNormalizer::new(DateParser::new(tz, schema.dayfirst)),
            fetcher: DataFetcher::from_schema(schema)?,
        })
    }

    pub fn provider(&self) -> &dyn ConnectionProvider {
        self.provider.as_ref()
    }

    pub fn timezone(&self) -> Tz {
        self.fetcher.timezone()
    }

    pub fn normalizer(&self) -> &WindowNormalizer {
        &self.normalizer
    }

    /// Size of the name index (empty until the first search)
    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// All table names, sorted
    pub fn tables(&self) -> QueryResult<Vec<String>> {
        let mut session = self.provider.open()?;
        let mut tables = session.connector().list_tables()?;
        tables.sort();
        Ok(tables)
    }

    /// Column names of one table
    pub fn columns(&self, table: &str) -> QueryResult<Vec<String>> {
        let mut session = self.provider.open()?;
        Ok(session.connector().list_columns(table)?)
    }

    /// Resolve a variable name without fetching
    pub fn locate(&mut self, name: &str) -> QueryResult<Resolution> {
        self.index.ensure_built(self.provider.as_ref())?;
        resolve(&self.index, name)
    }

    /// Normalize user start/stop input into a window
    pub fn window(
        &self,
        start: Option<&TimeBound>,
        stop: Option<&TimeBound>,
    ) -> QueryResult<TimeWindow> {
        self.normalizer.normalize(start, stop)
    }

    /// Fetch `columns` (all when `None`) of `table` between `start` and `stop`
    pub fn get_data(
        &self,
        table: &str,
        columns: Option<&[String]>,
        start: Option<&TimeBound>,
        stop: Option<&TimeBound>,
    ) -> QueryResult<RecordSet> {
        let window = self.window(start, stop)?;
        self.fetch_window(table, columns, &window)
    }

    /// Fetch inside an already normalized window
    pub fn fetch_window(
        &self,
        table: &str,
        columns: Option<&[String]>,
        window: &TimeWindow,
    ) -> QueryResult<RecordSet> {
        let mut session = self.provider.open()?;
        self.fetcher.fetch(session.connector(), table, columns, window)
    }

    /// Find the data for one or more variable names
    ///
    /// With `rename` set, each fetched column is renamed to the name that was
    /// asked for.
    pub fn search_data(
        &mut self,
        query: &SearchQuery,
        start: Option<&TimeBound>,
        stop: Option<&TimeBound>,
        rename: bool,
    ) -> QueryResult<RecordSet> {
        let window = self.window(start, stop)?;
        self.search_window(query, &window, rename)
    }

    /// Search inside an already normalized window
    pub fn search_window(
        &mut self,
        query: &SearchQuery,
        window: &TimeWindow,
        rename: bool,
    ) -> QueryResult<RecordSet> {
        match query {
            SearchQuery::Single(name) => self.search_one(name, window, rename),
            SearchQuery::Many(names) => {
                if names.is_empty() {
                    return Err(QueryError::NoMatch(String::new()));
                }
                let mut searched: Vec<&str> = Vec::with_capacity(names.len());
                let mut sets: Vec<RecordSet> = Vec::with_capacity(names.len());
                for name in names {
                    if searched.contains(&name.as_str()) {
                        tracing::debug!(variable = %name, "Skipping repeated variable");
                        continue;
                    }
                    searched.push(name.as_str());

                    let set = self.search_one(name, window, rename)?;
                    // Two names resolving to the same column add nothing new
                    if sets
                        .iter()
                        .any(|s| s.source == set.source && s.columns == set.columns)
                    {
                        continue;
                    }
                    sets.push(set);
                }
                RecordSet::join(sets, self.timezone())
            }
        }
    }

    fn search_one(&mut self, name: &str, window: &TimeWindow, rename: bool) -> QueryResult<RecordSet> {
        let (location, mut records) = match self.locate(name)? {
            Resolution::Single(location) => {
                let records = self.fetch_location(&location, window)?;
                (location, records)
            }
            Resolution::Candidates(candidates) => self.first_with_data(name, candidates, window)?,
        };

        if rename {
            records.rename_column(&location.column, name);
        }
        Ok(records)
    }

    /// Try candidates in order; only an empty window moves on to the next one
    fn first_with_data(
        &self,
        name: &str,
        candidates: Vec<Location>,
        window: &TimeWindow,
    ) -> QueryResult<(Location, RecordSet)> {
        for location in &candidates {
            match self.fetch_location(location, window) {
                Ok(records) => {
                    tracing::info!(variable = name, location = %location, "Using candidate");
                    return Ok((location.clone(), records));
                }
                Err(err) if err.is_empty_result() => {
                    tracing::warn!(variable = name, location = %location, "No data in window, trying next candidate");
                }
                Err(err) => return Err(err),
            }
        }

        Err(QueryError::CandidatesExhausted {
            name: name.to_string(),
            tried: candidates,
        })
    }

    fn fetch_location(&self, location: &Location, window: &TimeWindow) -> QueryResult<RecordSet> {
        let records = self.fetch_window(
            &location.table,
            Some(std::slice::from_ref(&location.column)),
            window,
        )?;

        // Rows exist but the column is NULL throughout
        if records.column_index(&location.column).is_none() {
            return Err(QueryError::EmptyResult {
                table: location.table.clone(),
            });
        }
        Ok(records)
    }
}
