//! # ucnhistory
//!
//! Fetch time-series measurements from the UCN history database and export
//! them as tables.
//!
//! ## Modules
//!
//! - [`connection`]: Connection providers, sessions, SSH tunnel and credentials
//! - [`index`]: Lazily built table → column name index
//! - [`query`]: Name resolution, date parsing, windows and data fetching
//! - [`history`]: The `History` orchestrator tying it all together
//! - [`export`]: CSV output
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ucnhistory::config::Config;
//! use ucnhistory::connection::provider_from_config;
//! use ucnhistory::query::{SearchQuery, TimeBound};
//! use ucnhistory::History;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default(None)?;
//!     let provider = provider_from_config(&config)?;
//!     let mut history = History::new(&config, provider)?;
//!
//!     // Last 24 hours of anything called "pressure"
//!     let records = history.search_data(&SearchQuery::from("pressure"), None, None, true)?;
//!     println!("{} rows from {}", records.len(), records.source);
//!
//!     // Two variables joined on time, explicit window
//!     let start = TimeBound::from("yesterday");
//!     let query = SearchQuery::from(vec!["ucn2 temp".to_string(), "pg9l".to_string()]);
//!     let records = history.search_data(&query, Some(&start), None, true)?;
//!     println!("columns: {:?}", records.columns);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod export;
pub mod history;
pub mod index;
pub mod query;

// Re-export top-level types for convenience
pub use config::{Config, ConfigError};
pub use connection::{ConnectionError, ConnectionProvider, Connector, Session};
pub use export::{ExportError, ExportHeader};
pub use history::History;
pub use index::{IndexStats, NameIndex};
pub use query::{
    DateParser, Location, QueryError, QueryResult, Record, RecordSet, Resolution, SearchQuery,
    TimeBound, TimeWindow, WindowNormalizer,
};
