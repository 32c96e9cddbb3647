//! Query Engine
//!
//! Turns variable names and loose date input into normalized tables:
//!
//! - **Resolver**: Match a variable name against the name index
//! - **Parser**: Parse free-form date expressions
//! - **Window**: Normalize start/stop into a `[start, stop)` window
//! - **Executor**: Range-query one table and normalize the rows
//! - **Record**: Time-keyed record sets and joins
//!
//! # Examples
//!
//! ```rust,ignore
//! use ucnhistory::query::{DataFetcher, DateParser, TimeBound, WindowNormalizer};
//!
//! let normalizer = WindowNormalizer::new(DateParser::new(tz, false));
//! let window = normalizer.normalize(Some(&TimeBound::from("yesterday")), None)?;
//!
//! let mut session = provider.open()?;
//! let records = fetcher.fetch(session.connector(), "ucn2_measured", None, &window)?;
//! ```

mod error;
mod executor;
mod parser;
mod record;
mod resolver;
mod types;
mod window;

pub use error::{QueryError, QueryResult};
pub use executor::DataFetcher;
pub use parser::DateParser;
pub use record::{local_time, Record, RecordSet, TIME_FORMAT};
pub use resolver::{normalize_name, resolve};
pub use types::{Location, Resolution, SearchQuery, TimeBound, TimeWindow};
pub use window::WindowNormalizer;
