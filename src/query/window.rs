//! Time Window Normalizer
//!
//! Turns optional user start/stop input into a concrete `[start, stop)`
//! window in epoch seconds.
//!
//! - absent stop means now
//! - absent start mirrors the resolved stop
//! - equal start and stop become the trailing 24 hours ending at stop

use crate::query::error::{QueryError, QueryResult};
use crate::query::parser::DateParser;
use crate::query::types::{TimeBound, TimeWindow};
use chrono::{DateTime, Utc};

/// Resolves time bounds into windows
#[derive(Debug, Clone, Copy)]
pub struct WindowNormalizer {
    parser: DateParser,
}

impl WindowNormalizer {
    pub fn new(parser: DateParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &DateParser {
        &self.parser
    }

    /// Normalize against the current time
    pub fn normalize(
        &self,
        start: Option<&TimeBound>,
        stop: Option<&TimeBound>,
    ) -> QueryResult<TimeWindow> {
        self.normalize_at(start, stop, Utc::now())
    }

    /// Normalize against an explicit reference time
    pub fn normalize_at(
        &self,
        start: Option<&TimeBound>,
        stop: Option<&TimeBound>,
        now: DateTime<Utc>,
    ) -> QueryResult<TimeWindow> {
        let stop = match stop {
            Some(bound) => self.resolve(bound, now)?,
            None => now.timestamp(),
        };
        let start = match start {
            Some(bound) => self.resolve(bound, now)?,
            None => stop,
        };

        if start == stop {
            let window = TimeWindow::last_day(stop)
                .ok_or_else(|| QueryError::InvalidTime(format!("epoch {} out of range", stop)))?;
            tracing::debug!("No explicit window, using last 24h {}", window);
            return Ok(window);
        }

        TimeWindow::try_new(start, stop).ok_or(QueryError::InvalidWindow { start, stop })
    }

    /// Epoch seconds of a single bound
    ///
    /// Epochs chrono cannot represent as a date are rejected.
    pub fn resolve(&self, bound: &TimeBound, now: DateTime<Utc>) -> QueryResult<i64> {
        match bound {
            TimeBound::Epoch(epoch) => DateTime::<Utc>::from_timestamp(*epoch, 0)
                .map(|dt| dt.timestamp())
                .ok_or_else(|| QueryError::InvalidTime(format!("epoch {} out of range", epoch))),
            TimeBound::At(dt) => Ok(dt.timestamp()),
            TimeBound::Expr(text) => Ok(self.parser.parse(text, now)?.timestamp()),
        }
    }
}
