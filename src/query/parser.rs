//! Date Expression Parser
//!
//! Best-effort conversion of free-form date/time text into an instant.
//!
//! # Supported Input
//!
//! ```text
//! now | today | yesterday | tomorrow
//! now-7d | now() - 2h | -30m | 3 days ago
//! 1709582400                      (epoch seconds, 9+ digits)
//! 20240304                        (YYYYMMDD)
//! 2024-03-04T12:00:00-08:00       (RFC 3339)
//! 2024-03-04 12:00 | 2024/03/04 | 03/04/2024
//! March 4 12pm | 4th mar 2024 3:30 pm | 14:05 | noon
//! ```
//!
//! Missing date parts come from today, a missing time is midnight. Text without
//! an explicit offset is read in the facility timezone. Numeric `a/b/yyyy`
//! dates are month-first unless `dayfirst` is set.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map_res, opt, value},
    error::{Error as NomError, ErrorKind},
    IResult,
};

use crate::query::error::{QueryError, QueryResult};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const FILLER: [&str; 4] = ["at", "on", "of", "the"];

/// Parses date expressions relative to a reference instant
#[derive(Debug, Clone, Copy)]
pub struct DateParser {
    tz: Tz,
    dayfirst: bool,
}

impl DateParser {
    pub fn new(tz: Tz, dayfirst: bool) -> Self {
        Self { tz, dayfirst }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse `text` into an instant, resolving relative terms against `now`
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> QueryResult<DateTime<Utc>> {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();
        if lower.is_empty() {
            return Err(QueryError::InvalidTime("empty date expression".to_string()));
        }

        let today = now.with_timezone(&self.tz).date_naive();
        let day_offset = match lower.as_str() {
            "today" => Some(0),
            "yesterday" => Some(-1),
            "tomorrow" => Some(1),
            _ => None,
        };
        if let Some(days) = day_offset {
            let date = today
                .checked_add_signed(chrono::Duration::days(days))
                .ok_or_else(|| QueryError::InvalidTime(lower.clone()))?;
            return self.localize(date.and_time(NaiveTime::default()));
        }

        if let Some(offset) = parse_relative(&lower) {
            return chrono::Duration::try_seconds(offset)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| QueryError::InvalidTime(format!("{} is out of range", trimmed)));
        }

        if lower.chars().all(|c| c.is_ascii_digit()) {
            if lower.len() >= 9 {
                let epoch: i64 = lower
                    .parse()
                    .map_err(|_| QueryError::InvalidTime(format!("{} is out of range", trimmed)))?;
                return DateTime::<Utc>::from_timestamp(epoch, 0)
                    .ok_or_else(|| QueryError::InvalidTime(format!("{} is out of range", trimmed)));
            }
            if lower.len() == 8 {
                let date = NaiveDate::parse_from_str(&lower, "%Y%m%d")
                    .map_err(|e| QueryError::InvalidTime(format!("{}: {}", trimmed, e)))?;
                return self.localize(date.and_time(NaiveTime::default()));
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Some(naive) = self.parse_fixed(trimmed) {
            return self.localize(naive);
        }

        let naive = self.parse_tokens(&lower, today)?;
        self.localize(naive)
    }

    /// Attach the facility timezone to a wall-clock time
    fn localize(&self, naive: NaiveDateTime) -> QueryResult<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                QueryError::InvalidTime(format!("{} does not exist in {}", naive, self.tz.name()))
            })
    }

    fn numeric_date_format(&self) -> &'static str {
        if self.dayfirst {
            "%d/%m/%Y"
        } else {
            "%m/%d/%Y"
        }
    }

    /// Whole-string numeric formats
    fn parse_fixed(&self, text: &str) -> Option<NaiveDateTime> {
        let numeric = self.numeric_date_format();
        let datetime_formats = [
            "%Y-%m-%d %H:%M:%S".to_string(),
            "%Y-%m-%dT%H:%M:%S".to_string(),
            "%Y-%m-%d %H:%M".to_string(),
            "%Y-%m-%dT%H:%M".to_string(),
            "%Y/%m/%d %H:%M:%S".to_string(),
            "%Y/%m/%d %H:%M".to_string(),
            format!("{} %H:%M:%S", numeric),
            format!("{} %H:%M", numeric),
        ];

        for fmt in &datetime_formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt);
            }
        }

        self.parse_date_token(text)
            .map(|date| date.and_time(NaiveTime::default()))
    }

    /// A single token that is a complete numeric date
    fn parse_date_token(&self, token: &str) -> Option<NaiveDate> {
        let formats = ["%Y-%m-%d", "%Y/%m/%d", self.numeric_date_format(), "%d.%m.%Y"];
        formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
    }

    /// Free-form text: month names, day and year numbers, clock times
    fn parse_tokens(&self, text: &str, today: NaiveDate) -> QueryResult<NaiveDateTime> {
        let time_re = Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?(am|pm)?$")
            .map_err(|e| QueryError::InvalidTime(format!("regex error: {}", e)))?;
        let ordinal_re = Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)$")
            .map_err(|e| QueryError::InvalidTime(format!("regex error: {}", e)))?;

        let invalid = || QueryError::InvalidTime(format!("could not understand '{}'", text));

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        let mut fields = DateFields::default();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].trim_end_matches('.');
            let next = tokens.get(i + 1).map(|t| t.trim_end_matches('.'));
            i += 1;

            if token.is_empty() || FILLER.contains(&token) || is_weekday(token) {
                continue;
            }

            match token {
                "noon" => {
                    fields.time = NaiveTime::from_hms_opt(12, 0, 0);
                    continue;
                }
                "midnight" => {
                    fields.time = Some(NaiveTime::default());
                    continue;
                }
                _ => {}
            }

            if let Some(month) = month_from_name(token) {
                fields.month = Some(month);
                continue;
            }

            if let Some(date) = self.parse_date_token(token) {
                fields.year = Some(date.year());
                fields.month = Some(date.month());
                fields.day = Some(date.day());
                continue;
            }

            // "3 pm": fold a separate meridiem into the clock token
            let clock = match next {
                Some(m @ ("am" | "pm" | "a.m" | "p.m")) if is_clock_digits(token) => {
                    i += 1;
                    let meridiem = if m.starts_with('a') { "am" } else { "pm" };
                    format!("{}{}", token, meridiem)
                }
                _ => token.to_string(),
            };

            if let Some(caps) = time_re.captures(&clock) {
                let explicit = clock.contains(':') || caps.get(4).is_some();
                if explicit {
                    fields.time = Some(time_from_parts(&caps).ok_or_else(invalid)?);
                    continue;
                }
            }

            let number = ordinal_re
                .captures(token)
                .map(|caps| caps[1].to_string())
                .or_else(|| {
                    token
                        .chars()
                        .all(|c| c.is_ascii_digit())
                        .then(|| token.to_string())
                });

            match number {
                Some(digits) if digits.len() == 4 => {
                    fields.year = digits.parse().ok();
                }
                Some(digits) => {
                    let n: u32 = digits.parse().map_err(|_| invalid())?;
                    if fields.day.is_none() && (1..=31).contains(&n) {
                        fields.day = Some(n);
                    } else if fields.year.is_none() && n < 100 {
                        fields.year = Some(2000 + n as i32);
                    } else {
                        return Err(invalid());
                    }
                }
                None => return Err(invalid()),
            }
        }

        if fields.is_empty() {
            return Err(invalid());
        }

        let date = NaiveDate::from_ymd_opt(
            fields.year.unwrap_or_else(|| today.year()),
            fields.month.unwrap_or_else(|| today.month()),
            fields.day.unwrap_or_else(|| today.day()),
        )
        .ok_or_else(|| QueryError::InvalidTime(format!("no such date: '{}'", text)))?;

        Ok(date.and_time(fields.time.unwrap_or_default()))
    }
}

#[derive(Debug, Default)]
struct DateFields {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    time: Option<NaiveTime>,
}

impl DateFields {
    fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none() && self.time.is_none()
    }
}

fn month_from_name(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    if token == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(token))
        .map(|idx| idx as u32 + 1)
}

fn is_weekday(token: &str) -> bool {
    token.len() >= 3 && WEEKDAYS.iter().any(|d| d.starts_with(token))
}

fn is_clock_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == ':')
}

/// Build a time from `time_re` captures, applying am/pm
fn time_from_parts(caps: &regex::Captures<'_>) -> Option<NaiveTime> {
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;

    if let Some(meridiem) = caps.get(4).map(|m| m.as_str()) {
        if hour == 0 || hour > 12 {
            return None;
        }
        hour %= 12;
        if meridiem == "pm" {
            hour += 12;
        }
    }

    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Parse time unit, returning its length in seconds
fn parse_unit(input: &str) -> IResult<&str, i64> {
    alt((
        value(
            7 * 86_400,
            alt((tag("weeks"), tag("week"), tag("wks"), tag("wk"), tag("w"))),
        ),
        value(86_400, alt((tag("days"), tag("day"), tag("d")))),
        value(
            3_600,
            alt((tag("hours"), tag("hour"), tag("hrs"), tag("hr"), tag("h"))),
        ),
        value(
            60,
            alt((tag("minutes"), tag("minute"), tag("mins"), tag("min"), tag("m"))),
        ),
        value(
            1,
            alt((tag("seconds"), tag("second"), tag("secs"), tag("sec"), tag("s"))),
        ),
    ))(input)
}

/// Parse span like "7d", "2 hours"
fn parse_span(input: &str) -> IResult<&str, i64> {
    let (input, amount) = map_res(digit1, |s: &str| s.parse::<i64>())(input)?;
    let (input, _) = multispace0(input)?;
    let (rest, unit) = parse_unit(input)?;

    let seconds = amount
        .checked_mul(unit)
        .ok_or_else(|| nom::Err::Error(NomError::new(input, ErrorKind::TooLarge)))?;
    Ok((rest, seconds))
}

/// Parse signed span like "-7d", "+ 1h"
fn parse_signed_span(input: &str) -> IResult<&str, i64> {
    let (input, sign) = alt((value(-1i64, char('-')), value(1i64, char('+'))))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, span) = parse_span(input)?;
    Ok((input, sign * span))
}

/// Parse "now", "now()", "now - 7d"
fn parse_now_offset(input: &str) -> IResult<&str, i64> {
    let (input, _) = tag("now")(input)?;
    let (input, _) = opt(tag("()"))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, offset) = opt(parse_signed_span)(input)?;
    Ok((input, offset.unwrap_or(0)))
}

/// Parse "3 days ago"
fn parse_ago(input: &str) -> IResult<&str, i64> {
    let (input, span) = parse_span(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag("ago")(input)?;
    Ok((input, -span))
}

/// Offset in seconds from now, if `input` is a relative expression
fn parse_relative(input: &str) -> Option<i64> {
    all_consuming(alt((parse_now_offset, parse_signed_span, parse_ago)))(input.trim())
        .ok()
        .map(|(_, offset)| offset)
}
