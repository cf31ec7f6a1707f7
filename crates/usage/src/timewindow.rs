//! Time window parsing and timestamp formatting
//!
//! Usage windows are half-open: `[start, end)`. Either bound may be unset,
//! which leaves that side of the window open.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UsageError};

/// Text layout used when a timestamp has to be rendered as a literal
pub const DATETIME_MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A half-open time window for usage queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindow {
    /// Start of the window (inclusive), `None` for open
    pub start: Option<DateTime<Utc>>,
    /// End of the window (exclusive), `None` for open
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Create a window with both bounds set
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::from_bounds(Some(start), Some(end))
    }

    /// Create a window from optional bounds
    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if matches!((start, end), (Some(start), Some(end)) if end <= start) {
            return Err(UsageError::InvalidTimeWindow(
                "end must be after start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Check that the end is after the start when both are set
    pub fn validate(&self) -> Result<()> {
        Self::from_bounds(self.start, self.end).map(|_| ())
    }

    /// A window with no bounds at all
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Everything at or after `start`
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Everything strictly before `end`
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Check whether neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Duration of the window, if both bounds are set
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Check whether a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| ts >= start) && self.end.is_none_or(|end| ts < end)
    }

    /// Parse a time window string relative to the current time
    ///
    /// Supported formats:
    /// - Relative: `1h`, `24h`, `7d`, `2w`
    /// - Predefined: `today`, `yesterday`, `mtd`, `ytd`, `all`
    /// - Custom: `2024-01-01,2024-02-01` (either side may be empty for an open bound)
    /// - RFC 3339 bounds: `2024-01-01T00:00:00Z,2024-01-01T12:00:00Z`
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_at(s, Utc::now())
    }

    /// Parse a time window string relative to `now`
    pub fn parse_at(s: &str, now: DateTime<Utc>) -> Result<Self> {
        let s = s.trim();
        let lower = s.to_lowercase();

        if let Some(window) = Self::parse_predefined(&lower, now) {
            return Ok(window);
        }

        if let Some(window) = Self::parse_relative(&lower, now)? {
            return Ok(window);
        }

        if let Some(window) = Self::parse_custom(s)? {
            return Ok(window);
        }

        Err(UsageError::InvalidTimeWindow(format!(
            "unknown time window format: {}",
            s
        )))
    }
}

impl TimeWindow {
    fn parse_predefined(s: &str, now: DateTime<Utc>) -> Option<Self> {
        let today = start_of_day(now);
        let tomorrow = today + Duration::days(1);

        match s {
            "all" | "" => Some(Self::unbounded()),
            "today" => Some(Self {
                start: Some(today),
                end: Some(tomorrow),
            }),
            "yesterday" => Some(Self {
                start: Some(today - Duration::days(1)),
                end: Some(today),
            }),
            "mtd" => Some(Self {
                start: Some(start_of_month(now)),
                end: Some(tomorrow),
            }),
            "ytd" => Some(Self {
                start: Some(start_of_year(now)),
                end: Some(tomorrow),
            }),
            _ => None,
        }
    }

    fn parse_relative(s: &str, now: DateTime<Utc>) -> Result<Option<Self>> {
        let Some((num, unit)) = extract_num_unit(s) else {
            return Ok(None);
        };
        let tomorrow = start_of_day(now) + Duration::days(1);

        // Day-based windows cover whole calendar days and include today
        let (span, end) = match unit {
            'h' => (Duration::try_hours(num), now),
            'd' => (Duration::try_days(num), tomorrow),
            'w' => (Duration::try_weeks(num), tomorrow),
            _ => return Ok(None),
        };

        let start = span
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                UsageError::InvalidTimeWindow(format!("relative window out of range: {}", s))
            })?;

        Ok(Some(Self {
            start: Some(start),
            end: Some(end),
        }))
    }

    fn parse_custom(s: &str) -> Result<Option<Self>> {
        let Some((start, end)) = s.split_once(',') else {
            return Ok(None);
        };

        let start = parse_bound(start.trim())?;
        let end = parse_bound(end.trim())?;

        Self::from_bounds(start, end).map(Some)
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS.mmm` in UTC
///
/// Only for contexts that need literal text. Compiled queries bind
/// timestamps as arguments instead.
pub fn format_datetime_millis<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc)
        .format(DATETIME_MILLIS_FORMAT)
        .to_string()
}

fn extract_num_unit(s: &str) -> Option<(i64, char)> {
    let unit = s.chars().last()?;
    if !unit.is_ascii_alphabetic() {
        return None;
    }

    let num: i64 = s[..s.len() - 1].parse().ok()?;
    if num <= 0 {
        return None;
    }

    Some((num, unit))
}

fn parse_bound(s: &str) -> Result<Option<DateTime<Utc>>> {
    if s.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).map(|t| t.and_utc()));
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| {
            UsageError::InvalidTimeWindow(format!(
                "invalid bound: {} (use YYYY-MM-DD or RFC 3339)",
                s
            ))
        })
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(dt)
}

fn start_of_month(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(dt)
}

fn start_of_year(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .with_month(1)
        .and_then(|d| d.with_day(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(dt)
}
