//! Usage query parameters
//!
//! Describes what to aggregate: the event, the aggregation kind, the time
//! window, customer scoping, property filters, and the optional filter groups
//! used to attribute each event to a single bucket.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UsageError};
use crate::timewindow::TimeWindow;

/// Aggregation applied to the matched events
///
/// Decoding goes through [`AggregationType::parse`], so names are
/// case-insensitive and accept the same aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum AggregationType {
    /// Number of events
    #[default]
    Count,
    /// Sum of a numeric property
    Sum,
    /// Average of a numeric property
    Avg,
    /// Number of distinct property values
    CountDistinct,
}

impl AggregationType {
    /// Parse aggregation type from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" | "average" => Ok(Self::Avg),
            "count_distinct" | "count_unique" => Ok(Self::CountDistinct),
            _ => Err(UsageError::UnknownAggregation(s.to_string())),
        }
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::CountDistinct => "COUNT_DISTINCT",
        }
    }

    /// Whether the aggregation reads a property value
    pub fn requires_property(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl FromStr for AggregationType {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AggregationType {
    type Error = UsageError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound query argument
///
/// Timestamps stay typed so the driver binds them natively.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    /// Text value
    String(String),
    /// Integer value
    Int(i64),
    /// Timestamp value
    DateTime(DateTime<Utc>),
}

impl Param {
    /// Get the text value, if this is a string argument
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for Param {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

/// Allowed values per event property
///
/// Properties are ANDed together; values for one property are ORed. Used both
/// for query-level filters and for filter group definitions. Properties are
/// kept sorted so compiled output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFilters(BTreeMap<String, Vec<String>>);

impl PropertyFilters {
    /// Create an empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add allowed values for a property
    pub fn with(mut self, property: impl Into<String>, values: Vec<String>) -> Self {
        self.insert(property, values);
        self
    }

    /// Add allowed values for a property, appending to any existing values
    pub fn insert(&mut self, property: impl Into<String>, values: Vec<String>) {
        self.0.entry(property.into()).or_default().extend(values);
    }

    /// Iterate over properties that have at least one allowed value
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(property, values)| (property.as_str(), values.as_slice()))
    }

    /// Number of properties that produce a condition
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no property produces a condition
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyFilters
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (property, values) in iter {
            filters.insert(property, values.into_iter().map(Into::into).collect());
        }
        filters
    }
}

/// A usage aggregation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageQuery {
    /// Event name to aggregate
    pub event_name: String,
    /// Property read by SUM, AVG and COUNT_DISTINCT
    #[serde(default)]
    pub property_name: Option<String>,
    /// Aggregation kind
    #[serde(default)]
    pub aggregation: AggregationType,
    /// Time window, `[start, end)`
    #[serde(default)]
    pub window: TimeWindow,
    /// External customer identifier
    #[serde(default)]
    pub external_customer_id: Option<String>,
    /// Internal customer identifier
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Property filters
    #[serde(default)]
    pub filters: PropertyFilters,
}

impl UsageQuery {
    /// Create a query for an event with an aggregation
    pub fn new(event_name: impl Into<String>, aggregation: AggregationType) -> Self {
        Self {
            event_name: event_name.into(),
            property_name: None,
            aggregation,
            window: TimeWindow::unbounded(),
            external_customer_id: None,
            customer_id: None,
            filters: PropertyFilters::new(),
        }
    }

    /// Count events
    pub fn count(event_name: impl Into<String>) -> Self {
        Self::new(event_name, AggregationType::Count)
    }

    /// Set the aggregated property
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property_name = Some(property.into());
        self
    }

    /// Set the time window
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Restrict to an external customer id
    pub fn with_external_customer_id(mut self, id: impl Into<String>) -> Self {
        self.external_customer_id = Some(id.into());
        self
    }

    /// Restrict to a customer id
    pub fn with_customer_id(mut self, id: impl Into<String>) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    /// Add allowed values for a property
    pub fn with_filter<I, S>(mut self, property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .insert(property, values.into_iter().map(Into::into).collect());
        self
    }

    /// Aggregated property, if set and not blank
    pub fn property(&self) -> Option<&str> {
        self.property_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// External customer id, if set and non-empty
    pub fn external_customer(&self) -> Option<&str> {
        non_empty(self.external_customer_id.as_deref())
    }

    /// Customer id, if set and non-empty
    pub fn customer(&self) -> Option<&str> {
        non_empty(self.customer_id.as_deref())
    }

    /// Check the request before any SQL is built
    pub fn validate(&self) -> Result<()> {
        if self.event_name.trim().is_empty() {
            return Err(UsageError::MissingField("event_name"));
        }

        if self.aggregation.requires_property() && self.property().is_none() {
            return Err(UsageError::missing_property(self.aggregation.as_str()));
        }

        self.window.validate()?;

        Ok(())
    }
}

/// A named, prioritized set of property conditions
///
/// An event is attributed to the matching group with the highest priority;
/// equal priorities fall back to the greatest group id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    /// Group identifier, unique within a request
    pub id: String,
    /// Priority (higher wins)
    pub priority: i64,
    /// Conditions, empty for a group that matches everything
    #[serde(default)]
    pub filters: PropertyFilters,
}

impl FilterGroup {
    /// Create a group with no conditions
    pub fn new(id: impl Into<String>, priority: i64) -> Self {
        Self {
            id: id.into(),
            priority,
            filters: PropertyFilters::new(),
        }
    }

    /// Add allowed values for a property
    pub fn with_filter<I, S>(mut self, property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .insert(property, values.into_iter().map(Into::into).collect());
        self
    }

    /// Whether this group matches every event
    pub fn is_universal(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Check a set of filter groups: ids must be non-empty and unique
pub fn validate_filter_groups(groups: &[FilterGroup]) -> Result<()> {
    let mut seen = HashSet::with_capacity(groups.len());
    for group in groups {
        if group.id.is_empty() {
            return Err(UsageError::InvalidFilterGroup(
                "group id must not be empty".to_string(),
            ));
        }
        if !seen.insert(group.id.as_str()) {
            return Err(UsageError::DuplicateFilterGroup(group.id.clone()));
        }
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
