//! Usage result types
//!
//! Rows produced by a compiled usage query, one per bucket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, UsageError};

/// Aggregated value for one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBucket {
    /// Winning filter group, `None` for the implicit bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_group_id: Option<String>,
    /// Aggregated value
    pub value: f64,
}

impl UsageBucket {
    /// Create a bucket
    pub fn new(filter_group_id: Option<String>, value: f64) -> Self {
        Self {
            filter_group_id,
            value,
        }
    }
}

/// Usage aggregation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageResult {
    /// Buckets in bucket id order
    pub buckets: Vec<UsageBucket>,
    /// Sum of bucket values
    pub total: f64,
}

impl UsageResult {
    /// Create a result from buckets
    pub fn from_buckets(buckets: Vec<UsageBucket>) -> Self {
        let total = buckets.iter().map(|b| b.value).sum();
        Self { buckets, total }
    }

    /// Parse backend rows of `(filter_group_id, value)`
    ///
    /// NULL values count as zero. Numeric strings are accepted since
    /// ClickHouse quotes 64-bit integers in JSON output.
    pub fn from_rows(rows: &[Vec<Value>]) -> Result<Self> {
        let buckets = rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_row(i, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_buckets(buckets))
    }

    /// Find the bucket for a filter group
    pub fn bucket(&self, filter_group_id: &str) -> Option<&UsageBucket> {
        self.buckets
            .iter()
            .find(|b| b.filter_group_id.as_deref() == Some(filter_group_id))
    }

    /// Value for a filter group, zero if no event was attributed to it
    pub fn value_for(&self, filter_group_id: &str) -> f64 {
        self.bucket(filter_group_id).map(|b| b.value).unwrap_or(0.0)
    }

    /// Whether no bucket was returned
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn parse_row(index: usize, row: &[Value]) -> Result<UsageBucket> {
    let [group, value] = row else {
        return Err(UsageError::InvalidResult(format!(
            "row {} has {} columns, expected 2",
            index,
            row.len()
        )));
    };

    let filter_group_id = match group {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => {
            return Err(UsageError::InvalidResult(format!(
                "row {}: filter_group_id is not a string: {}",
                index, other
            )));
        }
    };

    let value = match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().map_err(|_| {
            UsageError::InvalidResult(format!("row {}: value is not numeric: {}", index, s))
        })?,
        other => {
            return Err(UsageError::InvalidResult(format!(
                "row {}: value is not numeric: {}",
                index, other
            )));
        }
    };

    Ok(UsageBucket::new(filter_group_id, value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_rows_grouped() {
        let rows = vec![vec![json!("g1"), json!(3)], vec![json!("g2"), json!("4")]];
        let result = UsageResult::from_rows(&rows).unwrap();

        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.value_for("g1"), 3.0);
        assert_eq!(result.value_for("g2"), 4.0);
        assert_eq!(result.value_for("g3"), 0.0);
        assert_eq!(result.total, 7.0);
    }

    #[test]
    fn test_from_rows_implicit_bucket() {
        let rows = vec![vec![Value::Null, json!(12.5)]];
        let result = UsageResult::from_rows(&rows).unwrap();

        assert_eq!(result.buckets[0].filter_group_id, None);
        assert_eq!(result.total, 12.5);
    }

    #[test]
    fn test_null_value_is_zero() {
        let rows = vec![vec![Value::Null, Value::Null]];
        assert_eq!(UsageResult::from_rows(&rows).unwrap().total, 0.0);
    }

    #[test]
    fn test_wrong_column_count() {
        let rows = vec![vec![json!(1)]];
        assert!(matches!(
            UsageResult::from_rows(&rows),
            Err(UsageError::InvalidResult(_))
        ));
    }

    #[test]
    fn test_non_numeric_value() {
        let rows = vec![vec![Value::Null, json!("abc")]];
        assert!(UsageResult::from_rows(&rows).is_err());
    }

    #[test]
    fn test_empty() {
        let result = UsageResult::from_rows(&[]).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total, 0.0);
    }
}
