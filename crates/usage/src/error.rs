//! Usage query error types

use thiserror::Error;

use crate::config::ConfigError;

/// Usage query errors
///
/// Validation variants describe a malformed request and are safe to show to
/// the caller. [`UsageError::PlaceholderMismatch`] is an internal defect and
/// should be reported through [`UsageError::public_message`].
#[derive(Debug, Error)]
pub enum UsageError {
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Aggregation needs a property name but none was given
    #[error("aggregation {aggregation} requires a property name")]
    MissingProperty {
        /// Aggregation that was requested
        aggregation: &'static str,
    },

    /// Unknown aggregation kind
    #[error("unknown aggregation type: {0}")]
    UnknownAggregation(String),

    /// Two filter groups share an identifier
    #[error("duplicate filter group id: {0}")]
    DuplicateFilterGroup(String),

    /// Filter group is malformed
    #[error("invalid filter group: {0}")]
    InvalidFilterGroup(String),

    /// Invalid time window
    #[error("invalid time window: {0}")]
    InvalidTimeWindow(String),

    /// Placeholder/argument parity broken while assembling a fragment
    #[error(
        "fragment {fragment} has {placeholders} placeholders but {args} arguments at offset {offset}"
    )]
    PlaceholderMismatch {
        /// Fragment name
        fragment: String,
        /// Placeholders found in the fragment template
        placeholders: usize,
        /// Arguments carried by the fragment
        args: usize,
        /// Offset the fragment was built at
        offset: usize,
    },

    /// Compiler configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Execution backend failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend returned rows in an unexpected shape
    #[error("invalid result: {0}")]
    InvalidResult(String),
}

impl UsageError {
    /// Create a MissingProperty error
    pub fn missing_property(aggregation: &'static str) -> Self {
        Self::MissingProperty { aggregation }
    }

    /// Whether the error was caused by the request rather than a defect
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::MissingProperty { .. }
                | Self::UnknownAggregation(_)
                | Self::DuplicateFilterGroup(_)
                | Self::InvalidFilterGroup(_)
                | Self::InvalidTimeWindow(_)
        )
    }

    /// Message suitable for returning to an API client
    ///
    /// Validation errors carry their detail. Everything else collapses to an
    /// opaque message so compiled fragments never leak.
    pub fn public_message(&self) -> String {
        if self.is_validation() {
            self.to_string()
        } else {
            "internal error processing usage query".to_string()
        }
    }
}

/// Result type for usage query operations
pub type Result<T> = std::result::Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_property_message() {
        let err = UsageError::missing_property("SUM");
        assert_eq!(err.to_string(), "aggregation SUM requires a property name");
        assert!(err.is_validation());
    }

    #[test]
    fn test_duplicate_group_is_validation() {
        let err = UsageError::DuplicateFilterGroup("g1".to_string());
        assert!(err.is_validation());
        assert!(err.public_message().contains("g1"));
    }

    #[test]
    fn test_placeholder_mismatch_is_opaque() {
        let err = UsageError::PlaceholderMismatch {
            fragment: "base_events".to_string(),
            placeholders: 3,
            args: 2,
            offset: 0,
        };
        assert!(!err.is_validation());
        assert!(err.to_string().contains("base_events"));
        assert!(!err.public_message().contains("base_events"));
    }

    #[test]
    fn test_backend_error_is_opaque() {
        let err = UsageError::Backend("connection refused".to_string());
        assert!(!err.is_validation());
        assert_eq!(
            err.public_message(),
            "internal error processing usage query"
        );
    }
}
