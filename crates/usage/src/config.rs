//! Compiler configuration
//!
//! Names of the event table and its columns, and the deduplication key.
//! Loaded once at startup and shared read-only by every compilation.
//!
//! # Example
//!
//! ```toml
//! events_table = "events"
//! properties_column = "properties"
//! timestamp_column = "timestamp"
//! dedup_key = ["tenant_id", "environment_id", "timestamp", "id"]
//! timestamp_precision = 3
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading compiler configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Field has an invalid value
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigError {
    /// Create an InvalidValue error
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Compiler configuration
///
/// Every field has a default matching the standard events table layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Raw events table
    /// Default: "events"
    pub events_table: String,

    /// JSON column holding event properties
    /// Default: "properties"
    pub properties_column: String,

    /// Event timestamp column
    /// Default: "timestamp"
    pub timestamp_column: String,

    /// Columns identifying one logical event across duplicate deliveries
    /// Default: ["tenant_id", "environment_id", "timestamp", "id"]
    pub dedup_key: Vec<String>,

    /// Sub-second digits of the timestamp column (DateTime64 precision)
    /// Default: 3
    pub timestamp_precision: u8,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            events_table: "events".to_string(),
            properties_column: "properties".to_string(),
            timestamp_column: "timestamp".to_string(),
            dedup_key: ["tenant_id", "environment_id", "timestamp", "id"]
                .into_iter()
                .map(String::from)
                .collect(),
            timestamp_precision: 3,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Dedup key as a column list
    pub fn dedup_columns(&self) -> String {
        self.dedup_key.join(", ")
    }

    /// Validate identifiers and ranges
    ///
    /// Names here are spliced into SQL text, so they are held to plain
    /// identifier characters even though they come from the operator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("events_table", &self.events_table, true)?;
        check_identifier("properties_column", &self.properties_column, false)?;
        check_identifier("timestamp_column", &self.timestamp_column, false)?;

        if self.dedup_key.is_empty() {
            return Err(ConfigError::invalid_value(
                "dedup_key",
                "at least one column is required",
            ));
        }
        for column in &self.dedup_key {
            check_identifier("dedup_key", column, false)?;
        }
        if !self.dedup_key.contains(&self.timestamp_column) {
            return Err(ConfigError::invalid_value(
                "dedup_key",
                format!("must include the timestamp column '{}'", self.timestamp_column),
            ));
        }

        if self.timestamp_precision > 9 {
            return Err(ConfigError::invalid_value(
                "timestamp_precision",
                format!("{} is out of range 0..=9", self.timestamp_precision),
            ));
        }

        Ok(())
    }
}

impl FromStr for CompilerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Identifiers may be `[A-Za-z0-9_]`, optionally `database.table` for tables
fn check_identifier(field: &'static str, value: &str, qualified: bool) -> Result<(), ConfigError> {
    let valid_part =
        |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    let valid = if qualified {
        value.split('.').count() <= 2 && value.split('.').all(valid_part)
    } else {
        valid_part(value)
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(
            field,
            format!("'{}' is not a plain identifier", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.dedup_columns(),
            "tenant_id, environment_id, timestamp, id"
        );
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = CompilerConfig::from_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = CompilerConfig::from_str(
            r#"
            events_table = "analytics.raw_events"
            timestamp_precision = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.events_table, "analytics.raw_events");
        assert_eq!(config.timestamp_precision, 6);
        assert_eq!(config.properties_column, "properties");
    }

    #[test]
    fn test_rejects_injected_table_name() {
        let err = CompilerConfig::from_str(r#"events_table = "events; DROP TABLE events""#)
            .unwrap_err();
        assert!(err.to_string().contains("events_table"));
    }

    #[test]
    fn test_rejects_qualified_column() {
        let err = CompilerConfig::from_str(r#"properties_column = "a.b""#).unwrap_err();
        assert!(err.to_string().contains("properties_column"));
    }

    #[test]
    fn test_dedup_key_requires_timestamp() {
        let err = CompilerConfig::from_str(r#"dedup_key = ["tenant_id", "id"]"#).unwrap_err();
        assert!(err.to_string().contains("dedup_key"));
    }

    #[test]
    fn test_empty_dedup_key() {
        let err = CompilerConfig::from_str("dedup_key = []").unwrap_err();
        assert!(err.to_string().contains("at least one column"));
    }

    #[test]
    fn test_precision_out_of_range() {
        assert!(CompilerConfig::from_str("timestamp_precision = 12").is_err());
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            CompilerConfig::from_str("table = \"events\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.toml");
        std::fs::write(&path, "events_table = \"events_v2\"\n").unwrap();

        let config = CompilerConfig::from_file(&path).unwrap();
        assert_eq!(config.events_table, "events_v2");
    }

    #[test]
    fn test_from_missing_file() {
        let err = CompilerConfig::from_file("/nonexistent/usage.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
