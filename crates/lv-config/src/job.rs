//! Job settings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Partition group size limit: 2 GiB, the largest input a columnar reader accepts.
pub const DEFAULT_PARTITION_THRESHOLD_BYTES: u64 = 1 << 31;

/// Output files are rotated once they reach this size.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 512 * 1024 * 1024;

/// Rows buffered before a record batch is handed to the writer.
pub const DEFAULT_BATCH_ROWS: usize = 1000;

/// Date format used on the command line and in storage prefixes.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Errors from configuration resolution and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid date '{0}', expected YYYYMMDD")]
    InvalidDate(String),

    #[error("date range is empty: {from} is after {to}")]
    EmptyDateRange { from: String, to: String },

    #[error("unknown stream: {0}")]
    UnknownStream(String),

    #[error("incompatible config schema version {0}")]
    IncompatibleVersion(String),

    #[error("invalid setting {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },
}

impl From<ConfigError> for lv_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownStream(name) => lv_common::Error::UnknownStream(name),
            ConfigError::Io { source, .. } => lv_common::Error::Io(source),
            other => lv_common::Error::Config(other.to_string()),
        }
    }
}

/// Resolved job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub schema_version: String,

    /// Root of the input object store.
    pub input_root: PathBuf,

    /// Root of the output object store.
    pub output_root: PathBuf,

    /// Histogram registry document.
    pub histograms_path: PathBuf,

    /// Sources manifest mapping stream names to input prefixes.
    pub sources_path: PathBuf,

    /// Input stream read from the sources manifest.
    pub input_stream: String,

    pub partition_threshold_bytes: u64,

    pub max_file_bytes: u64,

    pub batch_rows: usize,

    /// Worker threads; 0 lets rayon pick.
    pub workers: usize,

    /// Parent of per-shard staging directories; the system temp dir if unset.
    pub staging_root: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            input_root: PathBuf::from("data/input"),
            output_root: PathBuf::from("data/output"),
            histograms_path: PathBuf::from("Histograms.json"),
            sources_path: PathBuf::from("sources.json"),
            input_stream: "telemetry".to_string(),
            partition_threshold_bytes: DEFAULT_PARTITION_THRESHOLD_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            batch_rows: DEFAULT_BATCH_ROWS,
            workers: 0,
            staging_root: None,
        }
    }
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_compatible(&self.schema_version) {
            return Err(ConfigError::IncompatibleVersion(self.schema_version.clone()));
        }
        if self.partition_threshold_bytes == 0 {
            return Err(ConfigError::Invalid {
                setting: "partition_threshold_bytes",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_file_bytes == 0 {
            return Err(ConfigError::Invalid {
                setting: "max_file_bytes",
                reason: "must be positive".to_string(),
            });
        }
        if self.batch_rows == 0 {
            return Err(ConfigError::Invalid {
                setting: "batch_rows",
                reason: "must be positive".to_string(),
            });
        }
        if self.input_stream.trim().is_empty() {
            return Err(ConfigError::Invalid {
                setting: "input_stream",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Check if a config schema version is compatible with the current one.
fn is_compatible(version: &str) -> bool {
    let major = |v: &str| {
        v.split('.')
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0)
    };
    major(crate::CONFIG_SCHEMA_VERSION) == major(version)
}

/// Inclusive range of submission dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Parse a `YYYYMMDD` pair.
    pub fn parse(from: &str, to: &str) -> Result<Self, ConfigError> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ConfigError> {
        if from > to {
            return Err(ConfigError::EmptyDateRange {
                from: from.format(DATE_FORMAT).to_string(),
                to: to.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { from, to })
    }

    /// Every day in the range, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    /// Output partition label, keyed by the last day of the range.
    pub fn version_label(&self) -> String {
        format!("v{}", self.to.format(DATE_FORMAT))
    }
}

/// Parse a strict `YYYYMMDD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ConfigError> {
    if s.len() != 8 {
        return Err(ConfigError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ConfigError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = JobConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.partition_threshold_bytes, 1 << 31);
    }

    #[test]
    fn zero_batch_rows_is_invalid() {
        let config = JobConfig {
            batch_rows: 0,
            ..JobConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                setting: "batch_rows",
                ..
            })
        ));
    }

    #[test]
    fn other_major_version_is_incompatible() {
        let config = JobConfig {
            schema_version: "2.0.0".to_string(),
            ..JobConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompatibleVersion(_))
        ));
        let config = JobConfig {
            schema_version: "1.4.0".to_string(),
            ..JobConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: JobConfig = serde_json::from_str(r#"{"batch_rows": 10}"#).unwrap();
        assert_eq!(config.batch_rows, 10);
        assert_eq!(config.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }

    #[test]
    fn date_range_parses_and_iterates() {
        let range = DateRange::parse("20160130", "20160202").unwrap();
        let days: Vec<String> = range
            .days()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect();
        assert_eq!(days, vec!["20160130", "20160131", "20160201", "20160202"]);
        assert_eq!(range.version_label(), "v20160202");
    }

    #[test]
    fn date_range_rejects_bad_input() {
        assert!(matches!(
            DateRange::parse("2016-01-01", "20160102"),
            Err(ConfigError::InvalidDate(_))
        ));
        assert!(matches!(
            DateRange::parse("20160105", "20160102"),
            Err(ConfigError::EmptyDateRange { .. })
        ));
    }
}
