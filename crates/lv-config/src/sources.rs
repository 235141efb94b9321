//! Sources manifest.
//!
//! Maps logical input stream names to the storage prefix their
//! date-partitioned objects live under:
//!
//! ```json
//! { "telemetry": { "prefix": "telemetry-2", "doc_type": "main" } }
//! ```

use crate::job::{ConfigError, DateRange, DATE_FORMAT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Location of one input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    pub prefix: String,

    /// Optional document type sub-partition below each day.
    #[serde(default)]
    pub doc_type: Option<String>,
}

impl StreamSource {
    /// Listing prefixes for every day of `range`, oldest first.
    pub fn day_prefixes(&self, range: &DateRange) -> Vec<String> {
        let base = self.prefix.trim_end_matches('/');
        range
            .days()
            .map(|day| {
                let day = day.format(DATE_FORMAT);
                match &self.doc_type {
                    Some(doc_type) => format!("{base}/{day}/{doc_type}/"),
                    None => format!("{base}/{day}/"),
                }
            })
            .collect()
    }
}

/// All known input streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcesManifest {
    pub streams: BTreeMap<String, StreamSource>,
}

impl SourcesManifest {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn stream(&self, name: &str) -> Result<&StreamSource, ConfigError> {
        self.streams
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStream(name.to_string()))
    }
}
