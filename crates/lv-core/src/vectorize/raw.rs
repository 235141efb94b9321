//! Raw histograms as reported in ping payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One reported histogram: bucket label to count, plus the sum.
///
/// Payloads carry more keys (`bucket_count`, `range`, ...); only the ones
/// the vectorizer needs are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHistogram {
    #[serde(default)]
    pub sum: i64,
    #[serde(default)]
    pub values: BTreeMap<String, i64>,
}

impl RawHistogram {
    pub fn new(sum: i64, values: impl IntoIterator<Item = (&'static str, i64)>) -> Self {
        Self {
            sum,
            values: values
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
        }
    }

    /// Count for `label`, 0 when absent.
    pub fn count(&self, label: &str) -> i64 {
        self.values.get(label).copied().unwrap_or(0)
    }
}

/// Keyed histogram: sub-label to histogram.
pub type KeyedHistogram = BTreeMap<String, RawHistogram>;

/// Parse a histogram payload blob into name -> raw JSON.
///
/// Entries are decoded individually later so that histograms outside the
/// registry never need to have a well-formed shape.
pub fn parse_payload(json: &str) -> Result<Map<String, Value>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(json)
}
