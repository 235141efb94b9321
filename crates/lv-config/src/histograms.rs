//! Histogram registry.
//!
//! Definitions are read from a document in the Histograms.json shape:
//!
//! ```json
//! {
//!   "GC_MS": { "kind": "exponential", "high": 10000, "n_buckets": 50 },
//!   "SEARCH_COUNTS": { "kind": "count", "keyed": true }
//! }
//! ```
//!
//! The registry is built once at startup and never mutated afterwards; the
//! schema generator and the vectorizer both borrow it.

use lv_math::BucketRange;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default lower bound for linear and exponential histograms.
const DEFAULT_LOW: i64 = 1;

/// Widest per-ping vector a histogram may declare (Arrow list widths are `i32`).
pub const MAX_VECTOR_WIDTH: i64 = i32::MAX as i64;

/// Errors from loading the histogram registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("histogram {name}: unknown kind '{kind}'")]
    UnknownKind { name: String, kind: String },

    #[error("histogram {name}: missing parameter '{param}'")]
    MissingParameter { name: String, param: &'static str },

    #[error("histogram {name}: invalid parameter: {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl From<RegistryError> for lv_common::Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Io(e) => lv_common::Error::Io(e),
            other => lv_common::Error::InvalidRegistry(other.to_string()),
        }
    }
}

/// Histogram kind with its bucket parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistogramKind {
    Flag,
    Boolean,
    Count,
    Enumerated { n_values: usize },
    Linear(BucketRange),
    Exponential(BucketRange),
}

impl HistogramKind {
    pub fn name(&self) -> &'static str {
        match self {
            HistogramKind::Flag => "flag",
            HistogramKind::Boolean => "boolean",
            HistogramKind::Count => "count",
            HistogramKind::Enumerated { .. } => "enumerated",
            HistogramKind::Linear(_) => "linear",
            HistogramKind::Exponential(_) => "exponential",
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramDefinition {
    pub name: String,
    pub kind: HistogramKind,
    pub keyed: bool,
    boundaries: Vec<i64>,
}

impl HistogramDefinition {
    pub fn new(name: impl Into<String>, kind: HistogramKind, keyed: bool) -> Self {
        let boundaries = match &kind {
            HistogramKind::Linear(range) => range.linear(),
            HistogramKind::Exponential(range) => range.exponential(),
            _ => Vec::new(),
        };
        Self {
            name: name.into(),
            kind,
            keyed,
            boundaries,
        }
    }

    /// Bucket lower bounds for linear/exponential kinds, empty otherwise.
    pub fn boundaries(&self) -> &[i64] {
        &self.boundaries
    }
}

/// Histogram definition as it appears in the registry document.
#[derive(Debug, Deserialize)]
struct RawDefinition {
    kind: String,
    #[serde(default)]
    low: Option<Value>,
    #[serde(default)]
    high: Option<Value>,
    #[serde(default)]
    n_buckets: Option<Value>,
    #[serde(default)]
    n_values: Option<Value>,
    #[serde(default)]
    keyed: Option<Value>,
}

impl RawDefinition {
    fn into_definition(self, name: &str) -> Result<HistogramDefinition, RegistryError> {
        let keyed = match &self.keyed {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s == "true" => true,
            Some(Value::String(s)) if s == "false" => false,
            Some(other) => {
                return Err(RegistryError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("keyed must be a boolean, got {other}"),
                })
            }
        };

        let kind = match self.kind.as_str() {
            "flag" => HistogramKind::Flag,
            "boolean" => HistogramKind::Boolean,
            "count" => HistogramKind::Count,
            "enumerated" => {
                let n_values = integer_param(name, "n_values", self.n_values.as_ref())?;
                if !(1..MAX_VECTOR_WIDTH).contains(&n_values) {
                    return Err(RegistryError::InvalidParameter {
                        name: name.to_string(),
                        reason: format!(
                            "n_values must be in 1..{MAX_VECTOR_WIDTH}, got {n_values}"
                        ),
                    });
                }
                HistogramKind::Enumerated {
                    n_values: n_values as usize,
                }
            }
            "linear" | "exponential" => {
                let low = match self.low.as_ref() {
                    Some(v) => integer_param(name, "low", Some(v))?,
                    None => DEFAULT_LOW,
                };
                let high = integer_param(name, "high", self.high.as_ref())?;
                let n_buckets = integer_param(name, "n_buckets", self.n_buckets.as_ref())?;
                if n_buckets > MAX_VECTOR_WIDTH {
                    return Err(RegistryError::InvalidParameter {
                        name: name.to_string(),
                        reason: format!("n_buckets exceeds {MAX_VECTOR_WIDTH}"),
                    });
                }
                let range = BucketRange::new(low, high, n_buckets.max(0) as usize);
                range
                    .validate()
                    .map_err(|reason| RegistryError::InvalidParameter {
                        name: name.to_string(),
                        reason,
                    })?;
                if self.kind == "linear" {
                    HistogramKind::Linear(range)
                } else {
                    HistogramKind::Exponential(range)
                }
            }
            other => {
                return Err(RegistryError::UnknownKind {
                    name: name.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        Ok(HistogramDefinition::new(name, kind, keyed))
    }
}

/// Numeric parameter given either as a JSON number or a numeric string.
fn integer_param(
    name: &str,
    param: &'static str,
    value: Option<&Value>,
) -> Result<i64, RegistryError> {
    let value = value.ok_or_else(|| RegistryError::MissingParameter {
        name: name.to_string(),
        param,
    })?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RegistryError::InvalidParameter {
        name: name.to_string(),
        reason: format!("{param} is not an integer: {value}"),
    })
}

/// Immutable set of histogram definitions, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistogramRegistry {
    definitions: BTreeMap<String, HistogramDefinition>,
}

impl HistogramRegistry {
    pub fn new(definitions: impl IntoIterator<Item = HistogramDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    /// Parse a registry document.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, RawDefinition> = serde_json::from_str(json)?;
        let mut definitions = BTreeMap::new();
        for (name, raw) in raw {
            let definition = raw.into_definition(&name)?;
            definitions.insert(name, definition);
        }
        debug!(histograms = definitions.len(), "histogram registry parsed");
        Ok(Self { definitions })
    }

    /// Load a registry document from disk.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, name: &str) -> Option<&HistogramDefinition> {
        self.definitions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistogramDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "GC_MS": { "kind": "exponential", "low": 1, "high": 10000, "n_buckets": 50 },
        "PAGE_LOAD": { "kind": "linear", "high": "100", "n_buckets": 12 },
        "CRASHED": { "kind": "flag" },
        "SAFE_MODE": { "kind": "boolean" },
        "SEARCH_COUNTS": { "kind": "count", "keyed": "true" },
        "UPDATE_STATUS": { "kind": "enumerated", "n_values": 20, "keyed": false }
    }"#;

    #[test]
    fn parses_every_kind() {
        let registry = HistogramRegistry::from_json_str(REGISTRY).unwrap();
        assert_eq!(registry.len(), 6);

        let gc = registry.get("GC_MS").unwrap();
        assert_eq!(
            gc.kind,
            HistogramKind::Exponential(BucketRange::new(1, 10_000, 50))
        );
        assert_eq!(gc.boundaries().len(), 50);
        assert!(!gc.keyed);

        let page = registry.get("PAGE_LOAD").unwrap();
        assert_eq!(page.kind, HistogramKind::Linear(BucketRange::new(1, 100, 12)));
        assert_eq!(page.boundaries()[11], 100);

        assert!(registry.get("SEARCH_COUNTS").unwrap().keyed);
        assert_eq!(
            registry.get("UPDATE_STATUS").unwrap().kind,
            HistogramKind::Enumerated { n_values: 20 }
        );
        assert!(registry.get("CRASHED").unwrap().boundaries().is_empty());
    }

    #[test]
    fn iteration_is_ordered_by_name() {
        let registry = HistogramRegistry::from_json_str(REGISTRY).unwrap();
        let names: Vec<_> = registry.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn vector_widths_must_fit_a_column() {
        let err = HistogramRegistry::from_json_str(
            r#"{"X": {"kind": "enumerated", "n_values": 3000000000}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidParameter { .. }));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = HistogramRegistry::from_json_str(r#"{"X": {"kind": "categorical"}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownKind { ref kind, .. } if kind == "categorical"
        ));
    }

    #[test]
    fn missing_bucket_parameters_are_rejected() {
        let err = HistogramRegistry::from_json_str(r#"{"X": {"kind": "linear", "high": 10}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingParameter {
                param: "n_buckets",
                ..
            }
        ));

        let err = HistogramRegistry::from_json_str(r#"{"X": {"kind": "enumerated"}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingParameter {
                param: "n_values",
                ..
            }
        ));
    }

    #[test]
    fn degenerate_ranges_are_rejected() {
        let err = HistogramRegistry::from_json_str(
            r#"{"X": {"kind": "exponential", "low": 10, "high": 5, "n_buckets": 10}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidParameter { .. }));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Histograms.json");
        std::fs::write(&path, REGISTRY).unwrap();
        let registry = HistogramRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn converts_into_common_error() {
        let err: lv_common::Error = RegistryError::UnknownKind {
            name: "X".into(),
            kind: "y".into(),
        }
        .into();
        assert_eq!(err.code(), 11);
    }
}
