//! Arrow schema for the longitudinal table.
//!
//! The table has a fixed part (client scalars, per-ping payload blobs, the
//! parsed system environment) followed by one column per registry
//! histogram. Histogram column shapes are a total function of
//! `(kind, keyed)`:
//!
//! | kind                  | non-keyed column                                  |
//! |-----------------------|---------------------------------------------------|
//! | flag                  | `list<bool>`                                      |
//! | count                 | `list<int64>`                                     |
//! | boolean               | `list<fixed_size_list<int64>[2]>`                 |
//! | enumerated(n)         | `list<fixed_size_list<int64>[n + 1]>`             |
//! | linear / exponential  | `list<struct<values: fixed_size_list<int64>[buckets], sum: int64>>` |
//!
//! Keyed histograms wrap the non-keyed shape in `map<utf8, _>`.

use arrow::datatypes::{DataType, Field, Fields, Schema, SchemaRef};
use lv_config::{HistogramDefinition, HistogramKind, HistogramRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

pub const CLIENT_ID: &str = "client_id";
pub const CREATION_TIMESTAMP: &str = "creation_timestamp";
pub const SUBMISSION_DATE: &str = "submission_date";
pub const SYSTEM: &str = "system";

/// Bucket record child names.
pub const BUCKET_VALUES: &str = "values";
pub const BUCKET_SUM: &str = "sum";

/// A column filled from a ping field of the same meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadColumn {
    pub column: &'static str,
    pub source: &'static str,
}

const fn col(column: &'static str, source: &'static str) -> PayloadColumn {
    PayloadColumn { column, source }
}

/// Scalars taken from the chronologically first ping.
pub const SCALAR_COLUMNS: &[PayloadColumn] = &[
    col(CLIENT_ID, "clientId"),
    col("os", "os"),
    col("normalized_channel", "normalizedChannel"),
    col("app_name", "appName"),
];

/// Raw JSON blobs kept verbatim, one element per ping.
pub const PAYLOAD_COLUMNS: &[PayloadColumn] = &[
    col("simple_measurements", "payload.simpleMeasurements"),
    col("info", "payload.info"),
    col("log", "payload.log"),
    col("addon_details", "payload.addonDetails"),
    col("build", "environment.build"),
    col("settings", "environment.settings"),
    col("profile", "environment.profile"),
    col("partner", "environment.partner"),
    col("addons", "environment.addons"),
];

/// Errors from schema generation.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("histogram {0} collides with a fixed column")]
    DuplicateColumn(String),
}

impl From<SchemaError> for lv_common::Error {
    fn from(err: SchemaError) -> Self {
        lv_common::Error::SchemaValidation(err.to_string())
    }
}

/// `list<dt>` with a nullable `item` child.
pub fn list_of(data_type: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", data_type, true)))
}

/// `fixed_size_list<dt>[width]` with a nullable `item` child.
pub fn fixed_list_of(data_type: DataType, width: usize) -> DataType {
    // Registry loading keeps widths within i32.
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    DataType::FixedSizeList(Arc::new(Field::new("item", data_type, true)), width)
}

/// `struct<values: fixed_size_list<int64>[buckets], sum: int64>`.
pub fn bucket_record_type(buckets: usize) -> DataType {
    DataType::Struct(Fields::from(vec![
        Field::new(BUCKET_VALUES, fixed_list_of(DataType::Int64, buckets), true),
        Field::new(BUCKET_SUM, DataType::Int64, true),
    ]))
}

/// `map<utf8, value>` with the conventional `entries/key/value` names.
pub fn keyed_type(value: DataType) -> DataType {
    let entries = Fields::from(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", value, true),
    ]);
    DataType::Map(
        Arc::new(Field::new("entries", DataType::Struct(entries), false)),
        false,
    )
}

/// Column type for one registry histogram.
pub fn histogram_data_type(definition: &HistogramDefinition) -> DataType {
    let per_ping = match definition.kind {
        HistogramKind::Flag => DataType::Boolean,
        HistogramKind::Count => DataType::Int64,
        HistogramKind::Boolean => fixed_list_of(DataType::Int64, 2),
        HistogramKind::Enumerated { n_values } => fixed_list_of(DataType::Int64, n_values + 1),
        HistogramKind::Linear(_) | HistogramKind::Exponential(_) => {
            bucket_record_type(definition.boundaries().len())
        }
    };
    let series = list_of(per_ping);
    if definition.keyed {
        keyed_type(series)
    } else {
        series
    }
}

/// Nested record parsed from `environment.system`.
pub fn system_type() -> DataType {
    let cpu = Fields::from(vec![
        Field::new("count", DataType::Int64, true),
        Field::new("cores", DataType::Int64, true),
        Field::new("vendor", DataType::Utf8, true),
        Field::new("family", DataType::Int64, true),
        Field::new("model", DataType::Int64, true),
        Field::new("stepping", DataType::Int64, true),
        Field::new("l2cache_kb", DataType::Int64, true),
        Field::new("l3cache_kb", DataType::Int64, true),
        Field::new("speed_mhz", DataType::Int64, true),
        Field::new("extensions", list_of(DataType::Utf8), true),
    ]);
    let os = Fields::from(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("version", DataType::Utf8, true),
        Field::new("locale", DataType::Utf8, true),
    ]);
    DataType::Struct(Fields::from(vec![
        Field::new("memory_mb", DataType::Int64, true),
        Field::new("virtual_max_mb", DataType::Int64, true),
        Field::new("is_wow64", DataType::Boolean, true),
        Field::new("cpu", DataType::Struct(cpu), true),
        Field::new("os", DataType::Struct(os), true),
    ]))
}

/// Build the full table schema for `registry`.
pub fn longitudinal_schema(registry: &HistogramRegistry) -> Result<SchemaRef, SchemaError> {
    let mut fields = Vec::with_capacity(
        SCALAR_COLUMNS.len() + PAYLOAD_COLUMNS.len() + 3 + registry.len(),
    );

    for scalar in SCALAR_COLUMNS {
        fields.push(Field::new(
            scalar.column,
            DataType::Utf8,
            scalar.column != CLIENT_ID,
        ));
    }
    fields.push(Field::new(
        CREATION_TIMESTAMP,
        list_of(DataType::Float64),
        true,
    ));
    fields.push(Field::new(SUBMISSION_DATE, list_of(DataType::Utf8), true));
    for payload in PAYLOAD_COLUMNS {
        fields.push(Field::new(payload.column, list_of(DataType::Utf8), true));
    }
    fields.push(Field::new(SYSTEM, list_of(system_type()), true));

    let mut names: HashSet<String> = fields.iter().map(|f| f.name().clone()).collect();
    for definition in registry.iter() {
        if !names.insert(definition.name.clone()) {
            return Err(SchemaError::DuplicateColumn(definition.name.clone()));
        }
        fields.push(Field::new(
            definition.name.as_str(),
            histogram_data_type(definition),
            true,
        ));
    }

    let metadata = HashMap::from([(
        "schema_version".to_string(),
        crate::SCHEMA_VERSION.to_string(),
    )]);
    Ok(Arc::new(Schema::new_with_metadata(fields, metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_math::BucketRange;

    fn registry() -> HistogramRegistry {
        HistogramRegistry::new(vec![
            HistogramDefinition::new("CRASHED", HistogramKind::Flag, false),
            HistogramDefinition::new("SAFE_MODE", HistogramKind::Boolean, false),
            HistogramDefinition::new("SEARCH_COUNTS", HistogramKind::Count, true),
            HistogramDefinition::new(
                "UPDATE_STATUS",
                HistogramKind::Enumerated { n_values: 4 },
                false,
            ),
            HistogramDefinition::new(
                "GC_MS",
                HistogramKind::Exponential(BucketRange::new(1, 10_000, 50)),
                false,
            ),
        ])
    }

    #[test]
    fn fixed_columns_come_first() {
        let schema = longitudinal_schema(&HistogramRegistry::default()).unwrap();
        assert_eq!(schema.field(0).name(), CLIENT_ID);
        assert!(!schema.field(0).is_nullable());
        assert_eq!(
            schema.fields().len(),
            SCALAR_COLUMNS.len() + PAYLOAD_COLUMNS.len() + 3
        );
        assert_eq!(
            schema.metadata().get("schema_version").map(String::as_str),
            Some(crate::SCHEMA_VERSION)
        );
    }

    #[test]
    fn one_column_per_histogram() {
        let registry = registry();
        let schema = longitudinal_schema(&registry).unwrap();
        for definition in registry.iter() {
            let field = schema.field_with_name(&definition.name).unwrap();
            assert_eq!(field.data_type(), &histogram_data_type(definition));
        }
    }

    #[test]
    fn shapes_follow_kind() {
        let registry = registry();
        let shape = |name: &str| histogram_data_type(registry.get(name).unwrap());

        assert_eq!(shape("CRASHED"), list_of(DataType::Boolean));
        assert_eq!(shape("SAFE_MODE"), list_of(fixed_list_of(DataType::Int64, 2)));
        assert_eq!(shape("UPDATE_STATUS"), list_of(fixed_list_of(DataType::Int64, 5)));
        assert_eq!(shape("GC_MS"), list_of(bucket_record_type(50)));
        assert_eq!(shape("SEARCH_COUNTS"), keyed_type(list_of(DataType::Int64)));
    }

    #[test]
    fn colliding_histogram_name_is_rejected() {
        let registry = HistogramRegistry::new(vec![HistogramDefinition::new(
            "os",
            HistogramKind::Count,
            false,
        )]);
        assert!(matches!(
            longitudinal_schema(&registry),
            Err(SchemaError::DuplicateColumn(_))
        ));
    }
}
