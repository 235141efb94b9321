//! Longitudinal record building.
//!
//! One row per client session. Any failure while building a row is scoped to
//! that client: the caller logs the [`BuildError`] and moves on.

pub mod system;

pub use system::SystemInfo;

use crate::session::ClientSession;
use crate::vectorize::{
    parse_payload, vectorize, vectorize_keyed, HistogramSeries, KeyedHistogram, RawHistogram,
};
use lv_config::{HistogramDefinition, HistogramRegistry};
use lv_telemetry::schema::{CLIENT_ID, CREATION_TIMESTAMP, SUBMISSION_DATE, SYSTEM};
use lv_telemetry::{Cell, Row, RowError, RowLayout, PAYLOAD_COLUMNS, SCALAR_COLUMNS};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub const SUBMISSION_DATE_FIELD: &str = "submissionDate";
pub const SYSTEM_FIELD: &str = "environment.system";
pub const HISTOGRAMS_FIELD: &str = "payload.histograms";
pub const KEYED_HISTOGRAMS_FIELD: &str = "payload.keyedHistograms";

/// Why a client's row could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Field(#[from] lv_common::Error),

    #[error("malformed JSON in {field}: {source}")]
    Json {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Row(#[from] RowError),
}

impl From<BuildError> for lv_common::Error {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Field(e) => e,
            BuildError::Row(e) => e.into(),
            json @ BuildError::Json { .. } => lv_common::Error::Decode {
                key: String::new(),
                reason: json.to_string(),
            },
        }
    }
}

fn json_error(field: impl Into<String>) -> impl FnOnce(serde_json::Error) -> BuildError {
    let field = field.into();
    move |source| BuildError::Json { field, source }
}

/// Builds rows against a fixed registry and layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder<'a> {
    registry: &'a HistogramRegistry,
    layout: &'a RowLayout,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(registry: &'a HistogramRegistry, layout: &'a RowLayout) -> Self {
        Self { registry, layout }
    }

    pub fn build(&self, session: &ClientSession) -> Result<Row, BuildError> {
        let mut row = self.layout.builder();
        let first = session.first();

        for scalar in SCALAR_COLUMNS {
            let cell = if scalar.column == CLIENT_ID {
                Cell::Str(session.client_id.to_string())
            } else {
                first
                    .str_field(scalar.source)?
                    .map_or(Cell::Null, |s| Cell::Str(s.to_string()))
            };
            row.set(scalar.column, cell)?;
        }

        row.set(
            CREATION_TIMESTAMP,
            Cell::List(
                session
                    .pings
                    .iter()
                    .map(|p| p.creation_timestamp().map_or(Cell::Null, Cell::Float))
                    .collect(),
            ),
        )?;

        let mut dates = Vec::with_capacity(session.len());
        for ping in &session.pings {
            dates.push(
                ping.str_field(SUBMISSION_DATE_FIELD)?
                    .map_or(Cell::Null, |s| Cell::Str(s.to_string())),
            );
        }
        row.set(SUBMISSION_DATE, Cell::List(dates))?;

        for payload in PAYLOAD_COLUMNS {
            let mut blobs = Vec::with_capacity(session.len());
            for ping in &session.pings {
                let blob = ping.str_field(payload.source)?.unwrap_or_default();
                blobs.push(Cell::Str(blob.to_string()));
            }
            row.set(payload.column, Cell::List(blobs))?;
        }

        let mut systems = Vec::with_capacity(session.len());
        for ping in &session.pings {
            let cell = match ping.str_field(SYSTEM_FIELD)? {
                Some(json) if !json.trim().is_empty() => SystemInfo::from_json(json)
                    .map_err(json_error(SYSTEM_FIELD))?
                    .into_cell(),
                _ => Cell::Null,
            };
            systems.push(cell);
        }
        row.set(SYSTEM, Cell::List(systems))?;

        let mut histograms = payloads(session, HISTOGRAMS_FIELD)?;
        let mut keyed_histograms = payloads(session, KEYED_HISTOGRAMS_FIELD)?;
        for definition in self.registry.iter() {
            let series = if definition.keyed {
                keyed_series(definition, &mut keyed_histograms)?
            } else {
                plain_series(definition, &mut histograms)?
            };
            if let Some(series) = series {
                row.set(&definition.name, series.into_cell())?;
            }
        }

        Ok(row.finish()?)
    }
}

/// Parse one histogram blob per ping.
fn payloads(session: &ClientSession, field: &str) -> Result<Vec<Map<String, Value>>, BuildError> {
    let mut parsed = Vec::with_capacity(session.len());
    for ping in &session.pings {
        let json = ping.str_field(field)?.unwrap_or_default();
        parsed.push(parse_payload(json).map_err(json_error(field))?);
    }
    Ok(parsed)
}

/// Take `name` out of every ping's blob. `None` when no ping reports it.
fn take_entries<T: DeserializeOwned>(
    payloads: &mut [Map<String, Value>],
    name: &str,
) -> Result<Option<Vec<Option<T>>>, BuildError> {
    let mut reported = false;
    let mut entries = Vec::with_capacity(payloads.len());
    for payload in payloads.iter_mut() {
        let entry = match payload.remove(name) {
            None | Some(Value::Null) => None,
            Some(value) => {
                reported = true;
                Some(serde_json::from_value(value).map_err(json_error(name))?)
            }
        };
        entries.push(entry);
    }
    Ok(reported.then_some(entries))
}

fn plain_series(
    definition: &HistogramDefinition,
    payloads: &mut [Map<String, Value>],
) -> Result<Option<HistogramSeries>, BuildError> {
    let Some(entries) = take_entries::<RawHistogram>(payloads, &definition.name)? else {
        return Ok(None);
    };
    let per_ping: Vec<Option<&RawHistogram>> = entries.iter().map(Option::as_ref).collect();
    Ok(Some(HistogramSeries::Plain(vectorize(definition, &per_ping))))
}

fn keyed_series(
    definition: &HistogramDefinition,
    payloads: &mut [Map<String, Value>],
) -> Result<Option<HistogramSeries>, BuildError> {
    let Some(entries) = take_entries::<KeyedHistogram>(payloads, &definition.name)? else {
        return Ok(None);
    };
    let per_ping: Vec<Option<&KeyedHistogram>> = entries.iter().map(Option::as_ref).collect();
    Ok(Some(HistogramSeries::Keyed(vectorize_keyed(
        definition, &per_ping,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_common::{ClientId, FieldValue, Ping, CLIENT_ID_FIELD, CREATION_TIMESTAMP_FIELD};
    use lv_config::HistogramKind;
    use lv_math::BucketRange;
    use lv_telemetry::longitudinal_schema;

    fn registry() -> HistogramRegistry {
        HistogramRegistry::new(vec![
            HistogramDefinition::new(
                "GC_MS",
                HistogramKind::Exponential(BucketRange::new(1, 10_000, 50)),
                false,
            ),
            HistogramDefinition::new("SEARCH_COUNTS", HistogramKind::Count, true),
            HistogramDefinition::new("NEVER_SEEN", HistogramKind::Flag, false),
        ])
    }

    fn ping(ts: f64) -> Ping {
        Ping::new()
            .with(CLIENT_ID_FIELD, FieldValue::Str("c1".into()))
            .with(CREATION_TIMESTAMP_FIELD, FieldValue::Float(ts))
    }

    fn session(pings: Vec<Ping>) -> ClientSession {
        ClientSession::from_pings(ClientId::from("c1"), pings).unwrap()
    }

    fn cell<'r>(layout: &RowLayout, row: &'r Row, column: &str) -> &'r Cell {
        &row.cells()[layout.schema().index_of(column).unwrap()]
    }

    #[test]
    fn builds_fixed_and_histogram_columns() {
        let registry = registry();
        let layout = RowLayout::new(longitudinal_schema(&registry).unwrap());
        let builder = RecordBuilder::new(&registry, &layout);

        let first = ping(1.0)
            .with("os", FieldValue::Str("Linux".into()))
            .with("payload.info", FieldValue::Str("{\"a\":1}".into()))
            .with(
                KEYED_HISTOGRAMS_FIELD,
                FieldValue::Str(
                    r#"{"SEARCH_COUNTS": {"google": {"sum": 2, "values": {"0": 2}}}}"#.into(),
                ),
            );
        let second = ping(2.0).with(
            HISTOGRAMS_FIELD,
            FieldValue::Blob(
                br#"{"GC_MS": {"sum": 36, "values": {"12": 3}}, "OTHER": 7}"#.to_vec(),
            ),
        );

        let row = builder.build(&session(vec![second, first])).unwrap();
        assert_eq!(cell(&layout, &row, "client_id"), &Cell::Str("c1".into()));
        assert_eq!(cell(&layout, &row, "os"), &Cell::Str("Linux".into()));
        assert_eq!(
            cell(&layout, &row, "creation_timestamp"),
            &Cell::List(vec![Cell::Float(1.0), Cell::Float(2.0)])
        );
        assert_eq!(
            cell(&layout, &row, "info"),
            &Cell::List(vec![Cell::Str("{\"a\":1}".into()), Cell::Str(String::new())])
        );
        assert_eq!(
            cell(&layout, &row, "system"),
            &Cell::List(vec![Cell::Null, Cell::Null])
        );
        assert_eq!(cell(&layout, &row, "NEVER_SEEN"), &Cell::Null);

        let Cell::List(gc) = cell(&layout, &row, "GC_MS") else {
            panic!("GC_MS should be a list");
        };
        assert_eq!(gc.len(), 2);
        let Cell::Struct(record) = &gc[1] else {
            panic!("expected bucket record");
        };
        assert_eq!(record[1], Cell::Int(36));

        assert_eq!(
            cell(&layout, &row, "SEARCH_COUNTS"),
            &Cell::Map(vec![(
                "google".into(),
                Cell::List(vec![Cell::Int(2), Cell::Int(0)])
            )])
        );
    }

    #[test]
    fn malformed_histogram_blob_fails_the_client() {
        let registry = registry();
        let layout = RowLayout::new(longitudinal_schema(&registry).unwrap());
        let builder = RecordBuilder::new(&registry, &layout);
        let broken = ping(1.0).with(HISTOGRAMS_FIELD, FieldValue::Str("{not json".into()));

        let err = builder.build(&session(vec![broken])).unwrap_err();
        assert!(matches!(err, BuildError::Json { ref field, .. } if field == HISTOGRAMS_FIELD));
    }

    #[test]
    fn wrongly_typed_field_fails_the_client() {
        let registry = registry();
        let layout = RowLayout::new(longitudinal_schema(&registry).unwrap());
        let builder = RecordBuilder::new(&registry, &layout);
        let broken = ping(1.0).with("os", FieldValue::Int(3));

        let err = builder.build(&session(vec![broken])).unwrap_err();
        assert!(matches!(err, BuildError::Field(lv_common::Error::FieldType { .. })));
    }

    #[test]
    fn histograms_outside_registry_are_never_decoded() {
        let registry = registry();
        let layout = RowLayout::new(longitudinal_schema(&registry).unwrap());
        let builder = RecordBuilder::new(&registry, &layout);
        let odd = ping(1.0).with(
            HISTOGRAMS_FIELD,
            FieldValue::Str(r#"{"UNKNOWN": [1, 2, 3]}"#.into()),
        );
        assert!(builder.build(&session(vec![odd])).is_ok());
    }
}
