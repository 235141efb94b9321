//! Histogram vectorization.
//!
//! Each registry histogram becomes one fixed-shape value per ping, so a
//! client's history turns into an array aligned with its pings. Pings that
//! did not report the histogram get the kind's default value.
//!
//! | kind                 | per-ping value                        | default          |
//! |----------------------|---------------------------------------|------------------|
//! | flag                 | `values["0"] > 0`                     | `false`          |
//! | boolean              | `[values["0"], values["1"]]`          | `[0, 0]`         |
//! | count                | `values["0"]`                         | `0`              |
//! | enumerated(n)        | `n + 1` counts indexed by label       | zeros            |
//! | linear / exponential | counts indexed by bucket, plus `sum`  | zeros, `sum = 0` |
//!
//! Keyed histograms are vectorized per sub-label over the union of labels
//! seen anywhere in the client's history.

pub mod raw;

pub use raw::{parse_payload, KeyedHistogram, RawHistogram};

use lv_config::{HistogramDefinition, HistogramKind};
use lv_math::bucket_index;
use lv_telemetry::Cell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One ping's vectorized histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistogramValue {
    Flag(bool),
    Count(i64),
    Vector(Vec<i64>),
    Buckets { values: Vec<i64>, sum: i64 },
}

impl HistogramValue {
    pub fn into_cell(self) -> Cell {
        match self {
            HistogramValue::Flag(v) => Cell::Bool(v),
            HistogramValue::Count(v) => Cell::Int(v),
            HistogramValue::Vector(values) => int_list(values),
            HistogramValue::Buckets { values, sum } => {
                Cell::Struct(vec![int_list(values), Cell::Int(sum)])
            }
        }
    }
}

fn int_list(values: Vec<i64>) -> Cell {
    Cell::List(values.into_iter().map(Cell::Int).collect())
}

/// A client's vectorized history of one histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistogramSeries {
    Plain(Vec<HistogramValue>),
    Keyed(BTreeMap<String, Vec<HistogramValue>>),
}

impl HistogramSeries {
    pub fn into_cell(self) -> Cell {
        match self {
            HistogramSeries::Plain(values) => series_cell(values),
            HistogramSeries::Keyed(by_label) => Cell::Map(
                by_label
                    .into_iter()
                    .map(|(label, values)| (label, series_cell(values)))
                    .collect(),
            ),
        }
    }
}

fn series_cell(values: Vec<HistogramValue>) -> Cell {
    Cell::List(values.into_iter().map(HistogramValue::into_cell).collect())
}

/// Value used for a ping that did not report the histogram.
pub fn default_value(definition: &HistogramDefinition) -> HistogramValue {
    match &definition.kind {
        HistogramKind::Flag => HistogramValue::Flag(false),
        HistogramKind::Boolean => HistogramValue::Vector(vec![0, 0]),
        HistogramKind::Count => HistogramValue::Count(0),
        HistogramKind::Enumerated { n_values } => HistogramValue::Vector(vec![0; n_values + 1]),
        HistogramKind::Linear(_) | HistogramKind::Exponential(_) => HistogramValue::Buckets {
            values: vec![0; definition.boundaries().len()],
            sum: 0,
        },
    }
}

/// Bucket labels are integers, occasionally written as `"12.0"`.
fn parse_label(label: &str) -> Option<i64> {
    let label = label.trim();
    if let Ok(v) = label.parse::<i64>() {
        return Some(v);
    }
    let v = label.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

/// Vectorize one reported histogram.
pub fn flatten(definition: &HistogramDefinition, raw: &RawHistogram) -> HistogramValue {
    match &definition.kind {
        HistogramKind::Flag => HistogramValue::Flag(raw.count("0") > 0),
        HistogramKind::Boolean => HistogramValue::Vector(vec![raw.count("0"), raw.count("1")]),
        HistogramKind::Count => HistogramValue::Count(raw.count("0")),
        HistogramKind::Enumerated { n_values } => {
            let mut vector = vec![0; n_values + 1];
            for (label, count) in &raw.values {
                match parse_label(label)
                    .and_then(|v| usize::try_from(v).ok())
                    .filter(|idx| *idx < vector.len())
                {
                    Some(idx) => vector[idx] = *count,
                    None => debug!(
                        histogram = %definition.name,
                        label = %label,
                        n_values,
                        "dropping out-of-range enumerated label"
                    ),
                }
            }
            HistogramValue::Vector(vector)
        }
        HistogramKind::Linear(_) | HistogramKind::Exponential(_) => {
            let boundaries = definition.boundaries();
            let mut values = vec![0; boundaries.len()];
            for (label, count) in &raw.values {
                if let Some(idx) = parse_label(label).and_then(|v| bucket_index(boundaries, v)) {
                    values[idx] = *count;
                }
            }
            HistogramValue::Buckets {
                values,
                sum: raw.sum,
            }
        }
    }
}

/// Vectorize a non-keyed histogram across a client's pings.
pub fn vectorize(
    definition: &HistogramDefinition,
    per_ping: &[Option<&RawHistogram>],
) -> Vec<HistogramValue> {
    per_ping
        .iter()
        .map(|raw| match raw {
            Some(raw) => flatten(definition, raw),
            None => default_value(definition),
        })
        .collect()
}

/// Vectorize a keyed histogram across a client's pings.
///
/// Every label reported by any ping gets a full-length series.
pub fn vectorize_keyed(
    definition: &HistogramDefinition,
    per_ping: &[Option<&KeyedHistogram>],
) -> BTreeMap<String, Vec<HistogramValue>> {
    let labels: BTreeSet<&String> = per_ping.iter().flatten().flat_map(|h| h.keys()).collect();
    labels
        .into_iter()
        .map(|label| {
            let column: Vec<Option<&RawHistogram>> = per_ping
                .iter()
                .map(|keyed| keyed.and_then(|h| h.get(label)))
                .collect();
            (label.clone(), vectorize(definition, &column))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_math::BucketRange;

    fn gc_ms() -> HistogramDefinition {
        HistogramDefinition::new(
            "GC_MS",
            HistogramKind::Exponential(BucketRange::new(1, 10_000, 50)),
            false,
        )
    }

    #[test]
    fn exponential_series_places_counts_at_matching_bucket() {
        let def = gc_ms();
        let reported = RawHistogram::new(36, [("12", 3)]);
        let series = vectorize(&def, &[None, Some(&reported), None]);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0], default_value(&def));
        assert_eq!(series[2], default_value(&def));

        let mut expected = vec![0; 50];
        expected[10] = 3;
        assert_eq!(
            series[1],
            HistogramValue::Buckets {
                values: expected,
                sum: 36
            }
        );
    }

    #[test]
    fn labels_without_boundary_are_dropped() {
        let def = gc_ms();
        let raw = RawHistogram::new(5, [("11", 4), ("12.0", 1), ("bogus", 9)]);
        let HistogramValue::Buckets { values, sum } = flatten(&def, &raw) else {
            panic!("expected buckets");
        };
        assert_eq!(sum, 5);
        assert_eq!(values.iter().sum::<i64>(), 1);
        assert_eq!(values[10], 1);
    }

    #[test]
    fn flag_boolean_and_count() {
        let flag = HistogramDefinition::new("F", HistogramKind::Flag, false);
        let boolean = HistogramDefinition::new("B", HistogramKind::Boolean, false);
        let count = HistogramDefinition::new("C", HistogramKind::Count, false);

        let raw = RawHistogram::new(0, [("0", 2), ("1", 7)]);
        assert_eq!(flatten(&flag, &raw), HistogramValue::Flag(true));
        assert_eq!(flatten(&boolean, &raw), HistogramValue::Vector(vec![2, 7]));
        assert_eq!(flatten(&count, &raw), HistogramValue::Count(2));

        let only_one = RawHistogram::new(0, [("1", 1)]);
        assert_eq!(flatten(&flag, &only_one), HistogramValue::Flag(false));
        assert_eq!(flatten(&boolean, &only_one), HistogramValue::Vector(vec![0, 1]));
        assert_eq!(flatten(&count, &only_one), HistogramValue::Count(0));

        assert_eq!(default_value(&flag), HistogramValue::Flag(false));
        assert_eq!(default_value(&boolean), HistogramValue::Vector(vec![0, 0]));
        assert_eq!(default_value(&count), HistogramValue::Count(0));
    }

    #[test]
    fn enumerated_drops_out_of_range_labels() {
        let def = HistogramDefinition::new("E", HistogramKind::Enumerated { n_values: 3 }, false);
        let raw = RawHistogram::new(0, [("0", 1), ("3", 4), ("4", 9), ("-1", 9)]);
        assert_eq!(flatten(&def, &raw), HistogramValue::Vector(vec![1, 0, 0, 4]));
        assert_eq!(default_value(&def), HistogramValue::Vector(vec![0; 4]));
    }

    #[test]
    fn keyed_series_covers_union_of_labels() {
        let def = HistogramDefinition::new("SEARCH_COUNTS", HistogramKind::Count, true);
        let first: KeyedHistogram =
            BTreeMap::from([("google".to_string(), RawHistogram::new(0, [("0", 3)]))]);
        let third: KeyedHistogram = BTreeMap::from([
            ("bing".to_string(), RawHistogram::new(0, [("0", 1)])),
            ("google".to_string(), RawHistogram::new(0, [("0", 2)])),
        ]);
        let per_ping = [Some(&first), None, Some(&third), None, None];

        let by_label = vectorize_keyed(&def, &per_ping);
        assert_eq!(by_label.len(), 2);
        let counts = |label: &str| -> Vec<HistogramValue> { by_label[label].clone() };
        assert_eq!(
            counts("google"),
            [3, 0, 2, 0, 0].map(HistogramValue::Count).to_vec()
        );
        assert_eq!(
            counts("bing"),
            [0, 0, 1, 0, 0].map(HistogramValue::Count).to_vec()
        );
    }

    #[test]
    fn cells_have_expected_shape() {
        let value = HistogramValue::Buckets {
            values: vec![0, 1],
            sum: 4,
        };
        assert_eq!(
            value.into_cell(),
            Cell::Struct(vec![
                Cell::List(vec![Cell::Int(0), Cell::Int(1)]),
                Cell::Int(4)
            ])
        );

        let series = HistogramSeries::Keyed(BTreeMap::from([(
            "a".to_string(),
            vec![HistogramValue::Flag(true)],
        )]));
        assert_eq!(
            series.into_cell(),
            Cell::Map(vec![("a".to_string(), Cell::List(vec![Cell::Bool(true)]))])
        );
    }
}
