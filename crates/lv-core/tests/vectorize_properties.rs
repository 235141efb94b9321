//! Property-based tests for histogram vectorization.

use lv_config::{HistogramDefinition, HistogramKind};
use lv_core::vectorize::{
    default_value, vectorize, vectorize_keyed, HistogramSeries, KeyedHistogram, RawHistogram,
};
use lv_math::BucketRange;
use lv_telemetry::histogram_data_type;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn kind_strategy() -> impl Strategy<Value = HistogramKind> {
    prop_oneof![
        Just(HistogramKind::Flag),
        Just(HistogramKind::Boolean),
        Just(HistogramKind::Count),
        (1usize..40).prop_map(|n_values| HistogramKind::Enumerated { n_values }),
        (1i64..50, 60i64..5_000, 3usize..40)
            .prop_map(|(low, high, n)| HistogramKind::Linear(BucketRange::new(low, high, n))),
        (1i64..50, 60i64..100_000, 3usize..60)
            .prop_map(|(low, high, n)| HistogramKind::Exponential(BucketRange::new(low, high, n))),
    ]
}

fn definition_strategy() -> impl Strategy<Value = HistogramDefinition> {
    (kind_strategy(), any::<bool>())
        .prop_map(|(kind, keyed)| HistogramDefinition::new("H", kind, keyed))
}

fn raw_strategy() -> impl Strategy<Value = RawHistogram> {
    (
        0i64..10_000,
        prop::collection::btree_map(
            prop_oneof!["-?[0-9]{1,6}", "[a-z]{1,3}"],
            0i64..1_000,
            0..8,
        ),
    )
        .prop_map(|(sum, values)| RawHistogram { sum, values })
}

fn history_strategy() -> impl Strategy<Value = Vec<Option<RawHistogram>>> {
    prop::collection::vec(prop::option::of(raw_strategy()), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn missing_pings_get_the_default(def in definition_strategy(), history in history_strategy()) {
        let per_ping: Vec<Option<&RawHistogram>> = history.iter().map(Option::as_ref).collect();
        let series = vectorize(&def, &per_ping);
        prop_assert_eq!(series.len(), history.len());
        for (value, raw) in series.iter().zip(&history) {
            if raw.is_none() {
                prop_assert_eq!(value, &default_value(&def));
            }
        }
    }

    #[test]
    fn series_matches_generated_column_type(
        def in definition_strategy(),
        history in history_strategy(),
        labels in prop::collection::vec("[a-z]{1,6}", 1..4),
    ) {
        let series = if def.keyed {
            let keyed: Vec<Option<KeyedHistogram>> = history
                .iter()
                .map(|raw| {
                    raw.as_ref().map(|raw| {
                        labels
                            .iter()
                            .map(|label| (label.clone(), raw.clone()))
                            .collect::<BTreeMap<_, _>>()
                    })
                })
                .collect();
            let per_ping: Vec<Option<&KeyedHistogram>> = keyed.iter().map(Option::as_ref).collect();
            HistogramSeries::Keyed(vectorize_keyed(&def, &per_ping))
        } else {
            let per_ping: Vec<Option<&RawHistogram>> = history.iter().map(Option::as_ref).collect();
            HistogramSeries::Plain(vectorize(&def, &per_ping))
        };
        prop_assert!(series.into_cell().conforms_to(&histogram_data_type(&def)));
    }

    #[test]
    fn keyed_series_are_full_length(def in definition_strategy(), history in history_strategy()) {
        let keyed: Vec<Option<KeyedHistogram>> = history
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                raw.as_ref()
                    .map(|raw| BTreeMap::from([(format!("label-{}", i % 3), raw.clone())]))
            })
            .collect();
        let per_ping: Vec<Option<&KeyedHistogram>> = keyed.iter().map(Option::as_ref).collect();
        for series in vectorize_keyed(&def, &per_ping).values() {
            prop_assert_eq!(series.len(), history.len());
        }
    }
}
