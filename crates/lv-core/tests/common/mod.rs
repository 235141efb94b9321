//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use arrow::record_batch::RecordBatch;
use lv_common::{FieldValue, Ping, CLIENT_ID_FIELD, CREATION_TIMESTAMP_FIELD};
use lv_core::decode::encode_ping;
use lv_core::{LocalStore, ObjectStore};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File};
use std::path::Path;

pub const REGISTRY: &str = r#"{
    "GC_MS": { "kind": "exponential", "low": 1, "high": 10000, "n_buckets": 50 },
    "SEARCH_COUNTS": { "kind": "count", "keyed": true },
    "CRASHED": { "kind": "flag" }
}"#;

pub const SOURCES: &str = r#"{ "telemetry": { "prefix": "telemetry", "doc_type": "main" } }"#;

pub fn ping(client: &str, ts: f64) -> Ping {
    Ping::new()
        .with(CLIENT_ID_FIELD, FieldValue::Str(client.into()))
        .with(CREATION_TIMESTAMP_FIELD, FieldValue::Float(ts))
        .with("submissionDate", FieldValue::Str("20160101".into()))
        .with("os", FieldValue::Str("Windows_NT".into()))
}

pub fn with_histograms(ping: Ping, json: &str) -> Ping {
    ping.with("payload.histograms", FieldValue::Str(json.into()))
}

pub fn with_keyed(ping: Ping, json: &str) -> Ping {
    ping.with("payload.keyedHistograms", FieldValue::Str(json.into()))
}

/// Write `pings` as one framed blob at `root/key`.
pub fn write_blob(root: &Path, key: &str, pings: &[Ping]) {
    let bytes: Vec<u8> = pings.iter().flat_map(encode_ping).collect();
    write_bytes(root, key, &bytes);
}

pub fn write_bytes(root: &Path, key: &str, bytes: &[u8]) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

/// Every record batch written under `prefix`.
pub fn read_output(root: &Path, prefix: &str) -> Vec<RecordBatch> {
    let store = LocalStore::new(root);
    store
        .list(prefix)
        .unwrap()
        .into_iter()
        .flat_map(|object| {
            let file = File::open(root.join(&object.key)).unwrap();
            ParquetRecordBatchReaderBuilder::try_new(file)
                .unwrap()
                .build()
                .unwrap()
                .map(|batch| batch.unwrap())
                .collect::<Vec<_>>()
        })
        .collect()
}
