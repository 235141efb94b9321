//! Longitudinal view output storage.
//!
//! This crate provides:
//! - Arrow schema generation from the histogram registry
//! - Dynamically shaped row values and their conversion to Arrow arrays
//! - Batched Parquet writer with size-based file rotation

pub mod row;
pub mod schema;
pub mod writer;

pub use row::{build_array, rows_to_batch, Cell, Row, RowBuilder, RowError, RowLayout};
pub use schema::{
    bucket_record_type, fixed_list_of, histogram_data_type, keyed_type, list_of,
    longitudinal_schema, system_type, PayloadColumn, SchemaError, PAYLOAD_COLUMNS, SCALAR_COLUMNS,
};
pub use writer::{BatchedWriter, FinishedFile, WriteError, WriterConfig};

/// Schema version for the longitudinal table.
pub const SCHEMA_VERSION: &str = "1.0.0";
