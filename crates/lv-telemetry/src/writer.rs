//! Batched Parquet writer.
//!
//! Rows are buffered until `batch_rows` is reached, converted to a record
//! batch and appended to the current local file. Once the file's encoded
//! size reaches `max_file_bytes` it is closed and handed back to the caller
//! for upload, and the next batch starts a new file.

use crate::row::{rows_to_batch, Row};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the Parquet writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

impl From<WriteError> for lv_common::Error {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Io(e) => lv_common::Error::Io(e),
            other => lv_common::Error::Write(other.to_string()),
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Local staging directory for files in progress.
    pub staging_dir: PathBuf,

    /// Rotate to a new file once this many encoded bytes are written.
    pub max_file_bytes: u64,

    /// Rows per record batch.
    pub batch_rows: usize,
}

impl WriterConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            max_file_bytes: lv_config::job::DEFAULT_MAX_FILE_BYTES,
            batch_rows: lv_config::job::DEFAULT_BATCH_ROWS,
        }
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }
}

/// A closed local Parquet file, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedFile {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

struct OpenFile {
    path: PathBuf,
    writer: ArrowWriter<File>,
    rows: usize,
}

/// Buffers rows and writes size-bounded Parquet files.
pub struct BatchedWriter {
    schema: SchemaRef,
    config: WriterConfig,
    buffer: Vec<Row>,
    current: Option<OpenFile>,
}

impl BatchedWriter {
    pub fn new(schema: SchemaRef, config: WriterConfig) -> Self {
        let capacity = config.batch_rows;
        Self {
            schema,
            config,
            buffer: Vec::with_capacity(capacity),
            current: None,
        }
    }

    /// Buffer a row. Returns a file if this push completed one.
    pub fn push(&mut self, row: Row) -> Result<Option<FinishedFile>, WriteError> {
        self.buffer.push(row);
        if self.buffer.len() < self.config.batch_rows {
            return Ok(None);
        }
        self.flush_buffer()?;
        if self.current_size() >= self.config.max_file_bytes {
            return self.close_current();
        }
        Ok(None)
    }

    /// Write any buffered rows and close the last file.
    pub fn finish(mut self) -> Result<Option<FinishedFile>, WriteError> {
        self.flush_buffer()?;
        self.close_current()
    }

    fn current_size(&self) -> u64 {
        self.current
            .as_ref()
            .map(|f| (f.writer.bytes_written() + f.writer.in_progress_size()) as u64)
            .unwrap_or(0)
    }

    fn flush_buffer(&mut self) -> Result<(), WriteError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = rows_to_batch(&self.schema, &self.buffer)?;
        let rows = self.buffer.len();
        self.buffer.clear();

        let file = match self.current.take() {
            Some(file) => file,
            None => self.open_file()?,
        };
        let file = self.current.insert(file);
        file.writer.write(&batch)?;
        file.rows += rows;
        debug!(rows, path = %file.path.display(), "record batch written");
        Ok(())
    }

    fn open_file(&self) -> Result<OpenFile, WriteError> {
        std::fs::create_dir_all(&self.config.staging_dir)?;
        let path = self
            .config
            .staging_dir
            .join(format!("{}.parquet", uuid::Uuid::new_v4()));
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();
        let writer = ArrowWriter::try_new(File::create(&path)?, self.schema.clone(), Some(props))?;
        Ok(OpenFile {
            path,
            writer,
            rows: 0,
        })
    }

    fn close_current(&mut self) -> Result<Option<FinishedFile>, WriteError> {
        let Some(file) = self.current.take() else {
            return Ok(None);
        };
        file.writer.close()?;
        let bytes = std::fs::metadata(&file.path)?.len();
        info!(rows = file.rows, bytes, path = %file.path.display(), "parquet file closed");
        Ok(Some(FinishedFile {
            path: file.path,
            rows: file.rows,
            bytes,
        }))
    }
}
