//! Dynamically shaped row values.
//!
//! The histogram columns are only known once the registry is loaded, so rows
//! are assembled as trees of [`Cell`]s and checked against the schema field
//! by field before they are accepted. Batches of rows are then turned into
//! Arrow arrays column by column.

use arrow::array::{
    ArrayRef, BooleanArray, FixedSizeListArray, Float64Array, Int64Array, ListArray, MapArray,
    StringArray, StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

static NULL: Cell = Cell::Null;

/// One value in a row, shaped like the Arrow type of its column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Cell>),
    /// Children in schema field order.
    Struct(Vec<Cell>),
    Map(Vec<(String, Cell)>),
}

impl Cell {
    /// Whether this value can be stored in a column of `data_type`.
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Cell::Null, _) => true,
            (Cell::Bool(_), DataType::Boolean)
            | (Cell::Int(_), DataType::Int64)
            | (Cell::Float(_), DataType::Float64)
            | (Cell::Str(_), DataType::Utf8) => true,
            (Cell::List(items), DataType::List(item)) => {
                items.iter().all(|c| c.conforms_to(item.data_type()))
            }
            (Cell::List(items), DataType::FixedSizeList(item, width)) => {
                usize::try_from(*width).is_ok_and(|w| w == items.len())
                    && items.iter().all(|c| c.conforms_to(item.data_type()))
            }
            (Cell::Struct(children), DataType::Struct(fields)) => {
                children.len() == fields.len()
                    && children
                        .iter()
                        .zip(fields.iter())
                        .all(|(c, f)| c.conforms_to(f.data_type()))
            }
            (Cell::Map(entries), DataType::Map(entry, _)) => match entry.data_type() {
                DataType::Struct(kv) if kv.len() == 2 && kv[0].data_type() == &DataType::Utf8 => {
                    entries.iter().all(|(_, v)| v.conforms_to(kv[1].data_type()))
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Str(_) => "string",
            Cell::List(_) => "list",
            Cell::Struct(_) => "struct",
            Cell::Map(_) => "map",
        }
    }
}

/// Errors from assembling a row.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column {column}: value does not match {expected}")]
    ShapeMismatch { column: String, expected: String },

    #[error("required column {0} is null")]
    MissingRequired(String),
}

impl From<RowError> for lv_common::Error {
    fn from(err: RowError) -> Self {
        lv_common::Error::SchemaValidation(err.to_string())
    }
}

/// A complete row, one cell per schema field.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// Schema plus a name index, shared by every row builder of a job.
#[derive(Debug, Clone)]
pub struct RowLayout {
    schema: SchemaRef,
    index: HashMap<String, usize>,
}

impl RowLayout {
    pub fn new(schema: SchemaRef) -> Self {
        let index = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().clone(), i))
            .collect();
        Self { schema, index }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn builder(&self) -> RowBuilder<'_> {
        RowBuilder {
            layout: self,
            cells: vec![Cell::Null; self.schema.fields().len()],
        }
    }
}

/// Collects cells for one row, validating each against its column.
#[derive(Debug)]
pub struct RowBuilder<'a> {
    layout: &'a RowLayout,
    cells: Vec<Cell>,
}

impl RowBuilder<'_> {
    pub fn set(&mut self, column: &str, cell: Cell) -> Result<(), RowError> {
        let idx = *self
            .layout
            .index
            .get(column)
            .ok_or_else(|| RowError::UnknownColumn(column.to_string()))?;
        let field = self.layout.schema.field(idx);
        if !cell.conforms_to(field.data_type()) {
            return Err(RowError::ShapeMismatch {
                column: column.to_string(),
                expected: field.data_type().to_string(),
            });
        }
        self.cells[idx] = cell;
        Ok(())
    }

    pub fn finish(self) -> Result<Row, RowError> {
        for (field, cell) in self.layout.schema.fields().iter().zip(&self.cells) {
            if !field.is_nullable() && *cell == Cell::Null {
                return Err(RowError::MissingRequired(field.name().clone()));
            }
        }
        Ok(Row { cells: self.cells })
    }
}

fn mismatch(data_type: &DataType, cell: &Cell) -> ArrowError {
    ArrowError::InvalidArgumentError(format!(
        "cannot store {} cell in {} column",
        cell.kind(),
        data_type
    ))
}

fn null_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    if validity.iter().all(|v| *v) {
        None
    } else {
        Some(NullBuffer::from(validity))
    }
}

/// Build one Arrow array of `data_type` from `cells`.
pub fn build_array(data_type: &DataType, cells: &[&Cell]) -> Result<ArrayRef, ArrowError> {
    match data_type {
        DataType::Boolean => {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Bool(v) => Ok(Some(*v)),
                    Cell::Null => Ok(None),
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(BooleanArray::from(values)))
        }
        DataType::Int64 => {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Int(v) => Ok(Some(*v)),
                    Cell::Null => Ok(None),
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(Int64Array::from(values)))
        }
        DataType::Float64 => {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Float(v) => Ok(Some(*v)),
                    Cell::Null => Ok(None),
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(Float64Array::from(values)))
        }
        DataType::Utf8 => {
            let values = cells
                .iter()
                .map(|c| match c {
                    Cell::Str(v) => Ok(Some(v.as_str())),
                    Cell::Null => Ok(None),
                    other => Err(mismatch(data_type, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(StringArray::from(values)))
        }
        DataType::List(item) => {
            let mut lengths = Vec::with_capacity(cells.len());
            let mut validity = Vec::with_capacity(cells.len());
            let mut children: Vec<&Cell> = Vec::new();
            for cell in cells {
                match cell {
                    Cell::List(items) => {
                        lengths.push(items.len());
                        validity.push(true);
                        children.extend(items.iter());
                    }
                    Cell::Null => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    other => return Err(mismatch(data_type, other)),
                }
            }
            let values = build_array(item.data_type(), &children)?;
            let list = ListArray::try_new(
                item.clone(),
                OffsetBuffer::from_lengths(lengths),
                values,
                null_buffer(validity),
            )?;
            Ok(Arc::new(list))
        }
        DataType::FixedSizeList(item, width) => {
            let size = usize::try_from(*width).map_err(|_| {
                ArrowError::InvalidArgumentError(format!("invalid list width {width}"))
            })?;
            let mut validity = Vec::with_capacity(cells.len());
            let mut children: Vec<&Cell> = Vec::with_capacity(cells.len() * size);
            for cell in cells {
                match cell {
                    Cell::List(items) if items.len() == size => {
                        validity.push(true);
                        children.extend(items.iter());
                    }
                    // Null slots still occupy `size` children.
                    Cell::Null => {
                        validity.push(false);
                        children.extend(std::iter::repeat(&NULL).take(size));
                    }
                    other => return Err(mismatch(data_type, other)),
                }
            }
            let values = build_array(item.data_type(), &children)?;
            let list =
                FixedSizeListArray::try_new(item.clone(), *width, values, null_buffer(validity))?;
            Ok(Arc::new(list))
        }
        DataType::Struct(fields) => {
            let mut columns: Vec<Vec<&Cell>> = vec![Vec::with_capacity(cells.len()); fields.len()];
            let mut validity = Vec::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Struct(children) if children.len() == fields.len() => {
                        for (column, child) in columns.iter_mut().zip(children) {
                            column.push(child);
                        }
                        validity.push(true);
                    }
                    Cell::Null => {
                        for column in columns.iter_mut() {
                            column.push(&NULL);
                        }
                        validity.push(false);
                    }
                    other => return Err(mismatch(data_type, other)),
                }
            }
            let arrays = fields
                .iter()
                .zip(&columns)
                .map(|(field, column)| build_array(field.data_type(), column))
                .collect::<Result<Vec<_>, _>>()?;
            let array = StructArray::try_new(fields.clone(), arrays, null_buffer(validity))?;
            Ok(Arc::new(array))
        }
        DataType::Map(entry, sorted) => {
            let DataType::Struct(kv) = entry.data_type() else {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "map entries must be a struct, got {}",
                    entry.data_type()
                )));
            };
            if kv.len() != 2 || kv[0].data_type() != &DataType::Utf8 {
                return Err(ArrowError::InvalidArgumentError(
                    "map entries must be (utf8 key, value)".to_string(),
                ));
            }
            let mut lengths = Vec::with_capacity(cells.len());
            let mut validity = Vec::with_capacity(cells.len());
            let mut keys: Vec<&str> = Vec::new();
            let mut values: Vec<&Cell> = Vec::new();
            for cell in cells {
                match cell {
                    Cell::Map(entries) => {
                        lengths.push(entries.len());
                        validity.push(true);
                        for (key, value) in entries {
                            keys.push(key);
                            values.push(value);
                        }
                    }
                    Cell::Null => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    other => return Err(mismatch(data_type, other)),
                }
            }
            let key_array: ArrayRef = Arc::new(StringArray::from(keys));
            let value_array = build_array(kv[1].data_type(), &values)?;
            let entries = StructArray::try_new(kv.clone(), vec![key_array, value_array], None)?;
            let map = MapArray::try_new(
                entry.clone(),
                OffsetBuffer::from_lengths(lengths),
                entries,
                null_buffer(validity),
                *sorted,
            )?;
            Ok(Arc::new(map))
        }
        other => Err(ArrowError::NotYetImplemented(format!(
            "longitudinal cells do not support {other}"
        ))),
    }
}

/// Convert rows into a record batch of `schema`.
pub fn rows_to_batch(schema: &SchemaRef, rows: &[Row]) -> Result<RecordBatch, ArrowError> {
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let cells: Vec<&Cell> = rows.iter().map(|row| &row.cells[i]).collect();
            build_array(field.data_type(), &cells)
        })
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new(schema.clone(), columns)
}
