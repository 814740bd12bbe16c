// Arrow RecordBatch adapters for relations and results

use crate::error::{JoinError, Result};
use crate::types::{CastRow, ResultRow, TitleRow};
use arrow::array::{Array, ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

pub const MOVIE_ID: &str = "movie_id";
pub const NOTE: &str = "note";
pub const TITLE_ID: &str = "title_id";
pub const TITLE: &str = "title";

/// Schema of a cast relation batch
pub fn cast_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(MOVIE_ID, DataType::Int32, false),
        Field::new(NOTE, DataType::Utf8, false),
    ]))
}

/// Schema of a title relation batch
pub fn title_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(TITLE_ID, DataType::Int32, false),
        Field::new(TITLE, DataType::Utf8, false),
    ]))
}

/// Schema of the join result: cast fields followed by title fields
pub fn result_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(MOVIE_ID, DataType::Int32, false),
        Field::new(NOTE, DataType::Utf8, false),
        Field::new(TITLE_ID, DataType::Int32, false),
        Field::new(TITLE, DataType::Utf8, false),
    ]))
}

fn column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b ArrayRef> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| JoinError::MissingColumn(name.to_string()))?;
    if let Some(row) = (0..col.len()).find(|&i| col.is_null(i)) {
        return Err(JoinError::NullValue {
            column: name.to_string(),
            row,
        });
    }
    Ok(col)
}

fn int32_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b Int32Array> {
    let col = column(batch, name)?;
    col.as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| JoinError::ColumnType {
            column: name.to_string(),
            expected: DataType::Int32,
            actual: col.data_type().clone(),
        })
}

fn utf8_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    let col = column(batch, name)?;
    col.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| JoinError::ColumnType {
            column: name.to_string(),
            expected: DataType::Utf8,
            actual: col.data_type().clone(),
        })
}

/// Read cast rows from the `movie_id` (Int32) and `note` (Utf8) columns.
/// Other columns are ignored; nulls are rejected.
pub fn cast_relation_from_batch(batch: &RecordBatch) -> Result<Vec<CastRow>> {
    let ids = int32_column(batch, MOVIE_ID)?;
    let notes = utf8_column(batch, NOTE)?;
    Ok((0..batch.num_rows())
        .map(|i| CastRow::new(ids.value(i), notes.value(i)))
        .collect())
}

/// Read title rows from the `title_id` (Int32) and `title` (Utf8) columns
pub fn title_relation_from_batch(batch: &RecordBatch) -> Result<Vec<TitleRow>> {
    let ids = int32_column(batch, TITLE_ID)?;
    let titles = utf8_column(batch, TITLE)?;
    Ok((0..batch.num_rows())
        .map(|i| TitleRow::new(ids.value(i), titles.value(i)))
        .collect())
}

/// Concatenate the cast rows of several batches, in batch order
pub fn cast_relation_from_batches(batches: &[RecordBatch]) -> Result<Vec<CastRow>> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        rows.extend(cast_relation_from_batch(batch)?);
    }
    Ok(rows)
}

/// Concatenate the title rows of several batches, in batch order
pub fn title_relation_from_batches(batches: &[RecordBatch]) -> Result<Vec<TitleRow>> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        rows.extend(title_relation_from_batch(batch)?);
    }
    Ok(rows)
}

/// Convert a join result into one columnar batch with [`result_schema`]
pub fn results_to_batch(rows: &[ResultRow]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.movie_id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.note.as_str()))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.title_id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.title.as_str()))),
    ];
    Ok(RecordBatch::try_new(result_schema(), columns)?)
}
