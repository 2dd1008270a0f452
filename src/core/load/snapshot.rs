use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::core::frame::{cast_lenient, MovieFrame};
use crate::utils::{ensure_parent_dir, ReelResult};

/// The frame's batch, with columns that never held a value stored as nullable text.
fn storable_batch(frame: &MovieFrame) -> ReelResult<RecordBatch> {
    let batch = frame.batch();
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, col) in schema.fields().iter().zip(batch.columns()) {
        if field.data_type() == &DataType::Null {
            fields.push(Field::new(field.name(), DataType::Utf8, true));
            columns.push(cast_lenient(col, &DataType::Utf8)?);
        } else {
            fields.push(field.as_ref().clone());
            columns.push(col.clone());
        }
    }
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?)
}

/// Write the frame as a single-row-group, Snappy-compressed Parquet file,
/// replacing any file already at `path`. Returns the number of rows written.
pub fn write_parquet(frame: &MovieFrame, path: &Path) -> ReelResult<usize> {
    ensure_parent_dir(path)?;
    let batch = storable_batch(frame)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    info!(
        target: "reelpipe::load",
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "Wrote Parquet snapshot"
    );
    Ok(batch.num_rows())
}
