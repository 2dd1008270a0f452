//! Movie table backed by an Arrow [`RecordBatch`].
//!
//! Raw JSON rows are typed by `arrow::json` schema inference; the cleaning
//! rules then rewrite whole columns with Arrow compute kernels. Row removal
//! goes through [`MovieFrame::retain_rows`] so it applies to every column at once.

use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, BooleanArray, Datum, Float64Array, Int64Array, ListArray,
    StringArray,
};
use arrow::compute::kernels::boolean::is_not_null;
use arrow::compute::kernels::cast::{cast_with_options, CastOptions};
use arrow::compute::kernels::filter::filter_record_batch;
use arrow::compute::kernels::zip::zip;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::{ArrayWriter, ReaderBuilder};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::{Map, Value};

use crate::models::movie::{RawMovie, LIST_COLUMNS, RAW_COLUMNS};
use crate::utils::{Error, ReelResult};

/// `List<inner>` with the default nullable `item` field, as `ListBuilder` produces it.
pub fn list_of(inner: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", inner, true)))
}

/// Non-strict cast: values that cannot be represented as `to` become null.
pub fn cast_lenient(array: &ArrayRef, to: &DataType) -> ReelResult<ArrayRef> {
    let options = CastOptions { safe: true, ..Default::default() };
    Ok(cast_with_options(array, to, &options)?)
}

/// Replace nulls with `fill`, a one-element `Scalar` of the same type.
pub fn fill_null(array: &ArrayRef, fill: &dyn Datum) -> ReelResult<ArrayRef> {
    let valid = is_not_null(array.as_ref())?;
    Ok(zip(&valid, array, fill)?)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, expected: &str) -> ReelResult<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Other(format!("expected a {expected} column, found {}", array.data_type()))
    })
}

pub fn as_strings(array: &ArrayRef) -> ReelResult<&StringArray> {
    downcast(array, "Utf8")
}

pub fn as_floats(array: &ArrayRef) -> ReelResult<&Float64Array> {
    downcast(array, "Float64")
}

pub fn as_ints(array: &ArrayRef) -> ReelResult<&Int64Array> {
    downcast(array, "Int64")
}

pub fn as_lists(array: &ArrayRef) -> ReelResult<&ListArray> {
    downcast(array, "List")
}

/// Apply `f` to every non-null string; `None` from `f` nulls the cell.
pub fn map_strings(array: &ArrayRef, f: impl Fn(&str) -> Option<String>) -> ReelResult<ArrayRef> {
    let strings = as_strings(array)?;
    let mapped: StringArray = strings.iter().map(|s| s.and_then(&f)).collect();
    Ok(Arc::new(mapped))
}

/// Scalar columns never hold arrays or objects (they become JSON text), and
/// list columns hold arrays of scalars or null.
fn normalize_cell(column: &str, value: Value) -> Value {
    if LIST_COLUMNS.contains(&column) {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        nested @ (Value::Array(_) | Value::Object(_)) => Value::String(nested.to_string()),
                        scalar => scalar,
                    })
                    .collect(),
            ),
            _ => Value::Null,
        }
    } else {
        match value {
            nested @ (Value::Array(_) | Value::Object(_)) => Value::String(nested.to_string()),
            scalar => scalar,
        }
    }
}

fn build_batch(fields: Vec<Field>, columns: Vec<ArrayRef>, rows: usize) -> ReelResult<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieFrame {
    batch: RecordBatch,
}

impl Default for MovieFrame {
    fn default() -> Self {
        Self { batch: RecordBatch::new_empty(Arc::new(Schema::empty())) }
    }
}

impl From<RecordBatch> for MovieFrame {
    fn from(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

impl MovieFrame {
    /// Type loosely typed JSON rows into `columns`, in that order. Mixed
    /// scalar columns fall back to `Utf8`; a column that is null everywhere is `Null`.
    pub fn from_json_rows(columns: &[&str], rows: &[Map<String, Value>]) -> ReelResult<Self> {
        let normalized: Vec<Value> = rows
            .iter()
            .map(|row| {
                let cells = columns.iter().map(|name| {
                    let cell = row.get(*name).cloned().unwrap_or(Value::Null);
                    (name.to_string(), normalize_cell(name, cell))
                });
                Value::Object(cells.collect())
            })
            .collect();

        let inferred = infer_json_schema_from_iterator(normalized.iter().map(Ok))?;
        let fields: Vec<Field> = columns
            .iter()
            .map(|name| {
                let dtype = inferred
                    .field_with_name(name)
                    .map(|f| f.data_type().clone())
                    .unwrap_or(DataType::Null);
                Field::new(*name, dtype, true)
            })
            .collect();
        let schema = Arc::new(Schema::new(fields));
        if normalized.is_empty() {
            return Ok(Self { batch: RecordBatch::new_empty(schema) });
        }

        let mut decoder = ReaderBuilder::new(schema.clone())
            .with_batch_size(normalized.len())
            .with_coerce_primitive(true)
            .build_decoder()?;
        decoder.serialize(&normalized)?;
        let batch = decoder.flush()?.unwrap_or_else(|| RecordBatch::new_empty(schema));
        Ok(Self { batch })
    }

    /// One row per record, columns in extraction order.
    pub fn from_records(records: &[RawMovie]) -> ReelResult<Self> {
        let rows: Vec<Map<String, Value>> = records
            .iter()
            .map(|r| RAW_COLUMNS.iter().map(|c| c.to_string()).zip(r.cells()).collect())
            .collect();
        Self::from_json_rows(&RAW_COLUMNS, &rows)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn height(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn width(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// The named column, or an all-null column when the frame does not have it.
    pub fn column_or_nulls(&self, name: &str) -> ArrayRef {
        match self.column(name) {
            Some(col) => col.clone(),
            None => {
                tracing::debug!(column = name, "materializing missing column as nulls");
                new_null_array(&DataType::Null, self.height())
            }
        }
    }

    /// Set `name` to `array`, in place when it exists, appended otherwise.
    pub fn set_column(&mut self, name: &str, array: ArrayRef) -> ReelResult<()> {
        self.replace_column(name, name, array)
    }

    /// Put `array`, named `name`, where `old` was (appended when `old` is absent).
    pub fn replace_column(&mut self, old: &str, name: &str, array: ArrayRef) -> ReelResult<()> {
        let schema = self.batch.schema();
        if name != old && schema.index_of(name).is_ok() {
            return Err(Error::Other(format!("duplicate column name '{name}'")));
        }
        let rows = if self.width() == 0 { array.len() } else { self.height() };
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);
        match schema.index_of(old) {
            Ok(idx) => {
                fields[idx] = field;
                columns[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }
        self.batch = build_batch(fields, columns, rows)?;
        Ok(())
    }

    /// Keep the rows whose mask entry is `true` (null counts as `false`).
    /// Returns how many rows were dropped.
    pub fn retain_rows(&mut self, mask: &BooleanArray) -> ReelResult<usize> {
        let before = self.height();
        self.batch = filter_record_batch(&self.batch, mask)?;
        Ok(before - self.height())
    }

    /// Rows as JSON objects; null cells are left out of their object.
    pub fn to_json_rows(&self) -> ReelResult<Vec<Map<String, Value>>> {
        if self.height() == 0 {
            return Ok(Vec::new());
        }
        let mut writer = ArrayWriter::new(Vec::new());
        writer.write(&self.batch)?;
        writer.finish()?;
        Ok(serde_json::from_slice(&writer.into_inner())?)
    }
}
