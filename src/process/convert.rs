use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray, TimestampMillisecondArray},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::process::date_parser::SETTLEMENT_TZ_NAME;

/// Column-by-column assembly of a `RecordBatch` with a fixed row count.
pub struct TableBuilder {
    rows: usize,
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
}

impl TableBuilder {
    pub fn new(rows: usize) -> Self {
        TableBuilder {
            rows,
            fields: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &str, array: ArrayRef) -> Result<()> {
        if array.len() != self.rows {
            return Err(Error::Shape(format!(
                "column {} has {} values, expected {}",
                name,
                array.len(),
                self.rows
            )));
        }
        self.fields
            .push(Field::new(name, array.data_type().clone(), true));
        self.columns.push(array);
        Ok(())
    }

    pub fn finish(self) -> Result<RecordBatch> {
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        let schema = Arc::new(Schema::new(self.fields));
        RecordBatch::try_new_with_options(schema, self.columns, &options).map_err(Into::into)
    }
}

/// Look up a column by name, failing with a shape error when absent.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Shape(format!("missing column {}", name)))
}

/// Column values as optional strings, casting non-text columns.
pub fn string_values(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let arr = cast(column(batch, name)?, &DataType::Utf8)?;
    let sarr = arr
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Shape(format!("column {} did not cast to text", name)))?;
    Ok(sarr.iter().map(|v| v.map(str::to_owned)).collect())
}

/// Column values as `f64`, casting integer columns.
pub fn float_values(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let arr = cast(column(batch, name)?, &DataType::Float64)?;
    arr.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::Shape(format!("column {} did not cast to float", name)))
}

/// Millisecond timestamps without an attached zone.
pub fn naive_timestamps<T>(millis: T) -> ArrayRef
where
    TimestampMillisecondArray: From<T>,
{
    Arc::new(TimestampMillisecondArray::from(millis))
}

/// UTC millisecond timestamps tagged with the settlement timezone.
pub fn localized_timestamps<T>(millis: T) -> ArrayRef
where
    TimestampMillisecondArray: From<T>,
{
    Arc::new(TimestampMillisecondArray::from(millis).with_timezone(SETTLEMENT_TZ_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::TimeUnit;

    #[test]
    fn builder_rejects_misaligned_columns() {
        let mut b = TableBuilder::new(2);
        let res = b.push("x", Arc::new(Int64Array::from(vec![1, 2, 3])));
        assert!(matches!(res, Err(Error::Shape(_))));
    }

    #[test]
    fn zero_column_table_keeps_row_count() -> anyhow::Result<()> {
        let batch = TableBuilder::new(0).finish()?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
        Ok(())
    }

    #[test]
    fn casts_between_kinds() -> anyhow::Result<()> {
        let mut b = TableBuilder::new(2);
        b.push("n", Arc::new(Int64Array::from(vec![Some(50), None])))?;
        let batch = b.finish()?;
        let f = float_values(&batch, "n")?;
        assert_eq!(f.value(0), 50.0);
        assert!(f.is_null(1));
        assert_eq!(string_values(&batch, "n")?, vec![Some("50".to_string()), None]);
        assert!(matches!(column(&batch, "missing"), Err(Error::Shape(_))));
        Ok(())
    }

    #[test]
    fn timestamp_zone_tags() {
        assert_eq!(
            naive_timestamps(vec![Some(0), None]).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, None)
        );
        assert_eq!(
            localized_timestamps(vec![0_i64]).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, Some("Europe/Amsterdam".into()))
        );
    }
}
