use arrow::{
    array::{ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::process::{
    convert::{naive_timestamps, TableBuilder},
    date_parser::{interval_start, naive_millis, parse_hour, parse_utility_date},
    infer::infer_column,
    subject::ParseDataSubject,
    xml_tree::parse_document,
};

pub const DATE_COLUMN: &str = "Date";
pub const HOUR_COLUMN: &str = "CalendarHour";
pub const TIMESTAMP_COLUMN: &str = "TIMESTAMP_CET";

/// Leading columns of every record that hold date and hour; never type-inferred.
const RESERVED_COLUMNS: usize = 2;

/// Extract one subject table from the utility tool XML download.
///
/// The column set and order come from the children of the first record. Every
/// column is then read across all records and stitched positionally, so the
/// sequences must line up one-to-one. `Date` and `CalendarHour` are folded into
/// a naive `TIMESTAMP_CET` column appended last.
#[instrument(level = "debug", skip(payload))]
pub fn parse_utility_tool_xml(
    payload: impl AsRef<[u8]>,
    subject: ParseDataSubject,
) -> Result<RecordBatch> {
    let root = parse_document(payload.as_ref())?;
    let container = subject.as_str();
    let record = subject.record_name();

    let Some(first) = root.select(None, &[container, record]).into_iter().next() else {
        warn!(subject = %subject, "no records found, returning empty table");
        let mut b = TableBuilder::new(0);
        b.push(TIMESTAMP_COLUMN, naive_timestamps(Vec::<i64>::new()))?;
        return b.finish();
    };
    let column_names: Vec<String> = first.elements().map(|e| e.name.clone()).collect();

    let columns: Vec<Vec<String>> = column_names
        .iter()
        .map(|c| root.select_text(None, &[container, record, c]))
        .collect();

    let rows = columns.first().map(Vec::len).unwrap_or(0);
    for (name, values) in column_names.iter().zip(&columns) {
        if values.len() != rows {
            return Err(Error::Shape(format!(
                "column {} has {} values, column {} has {}",
                name,
                values.len(),
                column_names[0],
                rows
            )));
        }
    }
    debug!(rows, columns = column_names.len(), "stitched xml columns");

    let date_idx = position(&column_names, DATE_COLUMN)?;
    let hour_idx = position(&column_names, HOUR_COLUMN)?;
    let timestamps = columns[date_idx]
        .iter()
        .zip(&columns[hour_idx])
        .map(|(d, h)| {
            let start = interval_start(parse_utility_date(d)?, parse_hour(h)?)?;
            Ok(naive_millis(start))
        })
        .collect::<Result<Vec<i64>>>()?;

    let mut builder = TableBuilder::new(rows);
    for (idx, (name, values)) in column_names.into_iter().zip(columns).enumerate() {
        if idx == date_idx || idx == hour_idx {
            continue;
        }
        let array: ArrayRef = if idx < RESERVED_COLUMNS {
            Arc::new(StringArray::from(values))
        } else {
            let raw: Vec<Option<String>> = values.into_iter().map(Some).collect();
            infer_column(&raw)?.into_array()
        };
        builder.push(&name, array)?;
    }
    builder.push(TIMESTAMP_COLUMN, naive_timestamps(timestamps))?;
    builder.finish()
}

fn position(names: &[String], wanted: &str) -> Result<usize> {
    names
        .iter()
        .position(|n| n == wanted)
        .ok_or_else(|| Error::Shape(format!("records have no {} field", wanted)))
}
