use arrow::{
    array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray},
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::process::{
    convert::{localized_timestamps, naive_timestamps, TableBuilder},
    date_parser::{interval_start, localized_millis, naive_millis},
    subject::singularize,
};

pub const TIMESTAMP_INDEX: &str = "timestamp";

/// An already-typed value delivered by the SOAP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Record(Record),
    List(Vec<FieldValue>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Date(v) => write!(f, "{}", v),
            FieldValue::DateTime(v) => write!(f, "{}", v),
            FieldValue::Record(_) | FieldValue::List(_) => {
                f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
            }
        }
    }
}

/// Field name → value mapping, keeping field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Field value, or a shape error naming the missing field.
    pub fn require(&self, name: &str) -> Result<&FieldValue> {
        self.get(name)
            .ok_or_else(|| Error::Shape(format!("record has no {} field", name)))
    }

    pub fn require_record(&self, name: &str) -> Result<&Record> {
        match self.require(name)? {
            FieldValue::Record(r) => Ok(r),
            other => Err(Error::Shape(format!("{} is not a record: {}", name, other))),
        }
    }

    pub fn require_list(&self, name: &str) -> Result<&[FieldValue]> {
        match self.require(name)? {
            FieldValue::List(items) => Ok(items),
            other => Err(Error::Shape(format!("{} is not a list: {}", name, other))),
        }
    }

    /// Remove a field, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

/// Start of the settlement period for one record, consuming the date and
/// hour fields. `Date` is preferred over `CalendarDate`.
fn take_timestamp(record: &mut Record) -> Result<NaiveDateTime> {
    let date_field = if record.contains("Date") {
        "Date"
    } else {
        "CalendarDate"
    };
    let date = match record.require(date_field)? {
        FieldValue::Date(d) => *d,
        FieldValue::DateTime(dt) => {
            if dt.time().num_seconds_from_midnight() != 0 {
                debug!(field = date_field, value = %dt, "time part replaced by calendar hour");
            }
            dt.date()
        }
        other => {
            return Err(Error::Shape(format!(
                "{} is not a date: {}",
                date_field, other
            )))
        }
    };
    let hour = match record.require("CalendarHour")? {
        FieldValue::Int(h) => *h,
        other => {
            return Err(Error::Shape(format!(
                "CalendarHour is not an integer: {}",
                other
            )))
        }
    };
    let start = interval_start(date, hour)?;
    record.remove(date_field);
    record.remove("CalendarHour");
    Ok(start)
}

/// Build a timestamp-indexed table from typed records.
///
/// With `nested`, the list lives at `data[subject][singular(subject)]`,
/// otherwise at `data[subject]`. The `timestamp` column comes first and is
/// localized to the settlement timezone.
#[instrument(level = "debug", skip(data))]
pub fn build_from_records(data: &Record, subject: &str, nested: bool) -> Result<RecordBatch> {
    let items = if nested {
        data.require_record(subject)?
            .require_list(singularize(subject))?
    } else {
        data.require_list(subject)?
    };

    let mut records = Vec::with_capacity(items.len());
    let mut timestamps = Vec::with_capacity(items.len());
    for item in items {
        let FieldValue::Record(record) = item else {
            return Err(Error::Shape(format!(
                "{} entry is not a record: {}",
                subject, item
            )));
        };
        let mut record = record.clone();
        timestamps.push(localized_millis(take_timestamp(&mut record)?)?);
        records.push(record);
    }

    let names: IndexSet<&String> = records
        .iter()
        .flat_map(|r| r.iter().map(|(name, _)| name))
        .collect();
    debug!(rows = records.len(), columns = names.len(), "built record table");

    let mut builder = TableBuilder::new(records.len());
    builder.push(TIMESTAMP_INDEX, localized_timestamps(timestamps))?;
    for name in names {
        let values: Vec<Option<&FieldValue>> = records
            .iter()
            .map(|r| r.get(name).filter(|v| **v != FieldValue::Null))
            .collect();
        builder.push(name, typed_array(&values))?;
    }
    builder.finish()
}

/// Arrow array for one column of native values.
fn typed_array(values: &[Option<&FieldValue>]) -> ArrayRef {
    let present = || values.iter().flatten();
    if present().all(|v| matches!(v, FieldValue::Int(_))) && present().next().is_some() {
        let ints: Int64Array = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Int(i)) => Some(*i),
                _ => None,
            })
            .collect();
        return Arc::new(ints);
    }
    if present().all(|v| matches!(v, FieldValue::Int(_) | FieldValue::Float(_))) {
        let floats: Float64Array = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Int(i)) => Some(*i as f64),
                Some(FieldValue::Float(f)) => Some(*f),
                _ => None,
            })
            .collect();
        return Arc::new(floats);
    }
    if present().all(|v| matches!(v, FieldValue::Bool(_))) {
        let bools: BooleanArray = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Bool(b)) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(bools);
    }
    if present().all(|v| matches!(v, FieldValue::Date(_) | FieldValue::DateTime(_))) {
        let millis: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                Some(FieldValue::Date(d)) => d.and_hms_opt(0, 0, 0).map(naive_millis),
                Some(FieldValue::DateTime(dt)) => Some(naive_millis(*dt)),
                _ => None,
            })
            .collect();
        return naive_timestamps(millis);
    }
    let text: StringArray = values
        .iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect();
    Arc::new(text)
}
