use arrow::{array::Float64Array, record_batch::RecordBatch};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::process::{
    convert::{localized_timestamps, TableBuilder},
    date_parser::{interval_start, localized_millis, parse_hour, parse_utility_date},
    utility_tool::TIMESTAMP_COLUMN,
    xml_tree::parse_document,
};

/// Namespace of the CWE utility tool net position web service.
pub const NET_POSITION_NS: &str = "http://tempuri.org/";

/// Hub columns, in output order.
pub const ZONES: [&str; 7] = ["AT", "NL", "BE", "DE", "FR", "ALBE", "ALDE"];

const RECORD: &str = "NetPositionData";

/// Extract the net position per hub from the net position endpoint XML.
///
/// All zone columns are `Float64` whatever the text looks like, and the
/// timestamp is localized to the settlement timezone.
#[instrument(level = "debug", skip(payload))]
pub fn parse_net_positions(payload: impl AsRef<[u8]>) -> Result<RecordBatch> {
    let root = parse_document(payload.as_ref())?;
    let ns = Some(NET_POSITION_NS);

    let dates = root.select_text(ns, &[RECORD, "CalendarDate"]);
    let hours = root.select_text(ns, &[RECORD, "CalendarHour"]);
    let zones: Vec<Vec<String>> = ZONES
        .iter()
        .map(|z| root.select_text(ns, &[RECORD, z]))
        .collect();

    let rows = dates.len();
    let lengths = std::iter::once(("CalendarHour", hours.len()))
        .chain(ZONES.iter().copied().zip(zones.iter().map(Vec::len)));
    for (name, len) in lengths {
        if len != rows {
            return Err(Error::Shape(format!(
                "{} has {} values, CalendarDate has {}",
                name, len, rows
            )));
        }
    }
    debug!(rows, "net position records");

    let mut builder = TableBuilder::new(rows);
    for (zone, values) in ZONES.iter().zip(zones) {
        let floats = values
            .iter()
            .map(|v| {
                v.trim().parse::<f64>().map_err(|_| {
                    Error::Value(format!("net position {} is not a number: {:?}", zone, v))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        builder.push(zone, Arc::new(Float64Array::from(floats)))?;
    }

    let timestamps = dates
        .iter()
        .zip(&hours)
        .map(|(d, h)| localized_millis(interval_start(parse_utility_date(d)?, parse_hour(h)?)?))
        .collect::<Result<Vec<i64>>>()?;
    builder.push(TIMESTAMP_COLUMN, localized_timestamps(timestamps))?;
    builder.finish()
}
