use arrow::{
    array::{ArrayRef, StringArray},
    compute::filter_record_batch,
    record_batch::RecordBatch,
};
use chrono::{NaiveDateTime, Timelike};
use csv::ReaderBuilder;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::process::{
    convert::{localized_timestamps, TableBuilder},
    date_parser::{at_hour, localized_millis},
    infer::infer_column,
    records::TIMESTAMP_INDEX,
};

const DELIVERY_DATE: &str = "DeliveryDate";
const PERIOD: &str = "Period";
const DELIVERY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Undo the utility tool's mixed `;`/`|` separators: `;|` becomes `|` and the
/// header uses `|` throughout.
fn normalize(text: &str) -> String {
    let replaced = text.replace(";|", "|");
    let mut lines: Vec<String> = replaced.split("\r\n").map(str::to_owned).collect();
    if let Some(header) = lines.first_mut() {
        *header = header.replace(';', "|");
    }
    lines.join("\n")
}

/// Hour of day for a settlement period, given the longest period of that day.
///
/// 25 periods: clock goes back, period 4 is the repeated hour and is skipped.
/// 23 periods: clock goes forward, periods from 3 on shift up by one.
pub fn period_hour(period: i64, max_period: i64) -> Option<i64> {
    if max_period > 24 {
        match period {
            p if p < 4 => Some(p - 1),
            4 => None,
            p => Some(p - 2),
        }
    } else if max_period < 24 {
        if period < 3 {
            Some(period - 1)
        } else {
            Some(period)
        }
    } else {
        Some(period - 1)
    }
}

/// Parse the final flow-based domain CSV export for one business day.
///
/// A day on default flow-based parameters has no rows and yields an empty
/// table of text columns. Otherwise every column except `DeliveryDate` and
/// `Period` is type-inferred and a localized `timestamp` column leads.
#[instrument(level = "debug", skip(text), fields(len = text.len()))]
pub fn parse_final_domain(text: &str) -> Result<RecordBatch> {
    let normalized = normalize(text);
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .from_reader(normalized.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| Error::Parse(format!("record {}: {}", idx, e)))?;
        for (col, field) in columns.iter_mut().zip(record.iter()) {
            col.push(if field.is_empty() {
                None
            } else {
                Some(field.to_owned())
            });
        }
    }
    let rows = columns.first().map(Vec::len).unwrap_or(0);

    if rows == 0 {
        debug!("no rows, default flow-based parameters");
        let mut b = TableBuilder::new(0);
        for name in &headers {
            b.push(name, Arc::new(StringArray::from(Vec::<String>::new())))?;
        }
        return b.finish();
    }

    let date_idx = header_position(&headers, DELIVERY_DATE)?;
    let period_idx = header_position(&headers, PERIOD)?;

    let dates = columns[date_idx]
        .iter()
        .map(|d| {
            let d = d
                .as_deref()
                .ok_or_else(|| Error::Value("empty DeliveryDate".into()))?;
            NaiveDateTime::parse_from_str(d, DELIVERY_DATE_FORMAT)
                .map_err(|e| Error::Value(format!("bad DeliveryDate {:?}: {}", d, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    let periods = columns[period_idx]
        .iter()
        .map(|p| {
            p.as_deref()
                .and_then(|p| p.trim().parse::<i64>().ok())
                .ok_or_else(|| Error::Value(format!("bad Period {:?}", p)))
        })
        .collect::<Result<Vec<_>>>()?;
    let max_period = periods.iter().copied().max().unwrap_or(24);
    if max_period != 24 {
        warn!(max_period, "clock change day");
    }

    let mut keep = Vec::with_capacity(rows);
    let mut timestamps = Vec::with_capacity(rows);
    for (date, period) in dates.iter().zip(&periods) {
        match period_hour(*period, max_period) {
            Some(hour) => {
                let hour = u32::try_from(hour)
                    .map_err(|_| Error::Value(format!("period {} before midnight", period)))?;
                let start = at_hour(date.date(), hour)?;
                if date.hour() != 0 {
                    debug!(%date, "DeliveryDate time part replaced by period");
                }
                timestamps.push(localized_millis(start)?);
                keep.push(true);
            }
            None => {
                timestamps.push(0);
                keep.push(false);
            }
        }
    }

    let mut builder = TableBuilder::new(rows);
    builder.push(TIMESTAMP_INDEX, localized_timestamps(timestamps))?;
    for (idx, (name, values)) in headers.iter().zip(columns).enumerate() {
        if idx == date_idx || idx == period_idx {
            continue;
        }
        let array: ArrayRef = infer_column(&values)?.into_array();
        builder.push(name, array)?;
    }
    let batch = builder.finish()?;

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return Ok(batch);
    }
    debug!(dropped, "dropping repeated clock change hour");
    Ok(filter_record_batch(&batch, &keep.into())?)
}

fn header_position(headers: &[String], wanted: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == wanted)
        .ok_or_else(|| Error::Shape(format!("final domain has no {} column", wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{convert::string_values, maczt::derive_maczt, test_util::init_test_logging};
    use arrow::{
        array::{Array, Float64Array, Int64Array, TimestampMillisecondArray},
        datatypes::DataType,
    };
    use chrono::NaiveDate;

    const HEADER: &str = "DeliveryDate;Period;OutageName;OutageEIC;CriticalBranchName;\
CriticalBranchEIC;Presolved;RemainingAvailableMargin;Fmax;Fref;AMR;MinRAMFactor;\
MinRAMFactorJustification;Hub_NL";

    fn line(day: &str, period: i64, branch: &str, ram: i64, justification: &str) -> String {
        format!(
            "{day} 00:00:00;|{period};|Basecase;|;|{branch};|10T-X;|True;|{ram};|100;|12.5;|0;|70;|{justification};|0.05"
        )
    }

    fn csv(lines: &[String]) -> String {
        let mut out = vec![HEADER.to_string()];
        out.extend(lines.iter().cloned());
        out.join("\r\n")
    }

    fn utc_hour(batch: &RecordBatch, row: usize) -> i64 {
        let ts = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        ts.value(row) / 3_600_000
    }

    fn epoch_hour(y: i32, m: u32, d: u32, h: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
            / 3600
    }

    #[test]
    fn test_parse_final_domain() -> anyhow::Result<()> {
        init_test_logging();
        let text = csv(&[
            line("23/03/2023", 1, "A", 50, "MNCC = 10%;LFcalc = 5%;LFaccept = 3%;MACZTtarget = 20%"),
            line("23/03/2023", 24, "B", 60, ""),
        ]);
        let batch = parse_final_domain(&text)?;

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "timestamp");
        assert!(batch.column_by_name("DeliveryDate").is_none());
        assert!(batch.column_by_name("Period").is_none());
        assert_eq!(utc_hour(&batch, 0), epoch_hour(2023, 3, 22, 23));
        assert_eq!(utc_hour(&batch, 1), epoch_hour(2023, 3, 23, 22));

        let ram = batch.column_by_name("RemainingAvailableMargin").unwrap();
        assert_eq!(ram.as_any().downcast_ref::<Int64Array>().unwrap().value(1), 60);
        let fref = batch.column_by_name("Fref").unwrap();
        assert_eq!(fref.as_any().downcast_ref::<Float64Array>().unwrap().value(0), 12.5);
        assert_eq!(
            batch.column_by_name("OutageEIC").unwrap().data_type(),
            &DataType::Float64
        );
        Ok(())
    }

    #[test]
    fn domain_feeds_maczt() -> anyhow::Result<()> {
        let text = csv(&[
            line("23/03/2023", 1, "A", 50, "MNCC = 10%;LFcalc = 5%;LFaccept = 3%;MACZTtarget = 20%"),
            line("23/03/2023", 2, "B", 50, ""),
            line("23/03/2023", 3, "C", 50, "MNCC = 10%;LFcalc = 5%;LFaccept = 3%;MACZTtarget = 20%"),
        ]);
        let batch = parse_final_domain(&text)?;
        let maczt = derive_maczt(&batch, "NL")?;
        assert_eq!(maczt.num_rows(), 2);
        assert_eq!(
            string_values(&maczt, "CriticalBranchName")?,
            vec![Some("A".to_string()), Some("C".to_string())]
        );
        assert!(maczt.column_by_name("timestamp").is_some());
        assert_eq!(utc_hour(&maczt, 0), epoch_hour(2023, 3, 22, 23));
        assert_eq!(utc_hour(&maczt, 1), epoch_hour(2023, 3, 23, 1));
        let margin = maczt.column_by_name("MACZT_MARGIN").unwrap();
        assert_eq!(
            margin.as_any().downcast_ref::<Float64Array>().unwrap().value(0),
            42.0
        );
        Ok(())
    }

    #[test]
    fn clock_back_day_drops_repeated_hour() -> anyhow::Result<()> {
        let lines: Vec<String> = (1..=25)
            .map(|p| line("29/10/2023", p, "A", 1, ""))
            .collect();
        let batch = parse_final_domain(&csv(&lines))?;
        assert_eq!(batch.num_rows(), 24);
        // period 3 is 02:00 summer time, period 5 is 03:00 winter time
        assert_eq!(utc_hour(&batch, 2), epoch_hour(2023, 10, 29, 0));
        assert_eq!(utc_hour(&batch, 3), epoch_hour(2023, 10, 29, 2));
        Ok(())
    }

    #[test]
    fn clock_forward_day_skips_missing_hour() -> anyhow::Result<()> {
        let lines: Vec<String> = (1..=23)
            .map(|p| line("26/03/2023", p, "A", 1, ""))
            .collect();
        let batch = parse_final_domain(&csv(&lines))?;
        assert_eq!(batch.num_rows(), 23);
        // period 2 is 01:00 winter time, period 3 is 03:00 summer time
        assert_eq!(utc_hour(&batch, 1), epoch_hour(2023, 3, 26, 0));
        assert_eq!(utc_hour(&batch, 2), epoch_hour(2023, 3, 26, 1));
        Ok(())
    }

    #[test]
    fn default_parameter_day_is_empty() -> anyhow::Result<()> {
        let batch = parse_final_domain(&csv(&[]))?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 14);
        let maczt = derive_maczt(&batch, "NL")?;
        assert_eq!(maczt.num_rows(), 0);
        assert!(maczt.column_by_name("timestamp").is_none());
        Ok(())
    }

    #[test]
    fn period_hours() {
        assert_eq!(period_hour(1, 24), Some(0));
        assert_eq!(period_hour(24, 24), Some(23));
        assert_eq!(period_hour(4, 25), None);
        assert_eq!(period_hour(25, 25), Some(23));
        assert_eq!(period_hour(3, 23), Some(3));
        assert_eq!(period_hour(23, 23), Some(23));
    }

    #[test]
    fn missing_period_column_is_a_shape_error() {
        let text = "DeliveryDate;Fmax\r\n23/03/2023 00:00:00;|100";
        assert!(matches!(parse_final_domain(text), Err(Error::Shape(_))));
    }
}
