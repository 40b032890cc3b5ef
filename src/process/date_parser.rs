use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Civil timezone the CWE/Core market settles in.
pub const SETTLEMENT_TZ: Tz = chrono_tz::Europe::Amsterdam;

/// Arrow timezone string matching [`SETTLEMENT_TZ`].
pub const SETTLEMENT_TZ_NAME: &str = "Europe/Amsterdam";

/// Date format used by the utility tool XML, always at midnight.
pub const UTILITY_DATE_FORMAT: &str = "%Y-%m-%dT00:00:00";

/// Parse `"YYYY-MM-DDT00:00:00"` into a date.
pub fn parse_utility_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), UTILITY_DATE_FORMAT)
        .map_err(|e| Error::Value(format!("bad date {:?}: {}", s, e)))
}

/// Parse a calendar hour literal.
pub fn parse_hour(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| Error::Value(format!("bad hour {:?}: {}", s, e)))
}

/// Start of the settlement period ending at `hour` (1..=24) on `date`.
///
/// Hour 24 maps to 23:00 of the same date, never to the next day.
pub fn interval_start(date: NaiveDate, hour: i64) -> Result<NaiveDateTime> {
    if !(1..=24).contains(&hour) {
        return Err(Error::Value(format!(
            "calendar hour {} outside 1..=24",
            hour
        )));
    }
    at_hour(date, (hour - 1) as u32)
}

/// `date` at `hour:00:00`.
pub fn at_hour(date: NaiveDate, hour: u32) -> Result<NaiveDateTime> {
    NaiveTime::from_hms_opt(hour, 0, 0)
        .map(|t| date.and_time(t))
        .ok_or_else(|| Error::Value(format!("hour {} outside 0..=23", hour)))
}

/// Attach the settlement timezone. Ambiguous wall times resolve to the
/// earlier (summer time) instant; nonexistent ones are an error.
pub fn localize(naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    SETTLEMENT_TZ
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| {
            Error::Value(format!(
                "{} does not exist in {}",
                naive, SETTLEMENT_TZ_NAME
            ))
        })
}

/// Epoch millis of a naive timestamp, read as wall clock without offset.
pub fn naive_millis(naive: NaiveDateTime) -> i64 {
    naive.and_utc().timestamp_millis()
}

/// Epoch millis (UTC) of the localized timestamp.
pub fn localized_millis(naive: NaiveDateTime) -> Result<i64> {
    localize(naive).map(|dt| dt.timestamp_millis())
}
