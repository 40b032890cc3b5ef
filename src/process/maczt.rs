use arrow::{
    array::{BooleanArray, Float64Array},
    compute::filter_record_batch,
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::process::{
    convert::{column, float_values, string_values, TableBuilder},
    records::TIMESTAMP_INDEX,
};

/// Columns of the final flow-based domain kept for MACZT.
pub const DOMAIN_COLUMNS: [&str; 11] = [
    "OutageName",
    "OutageEIC",
    "CriticalBranchName",
    "CriticalBranchEIC",
    "Presolved",
    "RemainingAvailableMargin",
    "Fmax",
    "Fref",
    "AMR",
    "MinRAMFactor",
    "MinRAMFactorJustification",
];

const JUSTIFICATION: &str = "MinRAMFactorJustification";
const BRANCH: &str = "CriticalBranchName";
const MACZT_MARKER: &str = "MACZTtarget";
const LTA_MARKER: &str = "LTA_corner";

// literal pattern, compiles or fails on the first test run
static JUSTIFICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"MNCC = (?P<MNCC_PCT>.*)%;LFcalc = (?P<LF_CALC_PCT>.*)%;LFaccept = (?P<LF_ACCEPT_PCT>.*)%;MACZTtarget = (?P<MACZT_TARGET_PCT>.*)%",
    )
    .expect("justification pattern is valid")
});

/// Captured percentages of one justification string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Justification {
    pub mncc: f64,
    pub lf_calc: f64,
    pub lf_accept: f64,
    pub maczt_target: f64,
}

/// Parse `MNCC = X%;LFcalc = Y%;LFaccept = Z%;MACZTtarget = W%`.
///
/// `Ok(None)` when the text does not follow the grammar; a matching text with a
/// non-numeric capture is an error.
pub fn parse_justification(text: &str) -> Result<Option<Justification>> {
    let Some(caps) = JUSTIFICATION_RE.captures(text) else {
        return Ok(None);
    };
    let number = |name: &str| -> Result<f64> {
        let raw = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
        raw.trim()
            .parse::<f64>()
            .map_err(|_| Error::Value(format!("{} capture {:?} is not a number", name, raw)))
    };
    Ok(Some(Justification {
        mncc: number("MNCC_PCT")?,
        lf_calc: number("LF_CALC_PCT")?,
        lf_accept: number("LF_ACCEPT_PCT")?,
        maczt_target: number("MACZT_TARGET_PCT")?,
    }))
}

/// Round to two decimals, ties to even.
fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

fn rounded(values: &[Option<f64>]) -> Arc<Float64Array> {
    float_column(values.iter().map(|v| v.map(round2)))
}

fn float_column(values: impl IntoIterator<Item = Option<f64>>) -> Arc<Float64Array> {
    Arc::new(values.into_iter().collect::<Float64Array>())
}

/// Derive the MACZT margin columns from the final flow-based domain.
///
/// Only `NL` is supported. A leading `timestamp` column is carried through
/// ahead of the projected domain columns. Rows are kept when the justification mentions
/// `MACZTtarget` and the branch is not an LTA corner. Rows whose justification
/// does not follow the grammar keep null percentages.
#[instrument(level = "debug", skip(domain), fields(rows = domain.num_rows()))]
pub fn derive_maczt(domain: &RecordBatch, zone: &str) -> Result<RecordBatch> {
    if zone != "NL" {
        return Err(Error::NotSupported(format!("MACZT for zone {}", zone)));
    }

    let mut projected = TableBuilder::new(domain.num_rows());
    if let Some(timestamps) = domain.column_by_name(TIMESTAMP_INDEX) {
        projected.push(TIMESTAMP_INDEX, timestamps.clone())?;
    }
    for name in DOMAIN_COLUMNS {
        projected.push(name, column(domain, name)?.clone())?;
    }
    let projected = projected.finish()?;
    if projected.num_rows() == 0 {
        debug!("empty domain, default flow parameters day");
        return Ok(projected);
    }

    let justifications = string_values(&projected, JUSTIFICATION)?;
    let branches = string_values(&projected, BRANCH)?;
    let keep: BooleanArray = justifications
        .iter()
        .zip(&branches)
        .map(|(j, b)| {
            let is_maczt = j.as_deref().is_some_and(|j| j.contains(MACZT_MARKER));
            let is_lta = b.as_deref().is_some_and(|b| b.contains(LTA_MARKER));
            Some(is_maczt && !is_lta)
        })
        .collect();
    let filtered = filter_record_batch(&projected, &keep)?;
    debug!(kept = filtered.num_rows(), "filtered on NL MACZT justification");

    let ram = float_values(&filtered, "RemainingAvailableMargin")?;
    let fmax = float_values(&filtered, "Fmax")?;
    let mccc: Vec<Option<f64>> = ram
        .iter()
        .zip(fmax.iter())
        .map(|(r, f)| Some(100.0 * r? / f?))
        .collect();

    let parsed = string_values(&filtered, JUSTIFICATION)?
        .iter()
        .map(|j| match j {
            Some(text) => parse_justification(text),
            None => Ok(None),
        })
        .collect::<Result<Vec<_>>>()?;
    let unmatched = parsed.iter().filter(|p| p.is_none()).count();
    if unmatched > 0 {
        warn!(unmatched, "justification strings not matching the MACZT grammar");
    }

    let mncc: Vec<Option<f64>> = parsed.iter().map(|p| p.map(|j| j.mncc)).collect();
    let lf_calc: Vec<Option<f64>> = parsed.iter().map(|p| p.map(|j| j.lf_calc)).collect();
    let lf_accept: Vec<Option<f64>> = parsed.iter().map(|p| p.map(|j| j.lf_accept)).collect();
    let target: Vec<Option<f64>> = parsed.iter().map(|p| p.map(|j| j.maczt_target)).collect();

    let maczt: Vec<Option<f64>> = mccc
        .iter()
        .zip(&mncc)
        .map(|(a, b)| Some((*a)? + (*b)?))
        .collect();
    let lf_sub: Vec<Option<f64>> = lf_calc
        .iter()
        .zip(&lf_accept)
        .map(|(c, a)| Some(((*c)? - (*a)?).max(0.0)))
        .collect();
    let maczt_min: Vec<Option<f64>> = target
        .iter()
        .zip(&lf_sub)
        .map(|(t, s)| Some((*t)? - (*s)?))
        .collect();
    let margin: Vec<Option<f64>> = maczt
        .iter()
        .zip(&maczt_min)
        .map(|(m, n)| Some((*m)? - (*n)?))
        .collect();

    let mut out = TableBuilder::new(filtered.num_rows());
    let schema = filtered.schema();
    for (field, array) in schema.fields().iter().zip(filtered.columns()) {
        if field.name() != JUSTIFICATION {
            out.push(field.name(), array.clone())?;
        }
    }
    out.push("MCCC_PCT", rounded(&mccc))?;
    out.push("MNCC_PCT", float_column(mncc))?;
    out.push("LF_CALC_PCT", float_column(lf_calc))?;
    out.push("LF_ACCEPT_PCT", float_column(lf_accept))?;
    out.push("MACZT_TARGET_PCT", float_column(target))?;
    out.push("MACZT_PCT", rounded(&maczt))?;
    out.push("LF_SUB_PCT", rounded(&lf_sub))?;
    out.push("MACZT_MIN_PCT", rounded(&maczt_min))?;
    out.push("MACZT_MARGIN", rounded(&margin))?;
    out.finish()
}
