use arrow::{
    array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray},
    datatypes::DataType,
};
use std::sync::Arc;
use tracing::trace;

use crate::error::{Error, Result};

/// Type decided for a column from its representative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Text => DataType::Utf8,
        }
    }
}

/// A column after inference: the tag and the converted values.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    Int(Vec<i64>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<String>),
}

impl TypedColumn {
    pub fn kind(&self) -> ColumnKind {
        match self {
            TypedColumn::Int(_) => ColumnKind::Int,
            TypedColumn::Float(_) => ColumnKind::Float,
            TypedColumn::Bool(_) => ColumnKind::Bool,
            TypedColumn::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedColumn::Int(v) => v.len(),
            TypedColumn::Float(v) => v.len(),
            TypedColumn::Bool(v) => v.len(),
            TypedColumn::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_array(self) -> ArrayRef {
        match self {
            TypedColumn::Int(v) => Arc::new(Int64Array::from(v)),
            TypedColumn::Float(v) => Arc::new(Float64Array::from(v)),
            TypedColumn::Bool(v) => Arc::new(BooleanArray::from(v)),
            TypedColumn::Text(v) => Arc::new(StringArray::from(v)),
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Decide the column kind from the first non-missing value only.
///
/// Returns `None` when every value is missing.
pub fn sample_kind(values: &[Option<String>]) -> Option<ColumnKind> {
    let sample = values.iter().find_map(|v| v.as_deref())?;
    let kind = if parse_int(sample).is_some() {
        ColumnKind::Int
    } else if parse_float(sample).is_some() {
        ColumnKind::Float
    } else if sample == "true" || sample == "false" {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    };
    Some(kind)
}

/// Sample one value, pick a kind, then convert the whole column.
///
/// A numeric kind that fails for any value falls back to text. Missing values
/// are allowed in float columns (null) but not in integer columns. Text columns
/// replace missing values with the empty string.
pub fn infer_column(values: &[Option<String>]) -> Result<TypedColumn> {
    let Some(kind) = sample_kind(values) else {
        return Ok(TypedColumn::Float(vec![None; values.len()]));
    };

    match kind {
        ColumnKind::Int => {
            let converted: Option<Vec<i64>> = values
                .iter()
                .map(|v| v.as_deref().and_then(parse_int))
                .collect();
            if let Some(ints) = converted {
                return Ok(TypedColumn::Int(ints));
            }
            trace!("integer sample but column does not convert, keeping text");
        }
        ColumnKind::Float => {
            let converted: Option<Vec<Option<f64>>> = values
                .iter()
                .map(|v| match v.as_deref() {
                    None => Some(None),
                    Some(s) => parse_float(s).map(Some),
                })
                .collect();
            if let Some(floats) = converted {
                return Ok(TypedColumn::Float(floats));
            }
            trace!("float sample but column does not convert, keeping text");
        }
        ColumnKind::Bool => {
            let bools = values
                .iter()
                .map(|v| match v.as_deref() {
                    None => Ok(None),
                    Some("true") => Ok(Some(true)),
                    Some("false") => Ok(Some(false)),
                    Some(other) => Err(Error::Value(format!(
                        "cannot map {:?} to a boolean",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(TypedColumn::Bool(bools));
        }
        ColumnKind::Text => {}
    }

    Ok(TypedColumn::Text(
        values
            .iter()
            .map(|v| v.clone().unwrap_or_default())
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn col(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn all_missing_becomes_null_floats() -> anyhow::Result<()> {
        let typed = infer_column(&[None, None, None])?;
        assert_eq!(typed, TypedColumn::Float(vec![None, None, None]));
        Ok(())
    }

    #[test]
    fn empty_column_is_float() -> anyhow::Result<()> {
        assert_eq!(infer_column(&[])?, TypedColumn::Float(vec![]));
        Ok(())
    }

    #[test]
    fn leading_zero_integer() -> anyhow::Result<()> {
        let typed = infer_column(&col(&["07", "12", "-3"]))?;
        assert_eq!(typed, TypedColumn::Int(vec![7, 12, -3]));
        Ok(())
    }

    #[test]
    fn integer_sample_with_bad_value_falls_back_to_text() -> anyhow::Result<()> {
        let typed = infer_column(&col(&["07", "abc"]))?;
        assert_eq!(
            typed,
            TypedColumn::Text(vec!["07".to_string(), "abc".to_string()])
        );
        Ok(())
    }

    #[test]
    fn integer_sample_with_decimal_value_stays_text() -> anyhow::Result<()> {
        // only the sampled kind is attempted, never widened to float
        let typed = infer_column(&col(&["1", "2.5"]))?;
        assert_eq!(typed.kind(), ColumnKind::Text);
        Ok(())
    }

    #[test]
    fn integer_sample_with_missing_value_stays_text() -> anyhow::Result<()> {
        let typed = infer_column(&[Some("1".to_string()), None])?;
        assert_eq!(typed, TypedColumn::Text(vec!["1".into(), String::new()]));
        Ok(())
    }

    #[test]
    fn float_column_keeps_missing_as_null() -> anyhow::Result<()> {
        let typed = infer_column(&[None, Some("1.5".to_string()), None, Some("3".to_string())])?;
        assert_eq!(
            typed,
            TypedColumn::Float(vec![None, Some(1.5), None, Some(3.0)])
        );
        Ok(())
    }

    #[test]
    fn float_sample_with_text_falls_back() -> anyhow::Result<()> {
        let typed = infer_column(&col(&["1.5", "n/a"]))?;
        assert_eq!(typed.kind(), ColumnKind::Text);
        Ok(())
    }

    #[test]
    fn booleans() -> anyhow::Result<()> {
        let typed = infer_column(&[Some("true".to_string()), None, Some("false".to_string())])?;
        assert_eq!(typed, TypedColumn::Bool(vec![Some(true), None, Some(false)]));
        Ok(())
    }

    #[test]
    fn unmappable_boolean_is_an_error() {
        let err = infer_column(&col(&["false", "True"])).unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }

    #[test]
    fn text_replaces_missing_with_empty() -> anyhow::Result<()> {
        let typed = infer_column(&[Some("NL".to_string()), None])?;
        assert_eq!(typed, TypedColumn::Text(vec!["NL".into(), String::new()]));
        assert_eq!(typed.into_array().data_type(), &DataType::Utf8);
        Ok(())
    }
}
