use arrow::error::ArrowError;
use thiserror::Error;

/// Failure modes of the extraction and derivation routines.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload is not well-formed XML or CSV.
    #[error("parse error: {0}")]
    Parse(String),

    /// Column lengths disagree or a required field/column is absent.
    #[error("shape error: {0}")]
    Shape(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    /// A value lies outside the domain its column allows.
    #[error("value error: {0}")]
    Value(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
