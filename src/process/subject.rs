use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Repeated record types found in the utility tool XML download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseDataSubject {
    MaxExchanges,
    MaxNetPositions,
    Ptdfs,
}

impl ParseDataSubject {
    pub const ALL: [ParseDataSubject; 3] = [
        ParseDataSubject::MaxExchanges,
        ParseDataSubject::MaxNetPositions,
        ParseDataSubject::Ptdfs,
    ];

    /// Container element name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseDataSubject::MaxExchanges => "MaxExchanges",
            ParseDataSubject::MaxNetPositions => "MaxNetPositions",
            ParseDataSubject::Ptdfs => "Ptdfs",
        }
    }

    /// Per-record element name, e.g. `MaxExchanges` → `MaxExchange`.
    pub fn record_name(&self) -> &'static str {
        singularize(self.as_str())
    }
}

impl fmt::Display for ParseDataSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseDataSubject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParseDataSubject::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::NotSupported(format!("unknown subject {:?}", s)))
    }
}

/// Strips one trailing `s`. Only valid for the fixed subject vocabulary.
pub fn singularize(subject: &str) -> &str {
    subject.strip_suffix('s').unwrap_or(subject)
}
