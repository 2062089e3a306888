//! Period tokens
//!
//! A period is the analytics API's own string encoding: `YYYYMM` (monthly),
//! `YYYYQn` (quarterly) or `YYYY` (annual). The encoding is fixed width per
//! cadence, so lexical order of two periods of the same cadence is their
//! chronological order. Cadence is always derived from the token shape.

use crate::error::{EtlError, EtlResult};
use std::fmt;

/// Granularity of a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cadence {
    Monthly,
    Quarterly,
    Annual,
}

impl Cadence {
    /// Classify a raw token by shape, or `None` if it is not a period
    pub fn classify(token: &str) -> Option<Cadence> {
        let bytes = token.as_bytes();
        let year_ok = bytes.len() >= 4 && bytes[..4].iter().all(u8::is_ascii_digit);
        if !year_ok {
            return None;
        }

        match &bytes[4..] {
            [] => Some(Cadence::Annual),
            [b'Q', q] if (b'1'..=b'4').contains(q) => Some(Cadence::Quarterly),
            [m1, m2] if m1.is_ascii_digit() && m2.is_ascii_digit() => {
                let month = (m1 - b'0') * 10 + (m2 - b'0');
                (1..=12).contains(&month).then_some(Cadence::Monthly)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
            Cadence::Annual => "annual",
        };
        f.write_str(label)
    }
}

/// A validated period token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(String);

impl Period {
    /// Parse and validate a period token
    pub fn parse(token: &str) -> EtlResult<Period> {
        match Cadence::classify(token) {
            Some(_) => Ok(Period(token.to_string())),
            None => Err(EtlError::InvalidPeriod(token.to_string())),
        }
    }

    /// `YYYYMM`; month must be 1..=12
    pub fn monthly(year: i32, month: u32) -> Period {
        debug_assert!((1..=12).contains(&month));
        Period(format!("{:04}{:02}", year, month))
    }

    /// `YYYYQn`; quarter must be 1..=4
    pub fn quarterly(year: i32, quarter: u32) -> Period {
        debug_assert!((1..=4).contains(&quarter));
        Period(format!("{:04}Q{}", year, quarter))
    }

    pub fn annual(year: i32) -> Period {
        Period(format!("{:04}", year))
    }

    pub fn cadence(&self) -> Cadence {
        // Construction guarantees the shape is valid
        Cadence::classify(&self.0).unwrap_or(Cadence::Annual)
    }

    /// The four-digit year prefix
    pub fn year(&self) -> &str {
        &self.0[..4]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Period {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
