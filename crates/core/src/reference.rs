//! Human-readable reference numbers ("BK00005", "ITM00041", ...).
//!
//! A reference is a short uppercase prefix plus a monotonically increasing
//! sequence, rendered zero-padded to five digits. Sequences past 99999 keep
//! their natural width. References are allocated once at entity creation and
//! are immutable thereafter; the allocation itself lives in infra
//! (`SequenceStore`), keeping this type a pure value.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Minimum rendered width of the numeric suffix.
const SEQUENCE_WIDTH: usize = 5;

/// A prefixed, sequence-numbered reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferenceNumber {
    prefix: String,
    sequence: u64,
}

impl ReferenceNumber {
    /// Build a reference from a prefix and a 1-based sequence.
    pub fn new(prefix: impl Into<String>, sequence: u64) -> Result<Self, DomainError> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::invalid_id(format!(
                "reference prefix must be non-empty uppercase ASCII, got '{prefix}'"
            )));
        }
        if sequence == 0 {
            return Err(DomainError::invalid_id("reference sequence starts at 1"));
        }
        Ok(Self { prefix, sequence })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl core::fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.sequence, width = SEQUENCE_WIDTH)
    }
}

impl FromStr for ReferenceNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(|| {
            DomainError::invalid_id(format!("reference '{s}' has no numeric suffix"))
        })?;
        let (prefix, digits) = s.split_at(split);
        let sequence: u64 = digits
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("reference '{s}': {e}")))?;
        Self::new(prefix, sequence)
    }
}

impl TryFrom<String> for ReferenceNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferenceNumber> for String {
    fn from(value: ReferenceNumber) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_zero_padded_to_five_digits() {
        let r = ReferenceNumber::new("BK", 5).unwrap();
        assert_eq!(r.to_string(), "BK00005");

        let r = ReferenceNumber::new("SA", 42).unwrap();
        assert_eq!(r.to_string(), "SA00042");
    }

    #[test]
    fn wide_sequences_keep_natural_width() {
        let r = ReferenceNumber::new("ITM", 123456).unwrap();
        assert_eq!(r.to_string(), "ITM123456");
    }

    #[test]
    fn parses_round_trip() {
        let r: ReferenceNumber = "GR00041".parse().unwrap();
        assert_eq!(r.prefix(), "GR");
        assert_eq!(r.sequence(), 41);
        assert_eq!(r.to_string(), "GR00041");
    }

    #[test]
    fn rejects_zero_sequence_and_bad_prefixes() {
        assert!(ReferenceNumber::new("BK", 0).is_err());
        assert!(ReferenceNumber::new("", 1).is_err());
        assert!(ReferenceNumber::new("bk", 1).is_err());
        assert!("12345".parse::<ReferenceNumber>().is_err());
        assert!("BK".parse::<ReferenceNumber>().is_err());
    }
}
