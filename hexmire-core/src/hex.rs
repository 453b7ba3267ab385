//! Hex cell addressing.
//!
//! A hex is identified by a 4-digit zero-padded code, columns then rows
//! ("XXYY"). Codes sort lexicographically in grid order, which the store
//! relies on for prefix scans.

use crate::error::HexCodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single addressable map cell, identified by a 4-digit zero-padded code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexCode {
    column: u8,
    row: u8,
}

impl HexCode {
    /// Build a hex code from column and row indices.
    ///
    /// Both components are clamped to two decimal digits by construction
    /// (`u8` values above 99 are rejected).
    pub fn new(column: u8, row: u8) -> Result<Self, HexCodeError> {
        if column > 99 || row > 99 {
            return Err(HexCodeError::WrongLength {
                got: format!("{column:02}{row:02}"),
            });
        }
        Ok(Self { column, row })
    }

    /// Parse a canonical 4-digit code like `"0213"`.
    pub fn parse(s: &str) -> Result<Self, HexCodeError> {
        if s.len() != 4 {
            return Err(HexCodeError::WrongLength { got: s.to_string() });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HexCodeError::NotDigits { got: s.to_string() });
        }
        // Length and digit checks above make these infallible.
        let column = s[0..2].parse::<u8>().unwrap_or(0);
        let row = s[2..4].parse::<u8>().unwrap_or(0);
        Ok(Self { column, row })
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    pub fn row(&self) -> u8 {
        self.row
    }
}

impl fmt::Display for HexCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.column, self.row)
    }
}

impl FromStr for HexCode {
    type Err = HexCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexCode {
    type Error = HexCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<HexCode> for String {
    fn from(code: HexCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let code = HexCode::parse("0213").expect("parse should succeed");
        assert_eq!(code.column(), 2);
        assert_eq!(code.row(), 13);
        assert_eq!(code.to_string(), "0213");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(matches!(
            HexCode::parse("213"),
            Err(HexCodeError::WrongLength { .. })
        ));
        assert!(matches!(
            HexCode::parse("02130"),
            Err(HexCodeError::WrongLength { .. })
        ));
        assert!(matches!(
            HexCode::parse(""),
            Err(HexCodeError::WrongLength { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(matches!(
            HexCode::parse("02a3"),
            Err(HexCodeError::NotDigits { .. })
        ));
        assert!(matches!(
            HexCode::parse("-213"),
            Err(HexCodeError::NotDigits { .. })
        ));
    }

    #[test]
    fn test_display_zero_pads() {
        let code = HexCode::new(1, 5).expect("new should succeed");
        assert_eq!(code.to_string(), "0105");
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let code = HexCode::parse("1201").expect("parse should succeed");
        let json = serde_json::to_string(&code).expect("serialize should succeed");
        assert_eq!(json, "\"1201\"");
        let back: HexCode = serde_json::from_str(&json).expect("deserialize should succeed");
        assert_eq!(back, code);
    }

    #[test]
    fn test_ordering_follows_grid_order() {
        let a = HexCode::parse("0101").expect("parse should succeed");
        let b = HexCode::parse("0102").expect("parse should succeed");
        let c = HexCode::parse("0201").expect("parse should succeed");
        assert!(a < b);
        assert!(b < c);
    }
}
