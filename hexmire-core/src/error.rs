//! Error types for Hexmire core operations.

use thiserror::Error;

/// Errors from parsing hex cell addresses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HexCodeError {
    #[error("Hex code must be exactly 4 digits, got {got:?}")]
    WrongLength { got: String },

    #[error("Hex code contains non-digit characters: {got:?}")]
    NotDigits { got: String },
}

/// Errors from parsing language codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LanguageError {
    #[error("Language code must not be empty")]
    Empty,

    #[error("Language code contains invalid characters: {got:?}")]
    InvalidChars { got: String },
}
