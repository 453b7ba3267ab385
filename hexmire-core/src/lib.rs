//! Hexmire Core - Data Types
//!
//! Pure data structures and the markdown settlement scraper. No I/O here;
//! the store and client crates depend on this.

pub mod entities;
pub mod error;
pub mod hex;
pub mod settlement;

pub use entities::{
    HexRecord, Language, LootSection, OverlayGrid, OverlayHexDetail, OverlayIndex, RecordKind,
    SettlementRecord, TavernInfo, Timestamp, VersionStamp,
};
pub use error::{HexCodeError, LanguageError};
pub use hex::HexCode;
pub use settlement::extract_settlement;
