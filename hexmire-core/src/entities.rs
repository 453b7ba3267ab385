//! Cached record types for the Hexmire content cache.
//!
//! All server content lands in one of these shapes before it is persisted.
//! The cache partitions records by [`Language`]; the sandbox overlay store
//! reuses [`HexRecord`] keyed by hex code alone.

use crate::error::LanguageError;
use crate::hex::HexCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A content language partition, e.g. `"en"` or `"de"`.
///
/// Lowercase ASCII letters and dashes only, never empty. Every cache key is
/// scoped by a language so switching languages never mixes content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn parse(s: &str) -> Result<Self, LanguageError> {
        if s.is_empty() {
            return Err(LanguageError::Empty);
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(LanguageError::InvalidChars { got: s.to_string() });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Language {
    type Error = LanguageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

/// Opaque server-supplied token for the current content generation.
///
/// The synchronizer compares the stored stamp against the server-advertised
/// one; a mismatch (or absence on either side) triggers a full resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp(pub String);

impl VersionStamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw markdown content for one hex, as fetched or prefetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexRecord {
    pub hex_code: HexCode,
    pub raw_markdown: String,
    pub updated_at: Timestamp,
}

impl HexRecord {
    pub fn new(hex_code: HexCode, raw_markdown: impl Into<String>) -> Self {
        Self {
            hex_code,
            raw_markdown: raw_markdown.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Structured fields scraped out of settlement markdown.
///
/// Every field degrades to an empty string when the source document does
/// not carry it; the scraper never fails on malformed markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub population: String,
    pub atmosphere: String,
    pub notable_feature: String,
    /// Bounded excerpt of the Denizen/Encounter section.
    pub description: String,
    pub tavern: TavernInfo,
    pub loot: LootSection,
}

/// Tavern details for a settlement hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TavernInfo {
    pub menu_items: Vec<String>,
    pub innkeeper_quirk: String,
    pub patron_trait: String,
}

/// Loot table contents: key/value pairs when the section parses as a
/// table, otherwise the raw trimmed section text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootSection {
    Entries(Vec<(String, String)>),
    Raw(String),
}

impl Default for LootSection {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

/// Index of city overlays advertised by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayIndex {
    pub overlays: Vec<String>,
}

/// A city-scale sub-grid nested within a world hex.
///
/// The grid payload is kept as raw JSON: the client caches and replays it,
/// it does not interpret the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayGrid {
    pub name: String,
    pub grid: serde_json::Value,
}

/// Detail content for one hex inside a city overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayHexDetail {
    pub overlay: String,
    pub hex_id: String,
    pub detail: serde_json::Value,
}

/// Discriminant for the classes of record the offline cache stores.
///
/// Encoded as a single byte inside cache keys; values are stable and must
/// not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    HexMarkdown,
    Settlement,
    OverlayIndex,
    OverlayGrid,
    OverlayHex,
    Lore,
    CityContext,
    VersionStamp,
}

impl RecordKind {
    /// Stable single-byte encoding for cache keys.
    pub fn to_byte(self) -> u8 {
        match self {
            RecordKind::HexMarkdown => 0,
            RecordKind::Settlement => 1,
            RecordKind::OverlayIndex => 2,
            RecordKind::OverlayGrid => 3,
            RecordKind::OverlayHex => 4,
            RecordKind::Lore => 5,
            RecordKind::CityContext => 6,
            RecordKind::VersionStamp => 7,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(RecordKind::HexMarkdown),
            1 => Some(RecordKind::Settlement),
            2 => Some(RecordKind::OverlayIndex),
            3 => Some(RecordKind::OverlayGrid),
            4 => Some(RecordKind::OverlayHex),
            5 => Some(RecordKind::Lore),
            6 => Some(RecordKind::CityContext),
            7 => Some(RecordKind::VersionStamp),
            _ => None,
        }
    }

    /// Every kind, in key-encoding order. Used by tests and prefix scans.
    pub fn all() -> [RecordKind; 8] {
        [
            RecordKind::HexMarkdown,
            RecordKind::Settlement,
            RecordKind::OverlayIndex,
            RecordKind::OverlayGrid,
            RecordKind::OverlayHex,
            RecordKind::Lore,
            RecordKind::CityContext,
            RecordKind::VersionStamp,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert!(Language::parse("en").is_ok());
        assert!(Language::parse("pt-br").is_ok());
        assert!(matches!(Language::parse(""), Err(LanguageError::Empty)));
        assert!(matches!(
            Language::parse("EN"),
            Err(LanguageError::InvalidChars { .. })
        ));
        assert!(matches!(
            Language::parse("en us"),
            Err(LanguageError::InvalidChars { .. })
        ));
    }

    #[test]
    fn test_record_kind_byte_roundtrip() {
        for kind in RecordKind::all() {
            assert_eq!(RecordKind::from_byte(kind.to_byte()), Some(kind));
        }
        assert_eq!(RecordKind::from_byte(200), None);
    }

    #[test]
    fn test_loot_section_default_is_empty_raw() {
        assert_eq!(LootSection::default(), LootSection::Raw(String::new()));
    }
}
