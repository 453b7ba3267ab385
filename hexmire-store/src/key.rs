//! Language-scoped cache key system.
//!
//! The key insight is that `LanguageScopedKey`'s private constructor makes
//! cross-language cache access uncompilable: a key cannot exist without a
//! language, so every read and write lands in exactly one language
//! partition.

use hexmire_core::{Language, RecordKind};

/// Separator byte between the language prefix and the rest of the key.
///
/// Languages are lowercase ASCII, so 0xFF can never appear inside one.
const SEPARATOR: u8 = 0xFF;

/// A cache key scoped to one language partition.
///
/// # Binary Format
///
/// `[language bytes][0xFF][kind byte][item bytes]`
///
/// Variable length, but unambiguous: the separator cannot occur inside the
/// language component. Keys sort by language first, then record kind, then
/// item, so LMDB prefix scans can wipe one language (or one kind within a
/// language) without touching its neighbors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageScopedKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    language: Language,
    kind: RecordKind,
    item: String,
}

impl LanguageScopedKey {
    /// Create a new language-scoped cache key.
    ///
    /// This is the only way to construct one, ensuring all cache
    /// operations are language-isolated by construction.
    pub fn new(language: Language, kind: RecordKind, item: impl Into<String>) -> Self {
        Self {
            inner: KeyInner {
                language,
                kind,
                item: item.into(),
            },
        }
    }

    pub fn language(&self) -> &Language {
        &self.inner.language
    }

    pub fn kind(&self) -> RecordKind {
        self.inner.kind
    }

    pub fn item(&self) -> &str {
        &self.inner.item
    }

    /// Encode this key for LMDB storage.
    pub fn encode(&self) -> Vec<u8> {
        let language = self.inner.language.as_str().as_bytes();
        let item = self.inner.item.as_bytes();
        let mut bytes = Vec::with_capacity(language.len() + 2 + item.len());
        bytes.extend_from_slice(language);
        bytes.push(SEPARATOR);
        bytes.push(self.inner.kind.to_byte());
        bytes.extend_from_slice(item);
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` when the separator is missing, the language or item
    /// bytes are not valid UTF-8, or the kind byte is unknown.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let sep = bytes.iter().position(|&b| b == SEPARATOR)?;
        let language = std::str::from_utf8(&bytes[..sep]).ok()?;
        let language = Language::parse(language).ok()?;
        let kind = RecordKind::from_byte(*bytes.get(sep + 1)?)?;
        let item = std::str::from_utf8(&bytes[sep + 2..]).ok()?.to_string();
        Some(Self {
            inner: KeyInner {
                language,
                kind,
                item,
            },
        })
    }

    /// Prefix matching every key in a language partition.
    pub fn language_prefix(language: &Language) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(language.as_str().len() + 1);
        prefix.extend_from_slice(language.as_str().as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }

    /// Prefix matching every key of one record kind within a language.
    pub fn language_kind_prefix(language: &Language, kind: RecordKind) -> Vec<u8> {
        let mut prefix = Self::language_prefix(language);
        prefix.push(kind.to_byte());
        prefix
    }
}
