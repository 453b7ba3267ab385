//! Offline content cache facade.
//!
//! [`OfflineCache`] wraps the LMDB backend with the contract the UI layer
//! relies on: reads never touch the network, writes are last-write-wins,
//! and storage failure is never fatal. Every backend error is logged at
//! debug level and degraded to a cache miss (reads) or a no-op (writes).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use hexmire_core::{
    HexCode, HexRecord, Language, OverlayGrid, OverlayHexDetail, OverlayIndex, RecordKind,
    SettlementRecord, VersionStamp,
};

use crate::backend::{LmdbBackend, StoreStats};
use crate::key::LanguageScopedKey;
use crate::sandbox::SandboxStore;

/// Language-partitioned persistent cache for server content.
#[derive(Clone)]
pub struct OfflineCache {
    backend: Arc<LmdbBackend>,
}

impl OfflineCache {
    pub fn new(backend: Arc<LmdbBackend>) -> Self {
        Self { backend }
    }

    // ------------------------------------------------------------------
    // Hex markdown
    // ------------------------------------------------------------------

    /// Raw markdown for a hex, or `None` on miss or storage failure.
    pub fn get(&self, language: &Language, hex: HexCode) -> Option<String> {
        self.get_hex_record(language, hex)
            .map(|record| record.raw_markdown)
    }

    /// Full cached record for a hex.
    pub fn get_hex_record(&self, language: &Language, hex: HexCode) -> Option<HexRecord> {
        self.get_json(language, RecordKind::HexMarkdown, &hex.to_string())
    }

    /// Store markdown for a hex. Last write wins; failure is a no-op.
    pub fn set(&self, language: &Language, hex: HexCode, content: &str) {
        self.set_hex_record(language, &HexRecord::new(hex, content));
    }

    pub fn set_hex_record(&self, language: &Language, record: &HexRecord) {
        self.put_json(
            language,
            RecordKind::HexMarkdown,
            &record.hex_code.to_string(),
            record,
        );
    }

    /// Read a hex with sandbox precedence: a sandbox edit, when present,
    /// always shadows the synced base record.
    pub fn read_hex(
        &self,
        sandbox: &SandboxStore,
        language: &Language,
        hex: HexCode,
    ) -> Option<HexRecord> {
        if let Some(record) = sandbox.get_record(hex) {
            return Some(record);
        }
        self.get_hex_record(language, hex)
    }

    // ------------------------------------------------------------------
    // Version stamps
    // ------------------------------------------------------------------

    pub fn get_version(&self, language: &Language) -> Option<VersionStamp> {
        let key = LanguageScopedKey::new(language.clone(), RecordKind::VersionStamp, "");
        match self.backend.get(&key) {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok().map(VersionStamp),
            Ok(None) => None,
            Err(e) => {
                debug!(language = %language, error = %e, "version read failed, treating as absent");
                None
            }
        }
    }

    pub fn set_version(&self, language: &Language, stamp: &VersionStamp) {
        let key = LanguageScopedKey::new(language.clone(), RecordKind::VersionStamp, "");
        if let Err(e) = self.backend.put(&key, stamp.as_str().as_bytes()) {
            debug!(language = %language, error = %e, "version write failed, skipping");
        }
    }

    /// Wipe a language partition, version stamp included (atomic).
    pub fn clear_all(&self, language: &Language) {
        if let Err(e) = self.backend.clear_language(language) {
            debug!(language = %language, error = %e, "cache clear failed, skipping");
        }
    }

    // ------------------------------------------------------------------
    // Typed JSON records
    // ------------------------------------------------------------------

    pub fn get_settlement(&self, language: &Language, hex: HexCode) -> Option<SettlementRecord> {
        self.get_json(language, RecordKind::Settlement, &hex.to_string())
    }

    pub fn set_settlement(
        &self,
        language: &Language,
        hex: HexCode,
        record: &SettlementRecord,
    ) {
        self.put_json(language, RecordKind::Settlement, &hex.to_string(), record);
    }

    pub fn get_overlay_index(&self, language: &Language) -> Option<OverlayIndex> {
        self.get_json(language, RecordKind::OverlayIndex, "")
    }

    pub fn set_overlay_index(&self, language: &Language, index: &OverlayIndex) {
        self.put_json(language, RecordKind::OverlayIndex, "", index);
    }

    pub fn get_overlay_grid(&self, language: &Language, name: &str) -> Option<OverlayGrid> {
        self.get_json(language, RecordKind::OverlayGrid, name)
    }

    pub fn set_overlay_grid(&self, language: &Language, grid: &OverlayGrid) {
        self.put_json(language, RecordKind::OverlayGrid, &grid.name, grid);
    }

    pub fn get_overlay_hex(
        &self,
        language: &Language,
        overlay: &str,
        hex_id: &str,
    ) -> Option<OverlayHexDetail> {
        self.get_json(
            language,
            RecordKind::OverlayHex,
            &overlay_hex_item(overlay, hex_id),
        )
    }

    pub fn set_overlay_hex(&self, language: &Language, detail: &OverlayHexDetail) {
        self.put_json(
            language,
            RecordKind::OverlayHex,
            &overlay_hex_item(&detail.overlay, &detail.hex_id),
            detail,
        );
    }

    pub fn get_lore(&self, language: &Language) -> Option<String> {
        self.get_json(language, RecordKind::Lore, "")
    }

    pub fn set_lore(&self, language: &Language, lore: &str) {
        self.put_json(language, RecordKind::Lore, "", &lore.to_string());
    }

    pub fn get_city_context(
        &self,
        language: &Language,
        overlay: &str,
    ) -> Option<serde_json::Value> {
        self.get_json(language, RecordKind::CityContext, overlay)
    }

    pub fn set_city_context(&self, language: &Language, overlay: &str, context: &serde_json::Value) {
        self.put_json(language, RecordKind::CityContext, overlay, context);
    }

    /// Backend hit/miss/entry statistics.
    pub fn stats(&self) -> StoreStats {
        self.backend.stats()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn get_json<T: DeserializeOwned>(
        &self,
        language: &Language,
        kind: RecordKind,
        item: &str,
    ) -> Option<T> {
        let key = LanguageScopedKey::new(language.clone(), kind, item);
        match self.backend.get(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(?kind, item, error = %e, "cached record undecodable, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(?kind, item, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn put_json<T: Serialize>(&self, language: &Language, kind: RecordKind, item: &str, value: &T) {
        let key = LanguageScopedKey::new(language.clone(), kind, item);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(?kind, item, error = %e, "record serialization failed, skipping write");
                return;
            }
        };
        if let Err(e) = self.backend.put(&key, &bytes) {
            debug!(?kind, item, error = %e, "cache write failed, skipping");
        }
    }
}

fn overlay_hex_item(overlay: &str, hex_id: &str) -> String {
    format!("{overlay}/{hex_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexmire_core::extract_settlement;
    use tempfile::TempDir;

    fn create_cache() -> (OfflineCache, SandboxStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend = Arc::new(
            LmdbBackend::open(temp_dir.path(), 10).expect("backend creation should succeed"),
        );
        (
            OfflineCache::new(Arc::clone(&backend)),
            SandboxStore::new(backend),
            temp_dir,
        )
    }

    fn lang(code: &str) -> Language {
        Language::parse(code).expect("valid language")
    }

    fn hex(code: &str) -> HexCode {
        HexCode::parse(code).expect("valid hex code")
    }

    #[test]
    fn test_set_then_get() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        cache.set(&en, hex("0101"), "# A drowned chapel");
        assert_eq!(
            cache.get(&en, hex("0101")).as_deref(),
            Some("# A drowned chapel")
        );
        assert!(cache.get(&en, hex("0202")).is_none());
    }

    #[test]
    fn test_languages_are_isolated() {
        let (cache, _sandbox, _temp_dir) = create_cache();

        cache.set(&lang("en"), hex("0101"), "english");
        assert!(cache.get(&lang("de"), hex("0101")).is_none());
    }

    #[test]
    fn test_version_stamp_roundtrip() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        assert!(cache.get_version(&en).is_none());
        cache.set_version(&en, &VersionStamp("gen-42".to_string()));
        assert_eq!(
            cache.get_version(&en),
            Some(VersionStamp("gen-42".to_string()))
        );
    }

    #[test]
    fn test_clear_all_wipes_records_and_stamp() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        cache.set(&en, hex("0101"), "content");
        cache.set_version(&en, &VersionStamp("gen-1".to_string()));
        cache.clear_all(&en);

        assert!(cache.get(&en, hex("0101")).is_none());
        // Cleared cache must read as never-synced so the next check resyncs.
        assert!(cache.get_version(&en).is_none());
    }

    #[test]
    fn test_sandbox_shadows_base_record() {
        let (cache, sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        cache.set(&en, hex("0101"), "base content");
        sandbox.save(hex("0101"), "sandbox edit");

        let record = cache
            .read_hex(&sandbox, &en, hex("0101"))
            .expect("record should exist");
        assert_eq!(record.raw_markdown, "sandbox edit");

        // Without a sandbox entry the base record comes through.
        cache.set(&en, hex("0202"), "untouched");
        let record = cache
            .read_hex(&sandbox, &en, hex("0202"))
            .expect("record should exist");
        assert_eq!(record.raw_markdown, "untouched");
    }

    #[test]
    fn test_settlement_record_roundtrip() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        let doc = "# \u{2302} Hamlet\n\n**Population:** 40\n**Atmosphere:** damp\n";
        let record = extract_settlement(doc).expect("settlement should parse");
        cache.set_settlement(&en, hex("0304"), &record);

        let cached = cache
            .get_settlement(&en, hex("0304"))
            .expect("settlement should be cached");
        assert_eq!(cached.population, "40");
        assert_eq!(cached.atmosphere, "damp");
    }

    #[test]
    fn test_overlay_records_roundtrip() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        cache.set_overlay_index(
            &en,
            &OverlayIndex {
                overlays: vec!["galgenbeck".to_string()],
            },
        );
        cache.set_overlay_grid(
            &en,
            &OverlayGrid {
                name: "galgenbeck".to_string(),
                grid: serde_json::json!({"rows": 6}),
            },
        );
        cache.set_overlay_hex(
            &en,
            &OverlayHexDetail {
                overlay: "galgenbeck".to_string(),
                hex_id: "a1".to_string(),
                detail: serde_json::json!({"name": "Chapel Row"}),
            },
        );

        assert_eq!(
            cache
                .get_overlay_index(&en)
                .expect("index should be cached")
                .overlays,
            vec!["galgenbeck".to_string()]
        );
        assert_eq!(
            cache
                .get_overlay_grid(&en, "galgenbeck")
                .expect("grid should be cached")
                .grid["rows"],
            6
        );
        assert_eq!(
            cache
                .get_overlay_hex(&en, "galgenbeck", "a1")
                .expect("detail should be cached")
                .detail["name"],
            "Chapel Row"
        );
    }

    #[test]
    fn test_city_context_roundtrip() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        assert!(cache.get_city_context(&en, "galgenbeck").is_none());
        cache.set_city_context(&en, "galgenbeck", &serde_json::json!({"mood": "feverish"}));
        let context = cache
            .get_city_context(&en, "galgenbeck")
            .expect("context should be cached");
        assert_eq!(context["mood"], "feverish");
    }

    #[test]
    fn test_lore_roundtrip() {
        let (cache, _sandbox, _temp_dir) = create_cache();
        let en = lang("en");

        assert!(cache.get_lore(&en).is_none());
        cache.set_lore(&en, "# The Calendar of Nechrubel");
        assert_eq!(
            cache.get_lore(&en).as_deref(),
            Some("# The Calendar of Nechrubel")
        );
    }
}
