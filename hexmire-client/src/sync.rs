//! Prefetch synchronizer.
//!
//! Bulk-populates the offline cache from the server's export archive so
//! browsing never waits on per-hex round trips. The flow:
//!
//! 1. Stored stamp equals the advertised stamp → no-op, zero fetches.
//! 2. Otherwise wipe the language partition (stamp included, atomically),
//!    download the archive, and unpack it in memory.
//! 3. Store raw markdown per hex; settlements additionally get a
//!    structured record scraped out of the markdown.
//! 4. Report progress at a fixed sampling interval, not per item.
//! 5. Best-effort overlay prefetch: every failure is swallowed.
//! 6. Persist the new version stamp.
//!
//! All per-hex and per-overlay work runs sequentially. There is no
//! cancellation: a started sync runs to completion or errors, and callers
//! that stop caring must simply discard the result.

use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use hexmire_core::{
    extract_settlement, HexCode, Language, OverlayGrid, OverlayHexDetail, OverlayIndex,
    VersionStamp,
};
use hexmire_store::OfflineCache;

use crate::api::{ApiClient, ApiError, ExportArchive};

/// Default progress sampling interval: report every 50 processed entries.
pub const PROGRESS_INTERVAL: usize = 50;

/// Stamp persisted when neither the server nor the prior cache supplies one.
const FALLBACK_VERSION: &str = "0";

/// Archive entries named like `hex_0203.md` or `0203.md` are hex documents.
static HEX_DOC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\.md$").expect("static regex"));

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The export archive could not be fetched or unpacked. Fatal for this
    /// sync call; not retried automatically.
    #[error("Content archive unavailable: {reason}")]
    ArchiveUnavailable { reason: String },
}

/// Fetch seam for the synchronizer, so tests can count and fake network
/// traffic without a server.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn export_archive(&self) -> Result<ExportArchive, ApiError>;
    async fn city_overlays(&self) -> Result<OverlayIndex, ApiError>;
    async fn city_overlay(&self, name: &str) -> Result<OverlayGrid, ApiError>;
    async fn city_overlay_hex(&self, name: &str, hex_id: &str)
        -> Result<OverlayHexDetail, ApiError>;
}

#[async_trait]
impl ContentSource for ApiClient {
    async fn export_archive(&self) -> Result<ExportArchive, ApiError> {
        ApiClient::export_archive(self).await
    }

    async fn city_overlays(&self) -> Result<OverlayIndex, ApiError> {
        self.list_city_overlays().await
    }

    async fn city_overlay(&self, name: &str) -> Result<OverlayGrid, ApiError> {
        self.get_city_overlay(name).await
    }

    async fn city_overlay_hex(
        &self,
        name: &str,
        hex_id: &str,
    ) -> Result<OverlayHexDetail, ApiError> {
        self.get_city_overlay_hex(name, hex_id).await
    }
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub hexes_loaded: usize,
    pub settlements_parsed: usize,
    pub overlays_cached: usize,
    pub version: VersionStamp,
    /// True when the stored stamp already matched and nothing was fetched.
    pub already_current: bool,
}

/// Bulk cache populator; see the module docs for the flow.
pub struct PrefetchSynchronizer<'a, S: ContentSource> {
    source: &'a S,
    cache: &'a OfflineCache,
    progress_interval: usize,
}

impl<'a, S: ContentSource> PrefetchSynchronizer<'a, S> {
    pub fn new(source: &'a S, cache: &'a OfflineCache) -> Self {
        Self {
            source,
            cache,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Override the progress sampling interval (must be > 0).
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Synchronize one language partition against the server.
    ///
    /// `advertised` is the server-advertised version stamp the caller has
    /// seen (e.g. via [`ApiClient::server_version`]); when it matches the
    /// stored stamp the sync is a no-op with zero fetches. `progress` is
    /// invoked with `(processed, total)` every `progress_interval` entries
    /// and once at completion.
    pub async fn sync(
        &self,
        language: &Language,
        advertised: Option<&VersionStamp>,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<SyncReport, SyncError> {
        let stored = self.cache.get_version(language);
        if let (Some(stored), Some(advertised)) = (&stored, advertised) {
            if stored == advertised {
                debug!(language = %language, version = %stored, "cache current, skipping sync");
                return Ok(SyncReport {
                    hexes_loaded: 0,
                    settlements_parsed: 0,
                    overlays_cached: 0,
                    version: stored.clone(),
                    already_current: true,
                });
            }
        }

        // Stale or never synced: wipe the partition (stamp included) before
        // repopulating, so a failed sync leaves an honest empty cache
        // rather than a mix of generations.
        self.cache.clear_all(language);

        let archive = self
            .source
            .export_archive()
            .await
            .map_err(|e| SyncError::ArchiveUnavailable {
                reason: e.to_string(),
            })?;

        let documents = unpack_hex_documents(&archive.bytes)?;
        let total = documents.len();
        let mut settlements_parsed = 0usize;

        for (processed, (hex, markdown)) in documents.iter().enumerate().map(|(i, d)| (i + 1, d)) {
            self.cache.set(language, *hex, markdown);
            if let Some(settlement) = extract_settlement(markdown) {
                self.cache.set_settlement(language, *hex, &settlement);
                settlements_parsed += 1;
            }
            if processed % self.progress_interval == 0 {
                progress(processed, total);
            }
        }
        if total > 0 && total % self.progress_interval != 0 {
            progress(total, total);
        }

        let overlays_cached = self.prefetch_overlays(language).await;

        // Prefer the archive's stamp, then the previously stored one, then
        // the fallback, so the next comparison always has a value.
        let version = archive
            .version
            .or(stored)
            .unwrap_or_else(|| VersionStamp(FALLBACK_VERSION.to_string()));
        self.cache.set_version(language, &version);

        info!(
            language = %language,
            hexes = total,
            settlements = settlements_parsed,
            overlays = overlays_cached,
            version = %version,
            "prefetch sync complete"
        );

        Ok(SyncReport {
            hexes_loaded: total,
            settlements_parsed,
            overlays_cached,
            version,
            already_current: false,
        })
    }

    /// Best-effort city overlay prefetch. Failures at any level are logged
    /// and swallowed; they never abort the sync. Returns the number of
    /// overlay grids cached.
    async fn prefetch_overlays(&self, language: &Language) -> usize {
        let index = match self.source.city_overlays().await {
            Ok(index) => index,
            Err(e) => {
                debug!(error = %e, "overlay index fetch failed, skipping overlay prefetch");
                return 0;
            }
        };
        if index.overlays.is_empty() {
            return 0;
        }
        self.cache.set_overlay_index(language, &index);

        let mut cached = 0usize;
        for name in &index.overlays {
            let grid = match self.source.city_overlay(name).await {
                Ok(grid) => grid,
                Err(e) => {
                    debug!(overlay = %name, error = %e, "overlay grid fetch failed, skipping");
                    continue;
                }
            };
            self.cache.set_overlay_grid(language, &grid);
            cached += 1;

            for hex_id in overlay_hex_ids(&grid) {
                match self.source.city_overlay_hex(name, &hex_id).await {
                    Ok(detail) => self.cache.set_overlay_hex(language, &detail),
                    Err(e) => {
                        debug!(overlay = %name, hex = %hex_id, error = %e, "overlay hex fetch failed, skipping");
                    }
                }
            }
        }
        cached
    }
}

/// Unpack the export archive (gzip tar) in memory and keep every entry
/// that names a hex document. Entries that do not match the naming
/// pattern are skipped silently; a broken archive is fatal.
fn unpack_hex_documents(bytes: &[u8]) -> Result<Vec<(HexCode, String)>, SyncError> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);

    let mut documents = Vec::new();
    let entries = archive.entries().map_err(|e| SyncError::ArchiveUnavailable {
        reason: format!("unreadable archive: {e}"),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| SyncError::ArchiveUnavailable {
            reason: format!("corrupt archive entry: {e}"),
        })?;
        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        let Some(hex) = hex_code_from_entry_name(&name) else {
            continue;
        };

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| SyncError::ArchiveUnavailable {
                reason: format!("corrupt archive entry {name}: {e}"),
            })?;
        documents.push((hex, String::from_utf8_lossy(&contents).into_owned()));
    }
    Ok(documents)
}

/// Extract the 4-digit hex code from an archive entry name.
fn hex_code_from_entry_name(name: &str) -> Option<HexCode> {
    let caps = HEX_DOC_NAME.captures(name)?;
    HexCode::parse(caps.get(1)?.as_str()).ok()
}

/// Pull hex ids out of an overlay grid payload. The grid is otherwise
/// opaque to the client; a payload without a recognizable hex list just
/// yields nothing to prefetch.
fn overlay_hex_ids(grid: &OverlayGrid) -> Vec<String> {
    let Some(hexes) = grid.grid.get("hexes").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    hexes
        .iter()
        .filter_map(|hex| match hex {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Object(fields) => fields
                .get("id")
                .and_then(|id| id.as_str())
                .map(str::to_string),
            _ => None,
        })
        .collect()
}
