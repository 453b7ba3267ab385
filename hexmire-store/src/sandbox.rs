//! Sandbox overlay store for user-local edits.
//!
//! Sandbox records live in their own LMDB database, keyed by hex code
//! alone (no language partition: an edit follows the user, not the
//! content language). They shadow synced content on read and survive
//! restarts until the user resets the sandbox.
//!
//! Each sandbox carries a random persisted identity. `clear_all` wipes the
//! records and rotates the identity in one transaction, logically starting
//! a fresh anonymous session. This reset is one-way; there is no undo.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use hexmire_core::{HexCode, HexRecord};

use crate::backend::LmdbBackend;

/// Reserved key for the sandbox identity. Hex-code keys are ASCII digits,
/// so a NUL-prefixed key can never collide with one.
const IDENTITY_KEY: &[u8] = b"\x00identity";

/// Store of user-local hex edits, shadowing server content.
///
/// Like [`crate::cache::OfflineCache`], the sandbox never surfaces storage
/// errors: failed reads degrade to misses and failed writes to no-ops.
#[derive(Clone)]
pub struct SandboxStore {
    backend: Arc<LmdbBackend>,
}

impl SandboxStore {
    pub fn new(backend: Arc<LmdbBackend>) -> Self {
        Self { backend }
    }

    /// Persist an edit for a hex. Overwrites any previous edit.
    pub fn save(&self, hex: HexCode, content: &str) {
        let record = HexRecord::new(hex, content);
        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%hex, error = %e, "sandbox record serialization failed, skipping");
                return;
            }
        };
        if let Err(e) = self.backend.sandbox_put(hex.to_string().as_bytes(), &bytes) {
            debug!(%hex, error = %e, "sandbox write failed, skipping");
        }
    }

    /// The edited markdown for a hex, if any.
    pub fn get(&self, hex: HexCode) -> Option<String> {
        self.get_record(hex).map(|record| record.raw_markdown)
    }

    /// The full edit record for a hex, if any.
    pub fn get_record(&self, hex: HexCode) -> Option<HexRecord> {
        match self.backend.sandbox_get(hex.to_string().as_bytes()) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(%hex, error = %e, "sandbox record undecodable, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(%hex, error = %e, "sandbox read failed, treating as miss");
                None
            }
        }
    }

    /// Every edit in the sandbox, in hex-code order.
    pub fn dump_all(&self) -> Vec<HexRecord> {
        let entries = match self.backend.sandbox_scan(&[]) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "sandbox scan failed, returning empty dump");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter(|(key, _)| key != IDENTITY_KEY)
            .filter_map(|(_, value)| serde_json::from_slice(&value).ok())
            .collect()
    }

    /// Write a batch of edits back into the sandbox, e.g. from a dump
    /// taken before a reset on another device. Existing edits for other
    /// hexes are kept; colliding hexes are overwritten.
    pub fn restore_all(&self, records: &[HexRecord]) {
        for record in records {
            let bytes = match serde_json::to_vec(record) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(hex = %record.hex_code, error = %e, "restore serialization failed, skipping entry");
                    continue;
                }
            };
            if let Err(e) = self
                .backend
                .sandbox_put(record.hex_code.to_string().as_bytes(), &bytes)
            {
                debug!(hex = %record.hex_code, error = %e, "restore write failed, skipping entry");
            }
        }
    }

    /// Wipe every edit and rotate the sandbox identity, starting a fresh
    /// anonymous session. One-way; there is no undo.
    pub fn clear_all(&self) {
        let fresh = Uuid::now_v7().to_string();
        let entries = [(IDENTITY_KEY.to_vec(), fresh.into_bytes())];
        if let Err(e) = self.backend.sandbox_replace_all(&entries) {
            debug!(error = %e, "sandbox clear failed, skipping");
        }
    }

    /// The persisted sandbox identity, created on first access.
    pub fn identity(&self) -> String {
        match self.backend.sandbox_get(IDENTITY_KEY) {
            Ok(Some(bytes)) => {
                if let Ok(identity) = String::from_utf8(bytes) {
                    return identity;
                }
                debug!("sandbox identity undecodable, rotating");
                self.write_fresh_identity()
            }
            Ok(None) => self.write_fresh_identity(),
            Err(e) => {
                // Storage unavailable: hand out an ephemeral identity so the
                // caller can proceed; it will be regenerated next session.
                debug!(error = %e, "identity read failed, using ephemeral identity");
                Uuid::now_v7().to_string()
            }
        }
    }

    fn write_fresh_identity(&self) -> String {
        let fresh = Uuid::now_v7().to_string();
        if let Err(e) = self.backend.sandbox_put(IDENTITY_KEY, fresh.as_bytes()) {
            debug!(error = %e, "identity write failed, using ephemeral identity");
        }
        fresh
    }
}
