//! LMDB-backed storage for the offline cache and sandbox partitions.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store that survives restarts. One environment holds two named
//! databases:
//!
//! - `content`: server-synced records, keyed by [`LanguageScopedKey`]
//! - `sandbox`: user-local edits, keyed by hex code alone
//!
//! All operations here are fallible and return [`StoreError`]. The
//! never-throws contract of the cache lives one layer up, in
//! [`crate::cache::OfflineCache`] and [`crate::sandbox::SandboxStore`].

use std::path::Path;
use std::sync::RwLock;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use hexmire_core::Language;

use crate::key::LanguageScopedKey;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LMDB-backed store holding the content cache and the sandbox partition.
pub struct LmdbBackend {
    env: Env,
    content: Database<Bytes, Bytes>,
    sandbox: Database<Bytes, Bytes>,
    stats: RwLock<StoreStats>,
}

impl LmdbBackend {
    /// Open (or create) the store at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(2)
                .open(path.as_ref())
        }
        .map_err(|e| StoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let content: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("content"))
            .map_err(|e| StoreError::DbOpen(e.to_string()))?;
        let sandbox: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("sandbox"))
            .map_err(|e| StoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            content,
            sandbox,
            stats: RwLock::new(StoreStats::default()),
        })
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
        }
    }

    /// Current hit/miss/entry statistics.
    pub fn stats(&self) -> StoreStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Content partition
    // ------------------------------------------------------------------

    /// Get raw bytes for a language-scoped key.
    pub fn get(&self, key: &LanguageScopedKey) -> Result<Option<Vec<u8>>, StoreError> {
        let encoded = key.encode();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        match self.content.get(&rtxn, &encoded) {
            Ok(Some(bytes)) => {
                self.record_hit();
                Ok(Some(bytes.to_vec()))
            }
            Ok(None) => {
                self.record_miss();
                Ok(None)
            }
            Err(e) => {
                self.record_miss();
                Err(StoreError::Transaction(e.to_string()))
            }
        }
    }

    /// Put raw bytes under a language-scoped key. Last write wins.
    pub fn put(&self, key: &LanguageScopedKey, value: &[u8]) -> Result<(), StoreError> {
        let encoded = key.encode();

        let is_new = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| StoreError::Transaction(e.to_string()))?;
            self.content.get(&rtxn, &encoded).ok().flatten().is_none()
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        self.content
            .put(&mut wtxn, &encoded, value)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        if is_new {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count += 1;
            }
        }
        Ok(())
    }

    /// Delete one language-scoped key.
    pub fn delete(&self, key: &LanguageScopedKey) -> Result<bool, StoreError> {
        let encoded = key.encode();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        let deleted = self
            .content
            .delete(&mut wtxn, &encoded)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        if deleted {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count = stats.entry_count.saturating_sub(1);
            }
        }
        Ok(deleted)
    }

    /// Wipe an entire language partition, version stamp included.
    ///
    /// The records and the stamp share the language prefix, so a single
    /// write transaction removes both: a cleared language can never be
    /// left with a stale stamp that would suppress the next resync.
    pub fn clear_language(&self, language: &Language) -> Result<u64, StoreError> {
        let prefix = LanguageScopedKey::language_prefix(language);
        let keys = self.collect_content_keys_with_prefix(&prefix)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &keys {
            if self.content.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(deleted);
        }
        Ok(deleted)
    }

    fn collect_content_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        let iter = self
            .content
            .iter(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        for result in iter {
            match result {
                Ok((key, _)) => {
                    if key.len() >= prefix.len() && &key[0..prefix.len()] == prefix {
                        keys.push(key.to_vec());
                    }
                }
                Err(_) => continue,
            }
        }
        Ok(keys)
    }

    // ------------------------------------------------------------------
    // Sandbox partition
    // ------------------------------------------------------------------

    /// Get raw bytes for a sandbox key.
    pub fn sandbox_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        self.sandbox
            .get(&rtxn, key)
            .map(|opt| opt.map(|bytes| bytes.to_vec()))
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Put raw bytes under a sandbox key.
    pub fn sandbox_put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        self.sandbox
            .put(&mut wtxn, key, value)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    /// Collect every sandbox entry whose key starts with `prefix`.
    pub fn sandbox_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let mut entries = Vec::new();
        let iter = self
            .sandbox
            .iter(&rtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        for result in iter {
            match result {
                Ok((key, value)) => {
                    if key.len() >= prefix.len() && &key[0..prefix.len()] == prefix {
                        entries.push((key.to_vec(), value.to_vec()));
                    }
                }
                Err(_) => continue,
            }
        }
        Ok(entries)
    }

    /// Clear the sandbox partition and write replacement entries in the
    /// same transaction.
    ///
    /// Used for both the identity-rotating reset (one replacement entry:
    /// the new identity) and `restore_all` (cleared state plus the restored
    /// records). Crashing between clear and write is impossible by
    /// construction.
    pub fn sandbox_replace_all(
        &self,
        entries: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<(), StoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        self.sandbox
            .clear(&mut wtxn)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        for (key, value) in entries {
            self.sandbox
                .put(&mut wtxn, key, value)
                .map_err(|e| StoreError::Transaction(e.to_string()))?;
        }
        wtxn.commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}
