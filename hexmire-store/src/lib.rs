//! Hexmire Store - Offline Content Cache
//!
//! Language-partitioned LMDB cache for server content plus the sandbox
//! overlay store for user-local edits. The fallible [`LmdbBackend`] is the
//! raw storage layer; [`OfflineCache`] and [`SandboxStore`] wrap it with
//! the never-throws contract the presentation layer depends on.

pub mod backend;
pub mod cache;
pub mod key;
pub mod sandbox;

pub use backend::{LmdbBackend, StoreError, StoreStats};
pub use cache::OfflineCache;
pub use key::LanguageScopedKey;
pub use sandbox::SandboxStore;
