//! Hexmire Client - API access and prefetch synchronization.
//!
//! Wraps the content server's REST API in a typed client and keeps the
//! offline cache in `hexmire-store` populated via the export archive.

pub mod api;
pub mod config;
pub mod error;
pub mod sync;

pub use api::{ApiClient, ApiError, ExportArchive, HexResponse};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use sync::{ContentSource, PrefetchSynchronizer, SyncError, SyncReport, PROGRESS_INTERVAL};
