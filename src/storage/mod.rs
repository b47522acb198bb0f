//! Note Storage
//!
//! Notes are UTF-8 text objects addressed by key. The HTTP layer only talks
//! to the [`NoteStore`] trait; the S3 backend is what runs in production and
//! the in-memory backend serves tests and local development.

mod memory;
mod bucket;

use std::sync::Arc;

use serde::Serialize;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

pub use memory::MemoryNoteStore;
pub use bucket::S3NoteStore;

/// Longest key an S3-compatible store accepts, in bytes
pub const MAX_KEY_BYTES: usize = 1024;

/// Listing entry for a stored note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    pub key: String,
    pub size: u64,
    /// Last-modified timestamp as reported by the store
    pub last_modified: Option<String>,
}

/// Where a store keeps its notes, reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub backend: String,
    pub bucket: String,
    pub endpoint: String,
}

/// Common trait for note stores
#[async_trait::async_trait]
pub trait NoteStore: Send + Sync {
    /// List notes in key order, optionally restricted to a key prefix
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<NoteSummary>>;

    /// Read a note's content
    async fn read(&self, key: &str) -> Result<String>;

    /// Create or overwrite a note
    async fn write(&self, key: &str, content: &str) -> Result<()>;

    /// Describe the backing location
    fn describe(&self) -> StoreInfo;
}

/// Check that a key is usable as an object key
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("filename is empty".into()));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(Error::InvalidKey(format!(
            "filename is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_BYTES
        )));
    }
    Ok(())
}

/// Build the store selected by the configuration
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn NoteStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let store = S3NoteStore::new(config)?;
            tracing::info!(
                "Using S3 note store: bucket '{}' at {}",
                config.bucket,
                config.endpoint
            );
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory note store, notes will not survive a restart");
            Ok(Arc::new(MemoryNoteStore::new()))
        }
    }
}
