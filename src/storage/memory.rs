//! In-memory note store

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::{validate_key, NoteStore, NoteSummary, StoreInfo};
use crate::error::{Error, Result};

/// Note store backed by an ordered map
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<String, String>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notes
    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<NoteSummary>> {
        let notes = self.notes.read().await;
        let prefix = prefix.unwrap_or("");
        Ok(notes
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, content)| NoteSummary {
                key: key.clone(),
                size: content.len() as u64,
                last_modified: None,
            })
            .collect())
    }

    async fn read(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        self.notes
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NoteNotFound(key.to_string()))
    }

    async fn write(&self, key: &str, content: &str) -> Result<()> {
        validate_key(key)?;
        self.notes
            .write()
            .await
            .insert(key.to_string(), content.to_string());
        Ok(())
    }

    fn describe(&self) -> StoreInfo {
        StoreInfo {
            backend: "memory".to_string(),
            bucket: "memory".to_string(),
            endpoint: "memory://".to_string(),
        }
    }
}
