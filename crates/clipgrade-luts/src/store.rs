//! Pluggable persistence for ordered record lists.
//!
//! Catalogs are read fully on load and rewritten fully on every save.
//! [`JsonFileStore`] keeps one pretty-printed JSON array per file;
//! [`MemoryStore`] backs tests and ephemeral sessions.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use clipgrade_media::write_atomically;

use crate::error::{LutError, LutResult};

/// Durable storage for an ordered list of records.
#[async_trait]
pub trait RecordStore<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Read every record. A store that was never written yields an empty list.
    async fn load(&self) -> LutResult<Vec<T>>;

    /// Replace the stored list. Returns only once the data is durable.
    async fn save(&self, records: &[T]) -> LutResult<()>;
}

/// JSON array stored in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> LutResult<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No catalog file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, records: &[T]) -> LutResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        write_atomically(&self.path, json)
            .await
            .map_err(|e| LutError::storage(format!("writing {}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), count = records.len(), "Saved catalog");
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl<T> RecordStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync,
{
    async fn load(&self) -> LutResult<Vec<T>> {
        let guard = self
            .records
            .lock()
            .map_err(|_| LutError::storage("memory store poisoned"))?;
        Ok(guard.clone())
    }

    async fn save(&self, records: &[T]) -> LutResult<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| LutError::storage("memory store poisoned"))?;
        *guard = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    fn records() -> Vec<Record> {
        vec![
            Record { id: "b".into(), value: 2 },
            Record { id: "a".into(), value: 1 },
        ]
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Record> = JsonFileStore::new(dir.path().join("catalog.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        JsonFileStore::<Record>::new(&path).save(&records()).await.unwrap();

        // A fresh handle sees the same data, as after a restart
        let reloaded = JsonFileStore::<Record>::new(&path).load().await.unwrap();
        assert_eq!(reloaded, records());
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store: JsonFileStore<Record> = JsonFileStore::new(&path);
        assert!(matches!(store.load().await, Err(LutError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::<Record>::new();
        store.save(&records()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), records());
    }
}
