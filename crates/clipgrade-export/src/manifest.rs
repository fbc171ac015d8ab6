//! JSON manifest of pending clip changes.
//!
//! The command-line front end keeps clip edits in a manifest file: a JSON
//! array of [`ClipChange`]s. During a batch the manifest is the clip store,
//! so consumed edits, renames and deletions are written back as they happen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use clipgrade_luts::{JsonFileStore, RecordStore};
use clipgrade_models::ExportRequest;

use crate::batch::{ClipChange, ClipStore};
use crate::error::{ExportError, ExportResult};

/// Clip store backed by a manifest file.
pub struct ManifestStore {
    path: PathBuf,
    store: Arc<dyn RecordStore<ClipChange>>,
    changes: Mutex<Vec<ClipChange>>,
}

impl ManifestStore {
    /// Load the manifest at `path`. A missing file is an empty manifest.
    pub async fn open(path: impl Into<PathBuf>) -> ExportResult<Self> {
        let path = path.into();
        let store: JsonFileStore<ClipChange> = JsonFileStore::new(path.clone());
        let changes = store
            .load()
            .await
            .map_err(|e| ExportError::store(format!("reading {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), clips = changes.len(), "Loaded manifest");
        Ok(Self {
            path,
            store: Arc::new(store),
            changes: Mutex::new(changes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current clip changes, in manifest order.
    pub async fn changes(&self) -> Vec<ClipChange> {
        self.changes.lock().await.clone()
    }

    async fn mutate<F>(&self, apply: F) -> ExportResult<()>
    where
        F: FnOnce(&mut Vec<ClipChange>),
    {
        let mut changes = self.changes.lock().await;
        let mut updated = changes.clone();
        apply(&mut updated);
        self.store
            .save(&updated)
            .await
            .map_err(|e| ExportError::store(format!("writing {}: {}", self.path.display(), e)))?;
        *changes = updated;
        Ok(())
    }
}

#[async_trait]
impl ClipStore for ManifestStore {
    async fn update_request(&self, source: &Path, request: &ExportRequest) -> ExportResult<()> {
        self.mutate(|changes| {
            for change in changes.iter_mut().filter(|c| c.request.source == source) {
                change.request = request.clone();
            }
        })
        .await
    }

    async fn rename_clip(&self, from: &Path, to: &Path) -> ExportResult<()> {
        self.mutate(|changes| {
            for change in changes.iter_mut().filter(|c| c.request.source == from) {
                change.request.source = to.to_path_buf();
                change.rename_to = None;
            }
        })
        .await
    }

    async fn remove_clip(&self, source: &Path) -> ExportResult<()> {
        self.mutate(|changes| changes.retain(|c| c.request.source != source))
            .await
    }
}
