//! "Apply Changes" batch runner.
//!
//! A batch walks the caller's clip changes strictly in order, one clip at a
//! time:
//!
//! 1. Every deletion is applied before any other clip is touched.
//! 2. Each remaining clip is planned and exported; a failure is recorded and
//!    the batch moves on to the next clip.
//! 3. A clip's rename is applied only after its export succeeded.
//!
//! Cancellation is polled between clips. A running export always finishes or
//! fails on its own first. The batch also stops early when an in-place
//! replacement could not restore the original.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

use clipgrade_luts::AutoMapper;
use clipgrade_media::move_file;
use clipgrade_models::{BatchMessage, DestinationMode, ExportRequest};

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::executor::{ExportExecutor, ExportJob, PercentCallback};
use crate::logging::{ClipAction, ClipLogger};
use crate::metrics;
use crate::planner::plan_export;

/// Pending user edits for one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipChange {
    pub request: ExportRequest,

    /// Delete the clip instead of exporting it
    #[serde(default)]
    pub delete: bool,

    /// New file name, applied after a successful export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_to: Option<String>,

    /// Camera gamma metadata, used for auto-mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<String>,

    /// Camera color space metadata, used for auto-mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
}

impl ClipChange {
    pub fn new(request: ExportRequest) -> Self {
        Self {
            request,
            delete: false,
            rename_to: None,
            gamma: None,
            color_space: None,
        }
    }

    pub fn deletion(source: impl AsRef<Path>) -> Self {
        Self {
            delete: true,
            ..Self::new(ExportRequest::new(source))
        }
    }

    pub fn with_rename(mut self, name: impl Into<String>) -> Self {
        self.rename_to = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, gamma: impl Into<String>, color_space: impl Into<String>) -> Self {
        self.gamma = Some(gamma.into());
        self.color_space = Some(color_space.into());
        self
    }

    pub fn source(&self) -> &Path {
        &self.request.source
    }

    pub fn file_name(&self) -> String {
        self.request.file_name()
    }

    /// The requested rename, unless it keeps the current name.
    pub fn effective_rename(&self) -> Option<&str> {
        self.rename_to
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != self.file_name())
    }

    fn metadata(&self) -> Option<(&str, &str)> {
        match (&self.gamma, &self.color_space) {
            (None, None) => None,
            (gamma, color_space) => Some((
                gamma.as_deref().unwrap_or_default(),
                color_space.as_deref().unwrap_or_default(),
            )),
        }
    }
}

/// Record-store collaborator that owns the clips' persisted edits.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Store the request for a clip (after export: the consumed request).
    async fn update_request(&self, source: &Path, request: &ExportRequest) -> ExportResult<()>;

    /// A clip's file moved to `to`.
    async fn rename_clip(&self, from: &Path, to: &Path) -> ExportResult<()>;

    /// A clip was deleted.
    async fn remove_clip(&self, source: &Path) -> ExportResult<()>;
}

/// Event recorded by [`MemoryClipStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClipStoreEvent {
    Updated { source: PathBuf, request: ExportRequest },
    Renamed { from: PathBuf, to: PathBuf },
    Removed { source: PathBuf },
}

/// In-memory clip store that records every call.
#[derive(Debug, Default)]
pub struct MemoryClipStore {
    events: Mutex<Vec<ClipStoreEvent>>,
}

impl MemoryClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ClipStoreEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl ClipStore for MemoryClipStore {
    async fn update_request(&self, source: &Path, request: &ExportRequest) -> ExportResult<()> {
        self.events.lock().await.push(ClipStoreEvent::Updated {
            source: source.to_path_buf(),
            request: request.clone(),
        });
        Ok(())
    }

    async fn rename_clip(&self, from: &Path, to: &Path) -> ExportResult<()> {
        self.events.lock().await.push(ClipStoreEvent::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    async fn remove_clip(&self, source: &Path) -> ExportResult<()> {
        self.events.lock().await.push(ClipStoreEvent::Removed {
            source: source.to_path_buf(),
        });
        Ok(())
    }
}

/// A clip that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipFailure {
    pub clip: PathBuf,
    /// Status line shown to the user
    pub message: String,
    /// Full error, for logs
    pub detail: String,
}

/// A non-fatal problem reported for a clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipWarning {
    pub clip: PathBuf,
    pub message: String,
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Final locations of clips processed successfully
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<ClipFailure>,
    pub deleted: Vec<PathBuf>,
    pub warnings: Vec<ClipWarning>,
    /// Clips never started because the batch stopped early
    pub not_started: usize,
    /// Stopped by the cancellation flag
    pub cancelled: bool,
    /// Stopped by an unrecoverable replacement failure
    pub aborted: bool,
}

impl BatchReport {
    fn outcome(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.aborted {
            "aborted"
        } else if self.failed.is_empty() {
            "completed"
        } else {
            "completed_with_failures"
        }
    }
}

/// Runs batches of clip changes.
#[derive(Clone)]
pub struct BatchRunner {
    executor: ExportExecutor,
    store: Arc<dyn ClipStore>,
    automapper: Option<AutoMapper>,
}

impl BatchRunner {
    pub fn new(executor: ExportExecutor, store: Arc<dyn ClipStore>) -> Self {
        Self {
            executor,
            store,
            automapper: None,
        }
    }

    /// Fill in LUTs for baking clips that have camera metadata but no LUT.
    pub fn with_automapper(mut self, automapper: AutoMapper) -> Self {
        self.automapper = Some(automapper);
        self
    }

    fn config(&self) -> &ExportConfig {
        self.executor.config()
    }

    /// Apply `changes` in order, reporting through `tx` until done.
    pub async fn run(
        &self,
        changes: Vec<ClipChange>,
        tx: mpsc::Sender<BatchMessage>,
        cancel: watch::Receiver<bool>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let (deletions, edits): (Vec<_>, Vec<_>) = changes.into_iter().partition(|c| c.delete);
        let total = edits.len();

        info!(deletions = deletions.len(), clips = total, "Applying changes");

        if !deletions.is_empty() {
            send(&tx, BatchMessage::status(format!("Deleting {} clip(s)", deletions.len()))).await;
        }
        for (index, change) in deletions.iter().enumerate() {
            if *cancel.borrow() {
                report.cancelled = true;
                report.not_started = deletions.len() - index + total;
                return self.finish(report, &tx).await;
            }
            match self.delete_clip(change).await {
                Ok(()) => report.deleted.push(change.source().to_path_buf()),
                Err(e) => self.record_failure(&mut report, change, e, &tx).await,
            }
        }

        for (index, change) in edits.iter().enumerate() {
            if *cancel.borrow() {
                report.cancelled = true;
                report.not_started = total - index;
                break;
            }

            let file_name = change.file_name();
            send(&tx, BatchMessage::progress(index + 1, total, &file_name)).await;
            send(&tx, BatchMessage::status(format!("Processing {}", file_name))).await;

            match self.process_clip(change, &tx, &mut report).await {
                Ok(location) => report.succeeded.push(location),
                Err(e) => {
                    let fatal = e.is_batch_fatal();
                    self.record_failure(&mut report, change, e, &tx).await;
                    if fatal {
                        report.aborted = true;
                        report.not_started = total - index - 1;
                        break;
                    }
                }
            }
        }

        self.finish(report, &tx).await
    }

    async fn finish(&self, report: BatchReport, tx: &mpsc::Sender<BatchMessage>) -> BatchReport {
        let outcome = report.outcome();
        metrics::record_batch(outcome);
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            deleted = report.deleted.len(),
            outcome,
            "Batch finished"
        );

        let status = match outcome {
            "cancelled" => "Cancelled".to_string(),
            "aborted" => "Stopped: an original file could not be restored".to_string(),
            _ => format!(
                "Done: {} succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            ),
        };
        send(tx, BatchMessage::status(status)).await;
        send(
            tx,
            BatchMessage::done(report.succeeded.len(), report.failed.len(), report.cancelled),
        )
        .await;
        report
    }

    async fn record_failure(
        &self,
        report: &mut BatchReport,
        change: &ClipChange,
        error: ExportError,
        tx: &mpsc::Sender<BatchMessage>,
    ) {
        let message = error.user_message();
        warn!(clip = %change.source().display(), error = %error, "Clip failed");
        send(tx, BatchMessage::status(format!("{}: {}", change.file_name(), message))).await;
        report.failed.push(ClipFailure {
            clip: change.source().to_path_buf(),
            message,
            detail: error.to_string(),
        });
    }

    async fn warn_clip(
        &self,
        report: &mut BatchReport,
        change: &ClipChange,
        message: String,
        tx: &mpsc::Sender<BatchMessage>,
    ) {
        send(tx, BatchMessage::warning(change.file_name(), &message)).await;
        report.warnings.push(ClipWarning {
            clip: change.source().to_path_buf(),
            message,
        });
    }

    async fn delete_clip(&self, change: &ClipChange) -> ExportResult<()> {
        let file_existed = match tokio::fs::remove_file(change.source()).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        self.store.remove_clip(change.source()).await?;
        ClipLogger::new(change.source(), ClipAction::Delete).deleted(file_existed);
        Ok(())
    }

    /// Export, consume and rename one clip. Returns its final location.
    async fn process_clip(
        &self,
        change: &ClipChange,
        tx: &mpsc::Sender<BatchMessage>,
        report: &mut BatchReport,
    ) -> ExportResult<PathBuf> {
        let mut request = self.effective_request(change);
        let mut auto_mapped = false;

        if request.bake && request.lut_id.is_none() {
            if let Some(result) = self.auto_map(change).await {
                send(
                    tx,
                    BatchMessage::status(format!("{}: using LUT {}", change.file_name(), result.1)),
                )
                .await;
                request.lut_id = Some(result.0);
                auto_mapped = true;
            }
        }

        let lut = match &request.lut_id {
            Some(id) => self.executor.registry().get(id).await,
            None => None,
        };
        let needs_export = request.is_trimmed() || request.wants_bake() || !request.destination.is_in_place();
        let mut location = change.source().to_path_buf();
        let mut stored = change.request.consumed();

        if needs_export {
            let source = self.executor.probe(change.source()).await?;
            let bake_lut = lut.as_ref().filter(|_| request.bake);
            let plan = plan_export(&request, &source, bake_lut)?;

            if let Some(missing) = &plan.missing_lut {
                // Keep the grading edit so it can be baked once the LUT is back
                stored.lut_id = change.request.lut_id.clone();
                stored.bake = change.request.bake;
                let message = format!("LUT {} is not available; the grade was kept for a later export", missing);
                self.warn_clip(report, change, message, tx).await;
            }

            if plan.requires_export() || !request.destination.is_in_place() {
                let mut job = ExportJob::new(plan);
                let outcome = self
                    .executor
                    .execute(&mut job, &request, &source, Some(percent_callback(tx, change.file_name())))
                    .await?;
                for warning in &outcome.warnings {
                    self.warn_clip(report, change, warning.to_string(), tx).await;
                }
                location = outcome.output;
            }
        }

        if !auto_mapped {
            self.learn_manual_choice(change, lut.as_ref()).await;
        }

        self.store.update_request(change.source(), &stored).await?;

        if request.destination.is_in_place() {
            if let Some(new_name) = change.effective_rename() {
                location = self.rename_clip(change.source(), new_name).await?;
            }
        }

        Ok(location)
    }

    /// The request with the configured destination folder and rename applied.
    fn effective_request(&self, change: &ClipChange) -> ExportRequest {
        let mut request = change.request.clone();
        let rename = change.effective_rename().map(str::to_string);
        request.destination = match (request.destination, &self.config().destination_folder) {
            (DestinationMode::ReplaceInPlace, Some(folder)) => DestinationMode::CopyToFolder {
                folder: folder.clone(),
                rename,
            },
            (DestinationMode::CopyToFolder { folder, rename: None }, _) => {
                DestinationMode::CopyToFolder { folder, rename }
            }
            (destination, _) => destination,
        };
        request
    }

    async fn auto_map(&self, change: &ClipChange) -> Option<(clipgrade_models::LutId, String)> {
        let automapper = self.automapper.as_ref()?;
        let (gamma, color_space) = change.metadata()?;
        let candidates = self.executor.registry().list().await;
        let result = automapper.resolve(gamma, color_space, &candidates).await?;
        info!(
            clip = %change.source().display(),
            lut = %result.lut_name,
            source = ?result.source,
            "Auto-mapped LUT"
        );
        Some((result.lut_id, result.lut_name))
    }

    async fn learn_manual_choice(&self, change: &ClipChange, lut: Option<&clipgrade_models::LutDescriptor>) {
        let (Some(automapper), Some(lut), Some((gamma, color_space))) =
            (self.automapper.as_ref(), lut, change.metadata())
        else {
            return;
        };
        let candidates = self.executor.registry().list().await;
        if let Err(e) = automapper
            .record_manual_choice(gamma, color_space, lut, &candidates)
            .await
        {
            warn!(clip = %change.source().display(), "Failed to learn LUT choice: {}", e);
        }
    }

    async fn rename_clip(&self, source: &Path, new_name: &str) -> ExportResult<PathBuf> {
        let target = match source.parent() {
            Some(parent) => parent.join(new_name),
            None => PathBuf::from(new_name),
        };
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ExportError::RenameConflict(target));
        }

        move_file(source, &target).await?;
        self.store.rename_clip(source, &target).await?;
        ClipLogger::new(source, ClipAction::Rename).renamed(&target);
        Ok(target)
    }
}

fn percent_callback(tx: &mpsc::Sender<BatchMessage>, file_name: String) -> PercentCallback {
    let tx = tx.clone();
    let last = std::sync::atomic::AtomicU8::new(u8::MAX);
    Box::new(move |percent| {
        // Only forward changes; drop events if the channel is full
        if last.swap(percent, std::sync::atomic::Ordering::Relaxed) != percent {
            let _ = tx.try_send(BatchMessage::clip_progress(file_name.clone(), percent));
        }
    })
}

async fn send(tx: &mpsc::Sender<BatchMessage>, message: BatchMessage) {
    if tx.send(message).await.is_err() {
        tracing::debug!("Batch status receiver dropped");
    }
}
