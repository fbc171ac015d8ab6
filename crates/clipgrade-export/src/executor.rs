//! Export executor.
//!
//! Runs one [`ExportPlan`] against one source:
//!
//! 1. Render into a private scratch directory (stream copy or re-encode with
//!    the planned color composition attached).
//! 2. Re-probe the result and compare it with the source.
//! 3. Move the result to its destination. In-place exports go through the
//!    backup/replace protocol so the original is never lost.
//!
//! Job state moves `Pending -> Running -> Completed | Failed | Cancelled`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use clipgrade_luts::LutRegistry;
use clipgrade_media::{
    move_file, replace_atomically, FfmpegCommand, FfmpegProgress, ProgressCallback, VideoComposition, VideoInfo,
};
use clipgrade_models::{DestinationMode, ExportRequest, JobState};

use crate::backend::MediaBackend;
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::logging::ClipLogger;
use crate::metrics;
use crate::planner::{ExportPlan, ExportStrategy};
use crate::validation::{validate_output, QualityWarning};

/// Encode progress as a whole percentage of the planned range.
pub type PercentCallback = Box<dyn Fn(u8) + Send + 'static>;

/// One clip's export and its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct ExportJob {
    pub id: Uuid,
    pub plan: ExportPlan,
    state: JobState,
    pub warnings: Vec<QualityWarning>,
    pub error: Option<String>,
}

impl ExportJob {
    pub fn new(plan: ExportPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan,
            state: JobState::Pending,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: JobState) -> ExportResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ExportError::internal(format!(
                "invalid job transition {} -> {}",
                self.state, next
            )));
        }
        debug!(job_id = %self.id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        Ok(())
    }

    /// Cancel a job that never started.
    pub fn cancel(&mut self) -> ExportResult<()> {
        self.transition(JobState::Cancelled)
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    /// Where the exported file now lives
    pub output: PathBuf,
    /// Whether the source file itself was replaced
    pub replaced_in_place: bool,
    pub warnings: Vec<QualityWarning>,
    pub duration_secs: f64,
}

/// Where a finished export should end up.
pub fn resolve_destination(request: &ExportRequest) -> PathBuf {
    match &request.destination {
        DestinationMode::ReplaceInPlace => request.source.clone(),
        DestinationMode::CopyToFolder { folder, rename } => {
            let name = rename
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| request.file_name());
            folder.join(name)
        }
    }
}

/// Executes export jobs.
#[derive(Clone)]
pub struct ExportExecutor {
    backend: Arc<dyn MediaBackend>,
    registry: LutRegistry,
    config: ExportConfig,
}

impl ExportExecutor {
    pub fn new(backend: Arc<dyn MediaBackend>, registry: LutRegistry, config: ExportConfig) -> Self {
        Self {
            backend,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &LutRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Probe a source clip.
    pub async fn probe(&self, path: &Path) -> ExportResult<VideoInfo> {
        Ok(self.backend.probe(path).await?)
    }

    /// Execute `job` for `request`, whose source was probed as `source`.
    pub async fn execute(
        &self,
        job: &mut ExportJob,
        request: &ExportRequest,
        source: &VideoInfo,
        on_progress: Option<PercentCallback>,
    ) -> ExportResult<ExportOutcome> {
        let logger = ClipLogger::for_export(&request.source, job.id, &job.plan);
        let span = logger.span();
        let started = Instant::now();
        let strategy = job.plan.strategy.as_str();

        job.transition(JobState::Running)?;

        let scratch_dir = self.config.work_dir.join(job.id.to_string());
        let result = self
            .run_job(job, request, source, &scratch_dir, on_progress, &logger)
            .instrument(span)
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(outcome) => {
                remove_scratch(&scratch_dir).await;
                job.transition(JobState::Completed)?;
                metrics::record_export(strategy, "completed", elapsed);
                logger.exported(&outcome.output, elapsed);
                Ok(ExportOutcome {
                    duration_secs: elapsed,
                    ..outcome
                })
            }
            Err(e) => {
                if self.config.keep_scratch_on_failure {
                    warn!(dir = %scratch_dir.display(), "Keeping scratch files of failed export");
                } else {
                    remove_scratch(&scratch_dir).await;
                }
                job.error = Some(e.to_string());
                job.transition(JobState::Failed)?;
                metrics::record_export(strategy, "failed", elapsed);
                logger.failed(&e);
                Err(e)
            }
        }
    }

    async fn run_job(
        &self,
        job: &mut ExportJob,
        request: &ExportRequest,
        source: &VideoInfo,
        scratch_dir: &Path,
        on_progress: Option<PercentCallback>,
        logger: &ClipLogger,
    ) -> ExportResult<ExportOutcome> {
        let destination = resolve_destination(request);
        let replaced_in_place = destination == request.source;
        if !replaced_in_place && destination.exists() {
            return Err(ExportError::RenameConflict(destination));
        }

        tokio::fs::create_dir_all(scratch_dir).await?;
        let scratch_output = scratch_dir.join(request.file_name());

        let composition = match job.plan.strategy.color_transform().cloned() {
            Some(lut) => match self.registry.load_transform(&lut.id).await {
                Ok(transform) => Some(
                    transform
                        .composition(source, job.plan.range.start, job.plan.range.duration, scratch_dir)
                        .await?,
                ),
                Err(e) => {
                    // Degrade to a plain re-encode rather than failing the clip
                    let warning = QualityWarning::ColorTransformSkipped {
                        lut: lut.name.clone(),
                        reason: e.to_string(),
                    };
                    logger.quality_warning(&warning);
                    metrics::record_quality_warning(warning.kind());
                    job.warnings.push(warning);
                    job.plan = job.plan.without_color_transform();
                    None
                }
            },
            None => None,
        };

        let cmd = build_command(&job.plan, &request.source, &scratch_output, composition.as_ref());
        let total_ms = (job.plan.range.duration * 1000.0).round() as i64;
        let callback: ProgressCallback = match on_progress {
            Some(on_percent) => Box::new(move |p: FfmpegProgress| on_percent(p.percentage(total_ms).round() as u8)),
            None => Box::new(|_| {}),
        };

        logger.encode_started();
        self.backend.run(&cmd, callback).await?;
        if !scratch_output.exists() {
            return Err(ExportError::export_failed("encoder produced no output file"));
        }
        logger.encode_finished();

        let output_info = self
            .backend
            .probe(&scratch_output)
            .await
            .map_err(|e| ExportError::export_failed(format!("output could not be probed: {}", e)))?;

        let warnings = validate_output(
            source,
            &output_info,
            job.plan.strategy.is_reencode(),
            &self.config.validation,
        );
        for warning in &warnings {
            logger.quality_warning(warning);
            metrics::record_quality_warning(warning.kind());
        }
        job.warnings.extend(warnings);

        if replaced_in_place {
            replace_atomically(&destination, &scratch_output).await?;
        } else if destination.exists() {
            return Err(ExportError::RenameConflict(destination));
        } else {
            move_file(&scratch_output, &destination).await?;
        }

        Ok(ExportOutcome {
            output: destination,
            replaced_in_place,
            warnings: job.warnings.clone(),
            duration_secs: 0.0,
        })
    }
}

/// Build the FFmpeg command for a plan.
pub fn build_command(
    plan: &ExportPlan,
    source: &Path,
    output: &Path,
    composition: Option<&VideoComposition>,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(source, output);
    if plan.range.start > 0.0 {
        cmd = cmd.seek(plan.range.start);
    }
    if plan.trimmed {
        cmd = cmd.duration(plan.range.duration);
    }
    cmd = cmd.map_video_and_audio();

    cmd = match &plan.strategy {
        ExportStrategy::Passthrough => cmd.codec_copy(),
        ExportStrategy::Reencode { quality, .. } => {
            let cmd = cmd.encoding(&quality.encoding());
            match composition {
                Some(composition) => composition.attach(cmd),
                None => cmd,
            }
        }
    };

    cmd.keep_metadata()
}

async fn remove_scratch(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), "Failed to remove scratch directory: {}", e);
        }
    }
}
