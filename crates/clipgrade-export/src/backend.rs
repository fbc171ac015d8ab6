//! Media backend seam.
//!
//! The executor only probes files and runs FFmpeg commands. Both go through
//! [`MediaBackend`] so batches can be driven without FFmpeg installed.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use clipgrade_media::{probe_video, FfmpegCommand, FfmpegRunner, MediaResult, ProgressCallback, VideoInfo};

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Probe a file's properties.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Run one FFmpeg command to completion.
    async fn run(&self, cmd: &FfmpegCommand, on_progress: ProgressCallback) -> MediaResult<()>;
}

/// Backend using the FFmpeg and FFprobe binaries on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    runner: FfmpegRunner,
}

impl FfmpegBackend {
    /// Create a backend. With a timeout, a stuck encode is killed.
    pub fn new(timeout: Option<Duration>) -> Self {
        let runner = match timeout {
            Some(timeout) => FfmpegRunner::new().with_timeout(timeout.as_secs().max(1)),
            None => FfmpegRunner::new(),
        };
        Self { runner }
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn run(&self, cmd: &FfmpegCommand, on_progress: ProgressCallback) -> MediaResult<()> {
        self.runner.run_with_progress(cmd, on_progress).await
    }
}
