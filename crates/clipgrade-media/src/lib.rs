#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and color pipeline for camera clip exports.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with progress parsing
//! - FFprobe video information
//! - `.cube` 3D LUT parsing and writing
//! - Color transforms shared by still previews and video compositions
//! - Cross-device moves and atomic file replacement

pub mod command;
pub mod cube;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod transform;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use cube::{parse_cube, read_cube, ColorCube};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, replace_atomically, write_atomically};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use transform::{ColorTransform, FrameDuration, VideoComposition};
