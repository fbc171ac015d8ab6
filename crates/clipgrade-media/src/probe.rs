//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use clipgrade_models::CodecFamily;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Probed properties of a video file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Probed file
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
    /// Natural width in pixels (before any display rotation)
    pub width: u32,
    /// Natural height in pixels (before any display rotation)
    pub height: u32,
    /// Nominal frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Estimated video bitrate in bits/second (container bitrate as fallback)
    pub bitrate: u64,
    /// Whether the file carries an audio stream
    pub has_audio: bool,
    /// Transfer characteristics tag (e.g. "arib-std-b67")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_transfer: Option<String>,
    /// Color primaries tag (e.g. "bt2020")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_primaries: Option<String>,
    /// Matrix coefficients tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
}

impl VideoInfo {
    /// Whether a usable visual track was found.
    pub fn has_video(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn codec_family(&self) -> CodecFamily {
        CodecFamily::from_codec_name(&self.codec)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
    color_transfer: Option<String>,
    color_primaries: Option<String>,
    color_space: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(path, &output.stdout)
}

/// Turn FFprobe's JSON into [`VideoInfo`].
pub fn parse_probe_output(path: &Path, json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::NoVisualTrack(path.to_path_buf()))?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    // Container duration, falling back to the stream's
    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    // Prefer the video stream's own bitrate; the container rate includes audio
    let bitrate = video_stream
        .bit_rate
        .as_deref()
        .or(probe.format.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        path: path.to_path_buf(),
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
        bitrate,
        has_audio,
        color_transfer: video_stream.color_transfer.clone(),
        color_primaries: video_stream.color_primaries.clone(),
        color_space: video_stream.color_space.clone(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` for "0/0", which FFprobe reports when the rate is unknown.
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|v: &f64| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONY_PROBE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160,
             "r_frame_rate": "24000/1001", "avg_frame_rate": "24000/1001",
             "bit_rate": "100000000", "color_transfer": "arib-std-b67", "color_primaries": "bt2020"},
            {"codec_type": "audio", "codec_name": "pcm_s16be"}
        ],
        "format": {"duration": "12.512000", "size": "160000000", "bit_rate": "101536000"}
    }"#;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(Path::new("/clips/C0001.MP4"), SONY_PROBE.as_bytes()).unwrap();
        assert_eq!((info.width, info.height), (3840, 2160));
        assert!((info.fps - 23.976).abs() < 0.001);
        assert_eq!(info.codec_family(), CodecFamily::Hevc);
        assert_eq!(info.bitrate, 100_000_000);
        assert!((info.duration - 12.512).abs() < 1e-9);
        assert!(info.has_audio);
        assert_eq!(info.color_transfer.as_deref(), Some("arib-std-b67"));
    }

    #[test]
    fn test_audio_only_has_no_visual_track() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        let result = parse_probe_output(Path::new("/a.m4a"), json.as_bytes());
        assert!(matches!(result, Err(MediaError::NoVisualTrack(_))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(matches!(
            probe_video("/nonexistent/clip.mp4").await,
            Err(MediaError::FileNotFound(_))
        ));
    }
}
